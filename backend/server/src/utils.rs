use std::sync::LazyLock;

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::{
        HeaderMap,
        header::{AUTHORIZATION, COOKIE},
    },
};
use chrono::NaiveDate;
use regex::Regex;
use uuid::Uuid;

use crate::error::{AppError, FieldError};

pub const SESSION_COOKIE: &str = "session_token";

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));

/// Bearer token, or the session cookie when there is no Authorization header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = bearer_token(headers) {
        return Some(token);
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// `Json` whose rejections come back as field errors instead of axum's plain text.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// Collects every field problem before failing, so forms can show them all at once.
#[derive(Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(&mut self, field: &str, message: &str) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn required(&mut self, field: &str, value: Option<&str>) -> Option<String> {
        match value.map(str::trim) {
            Some(value) if !value.is_empty() => Some(value.to_string()),
            _ => {
                self.reject(field, "Required");
                None
            }
        }
    }

    pub fn email(&mut self, field: &str, value: Option<&str>) -> Option<String> {
        let value = self.required(field, value)?;

        if EMAIL.is_match(&value) {
            Some(value.to_lowercase())
        } else {
            self.reject(field, "Invalid email address");
            None
        }
    }

    pub fn uuid(&mut self, field: &str, value: &str) -> Option<Uuid> {
        match Uuid::parse_str(value.trim()) {
            Ok(id) => Some(id),
            Err(_) => {
                self.reject(field, "Invalid id");
                None
            }
        }
    }

    pub fn optional_uuid(&mut self, field: &str, value: Option<&str>) -> Option<Option<Uuid>> {
        match value.map(str::trim).filter(|value| !value.is_empty()) {
            None => Some(None),
            Some(value) => self.uuid(field, value).map(Some),
        }
    }

    pub fn date(&mut self, field: &str, value: &str) -> Option<NaiveDate> {
        match NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                self.reject(field, "Expected a date as YYYY-MM-DD");
                None
            }
        }
    }

    pub fn optional_date(&mut self, field: &str, value: Option<&str>) -> Option<Option<NaiveDate>> {
        match value.map(str::trim).filter(|value| !value.is_empty()) {
            None => Some(None),
            Some(value) => self.date(field, value).map(Some),
        }
    }

    /// Hands back the parsed value when every field passed.
    pub fn finish<T>(self, value: Option<T>) -> Result<T, AppError> {
        match value {
            Some(value) if self.errors.is_empty() => Ok(value),
            _ => Err(AppError::Validation(self.errors)),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_beats_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(COOKIE, HeaderValue::from_static("session_token=xyz"));

        assert_eq!(session_token(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; session_token=xyz ; other=1"),
        );

        assert_eq!(session_token(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn no_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        headers.insert(COOKIE, HeaderValue::from_static("session_token="));
        assert_eq!(session_token(&headers), None);
    }

    #[test]
    fn collects_all_field_errors() {
        let mut v = Validator::new();
        assert_eq!(v.required("name", Some("   ")), None);
        assert_eq!(v.email("email", Some("not-an-email")), None);
        assert_eq!(v.uuid("clientId", "123"), None);

        let Err(AppError::Validation(errors)) = v.finish(Some(())) else {
            panic!("expected validation error");
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["name", "email", "clientId"]);
    }

    #[test]
    fn accepts_valid_input() {
        let mut v = Validator::new();
        assert_eq!(
            v.email("email", Some(" Coach@Example.com ")).as_deref(),
            Some("coach@example.com")
        );
        assert_eq!(v.optional_uuid("productId", None), Some(None));
        assert_eq!(
            v.optional_date("endDate", Some("2026-10-16")),
            Some(NaiveDate::from_ymd_opt(2026, 10, 16))
        );
        assert!(v.finish(Some(())).is_ok());
    }

    #[test]
    fn rejects_bad_dates() {
        let mut v = Validator::new();
        assert_eq!(v.date("startDate", "16/10/2026"), None);
        assert_eq!(v.optional_date("endDate", Some("2026-02-30")), None);
        assert!(v.finish(Some(())).is_err());
    }
}
