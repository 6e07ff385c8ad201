use access::{NoSession, Resource, Verb};
use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use roster::StoreError;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub const RETRY_MESSAGE: &str = "Something went wrong, please try again";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input")]
    Validation(Vec<FieldError>),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Authentication required")]
    AuthRequired,

    #[error("Not allowed to {verb:?} {resource:?}")]
    Forbidden { resource: Resource, verb: Verb },

    #[error("Internal error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict { field, .. } => {
                AppError::Validation(vec![FieldError::new(field, "Already in use")])
            }
            other => AppError::InternalError(Box::new(other)),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(vec![FieldError::new("body", &rejection.body_text())])
    }
}

impl From<NoSession> for AppError {
    fn from(_: NoSession) -> Self {
        AppError::AuthRequired
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::AuthRequired => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match self {
            AppError::Validation(errors) => json!({ "errors": errors }),
            AppError::InternalError(e) => {
                error!("Request failed: {e}");
                json!({ "error": RETRY_MESSAGE })
            }
            other => json!({ "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}
