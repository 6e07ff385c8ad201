use std::sync::Arc;

use access::{CapabilityStatement, Principal, Resource, Verb};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use grace::DetectionReport;
use roster::{ActivityPeriod, Client, GracePeriod};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    error::AppError,
    state::State as AppState,
    utils::{JsonBody, Validator, bearer_token},
};

#[derive(Serialize)]
pub struct CronResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DetectionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CronResponse {
    fn success(data: DetectionReport, timestamp: DateTime<Utc>) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp,
        }
    }

    fn failure(error: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            timestamp,
        }
    }
}

fn secret_matches(presented: Option<&str>, secret: &str) -> bool {
    presented.is_some_and(|presented| bool::from(presented.as_bytes().ct_eq(secret.as_bytes())))
}

/// Scheduled (`POST`) and manual (`GET`) trigger for grace period detection.
pub async fn cron_grace_periods_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let timestamp = Utc::now();

    if let Some(secret) = &state.config.cron_secret {
        if !secret_matches(bearer_token(&headers).as_deref(), secret) {
            warn!("Rejected grace period trigger without a valid cron secret");
            return (
                StatusCode::UNAUTHORIZED,
                Json(CronResponse::failure("Unauthorized", timestamp)),
            )
                .into_response();
        }
    }

    match state.detector.run(timestamp).await {
        Ok(report) => {
            if report.has_errors() {
                warn!(
                    "Grace period detection finished with {} failed clients",
                    report.errors.len()
                );
            }

            (StatusCode::OK, Json(CronResponse::success(report, timestamp))).into_response()
        }
        Err(e) => {
            error!("Grace period detection failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CronResponse::failure(
                    "Grace period detection failed",
                    timestamp,
                )),
            )
                .into_response()
        }
    }
}

#[derive(Serialize)]
pub struct PermissionsResponse {
    pub principal: Principal,
    pub statement: &'static CapabilityStatement,
}

pub async fn permissions_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<PermissionsResponse>, AppError> {
    let principal = state.principal(&headers).await?;
    let statement = principal.statement();

    Ok(Json(PermissionsResponse {
        principal,
        statement,
    }))
}

#[derive(Deserialize)]
pub struct NewClient {
    name: Option<String>,
    email: Option<String>,
}

pub async fn create_client_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    JsonBody(payload): JsonBody<NewClient>,
) -> Result<(StatusCode, Json<Client>), AppError> {
    let principal = state
        .authorize(&headers, Resource::Client, Verb::Create)
        .await?;

    let mut v = Validator::new();
    let name = v.required("name", payload.name.as_deref());
    let email = v.email("email", payload.email.as_deref());
    let (name, email) = v.finish(name.zip(email))?;

    let client = Client::new(name, email, Utc::now());
    state.store.insert_client(&client).await?;

    info!("{} created client {}", principal.id, client.id);
    Ok((StatusCode::CREATED, Json(client)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivityPeriod {
    product_id: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedEngagement {
    pub activity_period: ActivityPeriod,
    pub resolved_grace_period: Option<GracePeriod>,
}

/// Starts a new engagement. Any active grace period for the client is closed.
pub async fn start_activity_period_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(client_id): Path<String>,
    JsonBody(payload): JsonBody<NewActivityPeriod>,
) -> Result<(StatusCode, Json<StartedEngagement>), AppError> {
    let principal = state
        .authorize(&headers, Resource::ActivityPeriod, Verb::Create)
        .await?;

    let mut v = Validator::new();
    let client_id = v.uuid("clientId", &client_id);
    let product_id = v.optional_uuid("productId", payload.product_id.as_deref());
    let start_date = v
        .required("startDate", payload.start_date.as_deref())
        .and_then(|raw| v.date("startDate", &raw));
    let end_date = v.optional_date("endDate", payload.end_date.as_deref());

    if let (Some(start), Some(Some(end))) = (start_date, end_date) {
        if end < start {
            v.reject("endDate", "Must not be before the start date");
        }
    }

    let (((client_id, product_id), start_date), end_date) =
        v.finish(client_id.zip(product_id).zip(start_date).zip(end_date))?;

    state
        .store
        .get_client(client_id)
        .await?
        .ok_or(AppError::NotFound("Client"))?;

    if let Some(product_id) = product_id {
        state
            .store
            .get_product(product_id)
            .await?
            .ok_or(AppError::NotFound("Product"))?;
    }

    let activity_period = ActivityPeriod {
        id: Uuid::new_v4(),
        client_id,
        product_id,
        start_date,
        end_date,
    };
    state.store.insert_activity_period(&activity_period).await?;

    let resolved_grace_period = state
        .store
        .resolve_grace_period(client_id, Utc::now())
        .await?;

    info!(
        "{} started activity period {} for client {client_id}",
        principal.id, activity_period.id
    );
    if let Some(grace) = &resolved_grace_period {
        info!("Grace period {} for client {client_id} resolved by new engagement", grace.id);
    }

    Ok((
        StatusCode::CREATED,
        Json(StartedEngagement {
            activity_period,
            resolved_grace_period,
        }),
    ))
}

pub async fn list_grace_periods_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<GracePeriod>>, AppError> {
    state
        .authorize(&headers, Resource::GracePeriod, Verb::List)
        .await?;

    Ok(Json(state.store.list_active_grace_periods().await?))
}

/// Operator closes a client's active grace period by hand.
pub async fn resolve_grace_period_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(client_id): Path<String>,
) -> Result<Json<GracePeriod>, AppError> {
    let principal = state
        .authorize(&headers, Resource::GracePeriod, Verb::Update)
        .await?;

    let mut v = Validator::new();
    let client_id = v.uuid("clientId", &client_id);
    let client_id = v.finish(client_id)?;

    let grace = state
        .store
        .resolve_grace_period(client_id, Utc::now())
        .await?
        .ok_or(AppError::NotFound("Active grace period"))?;

    info!("{} resolved grace period {} for client {client_id}", principal.id, grace.id);
    Ok(Json(grace))
}
