//! Backend for a coaching company's CRM: clients, products, engagements and
//! who on staff may touch what.
//!
//!
//!
//! # General Infrastructure
//! - Frontend talks to this server over JSON
//! - Redis holds CRM records and the auth provider's sessions
//! - A scheduler (cron) hits `POST /cron/grace-periods` once a day
//! - Staff can trigger the same job by hand with `GET /cron/grace-periods` or the `grace` CLI
//!
//!
//!
//! # Access Control
//!
//! **Goal**: every screen and action is gated by a role, with no string typos possible.
//!
//! - Session token comes from `Authorization: Bearer` or the `session_token` cookie
//! - Token resolves to `{ user: { id, role } }` in Redis, written by the auth provider
//! - Role resolves to a capability statement from the static matrix in the `access` crate
//! - Unknown roles on a signed-in user act as `user`
//! - No session means no capabilities at all, answered with 401
//! - `GET /permissions` hands the statement to the frontend for UI gating
//!
//!
//!
//! # Grace Periods
//!
//! A client whose last engagement ended more than `GRACE_THRESHOLD_DAYS` ago gets
//! one active grace period. Starting a new activity period, or an operator
//! closing it, resolves it. See the `grace` crate for the detection rules.
//!
//! ## Cron Response
//! ```json
//! { "success": true, "data": { "created": [], "skipped": [], "errors": [] }, "timestamp": "..." }
//! { "success": false, "error": "Grace period detection failed", "timestamp": "..." }
//! ```
//!
//!
//!
//! # Setup
//!
//! Environment
//! - `RUST_PORT`: defaults to 1111
//! - `REDIS_URL`: defaults to `redis://redis:6379`
//! - `GRACE_THRESHOLD_DAYS`: required
//! - `CRON_SECRET`: optional, read from `/run/secrets/CRON_SECRET` or the environment
//!
//! Run locally.
//! ```sh
//! GRACE_THRESHOLD_DAYS=30 REDIS_URL=redis://127.0.0.1:6379 RUST_LOG=info cargo run -p coach
//! ```
//!
//! Seed demo data.
//! ```sh
//! cargo run -p tester -- --redis-url redis://127.0.0.1:6379
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
pub mod routes;
pub mod state;
pub mod utils;

use config::Config;
use routes::{
    create_client_handler, cron_grace_periods_handler, list_grace_periods_handler,
    permissions_handler, resolve_grace_period_handler, start_activity_period_handler,
};
use state::State;

pub fn build_router(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route(
            "/cron/grace-periods",
            post(cron_grace_periods_handler).get(cron_grace_periods_handler),
        )
        .route("/permissions", get(permissions_handler))
        .route("/clients", post(create_client_handler))
        .route(
            "/clients/{id}/activity-periods",
            post(start_activity_period_handler),
        )
        .route(
            "/clients/{id}/grace-periods/resolve",
            post(resolve_grace_period_handler),
        )
        .route("/grace-periods", get(list_grace_periods_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = State::new(config).await?;

    info!("Starting server...");
    let app = build_router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
