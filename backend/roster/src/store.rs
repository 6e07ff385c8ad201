use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{ActivityPeriod, Client, GracePeriod, Product};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Corrupt record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{field} already in use: {value}")]
    Conflict { field: &'static str, value: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result of inserting a grace period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    /// The client already had an active grace period; nothing was written.
    AlreadyActive,
}

/// Persistence for the CRM records the access and grace-period logic needs.
///
/// Implementations must enforce "at most one active grace period per client"
/// inside [`Store::insert_grace_period`] itself, so concurrent detector runs
/// cannot both create one.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn list_clients(&self) -> Result<Vec<Client>, StoreError>;
    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, StoreError>;
    /// Fails with [`StoreError::Conflict`] on a duplicate email.
    async fn insert_client(&self, client: &Client) -> Result<(), StoreError>;

    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;
    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError>;
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;

    async fn list_activity_periods(&self) -> Result<Vec<ActivityPeriod>, StoreError>;
    async fn insert_activity_period(&self, period: &ActivityPeriod) -> Result<(), StoreError>;

    async fn active_grace_period(&self, client_id: Uuid) -> Result<Option<GracePeriod>, StoreError>;
    async fn list_active_grace_periods(&self) -> Result<Vec<GracePeriod>, StoreError>;
    async fn insert_grace_period(&self, grace: &GracePeriod) -> Result<InsertOutcome, StoreError>;
    /// Closes the client's active grace period, returning it in its resolved state.
    async fn resolve_grace_period(
        &self,
        client_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<GracePeriod>, StoreError>;
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
