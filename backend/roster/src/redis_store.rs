//! # Redis
//!
//! Primary store for CRM records the server and the grace-period job touch.
//!
//! ## Layout
//!
//! - One hash per record type, record id -> JSON: `clients`, `products`,
//!   `activity_periods`, `grace_periods`
//! - `clients:email`: normalized email -> client id, the uniqueness index for emails
//! - `grace_periods:active`: client id -> grace period id. A field exists only
//!   while that client's grace period is active, so `HSETNX` on it is the
//!   "one active grace period per client" constraint
//!
//! ## Atomicity
//!
//! Anything that has to check one key and write another runs as a Lua script, so
//! two detector runs racing on the same client cannot both insert.
//!
//! ## Volume
//!
//! SMB scale: a few thousand clients, a handful of periods each. Full-hash reads
//! (`HVALS`) are fine at this size.
use std::{sync::LazyLock, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{
    AsyncCommands, Client as RedisClient, Script,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;
use uuid::Uuid;

use crate::{
    models::{ActivityPeriod, Client, GracePeriod, Product},
    store::{InsertOutcome, Store, StoreError, normalize_email},
};

pub const CLIENTS: &str = "clients";
pub const CLIENT_EMAILS: &str = "clients:email";
pub const PRODUCTS: &str = "products";
pub const ACTIVITY_PERIODS: &str = "activity_periods";
pub const GRACE_PERIODS: &str = "grace_periods";
pub const ACTIVE_GRACE_PERIODS: &str = "grace_periods:active";

// KEYS[1] index hash, KEYS[2] record hash
// ARGV[1] index field, ARGV[2] record id, ARGV[3] record json
const INSERT_UNIQUE: &str = r"
if redis.call('HSETNX', KEYS[1], ARGV[1], ARGV[2]) == 1 then
    redis.call('HSET', KEYS[2], ARGV[2], ARGV[3])
    return 1
end
return 0
";

// KEYS[1] active index, KEYS[2] grace period hash
// ARGV[1] client id, ARGV[2] grace period id, ARGV[3] resolved record json
const RESOLVE_ACTIVE: &str = r"
if redis.call('HGET', KEYS[1], ARGV[1]) ~= ARGV[2] then
    return 0
end
redis.call('HDEL', KEYS[1], ARGV[1])
redis.call('HSET', KEYS[2], ARGV[2], ARGV[3])
return 1
";

static INSERT_UNIQUE_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(INSERT_UNIQUE));
static RESOLVE_ACTIVE_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(RESOLVE_ACTIVE));

#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(Duration::from_millis(100));

        let client = RedisClient::open(redis_url)?;
        let connection = client.get_connection_manager_with_config(config).await?;

        Ok(Self::new(connection))
    }

    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }

    async fn values<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StoreError> {
        let mut conn = self.connection.clone();
        let raw: Vec<String> = conn.hvals(key).await?;

        raw.iter()
            .map(|value| serde_json::from_str(value).map_err(StoreError::from))
            .collect()
    }

    async fn get<T: DeserializeOwned>(&self, key: &str, id: Uuid) -> Result<Option<T>, StoreError> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.hget(key, id.to_string()).await?;

        raw.map(|value| serde_json::from_str(&value))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn put<T: Serialize>(&self, key: &str, id: Uuid, record: &T) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let json = serde_json::to_string(record)?;
        let _: () = conn.hset(key, id.to_string(), json).await?;
        Ok(())
    }

    async fn insert_unique<T: Serialize>(
        &self,
        index_key: &str,
        index_field: &str,
        record_key: &str,
        id: Uuid,
        record: &T,
    ) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let json = serde_json::to_string(record)?;

        let inserted: i64 = INSERT_UNIQUE_SCRIPT
            .key(index_key)
            .key(record_key)
            .arg(index_field)
            .arg(id.to_string())
            .arg(json)
            .invoke_async(&mut conn)
            .await?;

        Ok(inserted == 1)
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn list_clients(&self) -> Result<Vec<Client>, StoreError> {
        let mut clients: Vec<Client> = self.values(CLIENTS).await?;
        clients.sort_by_key(|client| (client.created_at, client.id));
        Ok(clients)
    }

    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, StoreError> {
        self.get(CLIENTS, id).await
    }

    async fn insert_client(&self, client: &Client) -> Result<(), StoreError> {
        let email = normalize_email(&client.email);

        if !self
            .insert_unique(CLIENT_EMAILS, &email, CLIENTS, client.id, client)
            .await?
        {
            return Err(StoreError::Conflict {
                field: "email",
                value: email,
            });
        }

        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        self.values(PRODUCTS).await
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        self.get(PRODUCTS, id).await
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        self.put(PRODUCTS, product.id, product).await
    }

    async fn list_activity_periods(&self) -> Result<Vec<ActivityPeriod>, StoreError> {
        self.values(ACTIVITY_PERIODS).await
    }

    async fn insert_activity_period(&self, period: &ActivityPeriod) -> Result<(), StoreError> {
        self.put(ACTIVITY_PERIODS, period.id, period).await
    }

    async fn active_grace_period(&self, client_id: Uuid) -> Result<Option<GracePeriod>, StoreError> {
        let mut conn = self.connection.clone();
        let grace_id: Option<String> = conn
            .hget(ACTIVE_GRACE_PERIODS, client_id.to_string())
            .await?;

        let Some(grace_id) = grace_id else {
            return Ok(None);
        };

        let raw: Option<String> = conn.hget(GRACE_PERIODS, grace_id).await?;
        raw.map(|value| serde_json::from_str(&value))
            .transpose()
            .map_err(StoreError::from)
    }

    async fn list_active_grace_periods(&self) -> Result<Vec<GracePeriod>, StoreError> {
        let mut conn = self.connection.clone();
        let ids: Vec<String> = conn.hvals(ACTIVE_GRACE_PERIODS).await?;

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let raw: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(GRACE_PERIODS)
            .arg(&ids)
            .query_async(&mut conn)
            .await?;

        let mut active = raw
            .iter()
            .flatten()
            .map(|value| serde_json::from_str::<GracePeriod>(value))
            .collect::<Result<Vec<_>, _>>()?;

        active.sort_by_key(|grace| (grace.detected_at, grace.client_id));
        Ok(active)
    }

    async fn insert_grace_period(&self, grace: &GracePeriod) -> Result<InsertOutcome, StoreError> {
        let inserted = self
            .insert_unique(
                ACTIVE_GRACE_PERIODS,
                &grace.client_id.to_string(),
                GRACE_PERIODS,
                grace.id,
                grace,
            )
            .await?;

        if inserted {
            Ok(InsertOutcome::Created)
        } else {
            debug!("Client {} already has an active grace period", grace.client_id);
            Ok(InsertOutcome::AlreadyActive)
        }
    }

    async fn resolve_grace_period(
        &self,
        client_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<GracePeriod>, StoreError> {
        let Some(mut grace) = self.active_grace_period(client_id).await? else {
            return Ok(None);
        };

        grace.resolve(at);
        let json = serde_json::to_string(&grace)?;

        let mut conn = self.connection.clone();
        let resolved: i64 = RESOLVE_ACTIVE_SCRIPT
            .key(ACTIVE_GRACE_PERIODS)
            .key(GRACE_PERIODS)
            .arg(client_id.to_string())
            .arg(grace.id.to_string())
            .arg(json)
            .invoke_async(&mut conn)
            .await?;

        if resolved == 0 {
            debug!("Grace period {} was resolved concurrently", grace.id);
            return Ok(None);
        }

        Ok(Some(grace))
    }
}
