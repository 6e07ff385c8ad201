//! # Sessions
//!
//! The auth provider writes one Redis key per signed-in user session:
//!
//! - Key: `session:<token>`, token taken from `Authorization: Bearer` or the
//!   `session_token` cookie
//! - Value: JSON `{ "user": { "id": "...", "role": "coach" } }`
//! - TTL: owned by the auth provider, an expired key simply reads as no session
//!
//! The server never writes these keys. CRM records live in [`roster::RedisStore`],
//! which shares the same connection manager.
use std::collections::HashMap;

use access::Session;
use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use roster::StoreError;
use tokio::sync::Mutex;

pub const SESSION_PREFIX: &str = "session:";

#[async_trait]
pub trait SessionSource: Send + Sync + 'static {
    async fn get_session(&self, token: &str) -> Result<Option<Session>, StoreError>;
}

pub struct RedisSessions {
    connection: ConnectionManager,
}

impl RedisSessions {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl SessionSource for RedisSessions {
    async fn get_session(&self, token: &str) -> Result<Option<Session>, StoreError> {
        let mut conn = self.connection.clone();
        let raw: Option<String> = conn.get(format!("{SESSION_PREFIX}{token}")).await?;

        raw.map(|value| serde_json::from_str(&value))
            .transpose()
            .map_err(StoreError::from)
    }
}

/// Fixed token -> session table.
#[derive(Default)]
pub struct MemorySessions {
    sessions: Mutex<HashMap<String, Session>>,
}

impl MemorySessions {
    pub async fn insert(&self, token: &str, session: Session) {
        self.sessions.lock().await.insert(token.to_string(), session);
    }
}

#[async_trait]
impl SessionSource for MemorySessions {
    async fn get_session(&self, token: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.lock().await.get(token).cloned())
    }
}
