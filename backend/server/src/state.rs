use std::sync::Arc;

use access::{Principal, Resource, Verb, resolve_principal};
use axum::http::HeaderMap;
use grace::{Detector, GraceConfig};
use roster::{RedisStore, Store, StoreError};
use tracing::warn;

use super::{
    config::Config,
    database::{RedisSessions, SessionSource},
    error::AppError,
    utils::session_token,
};

pub struct State {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub sessions: Arc<dyn SessionSource>,
    pub detector: Detector,
}

impl State {
    pub async fn new(config: Config) -> Result<Arc<Self>, StoreError> {
        let store = RedisStore::connect(&config.redis_url).await?;
        let sessions = RedisSessions::new(store.connection());

        Ok(Self::with_parts(config, Arc::new(store), Arc::new(sessions)))
    }

    pub fn with_parts(
        config: Config,
        store: Arc<dyn Store>,
        sessions: Arc<dyn SessionSource>,
    ) -> Arc<Self> {
        let detector = Detector::new(
            store.clone(),
            GraceConfig::new(config.grace_threshold_days),
        );

        Arc::new(Self {
            config,
            store,
            sessions,
            detector,
        })
    }

    /// Resolves the caller, or `AuthRequired` when there is no usable session.
    /// A session that cannot be read counts as no session.
    pub async fn principal(&self, headers: &HeaderMap) -> Result<Principal, AppError> {
        let session = match session_token(headers) {
            Some(token) => match self.sessions.get_session(&token).await {
                Ok(session) => session,
                Err(e) => {
                    warn!("Session lookup failed: {e}");
                    None
                }
            },
            None => None,
        };

        Ok(resolve_principal(session.as_ref())?)
    }

    /// Resolves the caller and checks they may perform `verb` on `resource`.
    pub async fn authorize(
        &self,
        headers: &HeaderMap,
        resource: Resource,
        verb: Verb,
    ) -> Result<Principal, AppError> {
        let principal = self.principal(headers).await?;

        if !principal.statement().can(resource, verb) {
            return Err(AppError::Forbidden { resource, verb });
        }

        Ok(principal)
    }
}
