use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    models::{ActivityPeriod, Client, GracePeriod, Product},
    store::{InsertOutcome, Store, StoreError, normalize_email},
};

/// Process-local store for tests and dry runs.
///
/// Grace period inserts can be made to fail per client with
/// [`MemoryStore::fail_grace_inserts_for`], and every bulk read with
/// [`MemoryStore::fail_loads`].
#[derive(Default)]
pub struct MemoryStore {
    pub clients: Mutex<HashMap<Uuid, Client>>,
    pub products: Mutex<HashMap<Uuid, Product>>,
    pub activity_periods: Mutex<HashMap<Uuid, ActivityPeriod>>,
    pub grace_periods: Mutex<HashMap<Uuid, GracePeriod>>,
    pub grace_inserts: AtomicU64,
    failing_clients: Mutex<HashSet<Uuid>>,
    failing_loads: AtomicBool,
}

impl MemoryStore {
    pub async fn fail_grace_inserts_for(&self, client_id: Uuid) {
        self.failing_clients.lock().await.insert(client_id);
    }

    pub fn fail_loads(&self) {
        self.failing_loads.store(true, Ordering::Relaxed);
    }

    fn check_load(&self, what: &str) -> Result<(), StoreError> {
        if self.failing_loads.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable(format!("cannot list {what}")));
        }

        Ok(())
    }

    pub async fn grace_periods_for(&self, client_id: Uuid) -> Vec<GracePeriod> {
        let mut found: Vec<GracePeriod> = self
            .grace_periods
            .lock()
            .await
            .values()
            .filter(|grace| grace.client_id == client_id)
            .cloned()
            .collect();

        found.sort_by_key(|grace| grace.detected_at);
        found
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_clients(&self) -> Result<Vec<Client>, StoreError> {
        self.check_load("clients")?;

        let mut clients: Vec<Client> = self.clients.lock().await.values().cloned().collect();
        clients.sort_by_key(|client| (client.created_at, client.id));
        Ok(clients)
    }

    async fn get_client(&self, id: Uuid) -> Result<Option<Client>, StoreError> {
        Ok(self.clients.lock().await.get(&id).cloned())
    }

    async fn insert_client(&self, client: &Client) -> Result<(), StoreError> {
        let mut clients = self.clients.lock().await;
        let email = normalize_email(&client.email);

        if clients
            .values()
            .any(|existing| normalize_email(&existing.email) == email)
        {
            return Err(StoreError::Conflict {
                field: "email",
                value: email,
            });
        }

        clients.insert(client.id, client.clone());
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        self.check_load("products")?;

        Ok(self.products.lock().await.values().cloned().collect())
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>, StoreError> {
        Ok(self.products.lock().await.get(&id).cloned())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        self.products
            .lock()
            .await
            .insert(product.id, product.clone());
        Ok(())
    }

    async fn list_activity_periods(&self) -> Result<Vec<ActivityPeriod>, StoreError> {
        self.check_load("activity periods")?;

        let mut periods: Vec<ActivityPeriod> = self
            .activity_periods
            .lock()
            .await
            .values()
            .cloned()
            .collect();
        periods.sort_by_key(|period| (period.client_id, period.start_date));
        Ok(periods)
    }

    async fn insert_activity_period(&self, period: &ActivityPeriod) -> Result<(), StoreError> {
        self.activity_periods
            .lock()
            .await
            .insert(period.id, period.clone());
        Ok(())
    }

    async fn active_grace_period(&self, client_id: Uuid) -> Result<Option<GracePeriod>, StoreError> {
        Ok(self
            .grace_periods
            .lock()
            .await
            .values()
            .find(|grace| grace.client_id == client_id && grace.is_active())
            .cloned())
    }

    async fn list_active_grace_periods(&self) -> Result<Vec<GracePeriod>, StoreError> {
        let mut active: Vec<GracePeriod> = self
            .grace_periods
            .lock()
            .await
            .values()
            .filter(|grace| grace.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|grace| (grace.detected_at, grace.client_id));
        Ok(active)
    }

    async fn insert_grace_period(&self, grace: &GracePeriod) -> Result<InsertOutcome, StoreError> {
        if self.failing_clients.lock().await.contains(&grace.client_id) {
            return Err(StoreError::Unavailable(format!(
                "insert rejected for client {}",
                grace.client_id
            )));
        }

        let mut grace_periods = self.grace_periods.lock().await;

        if grace_periods
            .values()
            .any(|existing| existing.client_id == grace.client_id && existing.is_active())
        {
            return Ok(InsertOutcome::AlreadyActive);
        }

        grace_periods.insert(grace.id, grace.clone());
        self.grace_inserts.fetch_add(1, Ordering::Relaxed);

        Ok(InsertOutcome::Created)
    }

    async fn resolve_grace_period(
        &self,
        client_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Option<GracePeriod>, StoreError> {
        let mut grace_periods = self.grace_periods.lock().await;

        let Some(grace) = grace_periods
            .values_mut()
            .find(|grace| grace.client_id == client_id && grace.is_active())
        else {
            return Ok(None);
        };

        grace.resolve(at);
        Ok(Some(grace.clone()))
    }
}
