//! # Grace Period Detection
//!
//! Flags clients whose coaching engagement ran out and was not renewed.
//!
//! ## Terms
//! - **Activity period**: a client's span on a product, `[start_date, end_date?]`.
//!   Without an `end_date` the end is `start_date + product.duration_days`; without
//!   either the period is open-ended.
//! - **Engaged until**: the latest effective end across all of a client's periods.
//! - **Grace period**: the flag this job creates once "engaged until" is more than
//!   `threshold_days` whole days in the past.
//!
//! ## Job
//! 1. Load clients, products and activity periods.
//! 2. Skip clients with no periods, or any open-ended period.
//! 3. Flag clients where `today - engaged_until > threshold_days` (calendar days, UTC).
//!    Exactly at the threshold is not flagged.
//! 4. For each flagged client, skip it if an active grace period already exists.
//! 5. Otherwise insert one with `detected_at = now`. The store refuses a second
//!    active grace period for a client, so a racing run ends up in `skipped`.
//! 6. Report `{created, skipped, errors}`.
//!
//! ## Notes
//! - The job only ever creates. Grace periods are resolved when a new activity
//!   period starts or an operator closes one.
//! - A failure on one client lands in `errors` and the loop moves on. Only failing
//!   to load the input fails the job.
//! - Re-running on unchanged data creates nothing new.
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use roster::{GracePeriod, InsertOutcome, Store, StoreError};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub mod models;
pub mod utils;

pub use models::{Candidate, DetectionFailure, DetectionReport, GraceConfig};
use utils::{days_since, is_lapsed, latest_engagement, today};

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Failed to load detection input: {0}")]
    Load(#[from] StoreError),
}

pub struct Detector {
    store: Arc<dyn Store>,
    config: GraceConfig,
}

impl Detector {
    pub fn new(store: Arc<dyn Store>, config: GraceConfig) -> Self {
        Self { store, config }
    }

    /// Clients that would be flagged at `now`, without writing anything.
    pub async fn plan(&self, now: DateTime<Utc>) -> Result<Vec<Candidate>, DetectorError> {
        let clients = self.store.list_clients().await?;
        let products = self.store.list_products().await?;
        let periods = self.store.list_activity_periods().await?;

        let known: HashSet<Uuid> = clients.iter().map(|client| client.id).collect();
        let products = products
            .into_iter()
            .map(|product| (product.id, product))
            .collect::<HashMap<_, _>>();

        let mut by_client: HashMap<Uuid, Vec<&roster::ActivityPeriod>> = HashMap::new();
        for period in &periods {
            if known.contains(&period.client_id) {
                by_client.entry(period.client_id).or_default().push(period);
            }
        }

        let today = today(now);
        let threshold = self.config.threshold_days;

        let mut candidates: Vec<Candidate> = clients
            .iter()
            .filter_map(|client| {
                let periods = by_client.get(&client.id)?;
                let engagement = latest_engagement(periods.iter().copied(), &products)?;

                is_lapsed(engagement.engaged_until, today, threshold).then(|| Candidate {
                    client_id: client.id,
                    activity_period_id: engagement.activity_period_id,
                    engaged_until: engagement.engaged_until,
                    days_lapsed: days_since(engagement.engaged_until, today),
                })
            })
            .collect();

        candidates.sort_by_key(|candidate| (candidate.engaged_until, candidate.client_id));
        Ok(candidates)
    }

    pub async fn run(&self, now: DateTime<Utc>) -> Result<DetectionReport, DetectorError> {
        let candidates = self.plan(now).await?;

        Ok(self.apply(now, &candidates, |_| {}).await)
    }

    /// Creates grace periods for `candidates`, calling `observe` after each one.
    pub async fn apply<F>(
        &self,
        now: DateTime<Utc>,
        candidates: &[Candidate],
        mut observe: F,
    ) -> DetectionReport
    where
        F: FnMut(&Candidate) + Send,
    {
        let mut report = DetectionReport::default();

        for candidate in candidates {
            self.detect_one(now, candidate, &mut report).await;
            observe(candidate);
        }

        info!(
            created = report.created.len(),
            skipped = report.skipped.len(),
            errors = report.errors.len(),
            "Grace period detection finished"
        );

        report
    }

    async fn detect_one(
        &self,
        now: DateTime<Utc>,
        candidate: &Candidate,
        report: &mut DetectionReport,
    ) {
        let client_id = candidate.client_id;

        match self.store.active_grace_period(client_id).await {
            Ok(Some(_)) => {
                #[cfg(feature = "verbose")]
                println!("Client {client_id} already in grace, skipping");

                report.skipped.push(client_id);
                return;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Failed to check grace period for client {client_id}: {e}");
                report.errors.push(DetectionFailure {
                    client_id,
                    message: e.to_string(),
                });
                return;
            }
        }

        let grace = GracePeriod::detected(client_id, candidate.activity_period_id, now);

        match self.store.insert_grace_period(&grace).await {
            Ok(InsertOutcome::Created) => {
                info!(
                    "Client {client_id} entered grace period {} ({} days since {})",
                    grace.id, candidate.days_lapsed, candidate.engaged_until
                );
                report.created.push(client_id);
            }
            Ok(InsertOutcome::AlreadyActive) => report.skipped.push(client_id),
            Err(e) => {
                warn!("Failed to create grace period for client {client_id}: {e}");
                report.errors.push(DetectionFailure {
                    client_id,
                    message: e.to_string(),
                });
            }
        }
    }
}
