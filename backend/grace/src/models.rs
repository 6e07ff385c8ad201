use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraceConfig {
    /// Whole days an engagement may be over before the client is flagged.
    pub threshold_days: u32,
}

impl GraceConfig {
    pub fn new(threshold_days: u32) -> Self {
        Self { threshold_days }
    }
}

/// A client whose engagement lapsed past the threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub client_id: Uuid,
    pub activity_period_id: Uuid,
    pub engaged_until: NaiveDate,
    pub days_lapsed: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionFailure {
    pub client_id: Uuid,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetectionReport {
    pub created: Vec<Uuid>,
    pub skipped: Vec<Uuid>,
    pub errors: Vec<DetectionFailure>,
}

impl DetectionReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
