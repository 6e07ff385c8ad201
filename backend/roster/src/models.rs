use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl Client {
    pub fn new(name: impl Into<String>, email: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            created_at: now,
        }
    }
}

/// Coaching product a client can be engaged on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    /// Length of one engagement. `None` means open-ended (e.g. monthly until cancelled).
    pub duration_days: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPeriod {
    pub id: Uuid,
    pub client_id: Uuid,
    pub product_id: Option<Uuid>,
    pub start_date: NaiveDate,
    /// Unset while ongoing.
    pub end_date: Option<NaiveDate>,
}

impl ActivityPeriod {
    /// Explicit end if recorded, otherwise start plus the product's duration.
    /// `None` when neither is known: the engagement has no end in sight.
    pub fn effective_end(&self, product: Option<&Product>) -> Option<NaiveDate> {
        if let Some(end) = self.end_date {
            return Some(end.max(self.start_date));
        }

        let days = product?.duration_days?;
        self.start_date.checked_add_days(Days::new(days.into()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraceStatus {
    Active,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GracePeriod {
    pub id: Uuid,
    pub client_id: Uuid,
    pub activity_period_id: Uuid,
    pub detected_at: DateTime<Utc>,
    pub status: GraceStatus,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl GracePeriod {
    pub fn detected(client_id: Uuid, activity_period_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            activity_period_id,
            detected_at: now,
            status: GraceStatus::Active,
            resolved_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == GraceStatus::Active
    }

    pub fn resolve(&mut self, at: DateTime<Utc>) {
        self.status = GraceStatus::Resolved;
        self.resolved_at = Some(at);
    }
}
