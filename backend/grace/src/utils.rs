use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use roster::{ActivityPeriod, Product};
use uuid::Uuid;

/// Period that currently bounds a client's engagement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Engagement {
    pub activity_period_id: Uuid,
    pub engaged_until: NaiveDate,
}

pub fn today(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive()
}

/// Whole calendar days from `end` to `today`; negative if `end` is ahead.
pub fn days_since(end: NaiveDate, today: NaiveDate) -> i64 {
    (today - end).num_days()
}

/// Strictly past the threshold. Exactly `threshold_days` is still fine.
pub fn is_lapsed(end: NaiveDate, today: NaiveDate, threshold_days: u32) -> bool {
    days_since(end, today) > i64::from(threshold_days)
}

/// Latest effective end across a client's periods.
///
/// `None` when there are no periods, or when any period has no end we can
/// work out: an open-ended engagement is never lapsed.
pub fn latest_engagement<'a>(
    periods: impl IntoIterator<Item = &'a ActivityPeriod>,
    products: &HashMap<Uuid, Product>,
) -> Option<Engagement> {
    let mut latest: Option<(NaiveDate, NaiveDate, Uuid)> = None;

    for period in periods {
        let product = period.product_id.and_then(|id| products.get(&id));
        let end = period.effective_end(product)?;

        let key = (end, period.start_date, period.id);
        if latest.is_none_or(|current| key > current) {
            latest = Some(key);
        }
    }

    latest.map(|(engaged_until, _, activity_period_id)| Engagement {
        activity_period_id,
        engaged_until,
    })
}
