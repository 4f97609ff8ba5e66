use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use http::{header::RETRY_AFTER, StatusCode};

use super::{report_store_failure, Observation, ResponseObserver};
use crate::clock::Clock;
use crate::records::BlockedUntil;
use crate::store::{keys, StoreHandle};

/// Resolve a `Retry-After` value to the epoch until which calls must wait.
///
/// Accepts delta seconds (fractions are rounded up) or an HTTP date such as
/// `Wed, 21 Oct 2015 07:28:00 GMT`. Returns `None` for anything else.
pub fn retry_after_epoch(raw: &str, now: i64) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<f64>() {
        if !secs.is_finite() {
            return None;
        }
        return Some(now.saturating_add(secs.ceil() as i64));
    }
    DateTime::parse_from_rfc2822(raw).ok().map(|date| date.timestamp())
}

/// Records a "blocked until" epoch whenever the API answers 429.
#[derive(Debug, Clone)]
pub struct RateLimitObserver {
    store: StoreHandle,
    clock: Arc<dyn Clock>,
    default_retry_after_secs: i64,
}

impl RateLimitObserver {
    pub fn new(store: StoreHandle, clock: Arc<dyn Clock>, default_retry_after_secs: i64) -> Self {
        Self { store, clock, default_retry_after_secs }
    }
}

#[async_trait]
impl ResponseObserver for RateLimitObserver {
    async fn observe(&self, observation: &Observation<'_>) {
        if observation.response.status() != StatusCode::TOO_MANY_REQUESTS {
            return;
        }

        let now = self.clock.now();
        let raw = observation.response.headers().get(RETRY_AFTER).map(|v| v.to_str().unwrap_or(""));
        if let Some(raw) = raw {
            tracing::warn!(
                target: "esiguard::observe",
                retry_after = raw,
                uri = %observation.uri,
                "rate limited, Retry-After: {raw}"
            );
        }

        let until = raw
            .and_then(|raw| retry_after_epoch(raw, now))
            .unwrap_or_else(|| now.saturating_add(self.default_retry_after_secs));
        if let Err(error) = BlockedUntil(until).save(self.store.as_ref(), keys::RATE_LIMITED).await {
            report_store_failure("rate_limit", keys::RATE_LIMITED, &error);
        }
    }
}
