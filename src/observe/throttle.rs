use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;

use super::{report_store_failure, Observation, ResponseObserver};
use crate::clock::Clock;
use crate::records::BlockedUntil;
use crate::store::{keys, StoreHandle};

const THROTTLE_MARKERS: [&str; 4] = [
    "Undefined 429 response.",
    "Original message:",
    "Too many errors.",
    "You have been temporarily throttled.",
];

/// Whether a 500 body is the API's malformed way of saying "throttled".
///
/// All markers must be present; the signature is undocumented and may change.
pub fn is_throttle_signature(body: &[u8]) -> bool {
    let body = String::from_utf8_lossy(body);
    THROTTLE_MARKERS.iter().all(|marker| body.contains(marker))
}

/// Blocks calls for a fixed period after a throttled response.
///
/// The record only ever moves forward; it clears by expiry.
#[derive(Debug, Clone)]
pub struct ThrottleObserver {
    store: StoreHandle,
    clock: Arc<dyn Clock>,
    throttle_secs: i64,
}

impl ThrottleObserver {
    pub fn new(store: StoreHandle, clock: Arc<dyn Clock>, throttle_secs: i64) -> Self {
        Self { store, clock, throttle_secs }
    }
}

#[async_trait]
impl ResponseObserver for ThrottleObserver {
    async fn observe(&self, observation: &Observation<'_>) {
        let response = observation.response;
        if response.status() != StatusCode::INTERNAL_SERVER_ERROR
            || !is_throttle_signature(response.body())
        {
            return;
        }

        let until = self.clock.now().saturating_add(self.throttle_secs);
        tracing::warn!(
            target: "esiguard::observe",
            until,
            uri = %observation.uri,
            "temporarily throttled"
        );
        if let Err(error) = BlockedUntil(until).save(self.store.as_ref(), keys::THROTTLED).await {
            report_store_failure("throttle", keys::THROTTLED, &error);
        }
    }
}
