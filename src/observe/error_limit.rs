use std::sync::Arc;

use async_trait::async_trait;
use http::HeaderMap;

use super::{report_store_failure, Observation, ResponseObserver};
use crate::clock::Clock;
use crate::records::ErrorLimitRecord;
use crate::store::{keys, StoreHandle};

pub const ERROR_LIMIT_REMAIN: &str = "x-esi-error-limit-remain";
pub const ERROR_LIMIT_RESET: &str = "x-esi-error-limit-reset";

/// Records the error-limit headers of every response that carries both.
#[derive(Debug, Clone)]
pub struct ErrorLimitObserver {
    store: StoreHandle,
    clock: Arc<dyn Clock>,
}

impl ErrorLimitObserver {
    pub fn new(store: StoreHandle, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }
}

fn int_header(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}

#[async_trait]
impl ResponseObserver for ErrorLimitObserver {
    async fn observe(&self, observation: &Observation<'_>) {
        let headers = observation.response.headers();
        let (Some(remaining), Some(reset)) =
            (int_header(headers, ERROR_LIMIT_REMAIN), int_header(headers, ERROR_LIMIT_RESET))
        else {
            return;
        };

        let record = ErrorLimitRecord::new(self.clock.now(), remaining, reset);
        tracing::trace!(
            target: "esiguard::observe",
            remaining,
            reset,
            uri = %observation.uri,
            "error limit headers"
        );
        if let Err(error) = record.save(self.store.as_ref()).await {
            report_store_failure("error_limit", keys::ERROR_LIMIT, &error);
        }
    }
}
