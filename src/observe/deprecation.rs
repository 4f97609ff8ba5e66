use async_trait::async_trait;
use http::header::WARNING;

use super::{Observation, ResponseObserver};

/// Logs deprecation warnings (`Warning: 299 ...`) sent by the API.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeprecationObserver;

#[async_trait]
impl ResponseObserver for DeprecationObserver {
    async fn observe(&self, observation: &Observation<'_>) {
        for value in observation.response.headers().get_all(WARNING) {
            let Ok(warning) = value.to_str() else { continue };
            if warning.contains("299") {
                tracing::warn!(
                    target: "esiguard::observe",
                    method = %observation.method,
                    uri = %observation.uri,
                    "{}: {}",
                    observation.uri,
                    warning
                );
            }
        }
    }
}
