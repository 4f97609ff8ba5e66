//! Limiter records persisted in the [`SharedStore`].
//!
//! Each record lives under its own key and is rewritten whole, so the three
//! limiters never interfere with each other. Reads are lenient: anything that
//! does not parse is treated as "no record".

use serde::{Deserialize, Serialize};

use crate::store::{keys, SharedStore, StoreError};

/// Snapshot of the error-limit headers of the most recent response.
///
/// Serialized as `{"updated": int, "remain": int, "reset": int}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLimitRecord {
    /// Epoch seconds when the headers were seen.
    pub updated: i64,
    /// Errors left in the current window.
    #[serde(rename = "remain")]
    pub remaining: i64,
    /// Seconds from `updated` until the window resets.
    pub reset: i64,
}

impl ErrorLimitRecord {
    pub fn new(updated: i64, remaining: i64, reset: i64) -> Self {
        Self { updated, remaining, reset }
    }

    /// Epoch at which the error window resets.
    pub fn reset_at(&self) -> i64 {
        self.updated.saturating_add(self.reset)
    }

    /// A record whose window has already reset carries no information.
    pub fn is_stale(&self, now: i64) -> bool {
        self.reset_at() < now
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        serde_json::to_string(self).map_err(|e| StoreError::Backend(e.to_string()))
    }

    /// Parse a stored value; empty or malformed input yields `None`.
    pub fn from_json(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match serde_json::from_str(raw) {
            Ok(record) => Some(record),
            Err(error) => {
                tracing::debug!(
                    target: "esiguard::store",
                    key = keys::ERROR_LIMIT,
                    %error,
                    "ignoring malformed error limit record"
                );
                None
            }
        }
    }

    pub async fn load(store: &dyn SharedStore) -> Result<Option<Self>, StoreError> {
        Ok(store.get(keys::ERROR_LIMIT).await?.as_deref().and_then(Self::from_json))
    }

    pub async fn save(&self, store: &dyn SharedStore) -> Result<(), StoreError> {
        store.set(keys::ERROR_LIMIT, &self.to_json()?).await
    }
}

/// "Blocked until" epoch used by the rate-limit and throttle records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BlockedUntil(pub i64);

impl BlockedUntil {
    /// Parse a decimal epoch; empty or non-numeric input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.parse::<i64>() {
            Ok(epoch) => Some(Self(epoch)),
            Err(_) => {
                tracing::debug!(target: "esiguard::store", value = raw, "ignoring malformed epoch");
                None
            }
        }
    }

    pub fn encode(&self) -> String {
        self.0.to_string()
    }

    /// Whether calls are still blocked at `now`.
    pub fn is_active(&self, now: i64) -> bool {
        self.0 > now
    }

    pub async fn load(store: &dyn SharedStore, key: &str) -> Result<Option<Self>, StoreError> {
        Ok(store.get(key).await?.as_deref().and_then(Self::parse))
    }

    pub async fn save(&self, store: &dyn SharedStore, key: &str) -> Result<(), StoreError> {
        store.set(key, &self.encode()).await
    }
}
