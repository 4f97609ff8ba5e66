//! Cross-process key/value storage for limiter state.
//!
//! Every process that talks to ESI attaches to the same [`SharedStore`] and
//! reads it fresh before each call. There is no locking and no compare-and-set:
//! every write is a blind overwrite of one key, last writer wins.
//!
//! Backends:
//! - [`MemoryStore`](memory::MemoryStore): in this crate, shared by every worker
//!   task and thread of the host process.
//! - `RedisStore` in `esiguard-redis`: distributed, with a one day ambient TTL.
//! - `SqlStore` in `esiguard-sql`: rows in a relational table, always available.
//!
//! Callers hold an `Arc<dyn SharedStore>` and never branch on the backend.

use std::sync::Arc;

use async_trait::async_trait;

pub mod memory;

pub use memory::MemoryStore;

/// Longest key accepted by [`SharedStore::set`], in bytes, before any backend prefix.
pub const MAX_KEY_LEN: usize = 112;

/// Longest value accepted under the general storage contract, in bytes.
pub const MAX_VALUE_LEN: usize = 255;

/// Storage keys for the limiter records.
pub mod keys {
    /// JSON `{"updated": int, "remain": int, "reset": int}`.
    pub const ERROR_LIMIT: &str = "esi_error_limit";
    /// Decimal epoch until which a 429 blocks calls.
    pub const RATE_LIMITED: &str = "esi_rate_limited";
    /// Decimal epoch until which the throttle signal blocks calls.
    pub const THROTTLED: &str = "esi_throttled";

    pub const ALL: [&str; 3] = [ERROR_LIMIT, RATE_LIMITED, THROTTLED];
}

/// Errors from storage operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("storage key is {len} bytes, limit is {max}")]
    KeyTooLong { len: usize, max: usize },
    #[error("storage value is {len} bytes, limit is {max}")]
    ValueTooLong { len: usize, max: usize },
    /// A provisioned backend has no entry for the key.
    #[error("storage entry {0} not found")]
    Missing(String),
    #[error("storage backend failed: {0}")]
    Backend(String),
}

/// Key/value contract shared by all backends.
#[async_trait]
pub trait SharedStore: Send + Sync + std::fmt::Debug {
    /// Overwrite `key` with `value`.
    ///
    /// Fails with [`StoreError::KeyTooLong`] or [`StoreError::ValueTooLong`]
    /// without touching any entry when the limits are exceeded.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Value length limit enforced by this backend; `None` if unbounded.
    fn value_limit(&self) -> Option<usize> {
        Some(MAX_VALUE_LEN)
    }

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}

/// Shared handle passed to every component that needs storage.
pub type StoreHandle = Arc<dyn SharedStore>;

/// Check `key` and `value` against the storage contract.
///
/// Backends call this first in `set` so a rejected write never reaches the medium.
pub fn validate_entry(key: &str, value: &str, value_limit: Option<usize>) -> Result<(), StoreError> {
    if key.len() > MAX_KEY_LEN {
        return Err(StoreError::KeyTooLong { len: key.len(), max: MAX_KEY_LEN });
    }
    if let Some(max) = value_limit {
        if value.len() > max {
            return Err(StoreError::ValueTooLong { len: value.len(), max });
        }
    }
    Ok(())
}
