//! Redis shared store for `esiguard` (companion crate).
//!
//! Every process that points at the same Redis server shares limiter state.
//! Keys are namespaced with a prefix and expire after one day; the expiry only
//! keeps abandoned keys from piling up, readers still compare the embedded
//! timestamps.

use async_trait::async_trait;
use esiguard::store::{validate_entry, SharedStore, StoreError, MAX_VALUE_LEN};
use redis::aio::ConnectionManager;

/// Default key prefix.
pub const KEY_PREFIX: &str = "esiguard:";
/// Expiry applied to every write.
pub const KEY_TTL_SECS: u64 = 86400;

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    prefix: String,
    ttl_secs: u64,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("prefix", &self.prefix)
            .field("ttl_secs", &self.ttl_secs)
            .field("conn", &"<redis::aio::ConnectionManager>")
            .finish()
    }
}

impl RedisStore {
    /// Connect to `redis_url` (e.g. `redis://127.0.0.1:6379`).
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::Backend(format!("redis connection error: {e}")))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Backend(format!("redis connection manager error: {e}")))?;
        Ok(Self::new(conn))
    }

    /// Use an existing connection manager.
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn, prefix: KEY_PREFIX.to_string(), ttl_secs: KEY_TTL_SECS }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs.max(1);
        self
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl SharedStore for RedisStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        validate_entry(key, value, Some(MAX_VALUE_LEN))?;
        let mut conn = self.conn.clone();
        let key = self.key(key);
        let _: () = redis::cmd("SET")
            .arg(&key)
            .arg(value)
            .arg("EX")
            .arg(self.ttl_secs)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                tracing::warn!(target: "esiguard::redis", key = %key, error = %e, "redis SET failed");
                StoreError::Backend(e.to_string())
            })?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let key = self.key(key);
        let value: Option<String> = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                tracing::warn!(target: "esiguard::redis", key = %key, error = %e, "redis GET failed");
                StoreError::Backend(e.to_string())
            })?;
        Ok(value)
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
