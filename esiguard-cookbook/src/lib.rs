//! Ready-to-use recipes for `esiguard`.
//!
//! Backend selection happens once, from configuration, and every component
//! afterwards only sees an `Arc<dyn SharedStore>`.
//!
//! - Store selection: [`StoreConfig`], [`connect`]
//! - Whole-application config: [`AppConfig`]
//! - Batch jobs: [`batch_limiter`]
//! - Request handlers: [`interactive_client`]

use std::sync::Arc;

use bytes::Bytes;
use esiguard::{
    BlockingLimiter, Clock, DynamicConfig, EsiClient, LimiterConfig, LimiterGate, MemoryStore,
    SharedStore, StoreError, StoreHandle, SystemClock,
};
use esiguard_redis::RedisStore;
use esiguard_sql::SqlStore;
use serde::{Deserialize, Serialize};

/// Which shared store backs the limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// In-process store; only tasks and threads of this process coordinate.
    Memory {
        #[serde(default)]
        prefix: Option<String>,
    },
    /// Redis server shared by every host.
    Redis {
        url: String,
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default)]
        ttl_secs: Option<u64>,
    },
    /// Rows in a SQLite database.
    Sql {
        url: String,
        /// Expect rows to be created ahead of time instead of migrating.
        #[serde(default)]
        provisioned: bool,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Memory { prefix: None }
    }
}

/// Build the store described by `config`.
pub async fn connect(config: &StoreConfig) -> Result<StoreHandle, StoreError> {
    let store: StoreHandle = match config {
        StoreConfig::Memory { prefix } => {
            let mut store = MemoryStore::new();
            if let Some(prefix) = prefix {
                store = store.with_prefix(prefix.clone());
            }
            Arc::new(store)
        }
        StoreConfig::Redis { url, prefix, ttl_secs } => {
            let mut store = RedisStore::connect(url).await?;
            if let Some(prefix) = prefix {
                store = store.with_prefix(prefix.clone());
            }
            if let Some(ttl) = ttl_secs {
                store = store.with_ttl_secs(*ttl);
            }
            Arc::new(store)
        }
        StoreConfig::Sql { url, provisioned } => {
            let pool = sqlx::SqlitePool::connect(url)
                .await
                .map_err(|e| StoreError::Backend(format!("sql connection error: {e}")))?;
            let store = SqlStore::new(pool);
            if *provisioned {
                Arc::new(store.provisioned())
            } else {
                store.migrate().await?;
                Arc::new(store)
            }
        }
    };
    tracing::info!(target: "esiguard::store", backend = store.backend(), "shared store ready");
    Ok(store)
}

/// Errors from loading an [`AppConfig`].
#[derive(Debug, thiserror::Error)]
pub enum AppConfigError {
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Env(#[from] esiguard::ConfigError),
}

/// Config file section for an application using esiguard.
///
/// ```json
/// { "store": { "backend": "redis", "url": "redis://127.0.0.1/" },
///   "limiter": { "error_limit_threshold": 15 } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub limiter: LimiterConfig,
}

impl AppConfig {
    /// Parse JSON, then apply `ESIGUARD_*` environment overrides to the limiter section.
    pub fn from_json(raw: &str) -> Result<Self, AppConfigError> {
        let mut config: AppConfig = serde_json::from_str(raw)?;
        config.limiter = config.limiter.overlay(|var| std::env::var(var).ok())?;
        Ok(config)
    }
}

/// Blocking limiter for a CLI or cron job.
pub fn batch_limiter(store: StoreHandle, config: LimiterConfig) -> BlockingLimiter {
    BlockingLimiter::new(LimiterGate::new(store, Arc::new(SystemClock), config))
}

/// Fail-fast client for request handlers.
///
/// The config handle is live: threshold changes made through it apply to the
/// next request.
pub fn interactive_client<T>(
    store: StoreHandle,
    config: DynamicConfig<LimiterConfig>,
    transport: T,
) -> EsiClient<T>
where
    T: tower::Service<http::Request<Bytes>, Response = http::Response<Bytes>>
        + Clone
        + Send
        + 'static,
    T::Future: Send + 'static,
    T::Error: std::fmt::Display + Send + 'static,
{
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    EsiClient::new(store, clock, config, transport)
}
