//! SQL shared store for `esiguard` (companion crate).
//!
//! Limiter state is kept as rows of a single name/value table. This is the
//! slowest backend but it is available wherever the application database is,
//! and it lifts the value length limit.

use async_trait::async_trait;
use esiguard::store::{keys, validate_entry, SharedStore, StoreError};
use sqlx::SqlitePool;

/// Prefix applied to every key so limiter rows never collide with other
/// application variables.
pub const KEY_PREFIX: &str = "__storage__";

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS esiguard_storage (
        name VARCHAR(255) NOT NULL PRIMARY KEY,
        value TEXT NOT NULL DEFAULT ''
    )
"#;

#[derive(Debug, Clone)]
pub struct SqlStore {
    pool: SqlitePool,
    prefix: String,
    provisioned: bool,
}

fn backend_error(error: sqlx::Error) -> StoreError {
    StoreError::Backend(error.to_string())
}

impl SqlStore {
    /// Upserting store; rows are created on first write.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool, prefix: KEY_PREFIX.to_string(), provisioned: false }
    }

    /// Only update rows created by [`SqlStore::migrate`].
    ///
    /// Writing a key without a row fails with [`StoreError::Missing`].
    pub fn provisioned(mut self) -> Self {
        self.provisioned = true;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Create the table and an empty row for each limiter key.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await.map_err(backend_error)?;
        for key in keys::ALL {
            sqlx::query("INSERT INTO esiguard_storage (name, value) VALUES (?, '') ON CONFLICT(name) DO NOTHING")
                .bind(self.key(key))
                .execute(&self.pool)
                .await
                .map_err(backend_error)?;
        }
        tracing::info!(target: "esiguard::sql", prefix = %self.prefix, "limiter storage provisioned");
        Ok(())
    }
}

#[async_trait]
impl SharedStore for SqlStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        validate_entry(key, value, None)?;
        let name = self.key(key);

        if self.provisioned {
            let updated = sqlx::query("UPDATE esiguard_storage SET value = ? WHERE name = ?")
                .bind(value)
                .bind(&name)
                .execute(&self.pool)
                .await
                .map_err(backend_error)?
                .rows_affected();
            if updated == 0 {
                tracing::error!(target: "esiguard::sql", key = %name, "storage row not found");
                return Err(StoreError::Missing(key.to_string()));
            }
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO esiguard_storage (name, value) VALUES (?, ?)
            ON CONFLICT(name) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(&name)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        sqlx::query_scalar::<_, String>("SELECT value FROM esiguard_storage WHERE name = ?")
            .bind(self.key(key))
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_error)
    }

    fn value_limit(&self) -> Option<usize> {
        None
    }

    fn backend(&self) -> &'static str {
        "sql"
    }
}
