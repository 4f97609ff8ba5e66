use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::{validate_entry, SharedStore, StoreError, MAX_VALUE_LEN};

/// In-process store shared by every clone.
///
/// Clones point at the same map, so all worker tasks and threads of a process
/// that were handed a clone coordinate through it. Nothing is persisted.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    data: Arc<RwLock<HashMap<String, String>>>,
    prefix: String,
    value_limit: Option<usize>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            data: Arc::default(),
            prefix: String::new(),
            value_limit: Some(MAX_VALUE_LEN),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespace every key with `prefix`.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Override the value length limit; `None` disables it.
    pub fn with_value_limit(mut self, limit: Option<usize>) -> Self {
        self.value_limit = limit;
        self
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        validate_entry(key, value, self.value_limit)?;
        let mut guard = self.data.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(self.namespaced(key), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let guard = self.data.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard.get(&self.namespaced(key)).cloned())
    }

    fn value_limit(&self) -> Option<usize> {
        self.value_limit
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
