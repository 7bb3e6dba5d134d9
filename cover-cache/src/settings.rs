//! Seam to the platform's small key-value settings store.
//!
//! The pool-fallback strategy remembers the discovered pool size here so it
//! can compute a pool index without re-enumerating the directory on every
//! lookup. Stale reads only cost a redundant re-enumeration, never
//! corruption, so no synchronization beyond the store's own is required.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Integer key-value settings, as exposed by the platform.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Read a value, falling back to `default` when the key is absent.
    async fn get_int(&self, key: &str, default: i64) -> i64;

    /// Persist a value.
    async fn put_int(&self, key: &str, value: i64);
}

/// In-memory settings, for tests and standalone use.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, i64>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get_int(&self, key: &str, default: i64) -> i64 {
        self.values.read().await.get(key).copied().unwrap_or(default)
    }

    async fn put_int(&self, key: &str, value: i64) {
        self.values.write().await.insert(key.to_string(), value);
    }
}
