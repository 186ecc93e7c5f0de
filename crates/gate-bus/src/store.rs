//! Shared key-value store holding externally produced parameters.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::trace;

use crate::error::StoreResult;

/// Read side of the shared parameter store.
///
/// Values are UTF-8 strings; interpretation belongs to the caller.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Read a key. `Ok(None)` means the key is not set.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;
}

/// In-process store backed by a concurrent map.
#[derive(Default)]
pub struct InMemoryStore {
    values: DashMap<String, String>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a key, replacing any previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Remove a key. Returns the previous value if there was one.
    pub fn remove(&self, key: &str) -> Option<String> {
        self.values.remove(key).map(|(_, v)| v)
    }
}

#[async_trait]
impl ParameterStore for InMemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self.values.get(key).map(|v| v.value().clone());
        trace!(key, found = value.is_some(), "Store read");
        Ok(value)
    }
}
