// # Memory Record Store
//
// In-memory implementation of RecordStore.
//
// ## Crash Behavior
//
// - All state is lost on restart/crash
// - First run after a restart starts with an empty local mirror; records
//   must be re-created or reconciled from provider state
//
// ## When to Use
//
// - Testing environments
// - One-shot invocations where the caller reconciles afterwards

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use async_trait::async_trait;

use crate::error::Error;
use crate::record::{RecordKey, StoredRecord};
use crate::traits::record_store::RecordStore;

/// In-memory record store implementation
///
/// State lives in a HashMap behind a RwLock; nothing persists across
/// restarts.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<RwLock<HashMap<RecordKey, StoredRecord>>>,
}

impl MemoryRecordStore {
    /// Create a new empty memory record store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of records in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<StoredRecord>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.get(key).cloned())
    }

    async fn put(&self, key: &RecordKey, record: &StoredRecord) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.insert(key.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, key: &RecordKey) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<RecordKey>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        // No-op for the memory store
        Ok(())
    }
}
