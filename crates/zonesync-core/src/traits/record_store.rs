// # Record Store Trait
//
// Defines the interface for the local persisted representation of DNS
// records.
//
// ## Purpose
//
// The store holds, per record identity, the last provider-confirmed fields
// and a synchronization state. It is the only mutable shared resource in
// the system, and all writes to it happen exclusively from the
// ReconciliationEngine after a provider outcome is known — never
// optimistically before confirmation.
//
// ## Implementations
//
// - Memory: `MemoryRecordStore` (tests, ephemeral runs)
// - File: `FileRecordStore` (JSON with atomic writes and backup recovery)

use async_trait::async_trait;

use crate::error::Error;
use crate::record::{RecordKey, StoredRecord};

/// Trait for record store implementations
///
/// All methods must be safe to call concurrently from multiple tasks;
/// per-identity write ordering is the engine's responsibility.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Get the stored record for an identity, if present
    async fn get(&self, key: &RecordKey) -> Result<Option<StoredRecord>, Error>;

    /// Insert or replace the stored record for an identity
    async fn put(&self, key: &RecordKey, record: &StoredRecord) -> Result<(), Error>;

    /// Remove the stored record for an identity (no-op if absent)
    async fn delete(&self, key: &RecordKey) -> Result<(), Error>;

    /// List all record identities in the store
    async fn list_keys(&self) -> Result<Vec<RecordKey>, Error>;

    /// Persist any pending changes.
    ///
    /// Some implementations may buffer writes; this ensures all changes
    /// are flushed to persistent storage.
    async fn flush(&self) -> Result<(), Error>;
}
