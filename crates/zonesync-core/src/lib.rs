// # zonesync-core
//
// Core library for the zonesync DNS record reconciliation system.
//
// ## Architecture Overview
//
// This library provides the core functionality for mirroring DNS records
// between a local store and an authoritative provider:
//
// - **RecordValidator** (`validate`): pure syntax checks applied before any
//   network call
// - **ProviderClient**: trait for the wire-level adapter to the provider API
// - **RecordStore**: trait for the local persisted record mirror
// - **ReconciliationEngine**: orchestrates validate → provider call →
//   state resolution, owns retry policy and per-identity serialization
//
// ## Design Principles
//
// 1. **Confirmed state only**: the local store never reflects a mutation the
//    provider has not acknowledged
// 2. **Engine-owned policy**: retries, backoff, and conflict resolution live
//    in the engine; provider clients are single-shot
// 3. **Separation of concerns**: core logic is separate from provider
//    implementations
// 4. **Library-first**: all core functionality can be used as a library

pub mod config;
pub mod engine;
pub mod error;
pub mod record;
pub mod store;
pub mod traits;
pub mod validate;

// Re-export core types for convenience
pub use config::{EngineConfig, ProviderConfig, StoreConfig, ZonesyncConfig};
pub use engine::{EngineEvent, Outcome, ReconciliationEngine};
pub use error::{Error, ProviderError, Result, ValidationError};
pub use record::{DnsRecord, ProposedFields, RecordKey, RecordType, StoredRecord, SyncState};
pub use store::{FileRecordStore, MemoryRecordStore};
pub use traits::{Ack, ProviderClient, RecordStore};
