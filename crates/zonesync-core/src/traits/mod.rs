//! Core traits for the zonesync system
//!
//! This module defines the abstract interfaces at the two external seams:
//!
//! - [`ProviderClient`]: wire-level adapter to the authoritative DNS provider
//! - [`RecordStore`]: local persisted representation of each DNS record

pub mod provider_client;
pub mod record_store;

pub use provider_client::{Ack, ProviderClient};
pub use record_store::RecordStore;
