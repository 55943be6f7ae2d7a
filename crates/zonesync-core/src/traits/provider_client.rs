// # Provider Client Trait
//
// Defines the interface for mutating DNS records via a provider API.
//
// ## Implementations
//
// - GoDaddy: `zonesync-provider-godaddy` crate
// - Future: Cloudflare, Route53, DigitalOcean, etc.
//
// ## Responsibility boundaries
//
// Provider clients are stateless wire adapters with strict limitations:
//
// - ✅ Perform exactly one HTTP call per invocation
// - ✅ Map provider responses and status codes to the local error taxonomy
// - ❌ No retry or backoff logic (owned by the ReconciliationEngine)
// - ❌ No access to the record store (owned by the engine)
// - ❌ No background tasks, no caching between requests
//
// Keeping clients single-shot makes the engine's call count observable,
// which the retry-bound tests rely on.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::record::{DnsRecord, RecordKey};

/// Provider acknowledgement of a mutation
///
/// `Committed` means the provider durably applied the change before
/// responding. A response indicating queued/async processing must be
/// reported as `Queued`, never as success: until the provider confirms,
/// the true record state is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// The change was durably committed before the response returned
    Committed,
    /// The provider accepted the request for asynchronous processing
    Queued,
}

/// Trait for DNS provider client implementations
///
/// Inputs are already-validated records. Update and delete are
/// target-replacing: the provider locates all records matching the
/// `(name, type)` identity and replaces (or removes) them wholesale, so
/// `update_record` always carries the complete desired record.
///
/// # Thread safety
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Create a record that does not yet exist at the provider.
    ///
    /// A duplicate `(name, type)` identity is a provider-side rejection
    /// and surfaces as [`ProviderError::Rejected`] with the provider's
    /// message intact.
    async fn create_record(&self, record: &DnsRecord) -> Result<Ack, ProviderError>;

    /// Replace the record at `key` with `record` (full-record-replace
    /// semantics, not a partial patch).
    async fn update_record(&self, key: &RecordKey, record: &DnsRecord)
    -> Result<Ack, ProviderError>;

    /// Delete the record at `key`.
    ///
    /// A provider-side absence is reported as [`ProviderError::NotFound`];
    /// the engine decides whether that is an error (it is not, for delete).
    async fn delete_record(&self, key: &RecordKey) -> Result<Ack, ProviderError>;

    /// Fetch the provider's current record at `key`, if any.
    ///
    /// This is the reconciliation read used to resolve a `Conflicted`
    /// local record against authoritative provider state.
    async fn fetch_record(&self, key: &RecordKey) -> Result<Option<DnsRecord>, ProviderError>;

    /// Provider name for logging/debugging (e.g. "godaddy")
    fn provider_name(&self) -> &'static str;
}
