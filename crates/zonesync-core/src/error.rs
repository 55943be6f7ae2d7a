//! Error types for the zonesync system
//!
//! Three layers, matching where a failure can occur:
//! - [`ValidationError`]: local, pre-network, always recoverable by the operator
//! - [`ProviderError`]: returned by the provider API boundary
//! - [`Error`]: everything else (store, config, engine plumbing)

use thiserror::Error;

/// Result type alias for zonesync operations
pub type Result<T> = std::result::Result<T, Error>;

/// A proposed record failed local validation.
///
/// These never reach the network layer and never mutate local state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Record type is not one of the supported kinds
    #[error("invalid record type: {0}")]
    InvalidType(String),

    /// Record name is empty or not a valid DNS label/FQDN
    #[error("invalid record name: {0}")]
    InvalidName(String),

    /// Record data does not match the grammar for its type
    #[error("invalid record data: {0}")]
    InvalidData(String),

    /// TTL is outside the provider-accepted bounds
    #[error("invalid ttl: {0}")]
    InvalidTtl(String),
}

/// A provider API call failed.
///
/// Only `RateLimited` and `Timeout` are retryable. `Timeout` is ambiguous:
/// the mutation may or may not have been applied at the provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The record does not exist at the provider
    #[error("record not found at provider: {0}")]
    NotFound(String),

    /// The provider throttled the request
    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    /// Credentials were refused; retrying cannot succeed
    #[error("provider authentication failed: {0}")]
    AuthFailure(String),

    /// The call did not resolve; the mutation's effect is unknown
    #[error("provider call timed out: {0}")]
    Timeout(String),

    /// Provider-side validation failure, message verbatim from the provider
    #[error("provider rejected the request: {0}")]
    Rejected(String),
}

impl ProviderError {
    /// Whether the engine may retry this failure under its backoff policy
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Timeout(_))
    }

    /// Whether the mutation's effect at the provider is unknown
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Core error type for the zonesync system
#[derive(Error, Debug)]
pub enum Error {
    /// Local validation failure
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Provider API failure
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Record store failure
    #[error("record store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// No local record exists for the given identity
    #[error("no local record: {0}")]
    NoLocalRecord(String),

    /// Engine-internal failure (task join, channel plumbing)
    #[error("engine error: {0}")]
    Engine(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a record store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a "no local record" error
    pub fn no_local_record(msg: impl Into<String>) -> Self {
        Self::NoLocalRecord(msg.into())
    }

    /// Create an engine-internal error
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Engine(err.to_string())
    }
}
