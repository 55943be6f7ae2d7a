//! Configuration types for the zonesync system

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main zonesync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZonesyncConfig {
    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Record store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Engine policy settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl ZonesyncConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.provider.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// DNS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// GoDaddy provider
    Godaddy {
        /// API key
        api_key: String,
        /// API secret
        api_secret: String,
        /// Zone (domain) the records belong to
        domain: String,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Godaddy {
                api_key,
                api_secret,
                domain,
            } => {
                if api_key.is_empty() {
                    return Err(crate::Error::config("GoDaddy API key cannot be empty"));
                }
                if api_secret.is_empty() {
                    return Err(crate::Error::config("GoDaddy API secret cannot be empty"));
                }
                if domain.is_empty() {
                    return Err(crate::Error::config("GoDaddy domain cannot be empty"));
                }
                Ok(())
            }
        }
    }
}

/// Record store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// File-based record store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory record store (not persistent)
    #[default]
    Memory,
}

/// Engine policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of retry attempts on retryable provider failures.
    /// Total provider calls per operation are bounded by `max_retries + 1`.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Base delay for exponential backoff between retries (milliseconds);
    /// attempt `n` waits `retry_base_ms * 2^n`
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Capacity of the engine event channel.
    ///
    /// When full, new events are dropped (with a warning log) so slow
    /// observers cannot block mutations.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_retries > 10 {
            return Err(crate::Error::config(format!(
                "max_retries must be at most 10, got {}",
                self.max_retries
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config(
                "event_channel_capacity must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Backoff delay before retrying after failed attempt `attempt`
    /// (zero-based)
    pub fn retry_delay(&self, attempt: usize) -> Duration {
        // Shift capped so the delay stays sane even with a high retry bound
        let factor = 1u64 << attempt.min(10);
        Duration::from_millis(self.retry_base_ms.saturating_mul(factor))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_base_ms() -> u64 {
    500
}

fn default_event_channel_capacity() -> usize {
    1000
}
