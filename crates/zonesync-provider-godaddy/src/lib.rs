// # GoDaddy DNS Provider Client
//
// `ProviderClient` implementation over the GoDaddy v1 domains API.
//
// ## Behavior
//
// - Makes exactly one HTTP request per invocation (retries are owned by the
//   ReconciliationEngine)
// - Update is target-replacing: `PUT /domains/{domain}/records/{type}/{name}`
//   replaces every record matching the identity with the supplied one
// - Create uses `PATCH /domains/{domain}/records`, which appends records
//   and rejects duplicates with a `DUPLICATE_RECORD` body
// - Delete is `DELETE /domains/{domain}/records/{type}/{name}`; a 404 maps
//   to `ProviderError::NotFound` and the engine treats it as idempotent
//   success
// - A 202 response means the provider queued the change; it is reported as
//   `Ack::Queued`, never as a committed success
//
// ## Security
//
// - The API secret NEVER appears in logs or `Debug` output
//
// ## API Reference
//
// - GoDaddy API v1: https://developer.godaddy.com/doc/endpoint/domains
// - Auth header: `Authorization: sso-key {key}:{secret}`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use zonesync_core::error::ProviderError;
use zonesync_core::record::{DnsRecord, RecordKey};
use zonesync_core::traits::{Ack, ProviderClient};

/// GoDaddy API base URL
const GODADDY_API_BASE: &str = "https://api.godaddy.com/v1";

/// HTTP timeout for API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// GoDaddy DNS provider client
///
/// Stateless and single-shot: one API call per invocation, no retries, no
/// caching. All coordination is owned by the ReconciliationEngine.
pub struct GoDaddyClient {
    /// API key
    api_key: String,

    /// API secret
    /// ⚠️ NEVER log this value
    api_secret: String,

    /// Zone (domain) the records belong to
    domain: String,

    /// API base URL, overridable for tests
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API secret
impl std::fmt::Debug for GoDaddyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoDaddyClient")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<REDACTED>")
            .field("domain", &self.domain)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Record payload for PUT (the identity is carried in the URL)
#[derive(Debug, Serialize)]
struct ReplacePayload<'a> {
    data: &'a str,
    ttl: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<u16>,
}

/// Record payload for PATCH (full record, identity included)
#[derive(Debug, Serialize)]
struct CreatePayload<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    name: &'a str,
    data: &'a str,
    ttl: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<u16>,
}

/// Record shape returned by GET on a `(type, name)` endpoint
#[derive(Debug, Deserialize)]
struct WireRecord {
    data: String,
    ttl: u32,
    #[serde(default)]
    priority: Option<u16>,
}

impl GoDaddyClient {
    /// Create a new GoDaddy client
    ///
    /// # Parameters
    ///
    /// - `api_key` / `api_secret`: GoDaddy production API credentials
    /// - `domain`: the zone whose records are managed
    ///
    /// # Security
    ///
    /// The API secret will never be logged or exposed in error messages.
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        domain: impl Into<String>,
    ) -> Result<Self, zonesync_core::Error> {
        Self::with_base_url(api_key, api_secret, domain, GODADDY_API_BASE)
    }

    /// Create a client against a custom base URL (for tests against a mock
    /// server)
    pub fn with_base_url(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        domain: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, zonesync_core::Error> {
        let api_key = api_key.into();
        let api_secret = api_secret.into();
        let domain = domain.into();

        if api_key.is_empty() || api_secret.is_empty() {
            return Err(zonesync_core::Error::config(
                "GoDaddy API key and secret are required",
            ));
        }
        if domain.is_empty() {
            return Err(zonesync_core::Error::config("GoDaddy domain is required"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| {
                zonesync_core::Error::config(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            api_key,
            api_secret,
            domain,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// The `sso-key` authorization header value
    fn auth_header(&self) -> String {
        format!("sso-key {}:{}", self.api_key, self.api_secret)
    }

    /// URL of the `(type, name)` record endpoint
    fn record_url(&self, key: &RecordKey) -> String {
        format!(
            "{}/domains/{}/records/{}/{}",
            self.base_url, self.domain, key.kind, key.name
        )
    }

    /// URL of the zone-wide records endpoint
    fn records_url(&self) -> String {
        format!("{}/domains/{}/records", self.base_url, self.domain)
    }

    /// Map a transport-level failure to the error taxonomy.
    ///
    /// The request may or may not have reached the provider, so every
    /// transport failure is ambiguous and reported as `Timeout`.
    fn transport_error(e: reqwest::Error) -> ProviderError {
        ProviderError::Timeout(format!("HTTP request failed: {e}"))
    }

    /// Map a non-success HTTP status to the error taxonomy.
    ///
    /// The response body is carried verbatim in `Rejected` so the operator
    /// sees the provider's own explanation.
    async fn status_error(response: reqwest::Response) -> ProviderError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error response".to_string());

        match status.as_u16() {
            401 | 403 => ProviderError::AuthFailure(format!(
                "invalid API credentials or insufficient permissions (status {status})"
            )),
            404 => ProviderError::NotFound(body),
            429 => ProviderError::RateLimited(format!("status {status}: {body}")),
            // The provider may or may not have applied the change before
            // failing; a server error is as ambiguous as a lost response
            500..=599 => ProviderError::Timeout(format!("server error {status}: {body}")),
            _ => ProviderError::Rejected(body),
        }
    }

    /// Interpret a success status as an acknowledgement.
    ///
    /// 202 means the provider accepted the request for asynchronous
    /// processing; that is not a durable commit.
    fn ack_from_status(status: reqwest::StatusCode) -> Ack {
        if status.as_u16() == 202 {
            Ack::Queued
        } else {
            Ack::Committed
        }
    }
}

#[async_trait]
impl ProviderClient for GoDaddyClient {
    async fn create_record(&self, record: &DnsRecord) -> Result<Ack, ProviderError> {
        let key = record.key();
        tracing::info!(%key, domain = %self.domain, "creating GoDaddy DNS record");

        let payload = [CreatePayload {
            kind: record.kind.as_str(),
            name: &record.name,
            data: &record.data,
            ttl: record.ttl,
            priority: record.priority,
        }];

        let response = self
            .client
            .patch(self.records_url())
            .header("Authorization", self.auth_header())
            .json(&payload)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        Ok(Self::ack_from_status(response.status()))
    }

    async fn update_record(
        &self,
        key: &RecordKey,
        record: &DnsRecord,
    ) -> Result<Ack, ProviderError> {
        tracing::info!(%key, domain = %self.domain, "replacing GoDaddy DNS record");

        // The endpoint replaces every record matching (type, name), so the
        // payload is the complete desired record, not a diff
        let payload = [ReplacePayload {
            data: &record.data,
            ttl: record.ttl,
            priority: record.priority,
        }];

        let response = self
            .client
            .put(self.record_url(key))
            .header("Authorization", self.auth_header())
            .json(&payload)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        Ok(Self::ack_from_status(response.status()))
    }

    async fn delete_record(&self, key: &RecordKey) -> Result<Ack, ProviderError> {
        tracing::info!(%key, domain = %self.domain, "deleting GoDaddy DNS record");

        let response = self
            .client
            .delete(self.record_url(key))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        Ok(Self::ack_from_status(response.status()))
    }

    async fn fetch_record(&self, key: &RecordKey) -> Result<Option<DnsRecord>, ProviderError> {
        tracing::debug!(%key, domain = %self.domain, "fetching GoDaddy DNS record");

        let response = self
            .client
            .get(self.record_url(key))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(Self::transport_error)?;

        // For a read, provider-side absence is a valid answer
        if response.status().as_u16() == 404 {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        let records: Vec<WireRecord> = response
            .json()
            .await
            .map_err(|e| ProviderError::Rejected(format!("unparseable response: {e}")))?;

        Ok(records.into_iter().next().map(|wire| DnsRecord {
            name: key.name.clone(),
            kind: key.kind,
            data: wire.data,
            ttl: wire.ttl,
            priority: wire.priority,
        }))
    }

    fn provider_name(&self) -> &'static str {
        "godaddy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_credentials_rejected() {
        assert!(GoDaddyClient::new("", "secret", "example.com").is_err());
        assert!(GoDaddyClient::new("key", "", "example.com").is_err());
        assert!(GoDaddyClient::new("key", "secret", "").is_err());
    }

    #[test]
    fn api_secret_not_exposed_in_debug() {
        let client = GoDaddyClient::new("key-12345", "secret-67890", "example.com").unwrap();
        let debug_str = format!("{client:?}");
        assert!(!debug_str.contains("secret-67890"));
        assert!(debug_str.contains("GoDaddyClient"));
        assert!(debug_str.contains("<REDACTED>"));
    }

    #[test]
    fn provider_name() {
        let client = GoDaddyClient::new("key", "secret", "example.com").unwrap();
        assert_eq!(client.provider_name(), "godaddy");
    }

    #[test]
    fn record_url_uses_identity() {
        let client = GoDaddyClient::new("key", "secret", "example.com").unwrap();
        let key = RecordKey::new("www", zonesync_core::record::RecordType::A);
        assert_eq!(
            client.record_url(&key),
            "https://api.godaddy.com/v1/domains/example.com/records/A/www"
        );
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client =
            GoDaddyClient::with_base_url("key", "secret", "example.com", "http://localhost:1/")
                .unwrap();
        assert_eq!(client.records_url(), "http://localhost:1/domains/example.com/records");
    }
}
