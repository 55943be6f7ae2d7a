//! DNS record model
//!
//! A record is identified by its `(name, type)` pair within a zone. The
//! provider treats update and delete as target-replacing operations against
//! that identity, so the model carries the complete desired record rather
//! than a diff.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Supported DNS record types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Cname,
    Mx,
    Txt,
    Srv,
    Ns,
}

impl RecordType {
    /// Uppercase name as used on the wire and in storage keys
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Cname => "CNAME",
            RecordType::Mx => "MX",
            RecordType::Txt => "TXT",
            RecordType::Srv => "SRV",
            RecordType::Ns => "NS",
        }
    }

    /// Whether records of this type carry a priority field
    pub fn requires_priority(&self) -> bool {
        matches!(self, RecordType::Mx | RecordType::Srv)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(RecordType::A),
            "CNAME" => Ok(RecordType::Cname),
            "MX" => Ok(RecordType::Mx),
            "TXT" => Ok(RecordType::Txt),
            "SRV" => Ok(RecordType::Srv),
            "NS" => Ok(RecordType::Ns),
            other => Err(ValidationError::InvalidType(other.to_string())),
        }
    }
}

/// Identity of a DNS record within a zone: the `(name, type)` pair
///
/// Names are normalized to lowercase on construction since DNS names are
/// case-insensitive; two keys differing only in case are the same identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    /// Record name, relative to the zone (e.g. "www", "@" for the apex)
    pub name: String,
    /// Record type
    pub kind: RecordType,
}

impl RecordKey {
    /// Create a key, normalizing the name to lowercase
    pub fn new(name: impl Into<String>, kind: RecordType) -> Self {
        Self {
            name: name.into().to_lowercase(),
            kind,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.kind)
    }
}

impl FromStr for RecordKey {
    type Err = ValidationError;

    /// Parse the `"<name>:<TYPE>"` form produced by `Display`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, kind) = s
            .rsplit_once(':')
            .ok_or_else(|| ValidationError::InvalidName(format!("not a record key: {s}")))?;
        if name.is_empty() {
            return Err(ValidationError::InvalidName("empty record name".to_string()));
        }
        Ok(RecordKey::new(name, kind.parse()?))
    }
}

/// A complete DNS record as it should exist at the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Record name, relative to the zone
    pub name: String,
    /// Record type
    #[serde(rename = "type")]
    pub kind: RecordType,
    /// Record value; semantics depend on `kind`
    pub data: String,
    /// Time-to-live in seconds
    pub ttl: u32,
    /// Priority, required for MX/SRV and absent otherwise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u16>,
}

impl DnsRecord {
    /// The identity of this record
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.name.clone(), self.kind)
    }

    /// Apply proposed fields over this record, producing the full
    /// replacement record (full-record-replace semantics, never a patch)
    pub fn merged_with(&self, fields: &ProposedFields) -> DnsRecord {
        DnsRecord {
            name: self.name.clone(),
            kind: self.kind,
            data: fields.data.clone().unwrap_or_else(|| self.data.clone()),
            ttl: fields.ttl.unwrap_or(self.ttl),
            priority: fields.priority.or(self.priority),
        }
    }
}

/// Operator-proposed field values for an update
///
/// Absent fields keep their current value; the engine always sends the
/// complete merged record to the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProposedFields {
    pub data: Option<String>,
    pub ttl: Option<u32>,
    pub priority: Option<u16>,
}

/// Synchronization state of a locally stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Local fields match what the provider last confirmed
    Synced,
    /// An update is in flight; the stored fields are still the confirmed ones
    PendingUpdate,
    /// A delete is in flight
    PendingDelete,
    /// The last mutation's true effect at the provider is unknown;
    /// only an explicit reconciliation read resolves this
    Conflicted,
}

/// A record as persisted in the local store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// The last provider-confirmed record fields
    pub record: DnsRecord,
    /// Current synchronization state
    pub state: SyncState,
    /// When the provider last confirmed these fields
    pub last_synced: DateTime<Utc>,
}

impl StoredRecord {
    /// A freshly confirmed record
    pub fn synced(record: DnsRecord) -> Self {
        Self {
            record,
            state: SyncState::Synced,
            last_synced: Utc::now(),
        }
    }

    /// The same record fields with a different state marker
    pub fn with_state(&self, state: SyncState) -> Self {
        Self {
            record: self.record.clone(),
            state,
            last_synced: self.last_synced,
        }
    }
}
