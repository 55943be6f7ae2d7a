//! Record validation
//!
//! Pure, deterministic syntax checks applied to a proposed record before any
//! network call is made. A record that fails here never reaches the provider
//! and never mutates local state.

use std::net::Ipv4Addr;

use crate::error::ValidationError;
use crate::record::{DnsRecord, RecordType};

/// Minimum TTL accepted by the provider (seconds)
pub const MIN_TTL: u32 = 600;

/// Maximum TTL accepted by the provider (seconds)
pub const MAX_TTL: u32 = 86_400;

/// Validate a complete proposed record.
///
/// Checks, in order: name syntax, TTL bounds, priority presence, per-type
/// data grammar. The first failure is returned; no side effects.
pub fn validate(record: &DnsRecord) -> Result<(), ValidationError> {
    validate_name(&record.name)?;
    validate_ttl(record.ttl)?;
    validate_priority(record)?;
    validate_data(record)
}

/// Validate a record name: `@` for the zone apex, otherwise RFC 1035 label
/// rules. Underscore labels are allowed for SRV/TXT conventions
/// (e.g. `_sip._tcp`).
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::InvalidName("name is empty".to_string()));
    }

    // Zone apex shorthand
    if name == "@" {
        return Ok(());
    }

    if name.len() > 253 {
        return Err(ValidationError::InvalidName(format!(
            "name too long: {} chars (max 253)",
            name.len()
        )));
    }

    for label in name.split('.') {
        if label.is_empty() {
            return Err(ValidationError::InvalidName(format!(
                "name has an empty label: '{name}'"
            )));
        }
        if label.len() > 63 {
            return Err(ValidationError::InvalidName(format!(
                "label too long: {} chars (max 63): '{label}'",
                label.len()
            )));
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValidationError::InvalidName(format!(
                "label contains invalid characters: '{label}'"
            )));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(ValidationError::InvalidName(format!(
                "label cannot start or end with a hyphen: '{label}'"
            )));
        }
    }

    Ok(())
}

fn validate_ttl(ttl: u32) -> Result<(), ValidationError> {
    if !(MIN_TTL..=MAX_TTL).contains(&ttl) {
        return Err(ValidationError::InvalidTtl(format!(
            "ttl {ttl} outside accepted bounds {MIN_TTL}..={MAX_TTL}"
        )));
    }
    Ok(())
}

fn validate_priority(record: &DnsRecord) -> Result<(), ValidationError> {
    match (record.kind.requires_priority(), record.priority) {
        (true, None) => Err(ValidationError::InvalidData(format!(
            "{} records require a priority",
            record.kind
        ))),
        (false, Some(_)) => Err(ValidationError::InvalidData(format!(
            "{} records do not carry a priority",
            record.kind
        ))),
        _ => Ok(()),
    }
}

fn validate_data(record: &DnsRecord) -> Result<(), ValidationError> {
    let data = record.data.as_str();
    match record.kind {
        RecordType::A => {
            data.parse::<Ipv4Addr>().map_err(|_| {
                ValidationError::InvalidData(format!("A data is not an IPv4 literal: '{data}'"))
            })?;
        }
        RecordType::Cname | RecordType::Mx | RecordType::Ns => {
            validate_hostname(data)?;
        }
        RecordType::Txt => {
            if data.is_empty() {
                return Err(ValidationError::InvalidData(
                    "TXT data is empty".to_string(),
                ));
            }
            if data.len() > 1024 {
                return Err(ValidationError::InvalidData(format!(
                    "TXT data too long: {} bytes (max 1024)",
                    data.len()
                )));
            }
        }
        RecordType::Srv => validate_srv_data(data)?,
    }
    Ok(())
}

/// Hostname-valued data (CNAME/MX/NS targets); a trailing dot for
/// fully-qualified targets is accepted.
fn validate_hostname(data: &str) -> Result<(), ValidationError> {
    let trimmed = data.strip_suffix('.').unwrap_or(data);
    validate_name(trimmed)
        .map_err(|_| ValidationError::InvalidData(format!("not a valid hostname: '{data}'")))
}

/// SRV data grammar: `priority weight port target`
fn validate_srv_data(data: &str) -> Result<(), ValidationError> {
    let parts: Vec<&str> = data.split_whitespace().collect();
    if parts.len() != 4 {
        return Err(ValidationError::InvalidData(format!(
            "SRV data must be 'priority weight port target': '{data}'"
        )));
    }
    for (field, value) in ["priority", "weight", "port"].iter().zip(&parts[..3]) {
        value.parse::<u16>().map_err(|_| {
            ValidationError::InvalidData(format!("SRV {field} is not a number: '{value}'"))
        })?;
    }
    validate_hostname(parts[3])
}
