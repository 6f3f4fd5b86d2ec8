//! Deterministic record identity.
//!
//! Providers never hand out stable IDs, so the merge key is derived from the
//! partition, title and address. Two distinct events sharing a title and an
//! address within one partition collapse into one document.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::event::{EventRecord, FIELD_ADDRESS, FIELD_TITLE};

/// Placeholder used when a record lacks a title or an address.
pub const UNKNOWN_FIELD: &str = "Unknown";

/// Separator between identity components.
pub const IDENTITY_SEPARATOR: char = '_';

/// Stable merge key for an event document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordIdentity(String);

impl RecordIdentity {
    /// Derive the identity of `record` within `partition`.
    pub fn derive(partition: &str, record: &EventRecord) -> Self {
        let title = component(record.get(FIELD_TITLE));
        let address = component(record.get(FIELD_ADDRESS));
        let joined = format!(
            "{partition}{IDENTITY_SEPARATOR}{title}{IDENTITY_SEPARATOR}{address}"
        );
        Self(sanitize(&joined))
    }

    /// Key prefix shared by every identity derived within `partition`.
    ///
    /// Sanitising can make distinct partitions share a prefix ("New York"
    /// and "New_York"), so a match is a candidate, not proof of membership.
    pub fn partition_prefix(partition: &str) -> String {
        sanitize(&format!("{partition}{IDENTITY_SEPARATOR}"))
    }

    /// Wrap an already-derived key, e.g. one read back from the store.
    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

fn sanitize(raw: &str) -> String {
    raw.replace([' ', '/'], "_")
}

impl fmt::Display for RecordIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RecordIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn component(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => UNKNOWN_FIELD.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
