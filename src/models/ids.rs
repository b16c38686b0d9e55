//! Identifier types for audited entities and audit entries
//!
//! Entity identifiers are opaque: the persistence layer decides whether a row
//! is keyed by an integer, a UUID or a natural string key. Audit entries always
//! get their own UUID.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use uuid::Uuid;

/// Opaque identifier of a tracked entity
///
/// Serialized as a bare number or string. A string always reads back as
/// `Text`, and a `Uuid` equals the `Text` of its hyphenated form, so ids
/// compare equal after a trip through the trail.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EntityId {
    /// Auto-increment style key
    Int(i64),
    /// UUID key
    Uuid(Uuid),
    /// Natural or composite key rendered as a string
    Text(String),
}

/// Wire shape of an `EntityId`
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntityId {
    Int(i64),
    Text(String),
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match StoredEntityId::deserialize(deserializer)? {
            StoredEntityId::Int(id) => EntityId::Int(id),
            StoredEntityId::Text(id) => EntityId::Text(id),
        })
    }
}

impl PartialEq for EntityId {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (EntityId::Int(a), EntityId::Int(b)) => a == b,
            (EntityId::Int(_), _) | (_, EntityId::Int(_)) => false,
            (EntityId::Uuid(a), EntityId::Uuid(b)) => a == b,
            _ => self.to_string() == other.to_string(),
        }
    }
}

impl Eq for EntityId {}

impl Hash for EntityId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            EntityId::Int(id) => {
                0u8.hash(state);
                id.hash(state);
            }
            other => {
                1u8.hash(state);
                other.to_string().hash(state);
            }
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Int(id) => write!(f, "{}", id),
            EntityId::Uuid(id) => write!(f, "{}", id),
            EntityId::Text(id) => write!(f, "{}", id),
        }
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<Uuid> for EntityId {
    fn from(id: Uuid) -> Self {
        Self::Uuid(id)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self::Text(id)
    }
}

/// Unique identifier of an audit log entry, generated at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditEntryId(Uuid);

impl AuditEntryId {
    /// Create a new random ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Parse an ID from a string
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for AuditEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AuditEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "log-{}", &self.0.to_string()[..8])
    }
}

impl From<Uuid> for AuditEntryId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for AuditEntryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("log-").unwrap_or(s);
        Ok(Self(Uuid::parse_str(s)?))
    }
}
