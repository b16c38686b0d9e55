//! Raw and rendered field values
//!
//! `FieldValue` is what the persistence layer hands us in a change-set.
//! `ChangeValue` is what ends up in a stored `ChangeRecord`.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use super::entity::{same_entity, Entity, EntityHandle};
use super::ids::EntityId;

/// A raw value on one side of a field delta
#[derive(Debug, Clone)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Temporal value; two values are equal when they denote the same instant
    DateTime(DateTime<FixedOffset>),
    /// Structured value passed through as-is
    Json(serde_json::Value),
    /// Reference to another entity
    Entity(EntityHandle),
}

impl FieldValue {
    /// Wrap an entity handle
    pub fn entity(entity: EntityHandle) -> Self {
        Self::Entity(entity)
    }

    /// Build a temporal value from a timestamp without zone, read as UTC
    pub fn naive(datetime: NaiveDateTime) -> Self {
        Self::DateTime(datetime.and_utc().fixed_offset())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The referenced entity, if this value is an entity reference
    pub fn as_entity(&self) -> Option<&EntityHandle> {
        match self {
            Self::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    /// String form of a scalar used as an enumeration case key
    pub fn enum_key(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Text(s) => Some(s.clone()),
            Self::DateTime(dt) => Some(dt.to_rfc3339()),
            Self::Json(serde_json::Value::String(s)) => Some(s.clone()),
            Self::Json(v) => Some(v.to_string()),
            Self::Entity(e) => Some(e.id().to_string()),
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            // chrono compares the underlying UTC instant, not the offset
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            (Self::Json(a), Self::Json(b)) => a == b,
            (Self::Entity(a), Self::Entity(b)) => same_entity(a.as_ref(), b.as_ref()),
            _ => false,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value.fixed_offset())
    }
}

impl From<DateTime<FixedOffset>> for FieldValue {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Self::DateTime(value)
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            other => Self::Json(other),
        }
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Reference to another entity as stored in the trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityReference {
    pub id: EntityId,
    /// Populated only when the entity exposes a label
    #[serde(deserialize_with = "present_option")]
    pub label: Option<String>,
}

impl EntityReference {
    pub fn of(entity: &dyn Entity) -> Self {
        Self {
            id: entity.id(),
            label: entity.label(),
        }
    }
}

impl fmt::Display for EntityReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{} (#{})", label, self.id),
            None => write!(f, "#{}", self.id),
        }
    }
}

/// An enumeration case as stored in the trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumValue {
    #[serde(deserialize_with = "present_option")]
    pub value: Option<String>,
    /// `"<enumName>.<value>"`, or null when the value is null
    #[serde(deserialize_with = "present_option")]
    pub label: Option<String>,
    #[serde(rename = "type", deserialize_with = "enum_kind")]
    pub kind: String,
}

impl EnumValue {
    pub const KIND: &'static str = "enum";

    pub fn new(enum_name: &str, value: Option<String>) -> Self {
        let label = value.as_ref().map(|v| format!("{}.{}", enum_name, v));
        Self {
            value,
            label,
            kind: Self::KIND.to_string(),
        }
    }
}

/// Nullable field that must still be present in the stored object
fn present_option<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Option::<String>::deserialize(deserializer)
}

fn enum_kind<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let kind = String::deserialize(deserializer)?;
    if kind != EnumValue::KIND {
        return Err(D::Error::custom(format!(
            "expected type \"{}\", found \"{}\"",
            EnumValue::KIND,
            kind
        )));
    }
    Ok(kind)
}

/// A rendered value on one side of a `ChangeRecord`
///
/// Enumeration and reference payloads only match their exact stored shape;
/// any other object reads back as `Raw`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum ChangeValue {
    #[default]
    Null,
    Text(String),
    Enum(EnumValue),
    Reference(EntityReference),
    Raw(serde_json::Value),
}

impl ChangeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_enum(&self) -> bool {
        matches!(self, Self::Enum(_))
    }

    pub fn as_reference(&self) -> Option<&EntityReference> {
        match self {
            Self::Reference(reference) => Some(reference),
            _ => None,
        }
    }

    /// Reference to an entity, or null when absent
    pub fn reference(entity: Option<&dyn Entity>) -> Self {
        entity.map_or(Self::Null, |e| Self::Reference(EntityReference::of(e)))
    }
}

impl fmt::Display for ChangeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeValue::Null => write!(f, "(none)"),
            ChangeValue::Text(s) => write!(f, "\"{}\"", s),
            ChangeValue::Enum(e) => match (&e.label, &e.value) {
                (Some(label), _) => write!(f, "{}", label),
                (None, Some(value)) => write!(f, "{}", value),
                (None, None) => write!(f, "(none)"),
            },
            ChangeValue::Reference(r) => write!(f, "{}", r),
            ChangeValue::Raw(v) => write!(f, "{}", v),
        }
    }
}
