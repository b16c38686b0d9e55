//! Field-level change records
//!
//! A `ChangeRecord` describes one detected change. A `PivotChangeRecord`
//! extends it with the join entity's type and extra attributes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::value::ChangeValue;

/// Category of a detected change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Create,
    Update,
    RelationChanged,
    AddedToCollection,
    RemovedFromCollection,
    PivotCreated,
    PivotUpdated,
    PivotDeleted,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Create => "CREATE",
            ChangeType::Update => "UPDATE",
            ChangeType::RelationChanged => "RELATION_CHANGED",
            ChangeType::AddedToCollection => "ADDED_TO_COLLECTION",
            ChangeType::RemovedFromCollection => "REMOVED_FROM_COLLECTION",
            ChangeType::PivotCreated => "PIVOT_CREATED",
            ChangeType::PivotUpdated => "PIVOT_UPDATED",
            ChangeType::PivotDeleted => "PIVOT_DELETED",
        }
    }

    pub fn is_pivot(&self) -> bool {
        matches!(
            self,
            ChangeType::PivotCreated | ChangeType::PivotUpdated | ChangeType::PivotDeleted
        )
    }

    /// Lowercased action without the `pivot_` prefix, e.g. `"created"`
    pub fn pivot_action(&self) -> Option<String> {
        if !self.is_pivot() {
            return None;
        }
        let lowered = self.as_str().to_lowercase();
        lowered.strip_prefix("pivot_").map(str::to_string)
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected field-level change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub field: String,

    #[serde(rename = "changeType")]
    pub change_type: ChangeType,

    pub from: ChangeValue,

    pub to: ChangeValue,

    /// Display-label key; `field` is used when unset
    #[serde(
        rename = "translationKey",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub translation_key: Option<String>,

    /// Short type name of the entity on the other side of a relation
    #[serde(
        rename = "relatedEntityType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub related_entity_type: Option<String>,
}

impl ChangeRecord {
    pub fn new(
        field: impl Into<String>,
        change_type: ChangeType,
        from: ChangeValue,
        to: ChangeValue,
    ) -> Self {
        Self {
            field: field.into(),
            change_type,
            from,
            to,
            translation_key: None,
            related_entity_type: None,
        }
    }

    pub fn with_related_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.related_entity_type = Some(entity_type.into());
        self
    }

    pub fn with_translation_key(mut self, key: impl Into<String>) -> Self {
        self.translation_key = Some(key.into());
        self
    }

    /// The display-label key, falling back to the field name
    pub fn translation_key(&self) -> &str {
        self.translation_key.as_deref().unwrap_or(&self.field)
    }

    pub fn is_enumeration(&self) -> bool {
        self.from.is_enum() || self.to.is_enum()
    }

    /// One-line rendering, e.g. `firstname: "John" -> "Jane"`
    pub fn summary(&self) -> String {
        format!("{}: {} -> {}", self.field, self.from, self.to)
    }
}

/// A change to an attributed join record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotChangeRecord {
    #[serde(flatten)]
    pub record: ChangeRecord,

    #[serde(rename = "pivotEntityType")]
    pub pivot_entity_type: String,

    /// Extra attributes of the join record, without its foreign keys
    #[serde(rename = "pivotData", default)]
    pub pivot_data: BTreeMap<String, ChangeValue>,

    /// Attribute-level diffs, for updated join records
    #[serde(
        rename = "pivotChanges",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub pivot_changes: Vec<ChangeRecord>,
}

/// Either kind of change, as stored in an entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuditChange {
    Pivot(PivotChangeRecord),
    Field(ChangeRecord),
}

impl AuditChange {
    pub fn record(&self) -> &ChangeRecord {
        match self {
            AuditChange::Pivot(pivot) => &pivot.record,
            AuditChange::Field(record) => record,
        }
    }

    pub fn record_mut(&mut self) -> &mut ChangeRecord {
        match self {
            AuditChange::Pivot(pivot) => &mut pivot.record,
            AuditChange::Field(record) => record,
        }
    }

    pub fn as_pivot(&self) -> Option<&PivotChangeRecord> {
        match self {
            AuditChange::Pivot(pivot) => Some(pivot),
            AuditChange::Field(_) => None,
        }
    }

    pub fn is_pivot(&self) -> bool {
        self.as_pivot().is_some()
    }
}

impl From<ChangeRecord> for AuditChange {
    fn from(record: ChangeRecord) -> Self {
        AuditChange::Field(record)
    }
}

impl From<PivotChangeRecord> for AuditChange {
    fn from(record: PivotChangeRecord) -> Self {
        AuditChange::Pivot(record)
    }
}
