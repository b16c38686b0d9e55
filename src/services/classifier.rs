//! Change classification
//!
//! Turns one raw `(field, old, new)` triple, one collection diff, or one
//! join-record event into normalized change records.
//!
//! Field triples are checked in priority order:
//!
//! 1. equal values (same instant for temporal values) produce nothing
//! 2. ignored fields produce nothing
//! 3. an entity on either side makes a `RELATION_CHANGED` record
//! 4. enumeration fields make an `UPDATE` record with enum payloads
//! 5. anything else makes an `UPDATE` record with rendered scalars

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::config::AuditSettings;
use crate::error::{AuditError, AuditResult};
use crate::metadata::FieldCatalog;
use crate::models::{
    ChangeRecord, ChangeSet, ChangeType, ChangeValue, CollectionDiff, Entity, EnumValue,
    FieldDelta, FieldValue, JoinRecord, PivotChangeRecord,
};

/// Which side of a join record a pivot record is written for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Perspective {
    /// The owning entity; the field is the relationship type
    Owner,
    /// The target entity; the field is the reverse relationship type
    Target,
}

/// Classifies changes for one concrete entity type
pub struct ChangeClassifier {
    entity_type: String,
    catalog: Arc<dyn FieldCatalog>,
    ignored: HashSet<String>,
    date_format: String,
}

impl ChangeClassifier {
    pub fn new(entity_type: impl Into<String>, catalog: Arc<dyn FieldCatalog>) -> Self {
        Self {
            entity_type: entity_type.into(),
            catalog,
            ignored: HashSet::new(),
            date_format: AuditSettings::default().date_format,
        }
    }

    /// Classifier using the ignore lists and date format from settings
    pub fn from_settings(
        entity_type: impl Into<String>,
        catalog: Arc<dyn FieldCatalog>,
        settings: &AuditSettings,
    ) -> Self {
        let entity_type = entity_type.into();
        let ignored = settings.ignored_fields_for(&entity_type);
        Self {
            entity_type,
            catalog,
            ignored,
            date_format: settings.date_format.clone(),
        }
    }

    pub fn with_ignored_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }

    /// The entity type this classifier is configured for
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn is_ignored(&self, field: &str) -> bool {
        self.ignored.contains(field)
    }

    pub fn tracked_collections(&self) -> AuditResult<Vec<String>> {
        Ok(self
            .catalog
            .tracked_collections(&self.entity_type)?
            .into_iter()
            .filter(|field| !self.is_ignored(field))
            .collect())
    }

    /// Classify one field delta from a change-set
    pub fn classify_delta(&self, delta: &FieldDelta) -> AuditResult<Option<ChangeRecord>> {
        self.classify(&delta.field, &delta.old, &delta.new)
    }

    /// Classify one `(field, old, new)` triple into zero or one record
    pub fn classify(
        &self,
        field: &str,
        old: &FieldValue,
        new: &FieldValue,
    ) -> AuditResult<Option<ChangeRecord>> {
        if old == new || self.is_ignored(field) {
            return Ok(None);
        }

        if old.as_entity().is_some() || new.as_entity().is_some() {
            return self.relation_change(field, old, new).map(Some);
        }

        let (from, to) = match self.catalog.enumeration_name(&self.entity_type, field)? {
            Some(enum_name) => (
                ChangeValue::Enum(EnumValue::new(&enum_name, self.enum_case(field, old)?)),
                ChangeValue::Enum(EnumValue::new(&enum_name, self.enum_case(field, new)?)),
            ),
            None => (self.render(old), self.render(new)),
        };

        // Values of different kinds can still render the same, e.g. `1` and `1.0`
        if from == to {
            return Ok(None);
        }
        Ok(Some(ChangeRecord::new(field, ChangeType::Update, from, to)))
    }

    /// Classify a scheduled collection diff for `owner`
    ///
    /// Diffs owned by another entity, or on a field that is not tracked, are
    /// discarded. Removals come before additions.
    pub fn classify_collection(
        &self,
        owner: &dyn Entity,
        diff: &CollectionDiff,
    ) -> AuditResult<Vec<ChangeRecord>> {
        if !diff.is_owned_by(owner) {
            debug!(
                entity_type = %self.entity_type,
                field = %diff.field,
                owner = %diff.owner.id(),
                "skipping collection diff of another owner"
            );
            return Ok(Vec::new());
        }
        if self.is_ignored(&diff.field) {
            return Ok(Vec::new());
        }
        if !self.tracked_collections()?.contains(&diff.field) {
            return Ok(Vec::new());
        }

        let removed = diff.net_deleted().map(|item| {
            ChangeRecord::new(
                &diff.field,
                ChangeType::RemovedFromCollection,
                ChangeValue::reference(Some(item.as_ref())),
                ChangeValue::Null,
            )
            .with_related_entity_type(item.entity_type())
        });

        let added = diff.net_inserted().map(|item| {
            ChangeRecord::new(
                &diff.field,
                ChangeType::AddedToCollection,
                ChangeValue::Null,
                ChangeValue::reference(Some(item.as_ref())),
            )
            .with_related_entity_type(item.entity_type())
        });

        Ok(removed.chain(added).collect())
    }

    /// Render one join-record event from one side of the relationship
    ///
    /// `changes` is the join record's own change-set, used for
    /// `PivotUpdated`. Only extra attributes are considered there; an update
    /// that touches none of them yields no record.
    pub fn pivot_record(
        &self,
        pivot_entity_type: &str,
        join: &dyn JoinRecord,
        perspective: Perspective,
        change_type: ChangeType,
        changes: Option<&ChangeSet>,
    ) -> AuditResult<Option<PivotChangeRecord>> {
        if !change_type.is_pivot() {
            return Err(AuditError::Extraction(format!(
                "{} is not a join-record change type",
                change_type
            )));
        }

        let (field, other) = match perspective {
            Perspective::Owner => (join.relationship_type().to_string(), join.target()),
            Perspective::Target => (join.reverse_relationship_type().to_string(), join.owner()),
        };

        let extra = join.extra_attributes();
        let pivot_data: BTreeMap<String, ChangeValue> = extra
            .iter()
            .map(|(name, value)| (name.clone(), self.render(value)))
            .collect();

        let mut pivot_changes = Vec::new();
        if change_type == ChangeType::PivotUpdated {
            if let Some(changes) = changes {
                for delta in changes.iter() {
                    let is_attribute = extra.iter().any(|(name, _)| name == &delta.field);
                    if !is_attribute {
                        continue;
                    }
                    let (from, to) = (self.render(&delta.old), self.render(&delta.new));
                    if from != to {
                        pivot_changes.push(ChangeRecord::new(&delta.field, ChangeType::Update, from, to));
                    }
                }
            }
            if pivot_changes.is_empty() {
                return Ok(None);
            }
        }

        let reference = ChangeValue::reference(Some(other.as_ref()));
        let (from, to) = match change_type {
            ChangeType::PivotCreated => (ChangeValue::Null, reference),
            ChangeType::PivotDeleted => (reference, ChangeValue::Null),
            _ => (reference.clone(), reference),
        };

        Ok(Some(PivotChangeRecord {
            record: ChangeRecord::new(field, change_type, from, to)
                .with_related_entity_type(other.entity_type()),
            pivot_entity_type: pivot_entity_type.to_string(),
            pivot_data,
            pivot_changes,
        }))
    }

    /// Render a scalar: dates with the configured format, booleans as
    /// `"1"`/`""`, numbers as their string form
    pub fn render(&self, value: &FieldValue) -> ChangeValue {
        match value {
            FieldValue::Null => ChangeValue::Null,
            FieldValue::Bool(true) => ChangeValue::Text("1".to_string()),
            FieldValue::Bool(false) => ChangeValue::Text(String::new()),
            FieldValue::Int(i) => ChangeValue::Text(i.to_string()),
            FieldValue::Float(f) => ChangeValue::Text(f.to_string()),
            FieldValue::Text(s) => ChangeValue::Text(s.clone()),
            FieldValue::DateTime(dt) => ChangeValue::Text(dt.format(&self.date_format).to_string()),
            FieldValue::Json(v) => ChangeValue::Raw(v.clone()),
            FieldValue::Entity(e) => ChangeValue::reference(Some(e.as_ref())),
        }
    }

    fn relation_change(
        &self,
        field: &str,
        old: &FieldValue,
        new: &FieldValue,
    ) -> AuditResult<ChangeRecord> {
        let old_entity = self.relation_side(field, old)?;
        let new_entity = self.relation_side(field, new)?;

        let mut record = ChangeRecord::new(
            field,
            ChangeType::RelationChanged,
            ChangeValue::reference(old_entity),
            ChangeValue::reference(new_entity),
        );
        if let Some(related) = new_entity.or(old_entity) {
            record = record.with_related_entity_type(related.entity_type());
        }
        Ok(record)
    }

    fn relation_side<'a>(
        &self,
        field: &str,
        value: &'a FieldValue,
    ) -> AuditResult<Option<&'a dyn Entity>> {
        match value {
            FieldValue::Null => Ok(None),
            FieldValue::Entity(entity) => Ok(Some(entity.as_ref())),
            other => Err(AuditError::Extraction(format!(
                "{}.{} mixes an entity reference with a non-entity value: {:?}",
                self.entity_type, field, other
            ))),
        }
    }

    fn enum_case(&self, field: &str, value: &FieldValue) -> AuditResult<Option<String>> {
        match value {
            FieldValue::Null | FieldValue::Bool(_) | FieldValue::Int(_) | FieldValue::Text(_) => {
                Ok(value.enum_key())
            }
            FieldValue::Json(serde_json::Value::String(_)) => Ok(value.enum_key()),
            other => Err(AuditError::Extraction(format!(
                "{}.{} is registered as an enumeration but holds {:?}",
                self.entity_type, field, other
            ))),
        }
    }
}
