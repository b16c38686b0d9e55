//! Audit record factories
//!
//! A factory turns extracted changes into an `AuditLogEntry`, applies the
//! translation-key conventions, and hands the entry to the store.

use std::collections::HashSet;

use tracing::debug;

use crate::audit::{Actor, AuditLogEntry, AuditStore, SubjectRef};
use crate::error::{AuditError, AuditResult};
use crate::models::{AuditChange, ChangeRecord, ChangeType, ChangeValue, Entity, EntityReference};

/// Field name of the single record in a creation entry
pub const CREATION_FIELD: &str = "entity";

/// Builds and stores audit entries for the entity types it supports
pub trait AuditRecordFactory: Send + Sync {
    /// Whether this factory handles the given concrete entity type
    fn supports(&self, entity_type: &str) -> bool;

    /// Record a creation and commit it right away
    fn create_from_create(
        &self,
        actor: Option<Actor>,
        entity: &dyn Entity,
        reference: EntityReference,
        store: &dyn AuditStore,
    ) -> AuditResult<AuditLogEntry> {
        let record = ChangeRecord::new(
            CREATION_FIELD,
            ChangeType::Create,
            ChangeValue::Null,
            ChangeValue::Reference(reference),
        )
        .with_related_entity_type(entity.entity_type());

        let entry = AuditLogEntry::new(actor, SubjectRef::of(entity), vec![record.into()]);
        store.persist(entry.clone())?;

        debug!(subject = %entry.subject, entry = %entry.id, "recorded creation");
        Ok(entry)
    }

    /// Record an update and stage it with the host's pending transaction
    fn create_from_update(
        &self,
        actor: Option<Actor>,
        entity: &dyn Entity,
        changes: Vec<AuditChange>,
        store: &dyn AuditStore,
    ) -> AuditResult<AuditLogEntry> {
        if changes.is_empty() {
            return Err(AuditError::Extraction(format!(
                "No changes to record for {} {}",
                entity.entity_type(),
                entity.id()
            )));
        }

        let changes = changes
            .into_iter()
            .map(|mut change| {
                if change.record().translation_key.is_none() {
                    let key = self.translation_key(&change);
                    change.record_mut().translation_key = Some(key);
                }
                change
            })
            .collect();

        let entry = AuditLogEntry::new(actor, SubjectRef::of(entity), changes);
        store.stage(entry.clone())?;

        debug!(
            subject = %entry.subject,
            entry = %entry.id,
            changes = entry.changes.len(),
            "staged update"
        );
        Ok(entry)
    }

    /// Display-label key for one change
    ///
    /// `<field>.label` for enumerations, `pivot.<field>.<action>` for join
    /// records, the field name otherwise.
    fn translation_key(&self, change: &AuditChange) -> String {
        let record = change.record();
        if let Some(action) = record.change_type.pivot_action() {
            return format!("pivot.{}.{}", record.field, action);
        }
        if record.is_enumeration() {
            return format!("{}.label", record.field);
        }
        record.field.clone()
    }
}

/// Factory applying the standard conventions to a fixed set of entity types
#[derive(Debug, Clone, Default)]
pub struct DefaultRecordFactory {
    entity_types: HashSet<String>,
}

impl DefaultRecordFactory {
    pub fn new<I, S>(entity_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entity_types: entity_types.into_iter().map(Into::into).collect(),
        }
    }
}

impl AuditRecordFactory for DefaultRecordFactory {
    fn supports(&self, entity_type: &str) -> bool {
        self.entity_types.contains(entity_type)
    }
}
