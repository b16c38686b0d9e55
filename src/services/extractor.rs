//! Change extraction
//!
//! An extractor is the per-type facade the mutation listener talks to. It runs
//! its classifier over a whole change-set or over the scheduled collection
//! diffs of one entity.

use tracing::debug;

use crate::error::AuditResult;
use crate::models::{ChangeRecord, ChangeSet, ChangeType, CollectionDiff, Entity, EntityReference};

use super::classifier::ChangeClassifier;

/// Extracts change records for the entity types it supports
pub trait ChangeExtractor: Send + Sync {
    /// Whether this extractor handles the given concrete entity type
    fn supports(&self, entity_type: &str) -> bool;

    fn classifier(&self) -> &ChangeClassifier;

    /// Reference to a freshly created entity
    fn extract_creation_data(&self, entity: &dyn Entity) -> EntityReference {
        EntityReference::of(entity)
    }

    /// Classify every field of a change-set, in iteration order
    fn extract_update_data(&self, changes: &ChangeSet) -> AuditResult<Vec<ChangeRecord>> {
        let mut records = Vec::new();
        for delta in changes.iter() {
            if let Some(record) = self.classifier().classify_delta(delta)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Membership changes of the entity's tracked collections
    ///
    /// For each tracked collection, every removal is listed before any
    /// addition.
    fn extract_collection_update_data(
        &self,
        entity: &dyn Entity,
        diffs: &[CollectionDiff],
    ) -> AuditResult<Vec<ChangeRecord>> {
        let classifier = self.classifier();
        let mut records = Vec::new();

        for field in classifier.tracked_collections()? {
            let mut removed = Vec::new();
            let mut added = Vec::new();

            for diff in diffs.iter().filter(|d| d.field == field) {
                for record in classifier.classify_collection(entity, diff)? {
                    if record.change_type == ChangeType::RemovedFromCollection {
                        removed.push(record);
                    } else {
                        added.push(record);
                    }
                }
            }

            records.append(&mut removed);
            records.append(&mut added);
        }

        Ok(records)
    }

    /// Changes caused by whole collections being dropped; nothing by default
    fn extract_collection_delete_data(
        &self,
        _entity: &dyn Entity,
        _diffs: &[CollectionDiff],
    ) -> AuditResult<Vec<ChangeRecord>> {
        Ok(Vec::new())
    }

    /// Reference to an entity being removed
    fn extract_remove_data(&self, entity: &dyn Entity) -> EntityReference {
        EntityReference::of(entity)
    }
}

/// Extractor bound to one entity type through its classifier
pub struct FieldChangeExtractor {
    classifier: ChangeClassifier,
}

impl FieldChangeExtractor {
    pub fn new(classifier: ChangeClassifier) -> Self {
        debug!(entity_type = classifier.entity_type(), "registered field change extractor");
        Self { classifier }
    }
}

impl ChangeExtractor for FieldChangeExtractor {
    fn supports(&self, entity_type: &str) -> bool {
        self.classifier.entity_type() == entity_type
    }

    fn classifier(&self) -> &ChangeClassifier {
        &self.classifier
    }
}
