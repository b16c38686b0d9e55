//! Entity capabilities and the deltas the persistence layer computes
//!
//! The engine never knows concrete entity shapes. It only sees objects through
//! the `Entity` capability trait, plus the change-sets and collection diffs the
//! persistence layer has already worked out.

use std::fmt;
use std::sync::Arc;

use super::ids::EntityId;
use super::value::FieldValue;

/// Shared handle to an entity instance
pub type EntityHandle = Arc<dyn Entity>;

/// Capabilities an entity exposes to the auditing engine
pub trait Entity: fmt::Debug + Send + Sync {
    /// Short type name, e.g. `"User"`
    fn entity_type(&self) -> &str;

    /// Identity assigned by the persistence layer
    fn id(&self) -> EntityId;

    /// Human-readable label, if the entity has one
    fn label(&self) -> Option<String> {
        None
    }

    /// Whether this entity type opted into auditing
    fn is_trackable(&self) -> bool {
        false
    }

    /// Join-record accessors, for attributed many-to-many rows
    fn as_join_record(&self) -> Option<&dyn JoinRecord> {
        None
    }
}

/// An attributed many-to-many row linking an owner to a target
pub trait JoinRecord {
    fn owner(&self) -> EntityHandle;

    fn target(&self) -> EntityHandle;

    /// Field name from the owner's side, e.g. `"role"`
    fn relationship_type(&self) -> &str;

    /// Field name from the target's side, e.g. `"user"`
    fn reverse_relationship_type(&self) -> &str;

    /// Extra attributes, excluding the two foreign keys
    fn extra_attributes(&self) -> Vec<(String, FieldValue)>;
}

/// Two handles denote the same entity when type and id match
pub fn same_entity(a: &dyn Entity, b: &dyn Entity) -> bool {
    a.entity_type() == b.entity_type() && a.id() == b.id()
}

/// One field of a change-set
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDelta {
    pub field: String,
    pub old: FieldValue,
    pub new: FieldValue,
}

/// Field name to `(old, new)` pairs for one entity update, in iteration order
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    deltas: Vec<FieldDelta>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of `insert`
    pub fn with(
        mut self,
        field: impl Into<String>,
        old: impl Into<FieldValue>,
        new: impl Into<FieldValue>,
    ) -> Self {
        self.insert(field, old, new);
        self
    }

    /// Record a delta; a second delta for the same field replaces the first in place
    pub fn insert(
        &mut self,
        field: impl Into<String>,
        old: impl Into<FieldValue>,
        new: impl Into<FieldValue>,
    ) {
        let delta = FieldDelta {
            field: field.into(),
            old: old.into(),
            new: new.into(),
        };

        match self.deltas.iter_mut().find(|d| d.field == delta.field) {
            Some(existing) => *existing = delta,
            None => self.deltas.push(delta),
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldDelta> {
        self.deltas.iter().find(|d| d.field == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDelta> {
        self.deltas.iter()
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }
}

/// Scheduled membership changes of one collection-valued association
#[derive(Debug, Clone)]
pub struct CollectionDiff {
    pub owner: EntityHandle,
    pub field: String,
    pub inserted: Vec<EntityHandle>,
    pub deleted: Vec<EntityHandle>,
}

impl CollectionDiff {
    pub fn new(owner: EntityHandle, field: impl Into<String>) -> Self {
        Self {
            owner,
            field: field.into(),
            inserted: Vec::new(),
            deleted: Vec::new(),
        }
    }

    pub fn insert(mut self, item: EntityHandle) -> Self {
        self.inserted.push(item);
        self
    }

    pub fn delete(mut self, item: EntityHandle) -> Self {
        self.deleted.push(item);
        self
    }

    pub fn is_owned_by(&self, entity: &dyn Entity) -> bool {
        same_entity(self.owner.as_ref(), entity)
    }

    /// Items only in the insert set
    pub fn net_inserted(&self) -> impl Iterator<Item = &EntityHandle> {
        self.inserted.iter().filter(|item| {
            !self
                .deleted
                .iter()
                .any(|d| same_entity(d.as_ref(), item.as_ref()))
        })
    }

    /// Items only in the delete set
    pub fn net_deleted(&self) -> impl Iterator<Item = &EntityHandle> {
        self.deleted.iter().filter(|item| {
            !self
                .inserted
                .iter()
                .any(|i| same_entity(i.as_ref(), item.as_ref()))
        })
    }
}

/// Collection work the persistence layer has scheduled for the current flush
#[derive(Debug, Clone, Default)]
pub struct ScheduledCollections {
    /// Membership changes of collections that survive the flush
    pub updates: Vec<CollectionDiff>,
    /// Collections dropped wholesale
    pub deletions: Vec<CollectionDiff>,
}

impl ScheduledCollections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_update(mut self, diff: CollectionDiff) -> Self {
        self.updates.push(diff);
        self
    }

    pub fn with_deletion(mut self, diff: CollectionDiff) -> Self {
        self.deletions.push(diff);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Person, Tag};

    #[test]
    fn test_change_set_preserves_order_and_replaces() {
        let mut set = ChangeSet::new()
            .with("firstname", "John", "Jane")
            .with("lastname", "Doe", "Roe");
        set.insert("firstname", "John", "Joan");

        let fields: Vec<_> = set.iter().map(|d| d.field.as_str()).collect();
        assert_eq!(fields, vec!["firstname", "lastname"]);
        assert_eq!(set.get("firstname").unwrap().new, FieldValue::from("Joan"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_collection_diff_ownership() {
        let owner: EntityHandle = Arc::new(Person::new(1, "Ann"));
        let stranger = Person::new(2, "Bob");
        let diff = CollectionDiff::new(owner.clone(), "tags");

        assert!(diff.is_owned_by(owner.as_ref()));
        assert!(!diff.is_owned_by(&stranger));
    }

    #[test]
    fn test_collection_diff_net_sets_cancel_out() {
        let owner: EntityHandle = Arc::new(Person::new(1, "Ann"));
        let kept: EntityHandle = Arc::new(Tag::new(10, "red"));
        let added: EntityHandle = Arc::new(Tag::new(11, "blue"));

        let diff = CollectionDiff::new(owner, "tags")
            .insert(kept.clone())
            .insert(added)
            .delete(kept);

        let inserted: Vec<_> = diff.net_inserted().map(|e| e.id()).collect();
        assert_eq!(inserted, vec![EntityId::Int(11)]);
        assert_eq!(diff.net_deleted().count(), 0);
    }
}
