//! Core data models for changetrail
//!
//! This module contains the data structures the engine consumes (entity
//! capabilities, change-sets, collection diffs) and the change records it
//! produces.

pub mod change;
pub mod entity;
pub mod ids;
pub mod value;

pub use change::{AuditChange, ChangeRecord, ChangeType, PivotChangeRecord};
pub use entity::{
    same_entity, ChangeSet, CollectionDiff, Entity, EntityHandle, FieldDelta, JoinRecord,
    ScheduledCollections,
};
pub use ids::{AuditEntryId, EntityId};
pub use value::{ChangeValue, EntityReference, EnumValue, FieldValue};
