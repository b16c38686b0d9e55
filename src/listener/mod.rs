//! Mutation listener
//!
//! Entry point bound to the persistence layer's lifecycle events. For each
//! event it picks the extractor/factory pair of the entity's concrete type and
//! produces at most one audit entry per affected side.
//!
//! | Event          | Plain trackable entity               | Join record                    |
//! |----------------|--------------------------------------|--------------------------------|
//! | `post_persist` | creation entry, committed at once    | `PIVOT_CREATED` on both sides  |
//! | `pre_update`   | field + collection entry, staged     | `PIVOT_UPDATED` on both sides  |
//! | `pre_remove`   | nothing yet                          | `PIVOT_DELETED` on both sides  |
//! | `post_flush`   | commits staged entries               |                                |
//!
//! Failures follow the configured `FailurePolicy` on every path alike.
//! Configuration errors (no handler, or several, for a type) always propagate.

mod actor;
mod registry;

pub use actor::{ActorProvider, SessionActor, SystemActor};
pub use registry::{HandlerRegistry, Handlers};

use std::sync::Arc;

use tracing::{debug, error};

use crate::audit::{AuditLogEntry, AuditStore};
use crate::config::{AuditSettings, FailurePolicy};
use crate::error::{AuditError, AuditResult};
use crate::models::{ChangeSet, ChangeType, Entity, JoinRecord, ScheduledCollections};
use crate::services::Perspective;

/// Dispatches lifecycle events to the registered audit handlers
pub struct MutationListener {
    registry: HandlerRegistry,
    store: Arc<dyn AuditStore>,
    actors: Arc<dyn ActorProvider>,
    policy: FailurePolicy,
}

impl MutationListener {
    pub fn new(registry: HandlerRegistry, store: Arc<dyn AuditStore>) -> Self {
        Self {
            registry,
            store,
            actors: Arc::new(SystemActor),
            policy: FailurePolicy::default(),
        }
    }

    /// Listener applying the failure policy from settings
    pub fn from_settings(
        registry: HandlerRegistry,
        store: Arc<dyn AuditStore>,
        settings: &AuditSettings,
    ) -> Self {
        Self::new(registry, store).with_failure_policy(settings.failure_policy)
    }

    pub fn with_actor_provider(mut self, actors: Arc<dyn ActorProvider>) -> Self {
        self.actors = actors;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn store(&self) -> &dyn AuditStore {
        self.store.as_ref()
    }

    /// Resolve handlers for every listed type now rather than on first use
    pub fn validate<'a>(&self, entity_types: impl IntoIterator<Item = &'a str>) -> AuditResult<()> {
        self.registry.validate(entity_types)
    }

    /// After an entity's insert has been flushed
    pub fn post_persist(&self, entity: &dyn Entity) -> AuditResult<Vec<AuditLogEntry>> {
        if let Some(join) = entity.as_join_record() {
            return self.record_join(entity, join, ChangeType::PivotCreated, None);
        }
        if !entity.is_trackable() {
            return Ok(Vec::new());
        }

        let result = self.audit_creation(entity).map(|entry| vec![entry]);
        self.settle("creation", entity, result)
    }

    /// Before an entity's update is flushed, while its change-set is available
    pub fn pre_update(
        &self,
        entity: &dyn Entity,
        changes: &ChangeSet,
        collections: &ScheduledCollections,
    ) -> AuditResult<Vec<AuditLogEntry>> {
        if let Some(join) = entity.as_join_record() {
            return self.record_join(entity, join, ChangeType::PivotUpdated, Some(changes));
        }
        if !entity.is_trackable() {
            return Ok(Vec::new());
        }

        let result = self
            .audit_update(entity, changes, collections)
            .map(|entry| entry.into_iter().collect());
        self.settle("update", entity, result)
    }

    /// Before an entity is deleted
    ///
    /// Only join records are audited on removal.
    pub fn pre_remove(&self, entity: &dyn Entity) -> AuditResult<Vec<AuditLogEntry>> {
        if let Some(join) = entity.as_join_record() {
            return self.record_join(entity, join, ChangeType::PivotDeleted, None);
        }
        Ok(Vec::new())
    }

    /// After the host transaction committed: write the staged entries
    pub fn post_flush(&self) -> AuditResult<usize> {
        match self.store.flush() {
            Ok(count) => {
                if count > 0 {
                    debug!(count, "flushed staged audit entries");
                }
                Ok(count)
            }
            Err(err) if self.policy == FailurePolicy::Strict => Err(err),
            Err(err) => {
                error!(error = %err, "failed to flush staged audit entries");
                Ok(0)
            }
        }
    }

    /// After the host transaction rolled back: drop the staged entries
    pub fn on_rollback(&self) -> AuditResult<usize> {
        let discarded = self.store.discard_staged()?;
        if discarded > 0 {
            debug!(discarded, "discarded staged audit entries");
        }
        Ok(discarded)
    }

    fn audit_creation(&self, entity: &dyn Entity) -> AuditResult<AuditLogEntry> {
        let handlers = self.registry.resolve(entity.entity_type())?;
        let reference = handlers.extractor.extract_creation_data(entity);
        handlers.factory.create_from_create(
            self.actors.current_actor(),
            entity,
            reference,
            self.store.as_ref(),
        )
    }

    fn audit_update(
        &self,
        entity: &dyn Entity,
        changes: &ChangeSet,
        collections: &ScheduledCollections,
    ) -> AuditResult<Option<AuditLogEntry>> {
        let handlers = self.registry.resolve(entity.entity_type())?;
        let extractor = &handlers.extractor;

        let mut records = extractor.extract_update_data(changes)?;
        records.extend(extractor.extract_collection_update_data(entity, &collections.updates)?);
        records.extend(extractor.extract_collection_delete_data(entity, &collections.deletions)?);

        if records.is_empty() {
            debug!(
                entity_type = entity.entity_type(),
                entity_id = %entity.id(),
                "no auditable changes"
            );
            return Ok(None);
        }

        let entry = handlers.factory.create_from_update(
            self.actors.current_actor(),
            entity,
            records.into_iter().map(Into::into).collect(),
            self.store.as_ref(),
        )?;
        Ok(Some(entry))
    }

    /// Record a join-record event on the owner and, if trackable, the target
    ///
    /// The owner is always recorded, so an owner type without handlers is a
    /// configuration error. Both sides are attempted even when the first one
    /// fails.
    fn record_join(
        &self,
        pivot: &dyn Entity,
        join: &dyn JoinRecord,
        change_type: ChangeType,
        changes: Option<&ChangeSet>,
    ) -> AuditResult<Vec<AuditLogEntry>> {
        let sides = [
            (join.owner(), Perspective::Owner),
            (join.target(), Perspective::Target),
        ];

        let mut entries = Vec::new();
        let mut first_error: Option<AuditError> = None;

        for (side, perspective) in sides {
            if perspective == Perspective::Target && !side.is_trackable() {
                debug!(
                    pivot = pivot.entity_type(),
                    target = side.entity_type(),
                    "join-record target is not trackable"
                );
                continue;
            }

            let result = self
                .record_join_side(pivot, join, side.as_ref(), perspective, change_type, changes)
                .map(|entry| entry.into_iter().collect());

            match self.settle("join record", side.as_ref(), result) {
                Ok(mut recorded) => entries.append(&mut recorded),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(entries),
        }
    }

    fn record_join_side(
        &self,
        pivot: &dyn Entity,
        join: &dyn JoinRecord,
        side: &dyn Entity,
        perspective: Perspective,
        change_type: ChangeType,
        changes: Option<&ChangeSet>,
    ) -> AuditResult<Option<AuditLogEntry>> {
        let handlers = self.registry.resolve(side.entity_type())?;
        let record = handlers.extractor.classifier().pivot_record(
            pivot.entity_type(),
            join,
            perspective,
            change_type,
            changes,
        )?;

        let Some(record) = record else {
            return Ok(None);
        };

        let entry = handlers.factory.create_from_update(
            self.actors.current_actor(),
            side,
            vec![record.into()],
            self.store.as_ref(),
        )?;
        Ok(Some(entry))
    }

    /// Apply the failure policy to the outcome of one audited path
    fn settle(
        &self,
        phase: &'static str,
        entity: &dyn Entity,
        result: AuditResult<Vec<AuditLogEntry>>,
    ) -> AuditResult<Vec<AuditLogEntry>> {
        match result {
            Ok(entries) => Ok(entries),
            Err(err) if err.is_configuration() => Err(err),
            Err(err) if self.policy == FailurePolicy::Strict => Err(err),
            Err(err) => {
                error!(
                    phase,
                    entity_type = entity.entity_type(),
                    entity_id = %entity.id(),
                    error = %err,
                    "auditing failed; mutation proceeds unaudited"
                );
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditStore;
    use crate::metadata::{FieldCatalog, ManualCatalog};
    use crate::models::{CollectionDiff, EntityHandle};
    use crate::testing::{Gadget, Person, Role, Tag, UserRole};
    use chrono::{TimeZone, Utc};

    fn listener(store: Arc<MemoryAuditStore>) -> MutationListener {
        let catalog: Arc<dyn FieldCatalog> =
            Arc::new(ManualCatalog::new().with_collection("Person", "tags"));
        let settings = AuditSettings::default();
        let registry = HandlerRegistry::new()
            .with_tracked_type("Person", catalog.clone(), &settings)
            .with_tracked_type("Role", catalog, &settings);
        MutationListener::new(registry, store)
    }

    fn grant() -> UserRole {
        UserRole::new(
            Arc::new(Person::new(1, "Ann")),
            Arc::new(Role::new(3, "Admin")),
            Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_creation_commits_one_entry() {
        let store = Arc::new(MemoryAuditStore::new());
        let entries = listener(store.clone())
            .post_persist(&Person::new(1, "Ann"))
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_untrackable_entity_is_skipped() {
        let store = Arc::new(MemoryAuditStore::new());
        let listener = listener(store.clone());

        assert!(listener.post_persist(&Gadget { id: 1 }).unwrap().is_empty());
        let changes = ChangeSet::new().with("name", "a", "b");
        assert!(listener
            .pre_update(&Gadget { id: 1 }, &changes, &ScheduledCollections::new())
            .unwrap()
            .is_empty());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_update_is_staged_until_flush() {
        let store = Arc::new(MemoryAuditStore::new());
        let listener = listener(store.clone());
        let changes = ChangeSet::new().with("firstname", "John", "Jane");

        let entries = listener
            .pre_update(&Person::new(1, "Ann"), &changes, &ScheduledCollections::new())
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(listener.post_flush().unwrap(), 1);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_update_merges_fields_then_collections() {
        let store = Arc::new(MemoryAuditStore::new());
        let owner: EntityHandle = Arc::new(Person::new(1, "Ann"));
        let changes = ChangeSet::new().with("firstname", "John", "Jane");
        let collections = ScheduledCollections::new().with_update(
            CollectionDiff::new(owner.clone(), "tags")
                .insert(Arc::new(Tag::new(1, "x")))
                .delete(Arc::new(Tag::new(2, "y"))),
        );

        let entries = listener(store)
            .pre_update(owner.as_ref(), &changes, &collections)
            .unwrap();

        let kinds: Vec<_> = entries[0]
            .changes
            .iter()
            .map(|c| c.record().change_type)
            .collect();
        assert_eq!(
            kinds,
            vec![
                ChangeType::Update,
                ChangeType::RemovedFromCollection,
                ChangeType::AddedToCollection
            ]
        );
    }

    #[test]
    fn test_empty_update_produces_no_entry() {
        let store = Arc::new(MemoryAuditStore::new());
        let changes = ChangeSet::new().with("firstname", "John", "John");

        let entries = listener(store.clone())
            .pre_update(&Person::new(1, "Ann"), &changes, &ScheduledCollections::new())
            .unwrap();

        assert!(entries.is_empty());
        assert_eq!(store.staged_count().unwrap(), 0);
    }

    #[test]
    fn test_join_record_recorded_on_both_sides() {
        let store = Arc::new(MemoryAuditStore::new());
        let entries = listener(store.clone()).post_persist(&grant()).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].subject.entity_type, "Person");
        assert_eq!(entries[0].changes[0].record().field, "role");
        assert_eq!(entries[1].subject.entity_type, "Role");
        assert_eq!(entries[1].changes[0].record().field, "user");
        assert_eq!(store.staged_count().unwrap(), 2);
    }

    #[test]
    fn test_untrackable_target_side_is_skipped() {
        let store = Arc::new(MemoryAuditStore::new());
        let join = UserRole::new(
            Arc::new(Person::new(1, "Ann")),
            Arc::new(Tag::new(5, "vip")),
            Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap(),
        );

        let entries = listener(store).post_persist(&join).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].subject.entity_type, "Person");
    }

    #[test]
    fn test_join_record_removal() {
        let store = Arc::new(MemoryAuditStore::new());
        let entries = listener(store).pre_remove(&grant()).unwrap();

        assert_eq!(entries.len(), 2);
        assert!(entries
            .iter()
            .all(|e| e.changes[0].record().change_type == ChangeType::PivotDeleted));
    }

    #[test]
    fn test_plain_removal_is_not_audited() {
        let store = Arc::new(MemoryAuditStore::new());
        assert!(listener(store).pre_remove(&Person::new(1, "Ann")).unwrap().is_empty());
    }

    #[test]
    fn test_unregistered_trackable_type_fails_loudly() {
        let store = Arc::new(MemoryAuditStore::new());
        let registry = HandlerRegistry::new();
        let listener = MutationListener::new(registry, store);

        let err = listener.post_persist(&Person::new(1, "Ann")).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_rollback_discards_staged_entries() {
        let store = Arc::new(MemoryAuditStore::new());
        let listener = listener(store.clone());
        let changes = ChangeSet::new().with("firstname", "John", "Jane");
        listener
            .pre_update(&Person::new(1, "Ann"), &changes, &ScheduledCollections::new())
            .unwrap();

        assert_eq!(listener.on_rollback().unwrap(), 1);
        assert_eq!(listener.post_flush().unwrap(), 0);
        assert_eq!(store.count().unwrap(), 0);
    }
}
