//! Resolution of the extractor/factory pair for a concrete entity type
//!
//! Handlers are registered once at startup. The first lookup of an entity
//! type scans them for exactly one extractor and one factory that claim it;
//! the answer is then cached by type name.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::config::AuditSettings;
use crate::error::{AuditError, AuditResult};
use crate::metadata::FieldCatalog;
use crate::services::{
    AuditRecordFactory, ChangeClassifier, ChangeExtractor, DefaultRecordFactory,
    FieldChangeExtractor,
};

/// The handlers responsible for one entity type
#[derive(Clone)]
pub struct Handlers {
    pub extractor: Arc<dyn ChangeExtractor>,
    pub factory: Arc<dyn AuditRecordFactory>,
}

/// Registered extractors and factories, with per-type resolution cache
#[derive(Default)]
pub struct HandlerRegistry {
    extractors: Vec<Arc<dyn ChangeExtractor>>,
    factories: Vec<Arc<dyn AuditRecordFactory>>,
    resolved: RwLock<HashMap<String, Handlers>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ChangeExtractor>) -> Self {
        self.extractors.push(extractor);
        self
    }

    pub fn with_factory(mut self, factory: Arc<dyn AuditRecordFactory>) -> Self {
        self.factories.push(factory);
        self
    }

    /// Register the standard extractor and factory for one trackable type
    pub fn with_tracked_type(
        self,
        entity_type: &str,
        catalog: Arc<dyn FieldCatalog>,
        settings: &AuditSettings,
    ) -> Self {
        let classifier = ChangeClassifier::from_settings(entity_type, catalog, settings);
        self.with_extractor(Arc::new(FieldChangeExtractor::new(classifier)))
            .with_factory(Arc::new(DefaultRecordFactory::new([entity_type])))
    }

    /// Exactly one extractor and one factory for `entity_type`
    pub fn resolve(&self, entity_type: &str) -> AuditResult<Handlers> {
        {
            let resolved = self.resolved.read().map_err(|e| {
                AuditError::Config(format!("Failed to acquire read lock: {}", e))
            })?;
            if let Some(handlers) = resolved.get(entity_type) {
                return Ok(handlers.clone());
            }
        }

        let extractor = pick_one(
            "extractor",
            entity_type,
            self.extractors.iter().filter(|e| e.supports(entity_type)),
        )?;
        let factory = pick_one(
            "factory",
            entity_type,
            self.factories.iter().filter(|f| f.supports(entity_type)),
        )?;

        let handlers = Handlers { extractor, factory };
        let mut resolved = self.resolved.write().map_err(|e| {
            AuditError::Config(format!("Failed to acquire write lock: {}", e))
        })?;
        resolved.insert(entity_type.to_string(), handlers.clone());

        debug!(entity_type, "resolved audit handlers");
        Ok(handlers)
    }

    /// Resolve every listed type up front so wiring mistakes surface at startup
    pub fn validate<'a>(&self, entity_types: impl IntoIterator<Item = &'a str>) -> AuditResult<()> {
        for entity_type in entity_types {
            self.resolve(entity_type)?;
        }
        Ok(())
    }
}

fn pick_one<'a, T: ?Sized + 'a>(
    role: &'static str,
    entity_type: &str,
    candidates: impl Iterator<Item = &'a Arc<T>>,
) -> AuditResult<Arc<T>> {
    let candidates: Vec<_> = candidates.collect();
    match candidates.as_slice() {
        [only] => Ok(Arc::clone(only)),
        [] => Err(AuditError::no_handler(role, entity_type)),
        many => Err(AuditError::AmbiguousHandler {
            role,
            entity_type: entity_type.to_string(),
            count: many.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ManualCatalog;

    fn registry() -> HandlerRegistry {
        let catalog: Arc<dyn FieldCatalog> = Arc::new(ManualCatalog::new());
        let settings = AuditSettings::default();
        HandlerRegistry::new()
            .with_tracked_type("Person", catalog.clone(), &settings)
            .with_tracked_type("Role", catalog, &settings)
    }

    #[test]
    fn test_resolves_matching_pair() {
        let handlers = registry().resolve("Person").unwrap();
        assert!(handlers.extractor.supports("Person"));
        assert!(handlers.factory.supports("Person"));
        assert_eq!(handlers.extractor.classifier().entity_type(), "Person");
    }

    #[test]
    fn test_missing_handler_is_configuration_error() {
        let err = registry().resolve("Invoice").err().unwrap();
        assert!(matches!(err, AuditError::NoHandler { role: "extractor", .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_missing_factory_is_reported() {
        let catalog: Arc<dyn FieldCatalog> = Arc::new(ManualCatalog::new());
        let registry = HandlerRegistry::new().with_extractor(Arc::new(FieldChangeExtractor::new(
            ChangeClassifier::new("Person", catalog),
        )));

        let err = registry.resolve("Person").err().unwrap();
        assert!(matches!(err, AuditError::NoHandler { role: "factory", .. }));
    }

    #[test]
    fn test_two_claimants_is_configuration_error() {
        let registry =
            registry().with_factory(Arc::new(DefaultRecordFactory::new(["Person", "Role"])));

        let err = registry.resolve("Role").err().unwrap();
        assert!(matches!(
            err,
            AuditError::AmbiguousHandler {
                role: "factory",
                count: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_validate_reports_first_unresolvable_type() {
        let registry = registry();
        assert!(registry.validate(["Person", "Role"]).is_ok());
        assert!(registry.validate(["Person", "Invoice"]).is_err());
    }
}
