//! Metadata-driven discovery of enumerations and tracked collections
//!
//! Instead of keeping a manual registry per entity type, the detector asks the
//! persistence layer's type metadata once per concrete type and caches the
//! answer for the lifetime of the process. Entity schemas are static at
//! runtime, so the cache is never invalidated.
//!
//! The cache follows a single-writer/many-reader contract behind a `RwLock`:
//! lookups take the read lock, and only the first lookup of a type takes the
//! write lock. Two threads detecting the same type concurrently both query
//! the provider and the first insert wins.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::config::AuditSettings;
use crate::error::{AuditError, AuditResult};

use super::catalog::{FieldCatalog, ManualCatalog};
use super::provider::{short_type_name, TypeMetadataProvider};

/// What the detector found for one entity type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectedFields {
    /// field -> enumeration name
    pub enumerations: HashMap<String, String>,
    /// Tracked collection-valued fields, in mapping order
    pub collections: Vec<String>,
}

/// `FieldCatalog` backed by type metadata, with manual registrations on top
pub struct MetadataDetector {
    provider: Arc<dyn TypeMetadataProvider>,
    manual: ManualCatalog,
    global_ignored: HashSet<String>,
    ignored: HashMap<String, HashSet<String>>,
    cache: RwLock<HashMap<String, Arc<DetectedFields>>>,
}

impl MetadataDetector {
    pub fn new(provider: Arc<dyn TypeMetadataProvider>) -> Self {
        Self {
            provider,
            manual: ManualCatalog::new(),
            global_ignored: HashSet::new(),
            ignored: HashMap::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Detector using the manual registries and ignore lists from settings
    pub fn from_settings(provider: Arc<dyn TypeMetadataProvider>, settings: &AuditSettings) -> Self {
        let mut detector = Self::new(provider).with_manual(ManualCatalog::from_settings(settings));
        detector.global_ignored = settings.global_ignored_fields.iter().cloned().collect();
        for (entity_type, fields) in &settings.ignored_fields {
            detector = detector.with_ignored(entity_type, fields.iter().cloned());
        }
        detector
    }

    /// Explicit registrations, consulted before metadata
    pub fn with_manual(mut self, manual: ManualCatalog) -> Self {
        self.manual = manual;
        self
    }

    /// Associations that must never be tracked for an entity type
    pub fn with_ignored(
        mut self,
        entity_type: impl Into<String>,
        fields: impl IntoIterator<Item = String>,
    ) -> Self {
        self.ignored
            .entry(entity_type.into())
            .or_default()
            .extend(fields);
        self
    }

    /// Detected fields of a type, querying metadata on first use
    pub fn detect(&self, entity_type: &str) -> AuditResult<Arc<DetectedFields>> {
        {
            let cache = self.cache.read().map_err(|e| {
                AuditError::Metadata(format!("Failed to acquire read lock: {}", e))
            })?;
            if let Some(found) = cache.get(entity_type) {
                return Ok(Arc::clone(found));
            }
        }

        let detected = Arc::new(self.query(entity_type)?);

        let mut cache = self.cache.write().map_err(|e| {
            AuditError::Metadata(format!("Failed to acquire write lock: {}", e))
        })?;
        let entry = cache
            .entry(entity_type.to_string())
            .or_insert(detected);
        Ok(Arc::clone(entry))
    }

    /// Number of entity types already cached
    pub fn cached_types(&self) -> AuditResult<usize> {
        let cache = self.cache.read().map_err(|e| {
            AuditError::Metadata(format!("Failed to acquire read lock: {}", e))
        })?;
        Ok(cache.len())
    }

    fn is_ignored(&self, entity_type: &str, field: &str) -> bool {
        self.global_ignored.contains(field)
            || self
                .ignored
                .get(entity_type)
                .is_some_and(|fields| fields.contains(field))
    }

    fn query(&self, entity_type: &str) -> AuditResult<DetectedFields> {
        let metadata = self.provider.type_metadata(entity_type)?;

        let enumerations: HashMap<String, String> = metadata
            .fields
            .iter()
            .filter_map(|f| {
                f.enum_type
                    .as_deref()
                    .map(|t| (f.name.clone(), short_type_name(t).to_string()))
            })
            .collect();

        let collections: Vec<String> = metadata
            .collection_associations()
            .filter(|name| !self.is_ignored(entity_type, name))
            .map(str::to_string)
            .collect();

        debug!(
            entity_type,
            enumerations = enumerations.len(),
            collections = collections.len(),
            "detected tracked fields from metadata"
        );

        Ok(DetectedFields {
            enumerations,
            collections,
        })
    }
}

/// Catalog chosen by `auto_detect`: metadata-driven when enabled and a
/// provider is available, the manual registries otherwise
pub fn catalog_from_settings(
    settings: &AuditSettings,
    provider: Option<Arc<dyn TypeMetadataProvider>>,
) -> Arc<dyn FieldCatalog> {
    match provider {
        Some(provider) if settings.auto_detect => {
            Arc::new(MetadataDetector::from_settings(provider, settings))
        }
        Some(_) => {
            debug!("metadata detection disabled; using manual registries");
            Arc::new(ManualCatalog::from_settings(settings))
        }
        None => Arc::new(ManualCatalog::from_settings(settings)),
    }
}

impl FieldCatalog for MetadataDetector {
    fn enumeration_name(&self, entity_type: &str, field: &str) -> AuditResult<Option<String>> {
        if let Some(name) = self.manual.enumeration(entity_type, field) {
            return Ok(Some(name.to_string()));
        }
        Ok(self.detect(entity_type)?.enumerations.get(field).cloned())
    }

    fn tracked_collections(&self, entity_type: &str) -> AuditResult<Vec<String>> {
        let mut collections = self.manual.collections(entity_type).to_vec();
        for field in &self.detect(entity_type)?.collections {
            if !collections.contains(field) {
                collections.push(field.clone());
            }
        }
        Ok(collections)
    }
}
