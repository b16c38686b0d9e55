//! Per-type registries of enumeration fields and tracked collections

use std::collections::HashMap;

use crate::config::AuditSettings;
use crate::error::AuditResult;

/// Answers which fields of an entity type are enumerations and which
/// collections are tracked
///
/// Lookups are keyed by entity type: the same field name can be an
/// enumeration on one type and a plain column on another.
pub trait FieldCatalog: Send + Sync {
    /// Enumeration name of `field`, if the field holds an enumeration
    fn enumeration_name(&self, entity_type: &str, field: &str) -> AuditResult<Option<String>>;

    /// Tracked collection-valued fields, in registration order
    fn tracked_collections(&self, entity_type: &str) -> AuditResult<Vec<String>>;
}

/// Hand-maintained registry
#[derive(Debug, Clone, Default)]
pub struct ManualCatalog {
    enumerations: HashMap<String, HashMap<String, String>>,
    collections: HashMap<String, Vec<String>>,
}

impl ManualCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from the `enumerations` and `collections` settings
    pub fn from_settings(settings: &AuditSettings) -> Self {
        let mut catalog = Self::new();
        for (entity_type, fields) in &settings.enumerations {
            for (field, enum_name) in fields {
                catalog = catalog.with_enumeration(entity_type, field, enum_name);
            }
        }
        for (entity_type, fields) in &settings.collections {
            for field in fields {
                catalog = catalog.with_collection(entity_type, field);
            }
        }
        catalog
    }

    pub fn with_enumeration(
        mut self,
        entity_type: impl Into<String>,
        field: impl Into<String>,
        enum_name: impl Into<String>,
    ) -> Self {
        self.enumerations
            .entry(entity_type.into())
            .or_default()
            .insert(field.into(), enum_name.into());
        self
    }

    pub fn with_collection(mut self, entity_type: impl Into<String>, field: impl Into<String>) -> Self {
        let fields = self.collections.entry(entity_type.into()).or_default();
        let field = field.into();
        if !fields.contains(&field) {
            fields.push(field);
        }
        self
    }

    pub(crate) fn enumeration(&self, entity_type: &str, field: &str) -> Option<&str> {
        self.enumerations
            .get(entity_type)
            .and_then(|fields| fields.get(field))
            .map(String::as_str)
    }

    pub(crate) fn collections(&self, entity_type: &str) -> &[String] {
        self.collections
            .get(entity_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl FieldCatalog for ManualCatalog {
    fn enumeration_name(&self, entity_type: &str, field: &str) -> AuditResult<Option<String>> {
        Ok(self.enumeration(entity_type, field).map(str::to_string))
    }

    fn tracked_collections(&self, entity_type: &str) -> AuditResult<Vec<String>> {
        Ok(self.collections(entity_type).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enumerations_are_keyed_by_type() {
        let catalog = ManualCatalog::new().with_enumeration("Order", "status", "orderStatus");

        assert_eq!(
            catalog.enumeration_name("Order", "status").unwrap().as_deref(),
            Some("orderStatus")
        );
        assert!(catalog.enumeration_name("Invoice", "status").unwrap().is_none());
    }

    #[test]
    fn test_collections_keep_order_without_duplicates() {
        let catalog = ManualCatalog::new()
            .with_collection("Order", "items")
            .with_collection("Order", "tags")
            .with_collection("Order", "items");

        assert_eq!(
            catalog.tracked_collections("Order").unwrap(),
            vec!["items".to_string(), "tags".to_string()]
        );
        assert!(catalog.tracked_collections("User").unwrap().is_empty());
    }

    #[test]
    fn test_from_settings() {
        let settings = AuditSettings::default()
            .with_enumeration("Order", "status", "status")
            .with_collection("Order", "items");

        let catalog = ManualCatalog::from_settings(&settings);
        assert_eq!(catalog.enumeration("Order", "status"), Some("status"));
        assert_eq!(catalog.collections("Order"), &["items".to_string()]);
    }
}
