//! Structural type metadata supplied by the persistence layer

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::settings::read_config_file;
use crate::error::{AuditError, AuditResult};

/// Cardinality of an association mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

impl AssociationKind {
    /// One-to-many and many-to-many associations hold collections
    pub fn is_collection(&self) -> bool {
        matches!(self, AssociationKind::OneToMany | AssociationKind::ManyToMany)
    }
}

/// Mapping of a plain column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub name: String,
    /// Declared enumeration type, if the column stores an enumeration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_type: Option<String>,
}

/// Mapping of a relation to another entity type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationMapping {
    pub name: String,
    pub kind: AssociationKind,
    pub target_type: String,
}

/// Field and association mappings of one concrete entity type
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypeMetadata {
    #[serde(default)]
    pub fields: Vec<FieldMapping>,
    #[serde(default)]
    pub associations: Vec<AssociationMapping>,
}

impl TypeMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldMapping {
            name: name.into(),
            enum_type: None,
        });
        self
    }

    pub fn with_enum_field(mut self, name: impl Into<String>, enum_type: impl Into<String>) -> Self {
        self.fields.push(FieldMapping {
            name: name.into(),
            enum_type: Some(enum_type.into()),
        });
        self
    }

    pub fn with_association(
        mut self,
        name: impl Into<String>,
        kind: AssociationKind,
        target_type: impl Into<String>,
    ) -> Self {
        self.associations.push(AssociationMapping {
            name: name.into(),
            kind,
            target_type: target_type.into(),
        });
        self
    }

    /// Declared enumeration type of a field
    pub fn enumeration_type(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == field)
            .and_then(|f| f.enum_type.as_deref())
    }

    pub fn is_enumeration_field(&self, field: &str) -> bool {
        self.enumeration_type(field).is_some()
    }

    pub fn is_collection_association(&self, field: &str) -> bool {
        self.associations
            .iter()
            .any(|a| a.name == field && a.kind.is_collection())
    }

    pub fn association_target_type(&self, field: &str) -> Option<&str> {
        self.associations
            .iter()
            .find(|a| a.name == field)
            .map(|a| a.target_type.as_str())
    }

    /// Names of every collection-valued association, in mapping order
    pub fn collection_associations(&self) -> impl Iterator<Item = &str> {
        self.associations
            .iter()
            .filter(|a| a.kind.is_collection())
            .map(|a| a.name.as_str())
    }
}

/// Source of structural metadata, implemented by the persistence-layer binding
pub trait TypeMetadataProvider: Send + Sync {
    fn type_metadata(&self, entity_type: &str) -> AuditResult<TypeMetadata>;
}

/// Metadata declared up front, in code or in a JSON/YAML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticMetadataProvider {
    types: HashMap<String, TypeMetadata>,
}

impl StaticMetadataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, entity_type: impl Into<String>, metadata: TypeMetadata) -> Self {
        self.types.insert(entity_type.into(), metadata);
        self
    }

    /// Load a `type -> metadata` map from a `.json`, `.yaml` or `.yml` file
    pub fn load(path: &Path) -> AuditResult<Self> {
        read_config_file(path)
    }
}

impl TypeMetadataProvider for StaticMetadataProvider {
    fn type_metadata(&self, entity_type: &str) -> AuditResult<TypeMetadata> {
        self.types.get(entity_type).cloned().ok_or_else(|| {
            AuditError::Metadata(format!("No metadata declared for entity type '{}'", entity_type))
        })
    }
}

/// Last path segment of a qualified type name, e.g. `app::enums::Status` -> `Status`
pub fn short_type_name(qualified: &str) -> &str {
    qualified
        .rsplit(|c| c == ':' || c == '\\' || c == '/')
        .next()
        .unwrap_or(qualified)
}
