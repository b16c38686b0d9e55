//! Enumeration and collection registries
//!
//! The classifier needs to know, per entity type, which fields hold
//! enumerations and which collections are tracked. That knowledge comes from a
//! `FieldCatalog`: either a hand-maintained `ManualCatalog`, or a
//! `MetadataDetector` that derives it from the persistence layer's structural
//! metadata through a `TypeMetadataProvider`.

pub mod catalog;
pub mod detector;
pub mod provider;

pub use catalog::{FieldCatalog, ManualCatalog};
pub use detector::{catalog_from_settings, DetectedFields, MetadataDetector};
pub use provider::{
    AssociationKind, AssociationMapping, FieldMapping, StaticMetadataProvider, TypeMetadata,
    TypeMetadataProvider,
};
