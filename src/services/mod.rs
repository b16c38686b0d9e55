//! Change processing services
//!
//! - `ChangeClassifier`: classifies raw deltas into change records
//! - `ChangeExtractor`: runs a classifier over whole change-sets and
//!   collection diffs for one entity type
//! - `AuditRecordFactory`: turns change records into stored audit entries

pub mod classifier;
pub mod extractor;
pub mod factory;

pub use classifier::{ChangeClassifier, Perspective};
pub use extractor::{ChangeExtractor, FieldChangeExtractor};
pub use factory::{AuditRecordFactory, DefaultRecordFactory, CREATION_FIELD};
