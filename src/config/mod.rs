//! Configuration module for changetrail
//!
//! This module provides:
//! - Storage path resolution
//! - File-backed audit settings (registries and failure policy)

pub mod paths;
pub mod settings;

pub use paths::AuditPaths;
pub use settings::{AuditSettings, FailurePolicy};
