//! changetrail - change auditing for persisted entities
//!
//! This library hooks into an object-persistence layer's lifecycle events and
//! records, for every trackable entity, a structured audit entry describing
//! what changed: scalar fields, enumerations, relations, collection
//! membership, and attributed many-to-many join records seen from both sides.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Storage paths and audit settings
//! - `error`: Custom error types
//! - `models`: Entity capabilities, change-sets and change records
//! - `metadata`: Enumeration and collection registries, manual or detected
//! - `services`: Classifier, extractors and audit record factories
//! - `audit`: Audit entries and their stores
//! - `listener`: Lifecycle-event dispatch
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use changetrail::audit::AuditLogger;
//! use changetrail::config::{AuditPaths, AuditSettings};
//! use changetrail::listener::{HandlerRegistry, MutationListener};
//! use changetrail::metadata::catalog_from_settings;
//!
//! let paths = AuditPaths::new()?;
//! paths.ensure_directories()?;
//! let settings = AuditSettings::load_or_create(&paths.settings_file())?;
//!
//! let catalog = catalog_from_settings(&settings, Some(provider));
//! let registry = HandlerRegistry::new().with_tracked_type("User", catalog, &settings);
//! let store = Arc::new(AuditLogger::new(paths.audit_log()));
//! let listener = MutationListener::from_settings(registry, store, &settings);
//!
//! listener.post_persist(&user)?;
//! listener.post_flush()?;
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod listener;
pub mod metadata;
pub mod models;
pub mod services;

#[cfg(test)]
mod testing;

pub use error::{AuditError, AuditResult};
pub use listener::MutationListener;
