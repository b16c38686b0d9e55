//! Audit settings for changetrail
//!
//! Manages the per-type registries (ignored fields, enumerations, tracked
//! collections) and the failure policy applied by the mutation listener.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{AuditError, AuditResult};

/// What the listener does when auditing a mutation fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure and let the mutation proceed (default)
    #[default]
    BestEffort,
    /// Return the failure to the caller
    Strict,
}

/// Settings for the auditing engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSettings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Applied uniformly to creation, update, join-record and removal paths.
    /// Configuration errors always propagate.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// strftime format used to render temporal values
    #[serde(default = "default_date_format")]
    pub date_format: String,

    /// Fields never audited, for any entity type
    #[serde(default = "default_global_ignored_fields")]
    pub global_ignored_fields: Vec<String>,

    /// Fields never audited, per entity type
    #[serde(default)]
    pub ignored_fields: BTreeMap<String, Vec<String>>,

    /// Manually registered enumerations: type -> field -> enumeration name
    #[serde(default)]
    pub enumerations: BTreeMap<String, BTreeMap<String, String>>,

    /// Manually registered tracked collections: type -> fields
    #[serde(default)]
    pub collections: BTreeMap<String, Vec<String>>,

    /// Discover enumerations and collections from type metadata when a
    /// provider is available
    #[serde(default = "default_auto_detect")]
    pub auto_detect: bool,
}

fn default_schema_version() -> u32 {
    1
}

fn default_date_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

fn default_global_ignored_fields() -> Vec<String> {
    vec!["updatedAt".to_string(), "updated_at".to_string()]
}

fn default_auto_detect() -> bool {
    true
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            failure_policy: FailurePolicy::default(),
            date_format: default_date_format(),
            global_ignored_fields: default_global_ignored_fields(),
            ignored_fields: BTreeMap::new(),
            enumerations: BTreeMap::new(),
            collections: BTreeMap::new(),
            auto_detect: default_auto_detect(),
        }
    }
}

impl AuditSettings {
    /// Every ignored field for an entity type, global ones included
    pub fn ignored_fields_for(&self, entity_type: &str) -> HashSet<String> {
        self.global_ignored_fields
            .iter()
            .chain(self.ignored_fields.get(entity_type).into_iter().flatten())
            .cloned()
            .collect()
    }

    pub fn ignore_field(mut self, entity_type: impl Into<String>, field: impl Into<String>) -> Self {
        self.ignored_fields
            .entry(entity_type.into())
            .or_default()
            .push(field.into());
        self
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
        self.collections
            .entry(entity_type.into())
            .or_default()
            .push(field.into());
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Load settings from disk, or return defaults if the file doesn't exist
    pub fn load_or_create(path: &Path) -> AuditResult<Self> {
        if path.exists() {
            read_config_file(path)
        } else {
            // Don't save yet - let caller decide when to persist
            Ok(Self::default())
        }
    }

    /// Save settings to disk, as YAML or JSON depending on the extension
    pub fn save(&self, path: &Path) -> AuditResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AuditError::Io(format!("Failed to create settings directory: {}", e))
            })?;
        }

        let contents = if is_yaml(path) {
            serde_yaml::to_string(self)
                .map_err(|e| AuditError::Config(format!("Failed to serialize settings: {}", e)))?
        } else {
            serde_json::to_string_pretty(self)
                .map_err(|e| AuditError::Config(format!("Failed to serialize settings: {}", e)))?
        };

        std::fs::write(path, contents)
            .map_err(|e| AuditError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Read a JSON or YAML config file, chosen by extension
pub(crate) fn read_config_file<T: DeserializeOwned>(path: &Path) -> AuditResult<T> {
    let file = File::open(path).map_err(|e| {
        AuditError::Io(format!("Failed to open {}: {}", path.display(), e))
    })?;
    let reader = BufReader::new(file);

    if is_yaml(path) {
        serde_yaml::from_reader(reader).map_err(|e| {
            AuditError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    } else {
        serde_json::from_reader(reader).map_err(|e| {
            AuditError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = AuditSettings::default();
        assert_eq!(settings.failure_policy, FailurePolicy::BestEffort);
        assert_eq!(settings.date_format, "%Y-%m-%d %H:%M:%S");
        assert!(settings.auto_detect);
        assert!(settings.ignored_fields_for("User").contains("updatedAt"));
    }

    #[test]
    fn test_ignored_fields_merge_global_and_per_type() {
        let settings = AuditSettings::default().ignore_field("User", "password");

        let user = settings.ignored_fields_for("User");
        assert!(user.contains("password"));
        assert!(user.contains("updated_at"));
        assert!(!settings.ignored_fields_for("Role").contains("password"));
    }

    #[test]
    fn test_save_and_load_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");

        let settings = AuditSettings::default()
            .with_failure_policy(FailurePolicy::Strict)
            .with_enumeration("Order", "status", "status");
        settings.save(&path).unwrap();

        let loaded = AuditSettings::load_or_create(&path).unwrap();
        assert_eq!(loaded.failure_policy, FailurePolicy::Strict);
        assert_eq!(loaded.enumerations["Order"]["status"], "status");
    }

    #[test]
    fn test_save_and_load_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");

        let settings = AuditSettings::default().with_collection("Order", "items");
        settings.save(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("failure_policy: best_effort"));

        let loaded = AuditSettings::load_or_create(&path).unwrap();
        assert_eq!(loaded.collections["Order"], vec!["items".to_string()]);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = AuditSettings::load_or_create(&temp_dir.path().join("none.json")).unwrap();
        assert_eq!(loaded.schema_version, 1);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, r#"{"failure_policy": "strict"}"#).unwrap();

        let loaded = AuditSettings::load_or_create(&path).unwrap();
        assert_eq!(loaded.failure_policy, FailurePolicy::Strict);
        assert_eq!(loaded.date_format, "%Y-%m-%d %H:%M:%S");
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        std::fs::write(&path, "{").unwrap();

        let err = AuditSettings::load_or_create(&path).unwrap_err();
        assert!(err.is_configuration());
    }
}
