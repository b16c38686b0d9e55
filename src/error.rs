//! Custom error types for changetrail
//!
//! This module defines the error hierarchy for the auditing engine using
//! thiserror for ergonomic error definitions.

use thiserror::Error;

/// The main error type for auditing operations
#[derive(Error, Debug)]
pub enum AuditError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// No registered handler claims an entity type
    #[error("No {role} registered for entity type '{entity_type}'")]
    NoHandler {
        role: &'static str,
        entity_type: String,
    },

    /// More than one registered handler claims an entity type
    #[error("{count} {role} handlers claim entity type '{entity_type}', expected exactly one")]
    AmbiguousHandler {
        role: &'static str,
        entity_type: String,
        count: usize,
    },

    /// Unexpected value shapes or missing accessors during classification
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Type metadata lookup failures
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Audit storage errors
    #[error("Storage error: {0}")]
    Storage(String),
}

impl AuditError {
    /// Create a "no handler" error for one handler role
    pub fn no_handler(role: &'static str, entity_type: impl Into<String>) -> Self {
        Self::NoHandler {
            role,
            entity_type: entity_type.into(),
        }
    }

    /// Check if this error comes from a wiring mistake rather than runtime data
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::NoHandler { .. } | Self::AmbiguousHandler { .. }
        )
    }
}

impl From<std::io::Error> for AuditError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<serde_yaml::Error> for AuditError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias for auditing operations
pub type AuditResult<T> = Result<T, AuditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuditError::Config("test error".into());
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_no_handler_error() {
        let err = AuditError::no_handler("extractor", "User");
        assert_eq!(
            err.to_string(),
            "No extractor registered for entity type 'User'"
        );
        assert!(err.is_configuration());
    }

    #[test]
    fn test_ambiguous_handler_error() {
        let err = AuditError::AmbiguousHandler {
            role: "factory",
            entity_type: "Role".into(),
            count: 2,
        };
        assert_eq!(
            err.to_string(),
            "2 factory handlers claim entity type 'Role', expected exactly one"
        );
        assert!(err.is_configuration());
    }

    #[test]
    fn test_runtime_errors_are_not_configuration() {
        assert!(!AuditError::Extraction("bad".into()).is_configuration());
        assert!(!AuditError::Storage("disk".into()).is_configuration());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let audit_err: AuditError = io_err.into();
        assert!(matches!(audit_err, AuditError::Io(_)));
    }
}
