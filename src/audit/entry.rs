//! Audit entry data structures
//!
//! Defines the persisted audit record, its severity, and who caused it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AuditChange, AuditEntryId, Entity, EntityId};

/// How significant an audit entry is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Every automatically generated entry
    #[default]
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
        }
    }
}

/// Identity of whoever caused a change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({})", name, self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// The tracked entity an entry belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectRef {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: EntityId,
}

impl SubjectRef {
    pub fn new(entity_type: impl Into<String>, id: impl Into<EntityId>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn of(entity: &dyn Entity) -> Self {
        Self {
            entity_type: entity.entity_type().to_string(),
            id: entity.id(),
        }
    }
}

impl std::fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.entity_type, self.id)
    }
}

/// A persisted audit record
///
/// Built once per lifecycle event that yields changes and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: AuditEntryId,

    /// Absent for anonymous or system changes
    #[serde(default)]
    pub actor: Option<Actor>,

    /// Reserved for manual annotations
    #[serde(default)]
    pub message: Option<String>,

    pub severity: Severity,

    /// Changes in detection order
    pub changes: Vec<AuditChange>,

    pub subject: SubjectRef,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Create a new low-severity entry stamped with the current time
    pub fn new(actor: Option<Actor>, subject: SubjectRef, changes: Vec<AuditChange>) -> Self {
        Self {
            id: AuditEntryId::new(),
            actor,
            message: None,
            severity: Severity::Low,
            changes,
            subject,
            created_at: Utc::now(),
        }
    }

    pub fn belongs_to(&self, subject: &SubjectRef) -> bool {
        &self.subject == subject
    }

    /// Format the entry for human-readable output
    pub fn format_human_readable(&self) -> String {
        let mut output = format!(
            "[{}] {} by {}",
            self.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.subject,
            self.actor
                .as_ref()
                .map_or_else(|| "system".to_string(), |a| a.to_string())
        );

        if let Some(message) = &self.message {
            output.push_str(&format!(" - {}", message));
        }

        for change in &self.changes {
            output.push_str(&format!("\n  {}", change.record().summary()));
        }

        output
    }
}
