//! Storage boundary for audit entries
//!
//! Entries reach storage one of two ways: `persist` commits immediately (used
//! for creation entries), `stage` buffers them until the host's transaction
//! commits and `flush` is called.

use std::sync::RwLock;

use crate::error::{AuditError, AuditResult};

use super::entry::{AuditLogEntry, SubjectRef};

/// Where audit entries are kept
pub trait AuditStore: Send + Sync {
    /// Write and commit an entry right away
    fn persist(&self, entry: AuditLogEntry) -> AuditResult<()>;

    /// Buffer an entry until the next `flush`
    fn stage(&self, entry: AuditLogEntry) -> AuditResult<()>;

    /// Commit every staged entry in staging order, returning how many were written
    fn flush(&self) -> AuditResult<usize>;

    /// Drop staged entries without writing them (host transaction rolled back)
    fn discard_staged(&self) -> AuditResult<usize>;

    fn staged_count(&self) -> AuditResult<usize>;

    /// Committed entries of one subject, oldest first
    fn history(&self, subject: &SubjectRef) -> AuditResult<Vec<AuditLogEntry>>;

    /// The most recent `count` committed entries, oldest first
    fn recent(&self, count: usize) -> AuditResult<Vec<AuditLogEntry>>;

    /// Number of committed entries
    fn count(&self) -> AuditResult<usize>;
}

/// In-process store for embedders that persist entries themselves
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    committed: RwLock<Vec<AuditLogEntry>>,
    staged: RwLock<Vec<AuditLogEntry>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every committed entry
    pub fn committed(&self) -> AuditResult<Vec<AuditLogEntry>> {
        let committed = self.committed.read().map_err(|e| {
            AuditError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;
        Ok(committed.clone())
    }

    /// Take every committed entry out of the store
    pub fn drain_committed(&self) -> AuditResult<Vec<AuditLogEntry>> {
        let mut committed = self.committed.write().map_err(|e| {
            AuditError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;
        Ok(std::mem::take(&mut *committed))
    }
}

impl AuditStore for MemoryAuditStore {
    fn persist(&self, entry: AuditLogEntry) -> AuditResult<()> {
        let mut committed = self.committed.write().map_err(|e| {
            AuditError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;
        committed.push(entry);
        Ok(())
    }

    fn stage(&self, entry: AuditLogEntry) -> AuditResult<()> {
        let mut staged = self.staged.write().map_err(|e| {
            AuditError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;
        staged.push(entry);
        Ok(())
    }

    fn flush(&self) -> AuditResult<usize> {
        let mut staged = self.staged.write().map_err(|e| {
            AuditError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;
        let mut committed = self.committed.write().map_err(|e| {
            AuditError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        let count = staged.len();
        committed.append(&mut staged);
        Ok(count)
    }

    fn discard_staged(&self) -> AuditResult<usize> {
        let mut staged = self.staged.write().map_err(|e| {
            AuditError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;
        let count = staged.len();
        staged.clear();
        Ok(count)
    }

    fn staged_count(&self) -> AuditResult<usize> {
        let staged = self.staged.read().map_err(|e| {
            AuditError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;
        Ok(staged.len())
    }

    fn history(&self, subject: &SubjectRef) -> AuditResult<Vec<AuditLogEntry>> {
        let committed = self.committed.read().map_err(|e| {
            AuditError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;
        Ok(committed
            .iter()
            .filter(|e| e.belongs_to(subject))
            .cloned()
            .collect())
    }

    fn recent(&self, count: usize) -> AuditResult<Vec<AuditLogEntry>> {
        let committed = self.committed.read().map_err(|e| {
            AuditError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;
        let start = committed.len().saturating_sub(count);
        Ok(committed[start..].to_vec())
    }

    fn count(&self) -> AuditResult<usize> {
        let committed = self.committed.read().map_err(|e| {
            AuditError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;
        Ok(committed.len())
    }
}
