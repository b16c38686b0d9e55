//! Append-only audit trail on disk
//!
//! Provides the AuditLogger store that writes audit entries to a log file.
//! Each entry is written as a single JSON line.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::RwLock;

use tracing::debug;

use crate::error::{AuditError, AuditResult};

use super::entry::{AuditLogEntry, SubjectRef};
use super::store::AuditStore;

/// Writes audit entries to a line-delimited JSON (JSONL) file
///
/// Each line is a complete JSON object representing one audit entry. Staged
/// entries are held in memory until `flush` appends them in one batch.
pub struct AuditLogger {
    /// Path to the audit log file
    log_path: PathBuf,
    staged: RwLock<Vec<AuditLogEntry>>,
}

impl AuditLogger {
    /// Create a new AuditLogger that writes to the specified path
    pub fn new(log_path: PathBuf) -> Self {
        Self {
            log_path,
            staged: RwLock::new(Vec::new()),
        }
    }

    /// Append one entry and flush the file
    pub fn log(&self, entry: &AuditLogEntry) -> AuditResult<()> {
        self.log_batch(std::slice::from_ref(entry))
    }

    /// Append several entries, flushing once at the end
    pub fn log_batch(&self, entries: &[AuditLogEntry]) -> AuditResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AuditError::Io(format!("Failed to create audit log directory: {}", e))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| AuditError::Io(format!("Failed to open audit log: {}", e)))?;

        let mut batch = String::new();
        for entry in entries {
            let json = serde_json::to_string(entry)
                .map_err(|e| AuditError::Json(format!("Failed to serialize audit entry: {}", e)))?;
            batch.push_str(&json);
            batch.push('\n');
        }

        // The whole batch goes out in a single write
        file.write_all(batch.as_bytes())
            .map_err(|e| AuditError::Io(format!("Failed to write audit entries: {}", e)))?;

        file.flush()
            .map_err(|e| AuditError::Io(format!("Failed to flush audit log: {}", e)))?;

        debug!(count = entries.len(), path = %self.log_path.display(), "appended audit entries");
        Ok(())
    }

    /// Read all audit entries from the log file
    ///
    /// Returns entries in chronological order (oldest first).
    pub fn read_all(&self) -> AuditResult<Vec<AuditLogEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path)
            .map_err(|e| AuditError::Io(format!("Failed to open audit log: {}", e)))?;

        let reader = BufReader::new(file);
        let mut entries = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                AuditError::Io(format!("Failed to read audit log line {}: {}", line_num + 1, e))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let entry: AuditLogEntry = serde_json::from_str(&line).map_err(|e| {
                AuditError::Json(format!(
                    "Failed to parse audit entry at line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;

            entries.push(entry);
        }

        Ok(entries)
    }

    /// Check if the audit log file exists
    pub fn exists(&self) -> bool {
        self.log_path.exists()
    }

    /// Get the path to the audit log file
    pub fn path(&self) -> &PathBuf {
        &self.log_path
    }
}

impl AuditStore for AuditLogger {
    fn persist(&self, entry: AuditLogEntry) -> AuditResult<()> {
        self.log(&entry)
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

        // Entries stay staged when the write fails
        self.log_batch(&staged)?;
        let count = staged.len();
        staged.clear();
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
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|e| e.belongs_to(subject))
            .collect())
    }

    fn recent(&self, count: usize) -> AuditResult<Vec<AuditLogEntry>> {
        let all_entries = self.read_all()?;
        let start = all_entries.len().saturating_sub(count);
        Ok(all_entries[start..].to_vec())
    }

    fn count(&self) -> AuditResult<usize> {
        if !self.log_path.exists() {
            return Ok(0);
        }

        let file = File::open(&self.log_path)
            .map_err(|e| AuditError::Io(format!("Failed to open audit log: {}", e)))?;

        let reader = BufReader::new(file);
        let count = reader
            .lines()
            .map_while(Result::ok)
            .filter(|l| !l.trim().is_empty())
            .count();

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChangeRecord, ChangeType, ChangeValue};
    use tempfile::TempDir;

    fn create_test_logger() -> (AuditLogger, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("audit.log");
        let logger = AuditLogger::new(log_path);
        (logger, temp_dir)
    }

    fn create_test_entry(id: i64) -> AuditLogEntry {
        AuditLogEntry::new(
            None,
            SubjectRef::new("User", id),
            vec![ChangeRecord::new(
                "firstname",
                ChangeType::Update,
                ChangeValue::Text("John".into()),
                ChangeValue::Text("Jane".into()),
            )
            .into()],
        )
    }

    #[test]
    fn test_persist_and_read() {
        let (logger, _temp) = create_test_logger();
        let entry = create_test_entry(1);

        logger.persist(entry.clone()).unwrap();

        let entries = logger.read_all().unwrap();
        assert_eq!(entries, vec![entry]);
    }

    #[test]
    fn test_staged_entries_written_on_flush() {
        let (logger, _temp) = create_test_logger();

        for i in 0..3 {
            logger.stage(create_test_entry(i)).unwrap();
        }

        assert!(!logger.exists());
        assert_eq!(logger.staged_count().unwrap(), 3);

        assert_eq!(logger.flush().unwrap(), 3);
        assert_eq!(logger.staged_count().unwrap(), 0);
        assert_eq!(logger.count().unwrap(), 3);
    }

    #[test]
    fn test_flush_with_nothing_staged_creates_no_file() {
        let (logger, _temp) = create_test_logger();
        assert_eq!(logger.flush().unwrap(), 0);
        assert!(!logger.exists());
    }

    #[test]
    fn test_recent_and_history() {
        let (logger, _temp) = create_test_logger();

        for i in 0..10 {
            logger.persist(create_test_entry(i % 2)).unwrap();
        }

        let recent = logger.recent(3).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[2].subject, SubjectRef::new("User", 1));

        let history = logger.history(&SubjectRef::new("User", 0)).unwrap();
        assert_eq!(history.len(), 5);
    }

    #[test]
    fn test_empty_log() {
        let (logger, _temp) = create_test_logger();

        assert!(!logger.exists());
        assert_eq!(logger.count().unwrap(), 0);
        assert!(logger.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let (logger, _temp) = create_test_logger();
        logger.persist(create_test_entry(1)).unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(logger.path())
            .unwrap()
            .write_all(b"\n{not json}\n")
            .unwrap();

        let err = logger.read_all().unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_survives_restart() {
        let (logger, temp) = create_test_logger();
        logger.persist(create_test_entry(1)).unwrap();

        let reopened = AuditLogger::new(temp.path().join("audit.log"));
        assert_eq!(reopened.read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_failed_flush_retry_writes_each_entry_once() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("trail");
        std::fs::write(&blocker, "not a directory").unwrap();
        let logger = AuditLogger::new(blocker.join("audit.log"));

        logger.stage(create_test_entry(1)).unwrap();
        logger.stage(create_test_entry(2)).unwrap();
        assert!(logger.flush().is_err());
        assert_eq!(logger.staged_count().unwrap(), 2);

        std::fs::remove_file(&blocker).unwrap();
        assert_eq!(logger.flush().unwrap(), 2);

        let entries = logger.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_ne!(entries[0].id, entries[1].id);
    }

    #[test]
    fn test_text_id_shaped_like_uuid_keeps_its_history() {
        let (logger, _temp) = create_test_logger();
        let subject = SubjectRef::new("User", "550e8400-e29b-41d4-a716-446655440000");
        logger
            .persist(AuditLogEntry::new(None, subject.clone(), Vec::new()))
            .unwrap();

        let history = logger.history(&subject).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].subject, subject);
    }

    #[test]
    fn test_raw_json_values_read_back_unchanged() {
        let (logger, _temp) = create_test_logger();
        let address = serde_json::json!({"id": 5, "street": "Main"});
        let entry = AuditLogEntry::new(
            None,
            SubjectRef::new("User", 1),
            vec![ChangeRecord::new(
                "address",
                ChangeType::Update,
                ChangeValue::Null,
                ChangeValue::Raw(address.clone()),
            )
            .into()],
        );
        logger.persist(entry).unwrap();

        let entries = logger.read_all().unwrap();
        assert_eq!(entries[0].changes[0].record().to, ChangeValue::Raw(address));
    }

    #[test]
    fn test_creates_parent_directories() {
        let temp = TempDir::new().unwrap();
        let logger = AuditLogger::new(temp.path().join("nested").join("audit.log"));
        logger.persist(create_test_entry(1)).unwrap();
        assert!(logger.exists());
    }
}
