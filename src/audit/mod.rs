//! Audit trail storage for changetrail
//!
//! Records one `AuditLogEntry` per lifecycle event that produced changes.
//!
//! # Architecture
//!
//! - `AuditLogEntry`: the persisted record with actor, severity, subject and
//!   the ordered change list.
//! - `AuditStore`: the storage boundary. Creation entries are committed right
//!   away, update entries are staged and committed by `flush`.
//! - `MemoryAuditStore`: in-process store.
//! - `AuditLogger`: append-only JSONL file store.
//!
//! # Example
//!
//! ```rust,ignore
//! use changetrail::audit::{AuditLogger, AuditStore, SubjectRef};
//!
//! let store = AuditLogger::new(paths.audit_log());
//! store.stage(entry)?;
//! store.flush()?;
//!
//! for entry in store.history(&SubjectRef::new("User", 42))? {
//!     println!("{}", entry.format_human_readable());
//! }
//! ```

mod entry;
mod logger;
mod store;

pub use entry::{Actor, AuditLogEntry, Severity, SubjectRef};
pub use logger::AuditLogger;
pub use store::{AuditStore, MemoryAuditStore};
