//! SecOps Journal - JSONL notification log
//!
//! Every state transition the engine commits emits one notification
//! ("requested", "completed", "cancelled", ...). Notifications are appended
//! to daily JSONL files and can be replayed for audit. The SQLite state
//! store remains the source of truth; the journal is an audit trail.

pub mod error;
pub mod event;
pub mod reader;
pub mod store;

pub use error::JournalError;
pub use event::{ApprovalPath, EngineEvent, Notification};
pub use reader::JournalReader;
pub use store::JournalWriter;
