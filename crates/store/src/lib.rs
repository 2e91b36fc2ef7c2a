//! # SecOps Record Store
//!
//! Durable table of in-flight and historical transaction records, plus the
//! registries and counters of one engine instance.
//!
//! ## Features
//! - Sequential `tx_id`, never reused
//! - Append-only history: records are updated in place by transitions, never deleted
//! - Every commit is one SQLite transaction
//! - In-memory database for tests

mod record;
mod store;

pub use record::{ExecutionKind, ExecutionOptions, PaymentDetails, RecordError, TxRecord, TxStatus};
pub use store::{Changeset, InstanceMeta, Snapshot, StateStore, StoreError, StoreStats};
