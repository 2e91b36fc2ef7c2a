//! # SecOps Engine
//!
//! Multi-phase secure operations: every guarded action is first requested,
//! then either approved after a time lock or fast-tracked by a signed
//! meta-transaction, or cancelled.
//!
//! ## Flow
//!
//! ```text
//! txRequest ──► PENDING ──► txDelayedApproval (after release time) ──► COMPLETED | FAILED
//!                  │    └──► txApprovalWithMetaTx (signed)          ──► COMPLETED | FAILED
//!                  └──────► txCancellation[WithMetaTx]              ──► CANCELLED
//! ```
//!
//! The environment is reached through [`host`] traits so the engine runs
//! the same against in-memory doubles and real adapters.

pub mod config;
pub mod engine;
pub mod error;
pub mod host;
pub mod internal;
pub mod shared;

pub use config::{time_lock_delay, ConfigError, EngineConfig, MAX_TIME_LOCK_PERIOD_SECS};
pub use engine::{handler_selector, Engine, Host};
pub use error::{EngineError, ErrorClass};
pub use host::{
    Clock, InMemoryRail, Invocation, InvocationFailure, ManualClock, PaymentRail, RailError,
    RecordingInvoker, SystemClock, TargetInvoker, Transfer,
};
pub use internal::InternalCall;
pub use shared::SharedEngine;
