//! SecOps CLI - command orchestration
//!
//! This crate provides the `secops` binary and the commands behind it.

pub mod commands;
pub mod context;

pub use context::{AppContext, LoggingInvoker};
