//! # SecOps Access
//!
//! Who may do what.
//!
//! - [`RoleRegistry`]: named roles → holders, plus the authorized-signer set
//! - [`OperationCatalog`]: allow-list of recognized operation types
//! - [`PermissionGate`]: per-function allow-list of roles
//!
//! All three are plain in-memory values. Persistence and atomicity belong
//! to the engine, which mutates a copy and swaps it in after the store commit.

mod catalog;
mod error;
mod gate;
mod roles;

pub use catalog::OperationCatalog;
pub use error::AccessError;
pub use gate::PermissionGate;
pub use roles::RoleRegistry;
