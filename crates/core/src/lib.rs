//! SecOps Core - Identity types
//!
//! This crate contains the fundamental types shared by every SecOps crate:
//! - `Address`: 20-byte identity of a principal, target or token
//! - `Bytes32`: opaque 32-byte identifier
//! - `RoleId`, `OperationType`, `FunctionId`: typed identifiers derived from names
//! - `Selector`: 4-byte function selector

pub mod address;
pub mod ident;
pub mod selector;
pub mod serde_hex;

pub use address::{Address, AddressError};
pub use ident::{
    functions, operation_types, roles, Bytes32, FunctionId, IdentError, OperationType, RoleId,
};
pub use selector::Selector;
