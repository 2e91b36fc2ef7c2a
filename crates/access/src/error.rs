//! Access control errors

use secops_core::{Address, OperationType, RoleId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("Invalid holder: {0}")]
    InvalidHolder(Address),

    #[error("Role {0} is protected and cannot be removed")]
    ProtectedRole(RoleId),

    #[error("Role not found: {0}")]
    RoleNotFound(RoleId),

    #[error("Role already exists: {0}")]
    RoleAlreadyExists(RoleId),

    #[error("Signer already authorized: {0}")]
    AlreadyAuthorized(Address),

    #[error("Cannot delegate signing to the current owner {0}")]
    CannotDelegateToOwner(Address),

    #[error("Signer not authorized: {0}")]
    NotAuthorized(Address),

    #[error("Operation type already supported: {0}")]
    OperationTypeExists(OperationType),

    #[error("Operation type not supported: {0}")]
    UnsupportedOperationType(OperationType),

    #[error("Unauthorized: {caller} may not call {function}")]
    Unauthorized { function: String, caller: Address },
}
