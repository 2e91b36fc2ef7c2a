//! 32-byte identifiers
//!
//! Roles, operation types and guarded function names are all opaque
//! 32-byte values. Named identifiers are derived as `SHA-256(name)` so that
//! every instance agrees on them without a registry.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur when parsing identifiers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentError {
    #[error("Invalid identifier hex: {0}")]
    InvalidHex(String),

    #[error("Identifier must be 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// Opaque 32-byte value
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Bytes32([u8; 32]);

impl Bytes32 {
    pub const ZERO: Self = Self([0u8; 32]);

    #[inline]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Build from a slice, which must be exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, IdentError> {
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| IdentError::InvalidLength(bytes.len()))?;
        Ok(Self(array))
    }

    /// SHA-256 of arbitrary bytes
    pub fn digest(data: impl AsRef<[u8]>) -> Self {
        let mut out = [0u8; 32];
        out.copy_from_slice(&Sha256::digest(data.as_ref()));
        Self(out)
    }

    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bytes32({})", self)
    }
}

impl FromStr for Bytes32 {
    type Err = IdentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|e| IdentError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl TryFrom<String> for Bytes32 {
    type Error = IdentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Bytes32> for String {
    fn from(value: Bytes32) -> Self {
        value.to_string()
    }
}

impl From<[u8; 32]> for Bytes32 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

macro_rules! named_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Bytes32);

        impl $name {
            /// Identifier derived from a human-readable name
            pub fn named(name: &str) -> Self {
                Self(Bytes32::digest(name.as_bytes()))
            }

            #[inline]
            pub const fn from_bytes32(value: Bytes32) -> Self {
                Self(value)
            }

            #[inline]
            pub const fn as_bytes32(&self) -> &Bytes32 {
                &self.0
            }

            #[inline]
            pub const fn as_bytes(&self) -> &[u8; 32] {
                self.0.as_bytes()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdentError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<Bytes32>().map(Self)
            }
        }

        impl From<Bytes32> for $name {
            fn from(value: Bytes32) -> Self {
                Self(value)
            }
        }
    };
}

named_identifier!(
    /// Identifier of a role in the role registry
    RoleId
);

named_identifier!(
    /// Identifier of an operation category in the operation-type catalog
    OperationType
);

named_identifier!(
    /// Digest of a guarded function name, the key of the permission table
    FunctionId
);

/// Well-known roles. The three listed here are permanent.
pub mod roles {
    use super::RoleId;

    pub const OWNER: &str = "OWNER_ROLE";
    pub const BROADCASTER: &str = "BROADCASTER_ROLE";
    pub const RECOVERY: &str = "RECOVERY_ROLE";

    pub fn owner() -> RoleId {
        RoleId::named(OWNER)
    }

    pub fn broadcaster() -> RoleId {
        RoleId::named(BROADCASTER)
    }

    pub fn recovery() -> RoleId {
        RoleId::named(RECOVERY)
    }

    /// Roles that can never be removed
    pub fn protected() -> [RoleId; 3] {
        [owner(), broadcaster(), recovery()]
    }
}

/// Operation types seeded into every new catalog
pub mod operation_types {
    use super::OperationType;

    pub const OWNERSHIP_UPDATE: &str = "OWNERSHIP_UPDATE";
    pub const BROADCASTER_UPDATE: &str = "BROADCASTER_UPDATE";
    pub const RECOVERY_UPDATE: &str = "RECOVERY_UPDATE";
    pub const TIMELOCK_UPDATE: &str = "TIMELOCK_UPDATE";

    pub const DEFAULTS: [&str; 4] = [
        OWNERSHIP_UPDATE,
        BROADCASTER_UPDATE,
        RECOVERY_UPDATE,
        TIMELOCK_UPDATE,
    ];

    pub fn defaults() -> Vec<OperationType> {
        DEFAULTS.iter().map(|name| OperationType::named(name)).collect()
    }
}

/// Names of the functions guarded by the permission gate
pub mod functions {
    use super::FunctionId;

    pub const TX_REQUEST: &str = "txRequest";
    pub const TX_DELAYED_APPROVAL: &str = "txDelayedApproval";
    pub const TX_CANCELLATION: &str = "txCancellation";
    pub const TX_CANCELLATION_WITH_META_TX: &str = "txCancellationWithMetaTx";
    pub const TX_APPROVAL_WITH_META_TX: &str = "txApprovalWithMetaTx";
    pub const REQUEST_AND_APPROVE: &str = "requestAndApprove";
    pub const EXECUTE_PAYMENT: &str = "executePayment";

    pub const ADD_ROLE: &str = "addRole";
    pub const REMOVE_ROLE: &str = "removeRole";
    pub const UPDATE_ROLE: &str = "updateRole";
    pub const ADD_AUTHORIZED_SIGNER: &str = "addAuthorizedSigner";
    pub const REMOVE_AUTHORIZED_SIGNER: &str = "removeAuthorizedSigner";
    pub const ADD_OPERATION_TYPE: &str = "addOperationType";
    pub const REMOVE_OPERATION_TYPE: &str = "removeOperationType";
    pub const SET_ALLOWED_ROLES: &str = "setAllowedRoles";
    pub const UPDATE_TIME_LOCK_PERIOD: &str = "updateTimeLockPeriod";

    /// Functions reserved to the owner by default
    pub const OWNER_DEFAULTS: [&str; 12] = [
        TX_REQUEST,
        TX_DELAYED_APPROVAL,
        TX_CANCELLATION,
        ADD_ROLE,
        REMOVE_ROLE,
        UPDATE_ROLE,
        ADD_AUTHORIZED_SIGNER,
        REMOVE_AUTHORIZED_SIGNER,
        ADD_OPERATION_TYPE,
        REMOVE_OPERATION_TYPE,
        SET_ALLOWED_ROLES,
        UPDATE_TIME_LOCK_PERIOD,
    ];

    /// Functions reserved to the broadcaster (relayer) by default
    pub const BROADCASTER_DEFAULTS: [&str; 4] = [
        TX_CANCELLATION_WITH_META_TX,
        TX_APPROVAL_WITH_META_TX,
        REQUEST_AND_APPROVE,
        EXECUTE_PAYMENT,
    ];

    pub fn id(name: &str) -> FunctionId {
        FunctionId::named(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_is_deterministic() {
        assert_eq!(RoleId::named("OWNER_ROLE"), roles::owner());
        assert_ne!(roles::owner(), roles::broadcaster());
    }

    #[test]
    fn test_bytes32_parse_roundtrip() {
        let id = OperationType::named(operation_types::TIMELOCK_UPDATE);
        let parsed: OperationType = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_bytes32_wrong_length() {
        let result: Result<Bytes32, _> = "0xabcd".parse();
        assert!(matches!(result, Err(IdentError::InvalidLength(2))));
    }

    #[test]
    fn test_default_tables_disjoint() {
        for name in functions::BROADCASTER_DEFAULTS {
            assert!(!functions::OWNER_DEFAULTS.contains(&name));
        }
        assert_eq!(operation_types::defaults().len(), 4);
    }

    #[test]
    fn test_identifier_serde_transparent() {
        let role = roles::recovery();
        let json = serde_json::to_string(&role).unwrap();
        assert_eq!(json, format!("\"{}\"", role));
        let back: RoleId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, role);
    }
}
