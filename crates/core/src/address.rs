//! Address - 20-byte identity of a principal
//!
//! Every actor the engine deals with (requesters, role holders, signers,
//! targets, token contracts) is identified by an `Address`.
//! The all-zero address is the null identity and is never a valid holder.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur when parsing addresses
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid address hex: {0}")]
    InvalidHex(String),

    #[error("Address must be 20 bytes, got {0}")]
    InvalidLength(usize),
}

/// A 20-byte identity.
///
/// # Example
/// ```
/// use secops_core::Address;
///
/// let addr: Address = "0x00000000000000000000000000000000000000aa".parse().unwrap();
/// assert!(!addr.is_zero());
/// assert_eq!(addr.to_string(), "0x00000000000000000000000000000000000000aa");
///
/// assert!(Address::ZERO.is_zero());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 20]);

impl Address {
    /// The null identity
    pub const ZERO: Self = Self([0u8; 20]);

    /// Byte length of an address
    pub const LEN: usize = 20;

    /// Create an address from raw bytes
    #[inline]
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Build an address from a slice, which must be exactly 20 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        let array: [u8; 20] = bytes
            .try_into()
            .map_err(|_| AddressError::InvalidLength(bytes.len()))?;
        Ok(Self(array))
    }

    /// Address whose last byte is `n`, every other byte zero.
    ///
    /// Convenient for fixtures and simulations.
    pub const fn from_low_u64(n: u64) -> Self {
        let mut bytes = [0u8; 20];
        let be = n.to_be_bytes();
        let mut i = 0;
        while i < 8 {
            bytes[12 + i] = be[i];
            i += 1;
        }
        Self(bytes)
    }

    /// Raw bytes
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Check if this is the null identity
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_and_without_prefix() {
        let a: Address = "0x1111111111111111111111111111111111111111".parse().unwrap();
        let b: Address = "1111111111111111111111111111111111111111".parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let result: Result<Address, _> = "0x1234".parse();
        assert!(matches!(result, Err(AddressError::InvalidLength(2))));
    }

    #[test]
    fn test_bad_hex_rejected() {
        let result: Result<Address, _> = "0xzz11111111111111111111111111111111111111".parse();
        assert!(matches!(result, Err(AddressError::InvalidHex(_))));
    }

    #[test]
    fn test_from_low_u64() {
        let addr = Address::from_low_u64(0xabcd);
        assert_eq!(addr.to_string(), "0x000000000000000000000000000000000000abcd");
        assert!(Address::from_low_u64(0).is_zero());
    }

    #[test]
    fn test_serde_as_hex_string() {
        let addr = Address::from_low_u64(7);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0x0000000000000000000000000000000000000007\"");
        let parsed: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, addr);
    }
}
