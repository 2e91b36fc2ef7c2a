//! 4-byte function selectors

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::ident::IdentError;

/// Leading 4 bytes of a call, naming the function invoked on a target
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Selector([u8; 4]);

impl Selector {
    pub const ZERO: Self = Self([0u8; 4]);

    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// First 4 bytes of `SHA-256(signature)`, e.g. `"transferOwnership(address)"`
    pub fn from_signature(signature: &str) -> Self {
        let digest = Sha256::digest(signature.as_bytes());
        Self([digest[0], digest[1], digest[2], digest[3]])
    }

    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Selector({})", self)
    }
}

impl FromStr for Selector {
    type Err = IdentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped).map_err(|e| IdentError::InvalidHex(e.to_string()))?;
        let array: [u8; 4] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| IdentError::InvalidLength(bytes.len()))?;
        Ok(Self(array))
    }
}

impl TryFrom<String> for Selector {
    type Error = IdentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Selector> for String {
    fn from(value: Selector) -> Self {
        value.to_string()
    }
}

impl From<[u8; 4]> for Selector {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_signature_is_stable() {
        let a = Selector::from_signature("transferOwnership(address)");
        let b = Selector::from_signature("transferOwnership(address)");
        let c = Selector::from_signature("updateBroadcaster(address)");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_parse() {
        let sel: Selector = "0xdeadbeef".parse().unwrap();
        assert_eq!(sel.as_bytes(), &[0xde, 0xad, 0xbe, 0xef]);
        assert!("0xdead".parse::<Selector>().is_err());
    }
}
