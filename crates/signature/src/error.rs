//! Signature and authorization errors

use chrono::{DateTime, Utc};
use secops_core::{Address, OperationType, Selector};
use thiserror::Error;

/// Errors raised while building or checking a meta-transaction authorization
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Operation type not supported: {0}")]
    UnsupportedOperationType(OperationType),

    #[error("Signature must be 65 bytes (r, s, v), got {0}")]
    BadSignatureLength(usize),

    #[error("Chain mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },

    #[error("Handler mismatch: expected {expected}, got {actual}")]
    HandlerMismatch { expected: Address, actual: Address },

    #[error("Handler selector mismatch: expected {expected}, got {actual}")]
    SelectorMismatch { expected: Selector, actual: Selector },

    #[error("Nonce mismatch: expected {expected}, got {actual}")]
    NonceMismatch { expected: u64, actual: u64 },

    #[error("Authorization expired at {deadline} (now {now})")]
    Expired {
        deadline: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("Fee rate {fee_rate} exceeds ceiling {ceiling}")]
    FeeCeilingExceeded { ceiling: u128, fee_rate: u128 },

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Signer {0} is neither owner nor an authorized signer")]
    SignerNotAuthorized(Address),

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}
