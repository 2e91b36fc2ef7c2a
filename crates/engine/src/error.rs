//! Engine errors

use chrono::{DateTime, Utc};
use secops_access::AccessError;
use secops_core::Address;
use secops_signature::SignatureError;
use secops_store::{StoreError, TxStatus};
use thiserror::Error;

/// Broad class of a rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Caller or signature not allowed; nothing was mutated
    Authorization,
    /// Malformed or out-of-state request; nothing was mutated
    Validation,
    /// A payment transfer failed
    Execution,
    /// Storage failure
    Infrastructure,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Engine already initialized")]
    AlreadyInitialized,

    #[error("Engine not initialized")]
    NotInitialized,

    #[error("Time lock period out of range: 1 to {} seconds", crate::config::MAX_TIME_LOCK_PERIOD_SECS)]
    InvalidTimeLock,

    #[error("Instance address must not be the null identity")]
    InvalidInstanceAddress,

    #[error("Target must not be the null identity")]
    InvalidTarget,

    #[error("Transaction not found: {0}")]
    TxNotFound(u64),

    #[error("Transaction {tx_id} is {status}, expected PENDING")]
    WrongStatus { tx_id: u64, status: TxStatus },

    #[error("Transaction {tx_id} releases at {release_time} (now {now})")]
    TooEarly {
        tx_id: u64,
        release_time: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("Execution kind NONE cannot be executed (transaction {0})")]
    UnsupportedExecutionKind(u64),

    #[error("Envelope record does not match transaction {0}")]
    RecordMismatch(u64),

    #[error("Invalid history range {from}..={to}")]
    InvalidRange { from: u64, to: u64 },

    #[error("Envelope carries no payment")]
    MissingPayment,

    #[error("Envelope for a new request must not carry a payment")]
    UnexpectedPayment,

    #[error("Transaction {0} already carries a payment")]
    PaymentAlreadyAttached(u64),

    #[error("Payment recipient must not be the null identity")]
    InvalidRecipient,

    #[error("Token payment requires a token address")]
    InvalidTokenAddress,

    #[error("Insufficient native balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u128, available: u128 },

    #[error("Insufficient balance of token {token}: need {needed}, have {available}")]
    InsufficientTokenBalance {
        token: Address,
        needed: u128,
        available: u128,
    },

    #[error("Native transfer failed: {0}")]
    TransferFailed(String),

    #[error("Token transfer failed: {0}")]
    TokenTransferFailed(String),
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::Access(AccessError::Unauthorized { .. }) => ErrorClass::Authorization,
            EngineError::Access(_) => ErrorClass::Validation,

            EngineError::Signature(
                SignatureError::UnsupportedOperationType(_)
                | SignatureError::BadSignatureLength(_)
                | SignatureError::InvalidKey(_),
            ) => ErrorClass::Validation,
            EngineError::Signature(_) => ErrorClass::Authorization,

            EngineError::Store(_) => ErrorClass::Infrastructure,

            EngineError::TransferFailed(_) | EngineError::TokenTransferFailed(_) => {
                ErrorClass::Execution
            }

            _ => ErrorClass::Validation,
        }
    }

    /// True for rejections caused by the caller or signer identity
    pub fn is_authorization(&self) -> bool {
        self.class() == ErrorClass::Authorization
    }
}
