//! Transaction record data structures

use chrono::{DateTime, Utc};
use secops_core::{Address, Bytes32, OperationType, Selector};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;

/// Errors decoding stored record fields
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("Unknown execution kind: {0}")]
    UnknownExecutionKind(u8),

    #[error("STANDARD payload must start with a 4-byte selector, got {0} bytes")]
    MalformedStandardPayload(usize),

    #[error("NONE execution carries no payload, got {0} bytes")]
    UnexpectedPayload(usize),
}

/// Status of a transaction record
///
/// `Pending` is the only non-terminal state. `Rejected` is reserved for
/// callers that decline a request before it is persisted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumString, Display,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    #[default]
    Undefined,
    Pending,
    Cancelled,
    Completed,
    Failed,
    Rejected,
}

impl TxStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxStatus::Pending | TxStatus::Undefined)
    }

    /// One-directional transitions: UNDEFINED → PENDING → terminal
    pub fn can_transition_to(&self, next: TxStatus) -> bool {
        match (self, next) {
            (TxStatus::Undefined, TxStatus::Pending | TxStatus::Rejected) => true,
            (
                TxStatus::Pending,
                TxStatus::Cancelled | TxStatus::Completed | TxStatus::Failed,
            ) => true,
            _ => false,
        }
    }
}

/// Discriminant of [`ExecutionOptions`], signed as a single byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionKind {
    None,
    Standard,
    Raw,
}

impl ExecutionKind {
    pub fn as_u8(&self) -> u8 {
        match self {
            ExecutionKind::None => 0,
            ExecutionKind::Standard => 1,
            ExecutionKind::Raw => 2,
        }
    }

    pub fn from_u8(value: u8) -> Result<Self, RecordError> {
        match value {
            0 => Ok(ExecutionKind::None),
            1 => Ok(ExecutionKind::Standard),
            2 => Ok(ExecutionKind::Raw),
            other => Err(RecordError::UnknownExecutionKind(other)),
        }
    }
}

/// How the guarded action is invoked on the target
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionOptions {
    #[default]
    None,
    /// Selector plus already-encoded parameters
    Standard {
        selector: Selector,
        #[serde(with = "secops_core::serde_hex")]
        params: Vec<u8>,
    },
    /// Prepared call data passed through unchanged
    Raw {
        #[serde(with = "secops_core::serde_hex")]
        call_data: Vec<u8>,
    },
}

impl ExecutionOptions {
    pub fn standard(selector: Selector, params: impl Into<Vec<u8>>) -> Self {
        ExecutionOptions::Standard {
            selector,
            params: params.into(),
        }
    }

    pub fn raw(call_data: impl Into<Vec<u8>>) -> Self {
        ExecutionOptions::Raw {
            call_data: call_data.into(),
        }
    }

    pub fn kind(&self) -> ExecutionKind {
        match self {
            ExecutionOptions::None => ExecutionKind::None,
            ExecutionOptions::Standard { .. } => ExecutionKind::Standard,
            ExecutionOptions::Raw { .. } => ExecutionKind::Raw,
        }
    }

    /// Opaque payload bytes as stored and signed
    ///
    /// STANDARD: `selector || params`; RAW: the call data; NONE: empty.
    pub fn payload(&self) -> Vec<u8> {
        match self {
            ExecutionOptions::None => Vec::new(),
            ExecutionOptions::Standard { selector, params } => {
                let mut out = Vec::with_capacity(4 + params.len());
                out.extend_from_slice(selector.as_bytes());
                out.extend_from_slice(params);
                out
            }
            ExecutionOptions::Raw { call_data } => call_data.clone(),
        }
    }

    pub fn payload_digest(&self) -> Bytes32 {
        Bytes32::digest(self.payload())
    }

    /// Inverse of (`kind`, `payload`)
    pub fn decode(kind: ExecutionKind, payload: &[u8]) -> Result<Self, RecordError> {
        match kind {
            ExecutionKind::None if payload.is_empty() => Ok(ExecutionOptions::None),
            ExecutionKind::None => Err(RecordError::UnexpectedPayload(payload.len())),
            ExecutionKind::Standard => {
                if payload.len() < 4 {
                    return Err(RecordError::MalformedStandardPayload(payload.len()));
                }
                let selector = Selector::new([payload[0], payload[1], payload[2], payload[3]]);
                Ok(ExecutionOptions::standard(selector, &payload[4..]))
            }
            ExecutionKind::Raw => Ok(ExecutionOptions::raw(payload)),
        }
    }
}

/// Payment bundled with a record
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub recipient: Address,
    pub native_amount: u128,
    pub token_address: Address,
    pub token_amount: u128,
}

impl PaymentDetails {
    pub fn native(recipient: Address, amount: u128) -> Self {
        Self {
            recipient,
            native_amount: amount,
            ..Self::default()
        }
    }

    pub fn token(recipient: Address, token_address: Address, amount: u128) -> Self {
        Self {
            recipient,
            token_address,
            token_amount: amount,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.native_amount == 0 && self.token_amount == 0
    }
}

/// The central entity: one guarded operation from request to terminal state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    /// Sequential identifier, assigned once
    pub tx_id: u64,

    /// Creation time + configured delay, never mutated
    pub release_time: DateTime<Utc>,

    pub status: TxStatus,

    /// Identity that initiated the request
    pub requester: Address,

    /// Identity the guarded action acts upon
    pub target: Address,

    pub operation_type: OperationType,

    pub execution: ExecutionOptions,

    pub value: u128,

    pub gas_limit: u64,

    /// Captured after execution, empty until then
    #[serde(with = "secops_core::serde_hex")]
    pub result: Vec<u8>,

    pub payment: Option<PaymentDetails>,
}

impl TxRecord {
    /// A fresh PENDING record
    #[allow(clippy::too_many_arguments)]
    pub fn pending(
        tx_id: u64,
        release_time: DateTime<Utc>,
        requester: Address,
        target: Address,
        operation_type: OperationType,
        execution: ExecutionOptions,
        value: u128,
        gas_limit: u64,
    ) -> Self {
        Self {
            tx_id,
            release_time,
            status: TxStatus::Pending,
            requester,
            target,
            operation_type,
            execution,
            value,
            gas_limit,
            result: Vec::new(),
            payment: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TxStatus::Pending
    }

    /// Whether `other` describes the same operation.
    ///
    /// Compares the fields a signer commits to; engine-assigned fields
    /// (release time, status, result, payment) are ignored.
    pub fn same_operation(&self, other: &TxRecord) -> bool {
        self.tx_id == other.tx_id
            && self.requester == other.requester
            && self.target == other.target
            && self.operation_type == other.operation_type
            && self.execution == other.execution
            && self.value == other.value
            && self.gas_limit == other.gas_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> TxRecord {
        TxRecord::pending(
            1,
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            Address::from_low_u64(1),
            Address::from_low_u64(0xbeef),
            OperationType::named("OWNERSHIP_UPDATE"),
            ExecutionOptions::standard(Selector::from_signature("transferOwnership(address)"), vec![1, 2, 3]),
            0,
            100_000,
        )
    }

    #[test]
    fn test_status_transitions() {
        assert!(TxStatus::Undefined.can_transition_to(TxStatus::Pending));
        assert!(TxStatus::Pending.can_transition_to(TxStatus::Completed));
        assert!(TxStatus::Pending.can_transition_to(TxStatus::Failed));
        assert!(TxStatus::Pending.can_transition_to(TxStatus::Cancelled));
        assert!(!TxStatus::Cancelled.can_transition_to(TxStatus::Pending));
        assert!(!TxStatus::Completed.can_transition_to(TxStatus::Failed));
        assert!(!TxStatus::Undefined.can_transition_to(TxStatus::Completed));

        assert!(!TxStatus::Pending.is_terminal());
        assert!(TxStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_status_string_forms() {
        assert_eq!(TxStatus::Pending.to_string(), "PENDING");
        assert_eq!("CANCELLED".parse::<TxStatus>().unwrap(), TxStatus::Cancelled);
        assert!("pending?".parse::<TxStatus>().is_err());
    }

    #[test]
    fn test_standard_payload_decodes_back() {
        let exec = record().execution;
        let payload = exec.payload();
        assert_eq!(payload.len(), 7);
        assert_eq!(ExecutionOptions::decode(ExecutionKind::Standard, &payload).unwrap(), exec);
    }

    #[test]
    fn test_malformed_payloads() {
        assert_eq!(
            ExecutionOptions::decode(ExecutionKind::Standard, &[1, 2]),
            Err(RecordError::MalformedStandardPayload(2))
        );
        assert_eq!(
            ExecutionOptions::decode(ExecutionKind::None, &[1]),
            Err(RecordError::UnexpectedPayload(1))
        );
        assert_eq!(ExecutionKind::from_u8(9), Err(RecordError::UnknownExecutionKind(9)));
    }

    #[test]
    fn test_payload_digest_tracks_content() {
        let a = ExecutionOptions::raw(vec![1, 2, 3]);
        let b = ExecutionOptions::raw(vec![1, 2, 4]);
        assert_ne!(a.payload_digest(), b.payload_digest());
    }

    #[test]
    fn test_same_operation_ignores_engine_fields() {
        let a = record();
        let mut b = a.clone();
        b.status = TxStatus::Completed;
        b.result = vec![9];
        assert!(a.same_operation(&b));

        b.value = 1;
        assert!(!a.same_operation(&b));
    }

    #[test]
    fn test_record_json_shape() {
        let json = serde_json::to_value(record()).unwrap();
        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["execution"]["kind"], "STANDARD");
        assert_eq!(json["result"], "0x");
    }
}
