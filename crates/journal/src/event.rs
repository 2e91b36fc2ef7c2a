//! Engine notifications

use chrono::{DateTime, Utc};
use secops_core::{Address, FunctionId, OperationType, RoleId};
use secops_store::{PaymentDetails, TxStatus};
use serde::{Deserialize, Serialize};

/// How a record left PENDING
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalPath {
    /// Waited out the time lock
    Delayed,
    /// Signed authorization submitted by a relayer
    MetaTx,
    /// Request and meta-approval in one call
    RequestAndApprove,
}

/// Events emitted by the engine after each committed transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Instance created with its protected roles
    Initialized {
        owner: Address,
        broadcaster: Address,
        recovery: Address,
        time_lock_secs: u64,
    },

    /// A record entered PENDING
    TxRequested {
        tx_id: u64,
        requester: Address,
        target: Address,
        operation_type: OperationType,
        release_time: DateTime<Utc>,
    },

    /// The guarded action ran; `status` is COMPLETED or FAILED
    TxExecuted {
        tx_id: u64,
        status: TxStatus,
        path: ApprovalPath,
        /// Nonce consumed by the approval, if it was a meta-transaction
        nonce: Option<u64>,
    },

    TxCancelled {
        tx_id: u64,
        nonce: Option<u64>,
    },

    PaymentExecuted {
        tx_id: u64,
        payment: PaymentDetails,
        nonce: u64,
    },

    RoleAdded {
        role: RoleId,
        holder: Address,
    },

    RoleUpdated {
        role: RoleId,
        previous: Address,
        holder: Address,
    },

    RoleRemoved {
        role: RoleId,
        holder: Address,
    },

    SignerAuthorized {
        signer: Address,
    },

    SignerRevoked {
        signer: Address,
    },

    OperationTypeAdded {
        operation_type: OperationType,
    },

    OperationTypeRemoved {
        operation_type: OperationType,
    },

    PermissionsUpdated {
        function: FunctionId,
        roles: Vec<RoleId>,
    },

    TimeLockUpdated {
        previous_secs: u64,
        time_lock_secs: u64,
    },
}

impl EngineEvent {
    /// Short name used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::Initialized { .. } => "initialized",
            EngineEvent::TxRequested { .. } => "requested",
            EngineEvent::TxExecuted {
                status: TxStatus::Completed,
                ..
            } => "completed",
            EngineEvent::TxExecuted { .. } => "failed",
            EngineEvent::TxCancelled { .. } => "cancelled",
            EngineEvent::PaymentExecuted { .. } => "payment_executed",
            EngineEvent::RoleAdded { .. } => "role_added",
            EngineEvent::RoleUpdated { .. } => "role_updated",
            EngineEvent::RoleRemoved { .. } => "role_removed",
            EngineEvent::SignerAuthorized { .. } => "signer_authorized",
            EngineEvent::SignerRevoked { .. } => "signer_revoked",
            EngineEvent::OperationTypeAdded { .. } => "operation_type_added",
            EngineEvent::OperationTypeRemoved { .. } => "operation_type_removed",
            EngineEvent::PermissionsUpdated { .. } => "permissions_updated",
            EngineEvent::TimeLockUpdated { .. } => "time_lock_updated",
        }
    }

    /// Record the event concerns, if any
    pub fn tx_id(&self) -> Option<u64> {
        match self {
            EngineEvent::TxRequested { tx_id, .. }
            | EngineEvent::TxExecuted { tx_id, .. }
            | EngineEvent::TxCancelled { tx_id, .. }
            | EngineEvent::PaymentExecuted { tx_id, .. } => Some(*tx_id),
            _ => None,
        }
    }
}

/// One journal line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Position in the journal, starting at 1
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub event: EngineEvent,
}
