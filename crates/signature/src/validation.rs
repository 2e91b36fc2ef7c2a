//! Meta-transaction authorization
//!
//! Checks run in a fixed order and the first failure wins, so callers see
//! the cheapest structural error before any curve operation happens.

use crate::envelope::MetaTransaction;
use crate::error::SignatureError;
use crate::signature::CryptoProvider;
use chrono::{DateTime, Utc};
use secops_access::{OperationCatalog, RoleRegistry};
use secops_core::{Address, Selector};

/// Engine-side facts an envelope is checked against
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationContext {
    pub chain_id: u64,
    /// Address of the engine instance processing the envelope
    pub handler_address: Address,
    /// Selector of the entry point receiving the envelope
    pub handler_selector: Selector,
    pub nonce: u64,
    pub now: DateTime<Utc>,
    /// Current host fee rate
    pub fee_rate: u128,
}

/// Validate an envelope and return the recovered signer
pub fn verify_signature(
    envelope: &MetaTransaction,
    ctx: &AuthorizationContext,
    catalog: &OperationCatalog,
    roles: &RoleRegistry,
    provider: &dyn CryptoProvider,
) -> Result<Address, SignatureError> {
    let params = &envelope.params;

    if !catalog.is_supported(&envelope.record.operation_type) {
        return Err(SignatureError::UnsupportedOperationType(
            envelope.record.operation_type,
        ));
    }

    if envelope.signature.len() != crate::signature::SIGNATURE_LEN {
        return Err(SignatureError::BadSignatureLength(envelope.signature.len()));
    }

    if params.chain_id != ctx.chain_id {
        return Err(SignatureError::ChainMismatch {
            expected: ctx.chain_id,
            actual: params.chain_id,
        });
    }

    if params.handler_address != ctx.handler_address {
        return Err(SignatureError::HandlerMismatch {
            expected: ctx.handler_address,
            actual: params.handler_address,
        });
    }

    if params.handler_selector != ctx.handler_selector {
        return Err(SignatureError::SelectorMismatch {
            expected: ctx.handler_selector,
            actual: params.handler_selector,
        });
    }

    if params.nonce != ctx.nonce {
        return Err(SignatureError::NonceMismatch {
            expected: ctx.nonce,
            actual: params.nonce,
        });
    }

    if ctx.now > params.deadline {
        return Err(SignatureError::Expired {
            deadline: params.deadline,
            now: ctx.now,
        });
    }

    if params.max_fee_ceiling != 0 && ctx.fee_rate > params.max_fee_ceiling {
        return Err(SignatureError::FeeCeilingExceeded {
            ceiling: params.max_fee_ceiling,
            fee_rate: ctx.fee_rate,
        });
    }

    let recovered = provider.recover(&envelope.digest(), &envelope.signature)?;
    if recovered.is_zero() || recovered != params.signer {
        tracing::warn!(%recovered, claimed = %params.signer, "Signature does not match claimed signer");
        return Err(SignatureError::InvalidSignature(format!(
            "Recovered {recovered}, claimed {}",
            params.signer
        )));
    }

    if !roles.can_sign(&recovered) {
        tracing::warn!(signer = %recovered, "Signer not authorized");
        return Err(SignatureError::SignerNotAuthorized(recovered));
    }

    tracing::debug!(signer = %recovered, nonce = params.nonce, "Meta-transaction authorized");
    Ok(recovered)
}
