//! Meta-authorization envelope
//!
//! A signed, single-use wrapper around a transaction record. The envelope
//! travels from the signer to the relayer (broadcaster), which submits it
//! to the engine; it is never persisted.

use crate::hash::meta_tx_digest;
use crate::signature::Signer;
use chrono::{DateTime, Utc};
use secops_core::{Address, Bytes32, Selector};
use secops_store::TxRecord;
use serde::{Deserialize, Serialize};

/// Authorization context a signature commits to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaTxParams {
    /// Chain (deployment) the authorization is valid on
    pub chain_id: u64,

    /// Engine instance expected to process the envelope
    pub handler_address: Address,

    /// Entry point the envelope is meant for
    pub handler_selector: Selector,

    /// Protocol-wide nonce at signing time
    pub nonce: u64,

    pub deadline: DateTime<Utc>,

    /// Upper bound on the host fee rate, 0 for no bound
    pub max_fee_ceiling: u128,

    /// Identity claimed to have signed
    pub signer: Address,
}

/// Record + context + signature, as submitted by a relayer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaTransaction {
    pub record: TxRecord,

    pub params: MetaTxParams,

    /// Digest the signature covers
    pub message: Bytes32,

    /// 65-byte `r || s || v`, empty while unsigned
    #[serde(with = "secops_core::serde_hex")]
    pub signature: Vec<u8>,

    /// Call data the target will receive
    #[serde(with = "secops_core::serde_hex")]
    pub data: Vec<u8>,
}

impl MetaTransaction {
    /// Unsigned envelope ready to be handed to an external signer
    pub fn unsigned(record: TxRecord, params: MetaTxParams) -> Self {
        let message = meta_tx_digest(&record, &params);
        let data = record.execution.payload();
        Self {
            record,
            params,
            message,
            signature: Vec::new(),
            data,
        }
    }

    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }

    /// Recompute the digest from the embedded fields
    pub fn digest(&self) -> Bytes32 {
        meta_tx_digest(&self.record, &self.params)
    }

    /// Sign with a local key
    ///
    /// The claimed signer is set to the key's address before hashing.
    pub fn sign_with(mut self, signer: &dyn Signer) -> Self {
        self.params.signer = signer.address();
        self.message = self.digest();
        self.signature = signer.sign_digest(&self.message);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{CryptoProvider, LocalSigner, Secp256k1Provider};
    use chrono::TimeZone;
    use secops_core::OperationType;
    use secops_store::ExecutionOptions;

    fn envelope() -> MetaTransaction {
        let record = TxRecord::pending(
            1,
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            Address::from_low_u64(1),
            Address::from_low_u64(0xbeef),
            OperationType::named("OWNERSHIP_UPDATE"),
            ExecutionOptions::raw(vec![0xaa, 0xbb]),
            0,
            50_000,
        );
        let params = MetaTxParams {
            chain_id: 1,
            handler_address: Address::from_low_u64(0x100),
            handler_selector: Selector::from_signature("txApprovalWithMetaTx"),
            nonce: 0,
            deadline: Utc.timestamp_opt(1_800_000_000, 0).unwrap(),
            max_fee_ceiling: 0,
            signer: Address::ZERO,
        };
        MetaTransaction::unsigned(record, params)
    }

    #[test]
    fn test_unsigned_envelope() {
        let env = envelope();
        assert!(!env.is_signed());
        assert_eq!(env.data, vec![0xaa, 0xbb]);
        assert_eq!(env.message, env.digest());
    }

    #[test]
    fn test_sign_with_sets_signer() {
        let key = LocalSigner::generate();
        let env = envelope().sign_with(&key);

        assert!(env.is_signed());
        assert_eq!(env.params.signer, key.address());
        let recovered = Secp256k1Provider::new().recover(&env.digest(), &env.signature).unwrap();
        assert_eq!(recovered, key.address());
    }

    #[test]
    fn test_json_roundtrip_preserves_signature() {
        let env = envelope().sign_with(&LocalSigner::generate());
        let json = serde_json::to_string(&env).unwrap();
        let back: MetaTransaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, env);
    }
}
