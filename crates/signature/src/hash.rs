//! Domain-separated digests for meta-transactions
//!
//! Every identifying field of the record and every envelope field is fed
//! into one SHA-256 in a fixed order and fixed width. Variable-length data
//! (the execution payload) enters as its own digest, so no two distinct
//! field assignments share an encoding.

use crate::envelope::MetaTxParams;
use secops_core::Bytes32;
use secops_store::TxRecord;
use sha2::{Digest, Sha256};

/// Domain tag prepended to every meta-transaction digest
pub const DOMAIN_TAG: &[u8] = b"secops.meta-tx.v1";

/// Prefix applied before signing, mirroring personal-message signing
pub const SIGNED_MESSAGE_PREFIX: &[u8] = b"\x19secops signed message:\n32";

/// Digest binding a record and its authorization context
pub fn meta_tx_digest(record: &TxRecord, params: &MetaTxParams) -> Bytes32 {
    let mut hasher = Sha256::new();
    hasher.update(DOMAIN_TAG);

    // Record
    hasher.update(record.tx_id.to_be_bytes());
    hasher.update(record.requester.as_bytes());
    hasher.update(record.target.as_bytes());
    hasher.update(record.operation_type.as_bytes());
    hasher.update([record.execution.kind().as_u8()]);
    hasher.update(record.execution.payload_digest().as_bytes());
    hasher.update(record.value.to_be_bytes());
    hasher.update(record.gas_limit.to_be_bytes());

    match &record.payment {
        Some(payment) => {
            hasher.update([1u8]);
            hasher.update(payment.recipient.as_bytes());
            hasher.update(payment.native_amount.to_be_bytes());
            hasher.update(payment.token_address.as_bytes());
            hasher.update(payment.token_amount.to_be_bytes());
        }
        None => hasher.update([0u8]),
    }

    // Envelope
    hasher.update(params.chain_id.to_be_bytes());
    hasher.update(params.handler_address.as_bytes());
    hasher.update(params.handler_selector.as_bytes());
    hasher.update(params.nonce.to_be_bytes());
    hasher.update(params.deadline.timestamp().to_be_bytes());
    hasher.update(params.deadline.timestamp_subsec_nanos().to_be_bytes());
    hasher.update(params.max_fee_ceiling.to_be_bytes());

    finalize(hasher)
}

/// The message actually signed: `SHA-256(prefix || digest)`
pub fn signed_message_hash(digest: &Bytes32) -> Bytes32 {
    let mut hasher = Sha256::new();
    hasher.update(SIGNED_MESSAGE_PREFIX);
    hasher.update(digest.as_bytes());
    finalize(hasher)
}

fn finalize(hasher: Sha256) -> Bytes32 {
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    Bytes32::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use secops_core::{Address, OperationType, Selector};
    use secops_store::{ExecutionOptions, PaymentDetails};

    fn record() -> TxRecord {
        TxRecord::pending(
            7,
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            Address::from_low_u64(1),
            Address::from_low_u64(0xbeef),
            OperationType::named("OWNERSHIP_UPDATE"),
            ExecutionOptions::standard(Selector::from_signature("transferOwnership(address)"), vec![1; 32]),
            0,
            100_000,
        )
    }

    fn params() -> MetaTxParams {
        MetaTxParams {
            chain_id: 1,
            handler_address: Address::from_low_u64(0x100),
            handler_selector: Selector::from_signature("txApprovalWithMetaTx"),
            nonce: 0,
            deadline: Utc.timestamp_opt(1_800_000_000, 0).unwrap(),
            max_fee_ceiling: 0,
            signer: Address::from_low_u64(1),
        }
    }

    #[test]
    fn test_digest_deterministic() {
        assert_eq!(meta_tx_digest(&record(), &params()), meta_tx_digest(&record(), &params()));
    }

    #[test]
    fn test_every_record_field_bound() {
        let base = meta_tx_digest(&record(), &params());

        let mutations: Vec<Box<dyn Fn(&mut TxRecord)>> = vec![
            Box::new(|r| r.tx_id += 1),
            Box::new(|r| r.requester = Address::from_low_u64(2)),
            Box::new(|r| r.target = Address::from_low_u64(3)),
            Box::new(|r| r.operation_type = OperationType::named("TIMELOCK_UPDATE")),
            Box::new(|r| r.execution = ExecutionOptions::raw(r.execution.payload())),
            Box::new(|r| r.execution = ExecutionOptions::standard(Selector::ZERO, vec![1; 32])),
            Box::new(|r| r.value = 1),
            Box::new(|r| r.gas_limit = 1),
            Box::new(|r| r.payment = Some(PaymentDetails::native(Address::from_low_u64(9), 1))),
        ];

        for mutate in mutations {
            let mut changed = record();
            mutate(&mut changed);
            assert_ne!(meta_tx_digest(&changed, &params()), base);
        }
    }

    #[test]
    fn test_every_envelope_field_bound() {
        let base = meta_tx_digest(&record(), &params());

        let mutations: Vec<Box<dyn Fn(&mut MetaTxParams)>> = vec![
            Box::new(|p| p.chain_id = 2),
            Box::new(|p| p.handler_address = Address::from_low_u64(0x101)),
            Box::new(|p| p.handler_selector = Selector::ZERO),
            Box::new(|p| p.nonce = 1),
            Box::new(|p| p.deadline = Utc.timestamp_opt(1_800_000_001, 0).unwrap()),
            Box::new(|p| p.max_fee_ceiling = 1),
        ];

        for mutate in mutations {
            let mut changed = params();
            mutate(&mut changed);
            assert_ne!(meta_tx_digest(&record(), &changed), base);
        }
    }

    #[test]
    fn test_sub_second_deadline_bound() {
        let base = meta_tx_digest(&record(), &params());

        let mut changed = params();
        changed.deadline += Duration::milliseconds(1);
        assert_ne!(meta_tx_digest(&record(), &changed), base);

        let mut changed = params();
        changed.deadline += Duration::nanoseconds(1);
        assert_ne!(meta_tx_digest(&record(), &changed), base);
    }

    #[test]
    fn test_engine_fields_not_bound() {
        let base = meta_tx_digest(&record(), &params());
        let mut changed = record();
        changed.release_time = Utc.timestamp_opt(1, 0).unwrap();
        changed.result = vec![1, 2, 3];
        assert_eq!(meta_tx_digest(&changed, &params()), base);
    }

    #[test]
    fn test_signed_message_differs_from_digest() {
        let digest = meta_tx_digest(&record(), &params());
        assert_ne!(signed_message_hash(&digest), digest);
    }
}
