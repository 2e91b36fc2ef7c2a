//! Calls the engine executes on itself
//!
//! A record whose target is the instance address is not sent to the
//! target invoker. Its call data is decoded here and applied to the
//! engine's own registries, so protected roles and the time lock change
//! through the same time-locked (or meta-approved) workflow as any other
//! guarded action.
//!
//! Arguments are single 32-byte words: addresses left-padded with zeros,
//! integers big-endian.

use secops_core::{operation_types, Address, OperationType, Selector};
use secops_store::ExecutionOptions;

pub const TRANSFER_OWNERSHIP: &str = "transferOwnership(address)";
pub const UPDATE_BROADCASTER: &str = "updateBroadcaster(address)";
pub const UPDATE_RECOVERY: &str = "updateRecoveryAddress(address)";
pub const UPDATE_TIME_LOCK: &str = "updateTimeLockPeriod(uint256)";

const WORD: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalCall {
    TransferOwnership(Address),
    UpdateBroadcaster(Address),
    UpdateRecovery(Address),
    UpdateTimeLockPeriod(u64),
}

impl InternalCall {
    pub fn signature(&self) -> &'static str {
        match self {
            InternalCall::TransferOwnership(_) => TRANSFER_OWNERSHIP,
            InternalCall::UpdateBroadcaster(_) => UPDATE_BROADCASTER,
            InternalCall::UpdateRecovery(_) => UPDATE_RECOVERY,
            InternalCall::UpdateTimeLockPeriod(_) => UPDATE_TIME_LOCK,
        }
    }

    pub fn selector(&self) -> Selector {
        Selector::from_signature(self.signature())
    }

    /// Operation type a record must carry to perform this call
    pub fn operation_type(&self) -> OperationType {
        OperationType::named(match self {
            InternalCall::TransferOwnership(_) => operation_types::OWNERSHIP_UPDATE,
            InternalCall::UpdateBroadcaster(_) => operation_types::BROADCASTER_UPDATE,
            InternalCall::UpdateRecovery(_) => operation_types::RECOVERY_UPDATE,
            InternalCall::UpdateTimeLockPeriod(_) => operation_types::TIMELOCK_UPDATE,
        })
    }

    pub fn execution(&self) -> ExecutionOptions {
        let word = match self {
            InternalCall::TransferOwnership(a)
            | InternalCall::UpdateBroadcaster(a)
            | InternalCall::UpdateRecovery(a) => address_word(a),
            InternalCall::UpdateTimeLockPeriod(secs) => u64_word(*secs),
        };
        ExecutionOptions::standard(self.selector(), word.to_vec())
    }

    pub fn decode(call_data: &[u8]) -> Result<Self, String> {
        if call_data.len() != 4 + WORD {
            return Err(format!(
                "expected {} bytes of call data, got {}",
                4 + WORD,
                call_data.len()
            ));
        }
        let selector = Selector::new([call_data[0], call_data[1], call_data[2], call_data[3]]);
        let word = &call_data[4..];

        if selector == Selector::from_signature(TRANSFER_OWNERSHIP) {
            Ok(InternalCall::TransferOwnership(word_address(word)?))
        } else if selector == Selector::from_signature(UPDATE_BROADCASTER) {
            Ok(InternalCall::UpdateBroadcaster(word_address(word)?))
        } else if selector == Selector::from_signature(UPDATE_RECOVERY) {
            Ok(InternalCall::UpdateRecovery(word_address(word)?))
        } else if selector == Selector::from_signature(UPDATE_TIME_LOCK) {
            Ok(InternalCall::UpdateTimeLockPeriod(word_u64(word)?))
        } else {
            Err(format!("unknown selector {selector}"))
        }
    }
}

pub fn address_word(address: &Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - Address::LEN..].copy_from_slice(address.as_bytes());
    word
}

pub fn u64_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

fn word_address(word: &[u8]) -> Result<Address, String> {
    let (padding, bytes) = word.split_at(WORD - Address::LEN);
    if padding.iter().any(|b| *b != 0) {
        return Err("address argument has dirty padding".to_string());
    }
    Address::from_slice(bytes).map_err(|e| e.to_string())
}

fn word_u64(word: &[u8]) -> Result<u64, String> {
    let (high, low) = word.split_at(WORD - 8);
    if high.iter().any(|b| *b != 0) {
        return Err("integer argument exceeds 64 bits".to_string());
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(low);
    Ok(u64::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        for call in [
            InternalCall::TransferOwnership(Address::from_low_u64(42)),
            InternalCall::UpdateRecovery(Address::from_low_u64(43)),
            InternalCall::UpdateTimeLockPeriod(3_600),
        ] {
            let data = call.execution().payload();
            assert_eq!(InternalCall::decode(&data).unwrap(), call);
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(InternalCall::decode(&[1, 2, 3]).is_err());

        let mut data = InternalCall::UpdateTimeLockPeriod(1).execution().payload();
        data[4] = 1;
        assert!(InternalCall::decode(&data).is_err());

        data[..4].copy_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        assert!(InternalCall::decode(&data).unwrap_err().contains("unknown selector"));
    }

    #[test]
    fn test_operation_types() {
        assert_eq!(
            InternalCall::UpdateBroadcaster(Address::ZERO).operation_type(),
            OperationType::named("BROADCASTER_UPDATE")
        );
    }
}
