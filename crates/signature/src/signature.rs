//! Signature recovery and signing
//!
//! The state machine only sees the [`CryptoProvider`] trait; the curve and
//! address derivation live behind it. [`Secp256k1Provider`] is the default:
//! 65-byte `r || s || v` signatures, low-s only, addresses taken from the
//! last 20 bytes of `SHA-256(uncompressed public key)`.

use crate::error::SignatureError;
use crate::hash::signed_message_hash;
use secops_core::{Address, Bytes32};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId, Signature};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

/// Length of a serialized signature: r (32) || s (32) || v (1)
pub const SIGNATURE_LEN: usize = 65;

/// Pluggable signature scheme
pub trait CryptoProvider: Send + Sync {
    /// Recover the identity that signed `digest`
    ///
    /// `digest` is the raw meta-transaction digest; the provider applies
    /// its own signed-message prefix.
    fn recover(&self, digest: &Bytes32, signature: &[u8]) -> Result<Address, SignatureError>;
}

/// Anything that can produce signatures a [`CryptoProvider`] accepts
pub trait Signer: Send + Sync {
    fn address(&self) -> Address;

    fn sign_digest(&self, digest: &Bytes32) -> Vec<u8>;
}

/// secp256k1 ECDSA with public-key recovery
pub struct Secp256k1Provider {
    secp: Secp256k1<secp256k1::All>,
}

impl Secp256k1Provider {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }
}

impl Default for Secp256k1Provider {
    fn default() -> Self {
        Self::new()
    }
}

impl CryptoProvider for Secp256k1Provider {
    fn recover(&self, digest: &Bytes32, signature: &[u8]) -> Result<Address, SignatureError> {
        if signature.len() != SIGNATURE_LEN {
            return Err(SignatureError::BadSignatureLength(signature.len()));
        }

        let compact = &signature[..64];
        let recovery_id = match signature[64] {
            v @ 0..=1 => v,
            v @ 27..=28 => v - 27,
            v => {
                return Err(SignatureError::InvalidSignature(format!(
                    "Invalid recovery id: {v}"
                )))
            }
        };

        // Reject the high-s twin of every valid signature
        let plain = Signature::from_compact(compact)
            .map_err(|e| SignatureError::InvalidSignature(format!("Malformed signature: {e}")))?;
        let mut normalized = plain;
        normalized.normalize_s();
        if normalized != plain {
            return Err(SignatureError::InvalidSignature(
                "Non-canonical (high-s) signature".to_string(),
            ));
        }

        let recid = RecoveryId::from_i32(i32::from(recovery_id))
            .map_err(|e| SignatureError::InvalidSignature(format!("Invalid recovery id: {e}")))?;
        let recoverable = RecoverableSignature::from_compact(compact, recid)
            .map_err(|e| SignatureError::InvalidSignature(format!("Malformed signature: {e}")))?;

        let message = Message::from_digest(*signed_message_hash(digest).as_bytes());
        let public_key = self
            .secp
            .recover_ecdsa(&message, &recoverable)
            .map_err(|e| SignatureError::InvalidSignature(format!("Recovery failed: {e}")))?;

        Ok(address_of(&public_key))
    }
}

/// Address of a public key
pub fn address_of(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.serialize_uncompressed();
    let hash = Sha256::digest(&uncompressed[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&hash[12..]);
    Address::new(out)
}

/// Signer holding a secp256k1 secret key in memory
pub struct LocalSigner {
    secp: Secp256k1<secp256k1::All>,
    secret_key: SecretKey,
    address: Address,
}

impl LocalSigner {
    /// Create from a 32-byte secret key (hex-encoded, optional `0x`)
    pub fn from_hex(hex_key: &str) -> Result<Self, SignatureError> {
        let stripped = hex_key.trim().strip_prefix("0x").unwrap_or(hex_key.trim());
        let bytes = hex::decode(stripped)
            .map_err(|e| SignatureError::InvalidKey(format!("Invalid key hex: {e}")))?;
        let secret_key = SecretKey::from_slice(&bytes)
            .map_err(|e| SignatureError::InvalidKey(format!("Invalid secret key: {e}")))?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// Generate a new random signing key
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self::from_secret_key(SecretKey::new(&mut rng))
    }

    fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let address = address_of(&PublicKey::from_secret_key(&secp, &secret_key));
        Self {
            secp,
            secret_key,
            address,
        }
    }

    /// Export the secret key as hex (for storage)
    pub fn secret_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }
}

impl Signer for LocalSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_digest(&self, digest: &Bytes32) -> Vec<u8> {
        let message = Message::from_digest(*signed_message_hash(digest).as_bytes());
        let signature = self.secp.sign_ecdsa_recoverable(&message, &self.secret_key);
        let (recid, compact) = signature.serialize_compact();

        let mut out = Vec::with_capacity(SIGNATURE_LEN);
        out.extend_from_slice(&compact);
        out.push(recid.to_i32() as u8 + 27);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Order of the secp256k1 group
    const CURVE_ORDER: [u8; 32] = [
        0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
        0xfe, 0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b, 0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36,
        0x41, 0x41,
    ];

    fn digest() -> Bytes32 {
        Bytes32::digest(b"approve tx 1")
    }

    /// s' = n - s, flipping the recovery parity
    fn high_s_twin(sig: &[u8]) -> Vec<u8> {
        let mut out = sig.to_vec();
        let mut borrow = 0i16;
        for i in (0..32).rev() {
            let diff = CURVE_ORDER[i] as i16 - sig[32 + i] as i16 - borrow;
            if diff < 0 {
                out[32 + i] = (diff + 256) as u8;
                borrow = 1;
            } else {
                out[32 + i] = diff as u8;
                borrow = 0;
            }
        }
        out[64] = if sig[64] == 27 { 28 } else { 27 };
        out
    }

    #[test]
    fn test_sign_and_recover() {
        let signer = LocalSigner::generate();
        let provider = Secp256k1Provider::new();

        let sig = signer.sign_digest(&digest());
        assert_eq!(sig.len(), SIGNATURE_LEN);
        assert_eq!(provider.recover(&digest(), &sig).unwrap(), signer.address());
    }

    #[test]
    fn test_recover_other_digest_yields_other_address() {
        let signer = LocalSigner::generate();
        let provider = Secp256k1Provider::new();

        let sig = signer.sign_digest(&digest());
        let other = Bytes32::digest(b"approve tx 2");
        let recovered = provider.recover(&other, &sig);
        assert!(recovered.map(|a| a != signer.address()).unwrap_or(true));
    }

    #[test]
    fn test_secret_hex_roundtrip() {
        let signer = LocalSigner::generate();
        let restored = LocalSigner::from_hex(&signer.secret_hex()).unwrap();
        assert_eq!(signer.address(), restored.address());

        let prefixed = LocalSigner::from_hex(&format!("0x{}", signer.secret_hex())).unwrap();
        assert_eq!(signer.address(), prefixed.address());
    }

    #[test]
    fn test_bad_length() {
        let provider = Secp256k1Provider::new();
        assert_eq!(
            provider.recover(&digest(), &[0u8; 64]),
            Err(SignatureError::BadSignatureLength(64))
        );
    }

    #[test]
    fn test_bad_recovery_byte() {
        let signer = LocalSigner::generate();
        let mut sig = signer.sign_digest(&digest());
        sig[64] = 5;
        assert!(matches!(
            Secp256k1Provider::new().recover(&digest(), &sig),
            Err(SignatureError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_high_s_rejected() {
        let signer = LocalSigner::generate();
        let sig = signer.sign_digest(&digest());
        let twin = high_s_twin(&sig);

        assert!(matches!(
            Secp256k1Provider::new().recover(&digest(), &twin),
            Err(SignatureError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_raw_recovery_byte_accepted() {
        let signer = LocalSigner::generate();
        let mut sig = signer.sign_digest(&digest());
        sig[64] -= 27;
        assert_eq!(
            Secp256k1Provider::new().recover(&digest(), &sig).unwrap(),
            signer.address()
        );
    }

    #[test]
    fn test_invalid_key_hex() {
        assert!(matches!(
            LocalSigner::from_hex("not-hex"),
            Err(SignatureError::InvalidKey(_))
        ));
        assert!(matches!(
            LocalSigner::from_hex(&"00".repeat(32)),
            Err(SignatureError::InvalidKey(_))
        ));
    }
}
