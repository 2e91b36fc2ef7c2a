//! SecOps Signature - Meta-transaction authorization
//!
//! Everything needed to authorize an operation off-band:
//!
//! # Key Types
//! - `MetaTxParams`: authorization context a signature commits to
//! - `MetaTransaction`: record + context + signature, submitted by a relayer
//! - `CryptoProvider`: pluggable signer recovery (secp256k1 by default)
//! - `LocalSigner`: in-memory secp256k1 key for tools and tests
//! - `verify_signature`: the ordered authorization checks

pub mod envelope;
pub mod error;
pub mod hash;
pub mod signature;
pub mod validation;

pub use envelope::{MetaTransaction, MetaTxParams};
pub use error::SignatureError;
pub use hash::{meta_tx_digest, signed_message_hash};
pub use signature::{address_of, CryptoProvider, LocalSigner, Secp256k1Provider, Signer, SIGNATURE_LEN};
pub use validation::{verify_signature, AuthorizationContext};
