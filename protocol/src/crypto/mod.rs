//! # Cryptographic Primitives
//!
//! Thin wrappers around `sha2` and `ed25519-dalek`. Content hashes and
//! transaction hashes come from [`hash`]; the transaction-signing identity
//! lives in [`keys`].

pub mod hash;
pub mod keys;

pub use hash::{is_hex_digest, sha256, sha256_hex, sha256_multi};
pub use keys::{KeyError, LedgerKeypair, LedgerPublicKey, LedgerSignature};
