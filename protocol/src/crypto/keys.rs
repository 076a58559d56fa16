//! # Key Management
//!
//! Ed25519 keypairs for authorizing ledger transactions.
//!
//! The service holds exactly one secret: the key that signs every contract
//! call it submits. The *caller* account that pays for and sequences a
//! transaction is a separate, public identity; it never needs a key on this
//! side.
//!
//! Key bytes are never logged. `Debug` prints the public half only.

use ed25519_dalek::{
    Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during key operations.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key: expected 32 hex-encoded bytes")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,
}

/// The transaction-signing keypair held by the service.
///
/// Intentionally not `Serialize`: exporting secret material should be an
/// explicit call to [`secret_key_hex`](Self::secret_key_hex).
pub struct LedgerKeypair {
    signing_key: SigningKey,
}

/// Public half of a [`LedgerKeypair`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerPublicKey {
    bytes: [u8; 32],
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSignature {
    bytes: Vec<u8>,
}

impl LedgerKeypair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic keypair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Load a keypair from a hex-encoded 32-byte secret, the format the
    /// `PRIVATE_KEY` setting uses. Surrounding whitespace is ignored.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|_| KeyError::InvalidSecretKey)?;
        let seed: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&seed))
    }

    /// Returns the public key for this keypair.
    pub fn public_key(&self) -> LedgerPublicKey {
        LedgerPublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> LedgerSignature {
        LedgerSignature {
            bytes: self.signing_key.sign(message).to_bytes().to_vec(),
        }
    }

    /// Hex export of the secret seed. Used by `anchorbook-node keygen` only.
    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }
}

impl Clone for LedgerKeypair {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for LedgerKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LedgerKeypair(pub={})", self.public_key().to_hex())
    }
}

impl LedgerPublicKey {
    /// Parse a hex-encoded public key, rejecting bytes that are not a
    /// valid curve point.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str.trim()).map_err(|_| KeyError::InvalidPublicKey)?;
        let bytes: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// The last four bytes of the key. Ledgers use this as a cheap hint to
    /// find which signer produced a signature without trying every key.
    pub fn hint(&self) -> [u8; 4] {
        let mut hint = [0u8; 4];
        hint.copy_from_slice(&self.bytes[28..]);
        hint
    }

    /// Verify `signature` over `message`. Malformed signatures verify as `false`.
    pub fn verify(&self, message: &[u8], signature: &LedgerSignature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let Ok(sig_bytes) = <[u8; 64]>::try_from(signature.bytes.as_slice()) else {
            return false;
        };
        verifying_key
            .verify(message, &DalekSignature::from_bytes(&sig_bytes))
            .is_ok()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl fmt::Debug for LedgerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LedgerPublicKey({})", self.to_hex())
    }
}

impl fmt::Display for LedgerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl LedgerSignature {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Debug for LedgerSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LedgerSignature({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let kp = LedgerKeypair::generate();
        let sig = kp.sign(b"create_customer");
        assert!(kp.public_key().verify(b"create_customer", &sig));
        assert!(!kp.public_key().verify(b"update_customer", &sig));
    }

    #[test]
    fn hex_round_trip_preserves_identity() {
        let kp = LedgerKeypair::generate();
        let restored = LedgerKeypair::from_hex(&kp.secret_key_hex()).unwrap();
        assert_eq!(kp.public_key(), restored.public_key());
    }

    #[test]
    fn from_hex_rejects_bad_input() {
        assert!(LedgerKeypair::from_hex("not hex").is_err());
        assert!(LedgerKeypair::from_hex("abcd").is_err());
        assert!(LedgerKeypair::from_hex(&"00".repeat(33)).is_err());
    }

    #[test]
    fn from_hex_tolerates_trailing_newline() {
        let kp = LedgerKeypair::from_seed(&[7u8; 32]);
        let with_newline = format!("{}\n", kp.secret_key_hex());
        assert_eq!(
            LedgerKeypair::from_hex(&with_newline).unwrap().public_key(),
            kp.public_key()
        );
    }

    #[test]
    fn debug_never_prints_secret() {
        let kp = LedgerKeypair::from_seed(&[9u8; 32]);
        let dbg = format!("{:?}", kp);
        assert!(!dbg.contains(&kp.secret_key_hex()));
        assert!(dbg.contains(&kp.public_key().to_hex()));
    }

    #[test]
    fn hint_is_key_suffix() {
        let kp = LedgerKeypair::from_seed(&[1u8; 32]);
        let pk = kp.public_key();
        assert_eq!(&pk.hint()[..], &pk.as_bytes()[28..]);
    }

    #[test]
    fn truncated_signature_fails_verification() {
        let kp = LedgerKeypair::generate();
        let sig = kp.sign(b"msg");
        let truncated = LedgerSignature::from_bytes(sig.as_bytes()[..63].to_vec());
        assert!(!kp.public_key().verify(b"msg", &truncated));
    }

    #[test]
    fn public_key_hex_round_trip() {
        let pk = LedgerKeypair::generate().public_key();
        assert_eq!(LedgerPublicKey::from_hex(&pk.to_hex()).unwrap(), pk);
    }
}
