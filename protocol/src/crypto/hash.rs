//! # Hashing Utilities
//!
//! SHA-256 is the only digest Anchorbook uses. Content hashes of customer
//! records, network ids and transaction hashes are all SHA-256, because the
//! ledger we anchor on speaks SHA-256 and a second hash function would only
//! add ways to compare the wrong digests.

use sha2::{Digest, Sha256};

/// Length of a SHA-256 digest in bytes.
pub const DIGEST_LENGTH: usize = 32;

/// Length of a hex-encoded SHA-256 digest.
pub const HEX_DIGEST_LENGTH: usize = DIGEST_LENGTH * 2;

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use anchorbook_protocol::crypto::sha256;
///
/// let hash = sha256(b"anchorbook");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; DIGEST_LENGTH] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 over several byte slices, as if they were concatenated.
///
/// Avoids building a temporary buffer when the parts already live in
/// separate allocations (e.g. network id + transaction body).
pub fn sha256_multi(parts: &[&[u8]]) -> [u8; DIGEST_LENGTH] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Lowercase hex SHA-256 of the input. This is the form content hashes take
/// in the record store, on the ledger, and in API responses.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Returns `true` if `s` looks like a hex SHA-256 digest (64 lowercase hex chars).
pub fn is_hex_digest(s: &str) -> bool {
    s.len() == HEX_DIGEST_LENGTH
        && s.bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
