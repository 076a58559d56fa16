//! Contract-invocation transactions.
//!
//! A [`LedgerTransaction`] carries exactly one operation: invoke `function`
//! on `contract` with `args`. It is built unsigned by
//! [`TransactionBuilder`], has its resource fee filled in by simulation,
//! and is then signed by the source account.
//!
//! # Hash
//!
//! ```text
//! hash = sha256( sha256(network_passphrase) || signable_bytes )
//! ```
//!
//! Mixing in the passphrase means a signature produced for one network is
//! worthless on every other network. Signatures are excluded from
//! `signable_bytes`, so the hash is stable across signing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::LedgerError;
use super::value::{write_len_prefixed, ScVal};
use crate::crypto::{sha256, sha256_multi, LedgerKeypair, LedgerPublicKey, LedgerSignature};

/// Envelope format version, bumped on any change to `signable_bytes`.
pub const ENVELOPE_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Envelope Types
// ---------------------------------------------------------------------------

/// A ledger account as reported by the RPC endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Hex-encoded ed25519 public key.
    pub account_id: String,
    /// Sequence number of the last transaction the account submitted.
    pub sequence: u64,
}

/// The single operation of an invocation transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeContract {
    pub contract: String,
    pub function: String,
    pub args: Vec<ScVal>,
}

/// Inclusive validity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBounds {
    pub min_time: DateTime<Utc>,
    pub max_time: DateTime<Utc>,
}

impl TimeBounds {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.min_time <= at && at <= self.max_time
    }
}

/// A signature plus the last four bytes of the signer's public key, so the
/// ledger can match signatures to keys without trying each one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoratedSignature {
    pub hint: [u8; 4],
    pub signature: LedgerSignature,
}

/// A contract-invocation transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub source_account: String,
    pub sequence: u64,
    /// Inclusion fee, in stroops.
    pub fee: u32,
    /// Resource fee resolved by simulation. `None` until prepared.
    pub resource_fee: Option<u32>,
    pub time_bounds: TimeBounds,
    pub operation: InvokeContract,
    pub signatures: Vec<DecoratedSignature>,
}

impl LedgerTransaction {
    /// Canonical bytes covered by signatures.
    ///
    /// Fixed-width big-endian integers, length-prefixed strings, and the
    /// canonical [`ScVal`] encoding for arguments. `signatures` are
    /// excluded.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);

        buf.push(ENVELOPE_VERSION);
        write_len_prefixed(&mut buf, self.source_account.as_bytes());
        buf.extend_from_slice(&self.sequence.to_be_bytes());
        buf.extend_from_slice(&self.fee.to_be_bytes());

        match self.resource_fee {
            Some(fee) => {
                buf.push(0x01);
                buf.extend_from_slice(&fee.to_be_bytes());
            }
            None => buf.push(0x00),
        }

        buf.extend_from_slice(&self.time_bounds.min_time.timestamp().to_be_bytes());
        buf.extend_from_slice(&self.time_bounds.max_time.timestamp().to_be_bytes());

        write_len_prefixed(&mut buf, self.operation.contract.as_bytes());
        write_len_prefixed(&mut buf, self.operation.function.as_bytes());
        buf.extend_from_slice(&(self.operation.args.len() as u32).to_be_bytes());
        for arg in &self.operation.args {
            arg.write_canonical(&mut buf);
        }

        buf
    }

    /// Network-scoped transaction hash.
    pub fn hash(&self, network_passphrase: &str) -> [u8; 32] {
        let network_id = sha256(network_passphrase.as_bytes());
        sha256_multi(&[&network_id, &self.signable_bytes()])
    }

    /// Lowercase hex form of [`LedgerTransaction::hash`], the identifier
    /// used by `sendTransaction` and `getTransaction`.
    pub fn hash_hex(&self, network_passphrase: &str) -> String {
        hex::encode(self.hash(network_passphrase))
    }

    /// Total fee the source account is charged.
    pub fn total_fee(&self) -> u64 {
        u64::from(self.fee) + u64::from(self.resource_fee.unwrap_or(0))
    }

    pub fn is_prepared(&self) -> bool {
        self.resource_fee.is_some()
    }

    pub fn is_signed(&self) -> bool {
        !self.signatures.is_empty()
    }

    /// Record the simulated resource fee. Any existing signature covers the
    /// old fee and is dropped.
    pub fn prepare(&mut self, resource_fee: u32) {
        self.resource_fee = Some(resource_fee);
        self.signatures.clear();
    }

    /// Sign the transaction for the given network and append the signature.
    pub fn sign(&mut self, keypair: &LedgerKeypair, network_passphrase: &str) {
        let hash = self.hash(network_passphrase);
        let signature = keypair.sign(&hash);
        self.signatures.push(DecoratedSignature {
            hint: keypair.public_key().hint(),
            signature,
        });
    }

    /// `true` if some attached signature was produced by `key` over this
    /// transaction on the given network.
    pub fn is_signed_by(&self, key: &LedgerPublicKey, network_passphrase: &str) -> bool {
        let hash = self.hash(network_passphrase);
        let hint = key.hint();
        self.signatures
            .iter()
            .filter(|s| s.hint == hint)
            .any(|s| key.verify(&hash, &s.signature))
    }
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for unsigned invocation transactions.
///
/// ```rust,no_run
/// use anchorbook_protocol::ledger::{Account, ScVal, TransactionBuilder};
///
/// let account = Account { account_id: "ab12...".into(), sequence: 41 };
/// let tx = TransactionBuilder::new(&account, 100)
///     .invoke("CCONTRACT", "create_customer", vec![ScVal::string("id"), ScVal::string("hash")])
///     .build()
///     .unwrap();
/// assert_eq!(tx.sequence, 42);
/// ```
pub struct TransactionBuilder {
    source_account: String,
    sequence: u64,
    fee: u32,
    timeout: Duration,
    now: Option<DateTime<Utc>>,
    operation: Option<InvokeContract>,
}

impl TransactionBuilder {
    /// Start a transaction from `account`, consuming its next sequence
    /// number.
    pub fn new(account: &Account, base_fee: u32) -> Self {
        Self {
            source_account: account.account_id.clone(),
            sequence: account.sequence.saturating_add(1),
            fee: base_fee,
            timeout: crate::config::TX_VALIDITY_WINDOW,
            now: None,
            operation: None,
        }
    }

    pub fn invoke(mut self, contract: &str, function: &str, args: Vec<ScVal>) -> Self {
        self.operation = Some(InvokeContract {
            contract: contract.to_string(),
            function: function.to_string(),
            args,
        });
        self
    }

    /// Validity window measured from build time.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Pin the build time. Defaults to the current UTC time.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn build(self) -> Result<LedgerTransaction, LedgerError> {
        let operation = self
            .operation
            .ok_or_else(|| LedgerError::Build("no operation set".into()))?;
        if operation.contract.is_empty() {
            return Err(LedgerError::Build("contract address is empty".into()));
        }
        if operation.function.is_empty() {
            return Err(LedgerError::Build("function name is empty".into()));
        }

        let now = self.now.unwrap_or_else(Utc::now);
        let timeout = chrono::Duration::from_std(self.timeout)
            .map_err(|e| LedgerError::Build(format!("invalid timeout: {}", e)))?;

        Ok(LedgerTransaction {
            source_account: self.source_account,
            sequence: self.sequence,
            fee: self.fee,
            resource_fee: None,
            time_bounds: TimeBounds {
                min_time: now,
                max_time: now + timeout,
            },
            operation,
            signatures: Vec::new(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{STANDALONE_PASSPHRASE, TESTNET_PASSPHRASE};

    fn account() -> Account {
        Account {
            account_id: "aa".repeat(32),
            sequence: 41,
        }
    }

    fn sample_tx() -> LedgerTransaction {
        TransactionBuilder::new(&account(), 100)
            .invoke(
                "CREGISTRY",
                "create_customer",
                vec![ScVal::string("id-1"), ScVal::string("ff".repeat(32))],
            )
            .at(DateTime::from_timestamp(1_700_000_000, 0).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn builder_consumes_next_sequence() {
        let tx = sample_tx();
        assert_eq!(tx.sequence, 42);
        assert_eq!(tx.fee, 100);
        assert!(!tx.is_prepared());
        assert!(!tx.is_signed());
        assert_eq!(
            (tx.time_bounds.max_time - tx.time_bounds.min_time).num_seconds(),
            30
        );
    }

    #[test]
    fn builder_requires_operation() {
        let err = TransactionBuilder::new(&account(), 100).build().unwrap_err();
        assert!(matches!(err, LedgerError::Build(_)));
    }

    #[test]
    fn builder_rejects_empty_contract() {
        let err = TransactionBuilder::new(&account(), 100)
            .invoke("", "f", vec![])
            .build()
            .unwrap_err();
        assert!(matches!(err, LedgerError::Build(_)));
    }

    #[test]
    fn hash_is_network_scoped() {
        let tx = sample_tx();
        assert_ne!(tx.hash(TESTNET_PASSPHRASE), tx.hash(STANDALONE_PASSPHRASE));
        assert_eq!(tx.hash_hex(TESTNET_PASSPHRASE).len(), 64);
    }

    #[test]
    fn hash_is_stable_across_signing() {
        let mut tx = sample_tx();
        let before = tx.hash(TESTNET_PASSPHRASE);
        tx.sign(&LedgerKeypair::generate(), TESTNET_PASSPHRASE);
        assert_eq!(tx.hash(TESTNET_PASSPHRASE), before);
    }

    #[test]
    fn hash_covers_arguments() {
        let a = sample_tx();
        let mut b = sample_tx();
        b.operation.args[1] = ScVal::string("00".repeat(32));
        assert_ne!(a.hash(TESTNET_PASSPHRASE), b.hash(TESTNET_PASSPHRASE));
    }

    #[test]
    fn signature_verifies_for_signer_only() {
        let kp = LedgerKeypair::generate();
        let other = LedgerKeypair::generate();
        let mut tx = sample_tx();
        tx.prepare(250);
        tx.sign(&kp, TESTNET_PASSPHRASE);

        assert!(tx.is_signed_by(&kp.public_key(), TESTNET_PASSPHRASE));
        assert!(!tx.is_signed_by(&other.public_key(), TESTNET_PASSPHRASE));
        assert!(!tx.is_signed_by(&kp.public_key(), STANDALONE_PASSPHRASE));
    }

    #[test]
    fn tampering_after_signing_invalidates_signature() {
        let kp = LedgerKeypair::generate();
        let mut tx = sample_tx();
        tx.prepare(250);
        tx.sign(&kp, TESTNET_PASSPHRASE);

        tx.operation.function = "update_customer".into();
        assert!(!tx.is_signed_by(&kp.public_key(), TESTNET_PASSPHRASE));
    }

    #[test]
    fn prepare_sets_fee_and_drops_stale_signatures() {
        let kp = LedgerKeypair::generate();
        let mut tx = sample_tx();
        tx.sign(&kp, TESTNET_PASSPHRASE);
        tx.prepare(900);

        assert!(tx.is_prepared());
        assert!(!tx.is_signed());
        assert_eq!(tx.total_fee(), 1000);
    }

    #[test]
    fn time_bounds_contains() {
        let tx = sample_tx();
        let tb = tx.time_bounds;
        assert!(tb.contains(tb.min_time));
        assert!(tb.contains(tb.max_time));
        assert!(!tb.contains(tb.max_time + chrono::Duration::seconds(1)));
    }
}
