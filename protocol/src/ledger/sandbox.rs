//! # Sandbox Ledger
//!
//! An in-process ledger that speaks [`LedgerRpc`]. It hosts one contract,
//! keeps accounts with sequence numbers, verifies signatures and time
//! bounds, and reports settlement through `getTransaction` the way a real
//! endpoint does: `NOT_FOUND` for a while, then `SUCCESS` or `FAILED`.
//!
//! Used by `LEDGER_BACKEND=sandbox` for local runs and by the test suites.
//!
//! ## Contract hosting
//!
//! Contract logic implements [`ContractHost`]. Simulation runs the call
//! against a scratch copy of storage and throws it away. Submission runs it
//! again against a scratch copy and commits only on success, so a trapping
//! call leaves storage untouched.
//!
//! ## Settlement
//!
//! Effects are applied at submission. [`Settlement`] only controls how long
//! `getTransaction` keeps answering `NOT_FOUND`, which is how callers
//! exercise their polling, including the case where a transaction lands but
//! its status is never observed.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use thiserror::Error;

use super::error::LedgerError;
use super::rpc::{
    GetTransactionResponse, LedgerRpc, SendResponse, SendStatus, SimulateResponse, TxStatus,
};
use super::transaction::{Account, LedgerTransaction};
use super::value::ScVal;
use crate::config::Network;
use crate::crypto::LedgerPublicKey;

/// Persistent contract storage: typed keys to typed values.
pub type ContractStorage = BTreeMap<ScVal, ScVal>;

/// Resource fee charged by the sandbox for every invocation, in stroops.
pub const SANDBOX_RESOURCE_FEE: u32 = 1_000;

// ---------------------------------------------------------------------------
// Contract Host
// ---------------------------------------------------------------------------

/// Why a contract call did not return a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("unknown contract function: {0}")]
    UnknownFunction(String),

    #[error("invalid arguments to {function}: {reason}")]
    InvalidArguments { function: String, reason: String },

    #[error("contract trapped: {0}")]
    Trap(String),
}

/// Contract logic runnable inside the sandbox.
pub trait ContractHost: Send + Sync {
    /// Execute `function` with `args`, reading and writing `storage`.
    fn call(
        &self,
        storage: &mut ContractStorage,
        function: &str,
        args: &[ScVal],
    ) -> Result<ScVal, HostError>;
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How many `getTransaction` polls report `NOT_FOUND` before the outcome
/// becomes visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    AfterPolls(u32),
    Never,
}

/// A one-shot failure injected into the next matching stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Next simulation reports this error.
    Simulation(String),
    /// Next submission is rejected with `ERROR`.
    Rejected(String),
    /// Next submission answers `TRY_AGAIN_LATER`.
    TryAgainLater,
    /// Next accepted transaction settles as `FAILED` without running.
    Failed(String),
}

const DEFAULT_SETTLED_RETENTION: usize = 256;

#[derive(Debug, Clone)]
pub struct SandboxConfig {
    pub network: Network,
    pub contract_address: String,
    /// Key whose signature every transaction must carry. When unset, the
    /// source account id must itself be a hex public key and sign.
    pub authorized_signer: Option<LedgerPublicKey>,
    /// Create unknown accounts on first lookup, with sequence 0.
    pub auto_fund: bool,
    pub settlement: Settlement,
    pub resource_fee: u32,
    /// Settled outcomes kept after their first read, for repeat polls and
    /// duplicate detection. Older ones are forgotten.
    pub settled_retention: usize,
}

impl SandboxConfig {
    pub fn new(contract_address: impl Into<String>, network: Network) -> Self {
        Self {
            network,
            contract_address: contract_address.into(),
            authorized_signer: None,
            auto_fund: true,
            settlement: Settlement::AfterPolls(1),
            resource_fee: SANDBOX_RESOURCE_FEE,
            settled_retention: DEFAULT_SETTLED_RETENTION,
        }
    }

    pub fn with_settlement(mut self, settlement: Settlement) -> Self {
        self.settlement = settlement;
        self
    }

    pub fn with_authorized_signer(mut self, key: LedgerPublicKey) -> Self {
        self.authorized_signer = Some(key);
        self
    }

    pub fn without_auto_fund(mut self) -> Self {
        self.auto_fund = false;
        self
    }

    pub fn with_settled_retention(mut self, retained: usize) -> Self {
        self.settled_retention = retained;
        self
    }
}

// ---------------------------------------------------------------------------
// SandboxLedger
// ---------------------------------------------------------------------------

struct Submitted {
    polls_remaining: Option<u32>,
    outcome: GetTransactionResponse,
}

struct SandboxState {
    ledger_seq: u32,
    settlement: Settlement,
    accounts: HashMap<String, u64>,
    storage: ContractStorage,
    accepted: usize,
    /// Accepted transactions whose outcome has not been read yet.
    transactions: HashMap<String, Submitted>,
    /// Outcomes already read, oldest first.
    settled: VecDeque<(String, GetTransactionResponse)>,
    faults: VecDeque<Fault>,
}

impl SandboxState {
    fn settled_outcome(&self, hash: &str) -> Option<&GetTransactionResponse> {
        self.settled
            .iter()
            .find(|(h, _)| h == hash)
            .map(|(_, outcome)| outcome)
    }

    fn take_fault(&mut self, pred: impl Fn(&Fault) -> bool) -> Option<Fault> {
        let pos = self.faults.iter().position(pred)?;
        self.faults.remove(pos)
    }
}

/// In-process ledger hosting a single contract.
pub struct SandboxLedger<H: ContractHost> {
    host: H,
    config: SandboxConfig,
    state: Mutex<SandboxState>,
}

impl<H: ContractHost> SandboxLedger<H> {
    pub fn new(host: H, config: SandboxConfig) -> Self {
        let state = SandboxState {
            ledger_seq: 1,
            settlement: config.settlement,
            accounts: HashMap::new(),
            storage: ContractStorage::new(),
            accepted: 0,
            transactions: HashMap::new(),
            settled: VecDeque::new(),
            faults: VecDeque::new(),
        };
        Self {
            host,
            config,
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Create (or reset) an account with the given sequence number.
    pub fn fund(&self, account_id: &str, sequence: u64) {
        self.state
            .lock()
            .accounts
            .insert(account_id.to_string(), sequence);
    }

    /// Change settlement behaviour for transactions submitted from now on.
    pub fn set_settlement(&self, settlement: Settlement) {
        self.state.lock().settlement = settlement;
    }

    pub fn inject_fault(&self, fault: Fault) {
        self.state.lock().faults.push_back(fault);
    }

    /// Read a contract storage entry directly, bypassing transactions.
    pub fn storage_get(&self, key: &ScVal) -> Option<ScVal> {
        self.state.lock().storage.get(key).cloned()
    }

    /// Run a read-only call against current storage without submitting.
    pub fn query(&self, function: &str, args: &[ScVal]) -> Result<ScVal, HostError> {
        let mut scratch = self.state.lock().storage.clone();
        self.host.call(&mut scratch, function, args)
    }

    /// Latest closed ledger sequence.
    pub fn ledger_sequence(&self) -> u32 {
        self.state.lock().ledger_seq
    }

    /// Number of transactions accepted so far.
    pub fn submitted_count(&self) -> usize {
        self.state.lock().accepted
    }

    /// Accepted transactions whose outcome nobody has read yet.
    pub fn unsettled_count(&self) -> usize {
        self.state.lock().transactions.len()
    }

    fn reject(hash: String, status: SendStatus, detail: &str) -> SendResponse {
        tracing::debug!(%hash, %status, detail, "sandbox rejected transaction");
        SendResponse {
            hash,
            status,
            error_result: Some(detail.to_string()),
        }
    }
}

#[async_trait]
impl<H: ContractHost> LedgerRpc for SandboxLedger<H> {
    async fn get_account(&self, account_id: &str) -> Result<Account, LedgerError> {
        let mut state = self.state.lock();
        let sequence = match state.accounts.get(account_id) {
            Some(seq) => *seq,
            None if self.config.auto_fund => {
                state.accounts.insert(account_id.to_string(), 0);
                0
            }
            None => return Err(LedgerError::AccountNotFound(account_id.to_string())),
        };
        Ok(Account {
            account_id: account_id.to_string(),
            sequence,
        })
    }

    async fn simulate_transaction(
        &self,
        tx: &LedgerTransaction,
    ) -> Result<SimulateResponse, LedgerError> {
        let mut state = self.state.lock();
        let latest_ledger = state.ledger_seq;

        let failed = |error: String| SimulateResponse {
            latest_ledger,
            min_resource_fee: 0,
            result: None,
            error: Some(error),
        };

        if let Some(Fault::Simulation(reason)) =
            state.take_fault(|f| matches!(f, Fault::Simulation(_)))
        {
            return Ok(failed(reason));
        }
        if tx.operation.contract != self.config.contract_address {
            return Ok(failed(format!(
                "contract not found: {}",
                tx.operation.contract
            )));
        }

        let mut scratch = state.storage.clone();
        drop(state);

        Ok(
            match self
                .host
                .call(&mut scratch, &tx.operation.function, &tx.operation.args)
            {
                Ok(value) => SimulateResponse {
                    latest_ledger,
                    min_resource_fee: self.config.resource_fee,
                    result: Some(value),
                    error: None,
                },
                Err(e) => failed(e.to_string()),
            },
        )
    }

    async fn send_transaction(&self, tx: &LedgerTransaction) -> Result<SendResponse, LedgerError> {
        let hash = tx.hash_hex(self.config.network.passphrase());
        let mut state = self.state.lock();

        if state.transactions.contains_key(&hash) || state.settled_outcome(&hash).is_some() {
            return Ok(SendResponse {
                hash,
                status: SendStatus::Duplicate,
                error_result: None,
            });
        }
        match state.take_fault(|f| matches!(f, Fault::Rejected(_) | Fault::TryAgainLater)) {
            Some(Fault::Rejected(reason)) => {
                return Ok(Self::reject(hash, SendStatus::Error, &reason))
            }
            Some(_) => return Ok(Self::reject(hash, SendStatus::TryAgainLater, "busy")),
            None => {}
        }

        let now = Utc::now();
        if now > tx.time_bounds.max_time {
            return Ok(Self::reject(hash, SendStatus::Error, "txTooLate"));
        }
        if now < tx.time_bounds.min_time {
            return Ok(Self::reject(hash, SendStatus::Error, "txTooEarly"));
        }

        let signer = match self.config.authorized_signer {
            Some(key) => Some(key),
            None => LedgerPublicKey::from_hex(&tx.source_account).ok(),
        };
        let signed = signer
            .map(|key| tx.is_signed_by(&key, self.config.network.passphrase()))
            .unwrap_or(false);
        if !signed {
            return Ok(Self::reject(hash, SendStatus::Error, "txBadAuth"));
        }

        let Some(&current_seq) = state.accounts.get(&tx.source_account) else {
            return Ok(Self::reject(hash, SendStatus::Error, "txNoAccount"));
        };
        if tx.sequence != current_seq + 1 {
            return Ok(Self::reject(hash, SendStatus::Error, "txBadSeq"));
        }
        if tx.resource_fee.unwrap_or(0) < self.config.resource_fee {
            return Ok(Self::reject(hash, SendStatus::Error, "txInsufficientFee"));
        }

        // Accepted: the sequence number is consumed whatever the outcome.
        state
            .accounts
            .insert(tx.source_account.clone(), tx.sequence);
        state.ledger_seq += 1;
        let ledger = state.ledger_seq;

        let failed = |detail: String| GetTransactionResponse {
            status: TxStatus::Failed,
            ledger: Some(ledger),
            return_value: None,
            result: Some(detail),
        };

        let outcome = if tx.operation.contract != self.config.contract_address {
            failed(format!("contract not found: {}", tx.operation.contract))
        } else if let Some(Fault::Failed(reason)) =
            state.take_fault(|f| matches!(f, Fault::Failed(_)))
        {
            failed(reason)
        } else {
            let mut scratch = state.storage.clone();
            match self
                .host
                .call(&mut scratch, &tx.operation.function, &tx.operation.args)
            {
                Ok(value) => {
                    state.storage = scratch;
                    GetTransactionResponse {
                        status: TxStatus::Success,
                        ledger: Some(ledger),
                        return_value: Some(value),
                        result: None,
                    }
                }
                Err(e) => failed(e.to_string()),
            }
        };

        tracing::debug!(
            %hash,
            function = %tx.operation.function,
            status = ?outcome.status,
            ledger,
            "sandbox applied transaction"
        );

        let polls_remaining = match state.settlement {
            Settlement::AfterPolls(n) => Some(n),
            Settlement::Never => None,
        };
        state.accepted += 1;
        state.transactions.insert(
            hash.clone(),
            Submitted {
                polls_remaining,
                outcome,
            },
        );

        Ok(SendResponse {
            hash,
            status: SendStatus::Pending,
            error_result: None,
        })
    }

    async fn get_transaction(&self, hash: &str) -> Result<GetTransactionResponse, LedgerError> {
        let mut state = self.state.lock();
        let Some(submitted) = state.transactions.get_mut(hash) else {
            return Ok(state
                .settled_outcome(hash)
                .cloned()
                .unwrap_or_else(GetTransactionResponse::not_found));
        };
        match submitted.polls_remaining {
            None => return Ok(GetTransactionResponse::not_found()),
            Some(0) => {}
            Some(ref mut n) => {
                *n -= 1;
                return Ok(GetTransactionResponse::not_found());
            }
        }

        let Some(Submitted { outcome, .. }) = state.transactions.remove(hash) else {
            return Ok(GetTransactionResponse::not_found());
        };
        state.settled.push_back((hash.to_string(), outcome.clone()));
        while state.settled.len() > self.config.settled_retention {
            state.settled.pop_front();
        }
        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
