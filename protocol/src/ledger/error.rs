//! Ledger client errors.

use thiserror::Error;

use super::rpc::SendStatus;

/// Everything that can go wrong while invoking a contract function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The signing account does not exist on the ledger.
    #[error("ledger account not found: {0}")]
    AccountNotFound(String),

    /// The transaction could not be assembled.
    #[error("transaction build failed: {0}")]
    Build(String),

    /// Simulation rejected the invocation.
    #[error("transaction simulation failed: {0}")]
    Simulation(String),

    /// The ledger refused the submission outright.
    #[error("transaction submission failed ({status}): {detail}")]
    Submission { status: SendStatus, detail: String },

    /// The transaction was included and failed.
    #[error("transaction {hash} failed: {detail}")]
    TransactionFailed { hash: String, detail: String },

    /// Polling gave up while the ledger still reported the transaction as
    /// unknown. It may still be included later.
    #[error("transaction {hash} still pending after {elapsed_ms} ms")]
    PollTimedOut { hash: String, elapsed_ms: u64 },

    /// Shutdown was requested while waiting for the transaction to settle.
    #[error("wait for transaction {hash} cancelled")]
    Cancelled { hash: String },

    /// HTTP or JSON-RPC level failure talking to the ledger endpoint.
    #[error("ledger transport error: {0}")]
    Transport(String),

    /// A response arrived but could not be decoded.
    #[error("ledger response decode error: {0}")]
    Decode(String),

    /// The endpoint failed before the transaction was handed to
    /// `sendTransaction`, so the ledger never saw it.
    #[error("transaction not submitted, {stage} failed: {detail}")]
    NotSubmitted { stage: &'static str, detail: String },
}

impl LedgerError {
    /// `true` when the ledger state is known not to contain the
    /// transaction's effects.
    ///
    /// `PollTimedOut`, `Cancelled`, `Transport` and `Decode` are
    /// indeterminate: the transaction may or may not have been (or yet be)
    /// applied. Transport failures ahead of submission surface as
    /// `NotSubmitted` instead.
    pub fn is_definitive(&self) -> bool {
        match self {
            LedgerError::AccountNotFound(_)
            | LedgerError::Build(_)
            | LedgerError::Simulation(_)
            | LedgerError::Submission { .. }
            | LedgerError::TransactionFailed { .. }
            | LedgerError::NotSubmitted { .. } => true,
            LedgerError::PollTimedOut { .. }
            | LedgerError::Cancelled { .. }
            | LedgerError::Transport(_)
            | LedgerError::Decode(_) => false,
        }
    }

    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::AccountNotFound(_) => "account_not_found",
            LedgerError::Build(_) => "build",
            LedgerError::Simulation(_) => "simulation",
            LedgerError::Submission { .. } => "submission",
            LedgerError::TransactionFailed { .. } => "transaction_failed",
            LedgerError::PollTimedOut { .. } => "poll_timeout",
            LedgerError::Cancelled { .. } => "cancelled",
            LedgerError::Transport(_) => "transport",
            LedgerError::Decode(_) => "decode",
            LedgerError::NotSubmitted { .. } => "not_submitted",
        }
    }

    /// Reclassify a failure from a step that runs before submission.
    /// Transport and decode errors there cannot have reached the ledger.
    pub(crate) fn before_submit(self, stage: &'static str) -> Self {
        match self {
            LedgerError::Transport(detail) | LedgerError::Decode(detail) => {
                LedgerError::NotSubmitted { stage, detail }
            }
            other => other,
        }
    }
}
