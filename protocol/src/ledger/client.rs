//! # Ledger Client
//!
//! Invokes a contract function and waits for the outcome:
//!
//! ```text
//! getAccount ──► build ──► simulate ──► sign ──► sendTransaction
//!                                                    │
//!                       PENDING / DUPLICATE ◄────────┘
//!                                │
//!                     getTransaction every poll_interval
//!                     until SUCCESS / FAILED / poll_timeout / shutdown
//! ```
//!
//! The caller's ledger account is the transaction source and supplies the
//! sequence number; the server-held key signs. Each call starts from a
//! fresh account lookup, so concurrent invocations for the same caller race
//! on sequence numbers and the loser surfaces as
//! [`LedgerError::Submission`].

use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::error::LedgerError;
use super::rpc::{LedgerRpc, TxStatus};
use super::transaction::{LedgerTransaction, TransactionBuilder};
use super::value::ScVal;
use crate::config::LedgerSettings;
use crate::crypto::{LedgerKeypair, LedgerPublicKey};

/// Signs and submits contract invocations on behalf of callers.
#[derive(Clone)]
pub struct LedgerClient {
    rpc: Arc<dyn LedgerRpc>,
    signer: LedgerKeypair,
    settings: LedgerSettings,
    shutdown: Option<watch::Receiver<bool>>,
}

impl LedgerClient {
    pub fn new(rpc: Arc<dyn LedgerRpc>, signer: LedgerKeypair, settings: LedgerSettings) -> Self {
        Self {
            rpc,
            signer,
            settings,
            shutdown: None,
        }
    }

    /// Abort settlement waits once `shutdown` flips to `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    /// Public key of the server-held signing key.
    pub fn signer(&self) -> LedgerPublicKey {
        self.signer.public_key()
    }

    /// Invoke `function` on the configured contract as `caller` and return
    /// its value once the transaction has settled successfully.
    pub async fn invoke(
        &self,
        caller: &str,
        function: &str,
        args: Vec<ScVal>,
    ) -> Result<ScVal, LedgerError> {
        let passphrase = self.settings.network.passphrase();

        let account = self
            .rpc
            .get_account(caller)
            .await
            .map_err(|e| e.before_submit("getAccount"))?;
        let tx = TransactionBuilder::new(&account, self.settings.base_fee)
            .invoke(&self.settings.contract_address, function, args)
            .timeout(self.settings.tx_validity)
            .build()?;

        let mut tx = self.prepare(tx).await?;
        tx.sign(&self.signer, passphrase);
        let hash = tx.hash_hex(passphrase);

        debug!(%caller, function, %hash, sequence = tx.sequence, "submitting transaction");

        let sent = self.rpc.send_transaction(&tx).await?;
        if !sent.status.is_accepted() {
            warn!(%caller, function, %hash, status = %sent.status, "transaction not accepted");
            return Err(LedgerError::Submission {
                status: sent.status,
                detail: sent.error_result.unwrap_or_default(),
            });
        }

        let value = self.await_settlement(&sent.hash).await?;
        info!(%caller, function, hash = %sent.hash, "transaction settled");
        Ok(value)
    }

    /// Simulate and attach the resource fee.
    async fn prepare(&self, mut tx: LedgerTransaction) -> Result<LedgerTransaction, LedgerError> {
        let sim = self
            .rpc
            .simulate_transaction(&tx)
            .await
            .map_err(|e| e.before_submit("simulateTransaction"))?;
        if let Some(error) = sim.error {
            return Err(LedgerError::Simulation(error));
        }
        tx.prepare(sim.min_resource_fee);
        Ok(tx)
    }

    /// Poll `getTransaction` until the transaction leaves `NOT_FOUND`.
    async fn await_settlement(&self, hash: &str) -> Result<ScVal, LedgerError> {
        let started = Instant::now();
        let deadline = started + self.settings.poll_timeout;
        let mut shutdown = self.shutdown.clone();

        loop {
            match self.rpc.get_transaction(hash).await {
                Ok(status) => match status.status {
                    TxStatus::Success => return Ok(status.return_value.unwrap_or(ScVal::Void)),
                    TxStatus::Failed => {
                        return Err(LedgerError::TransactionFailed {
                            hash: hash.to_string(),
                            detail: status.result.unwrap_or_default(),
                        })
                    }
                    TxStatus::NotFound => {}
                },
                // The transaction is already out; keep polling until the deadline.
                Err(LedgerError::Transport(detail)) => {
                    warn!(%hash, %detail, "status poll failed, retrying");
                }
                Err(e) => return Err(e),
            }

            if Instant::now() >= deadline {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                warn!(%hash, elapsed_ms, "gave up waiting for transaction");
                return Err(LedgerError::PollTimedOut {
                    hash: hash.to_string(),
                    elapsed_ms,
                });
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
                _ = shutdown_requested(&mut shutdown) => {
                    warn!(%hash, "shutdown while waiting for transaction");
                    return Err(LedgerError::Cancelled { hash: hash.to_string() });
                }
            }
        }
    }
}

impl std::fmt::Debug for LedgerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerClient")
            .field("signer", &self.signer.public_key())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Resolves once shutdown is signalled. Never resolves without a receiver
/// or after the sender is gone.
async fn shutdown_requested(rx: &mut Option<watch::Receiver<bool>>) {
    match rx {
        Some(rx) => {
            let sender_gone = rx.wait_for(|stop| *stop).await.is_err();
            if sender_gone {
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
