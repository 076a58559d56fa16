//! # Hash Anchoring
//!
//! Binds the record store to the customer-registry contract. Every write
//! stores the full record and anchors its content hash on the ledger; every
//! read asks the ledger for the anchored hash and only answers if the store
//! holds a record with exactly that hash.
//!
//! ## Failure semantics
//!
//! Store and ledger are not updated atomically.
//!
//! - `create` leaves the stored record in place when anchoring fails.
//! - `update` restores the previous record when the ledger definitely did
//!   not apply the new anchor (see [`LedgerError::is_definitive`]). When the
//!   outcome is unknown the new record is kept, since the anchor may still
//!   land. The restore is skipped if a concurrent update has rewritten the
//!   record since. Either way the error is reported.
//!
//! Any divergence left behind shows up as `NotFound` from `verify`.

use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::config::{FN_CREATE_CUSTOMER, FN_GET_CUSTOMER, FN_UPDATE_CUSTOMER};
use crate::ledger::{LedgerClient, LedgerError, ScVal};
use crate::record::{CustomerDraft, CustomerRecord, FieldError};
use crate::storage::{DbError, RecordDb};

// ---------------------------------------------------------------------------
// Results & Errors
// ---------------------------------------------------------------------------

/// Outcome of a successful `create`.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateReceipt {
    pub id: String,
    pub hash: String,
    /// Decoded contract return value.
    pub ledger_response: serde_json::Value,
}

/// Outcome of a successful `update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReceipt {
    pub id: String,
    pub new_hash: String,
}

/// A record whose stored hash matches the ledger anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAnchor {
    pub id: String,
    pub hash: String,
}

#[derive(Debug, Error)]
pub enum AnchorError {
    #[error(transparent)]
    Validation(#[from] FieldError),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("record store error: {0}")]
    Store(#[from] DbError),
}

// ---------------------------------------------------------------------------
// AnchorService
// ---------------------------------------------------------------------------

/// Create, update and verify hash-anchored customer records.
#[derive(Debug, Clone)]
pub struct AnchorService {
    store: Arc<RecordDb>,
    ledger: LedgerClient,
}

impl AnchorService {
    pub fn new(store: Arc<RecordDb>, ledger: LedgerClient) -> Self {
        Self { store, ledger }
    }

    pub fn store(&self) -> &RecordDb {
        &self.store
    }

    pub fn ledger(&self) -> &LedgerClient {
        &self.ledger
    }

    /// Store a new customer and anchor its hash.
    #[instrument(skip(self, draft))]
    pub async fn create(
        &self,
        caller: &str,
        draft: CustomerDraft,
    ) -> Result<CreateReceipt, AnchorError> {
        let fields = draft.validate()?;
        let hash = fields.content_hash();
        let record = self.store.insert(fields, hash.clone())?;

        let returned = self
            .ledger
            .invoke(
                caller,
                FN_CREATE_CUSTOMER,
                vec![ScVal::string(&record.id), ScVal::string(&hash)],
            )
            .await
            .map_err(|e| {
                warn!(id = %record.id, error = %e, "create anchor failed; record kept");
                e
            })?;

        info!(id = %record.id, %hash, "customer created");
        Ok(CreateReceipt {
            id: record.id,
            hash,
            ledger_response: returned.to_native(),
        })
    }

    /// Replace a customer's fields and re-anchor the new hash.
    #[instrument(skip(self, draft))]
    pub async fn update(
        &self,
        caller: &str,
        id: &str,
        draft: CustomerDraft,
    ) -> Result<UpdateReceipt, AnchorError> {
        let written = CustomerRecord::new(id, draft.validate()?);
        let new_hash = written.hash.clone();

        let previous = self
            .store
            .update_by_id(id, written.fields.clone(), new_hash.clone())?
            .ok_or_else(|| AnchorError::NotFound(format!("customer {} not found", id)))?;

        let anchored = self
            .ledger
            .invoke(
                caller,
                FN_UPDATE_CUSTOMER,
                vec![
                    ScVal::string(id),
                    ScVal::optional(Some(ScVal::string(&new_hash))),
                ],
            )
            .await;

        match anchored {
            Ok(_) => {
                info!(%id, %new_hash, "customer updated");
                Ok(UpdateReceipt {
                    id: id.to_string(),
                    new_hash,
                })
            }
            Err(e) if e.is_definitive() => {
                warn!(%id, error = %e, "update anchor rejected; restoring previous record");
                match self.store.restore(&previous, &written) {
                    Ok(true) => {}
                    Ok(false) => {
                        warn!(%id, "record changed by a concurrent update; leaving it in place")
                    }
                    Err(restore_err) => {
                        error!(%id, error = %restore_err, "failed to restore previous record")
                    }
                }
                Err(e.into())
            }
            Err(e) => {
                warn!(%id, error = %e, "update anchor outcome unknown; keeping new record");
                Err(e.into())
            }
        }
    }

    /// Read the anchored hash for `id` and confirm the store agrees.
    #[instrument(skip(self))]
    pub async fn verify(&self, caller: &str, id: &str) -> Result<VerifiedAnchor, AnchorError> {
        let anchor = self
            .ledger
            .invoke(caller, FN_GET_CUSTOMER, vec![ScVal::string(id)])
            .await?;

        let hash = anchor
            .to_native()
            .get("hash")
            .and_then(|h| h.as_str())
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AnchorError::NotFound(format!("no ledger anchor for customer {}", id)))?;

        let record = self.store.find_by_id_and_hash(id, &hash)?.ok_or_else(|| {
            warn!(%id, %hash, "stored record does not match ledger anchor");
            AnchorError::NotFound(format!("customer {} does not match its ledger anchor", id))
        })?;

        Ok(VerifiedAnchor {
            id: record.id,
            hash: record.hash,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
