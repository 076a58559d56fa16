//! # RecordDb — Customer Document Store
//!
//! Persistence for customer records, built on sled's embedded key-value
//! store. One JSON document per customer:
//!
//! | Tree        | Key             | Value                          |
//! |-------------|-----------------|--------------------------------|
//! | `customers` | `id` (UTF-8)    | `json(CustomerRecord)`         |
//!
//! Documents are JSON rather than bincode so the on-disk shape is the same
//! `{id, fields, hash}` document the API and operators reason about.
//!
//! ## Atomicity
//!
//! sled applies single-key operations atomically. Inserts use
//! compare-and-swap against an empty slot, updates use `fetch_and_update`,
//! so a concurrent reader sees either the old document or the new one,
//! never a mix of old fields and a new hash.

use sled::{Db, Tree};
use std::path::Path;
use uuid::Uuid;

use crate::record::{CustomerFields, CustomerRecord};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during record store operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("record id already taken: {0}")]
    Conflict(String),
}

pub type DbResult<T> = Result<T, DbError>;

const CUSTOMERS_TREE: &str = "customers";

// ---------------------------------------------------------------------------
// RecordDb
// ---------------------------------------------------------------------------

/// Persistent store for [`CustomerRecord`] documents.
///
/// Cheap to clone; clones share the same sled handles. Safe to share across
/// request handlers via `Arc<RecordDb>` without extra locking.
#[derive(Debug, Clone)]
pub struct RecordDb {
    db: Db,
    customers: Tree,
}

impl RecordDb {
    /// Open or create a store at the given directory.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// In-memory store removed on drop. Meant for tests and the sandbox.
    pub fn open_temporary() -> DbResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let customers = db.open_tree(CUSTOMERS_TREE)?;
        Ok(Self { db, customers })
    }

    /// Persist a new record with a freshly assigned id.
    ///
    /// The hash is passed in rather than recomputed so the caller anchors
    /// exactly the digest that was stored.
    pub fn insert(&self, fields: CustomerFields, hash: String) -> DbResult<CustomerRecord> {
        let record = CustomerRecord {
            id: Uuid::new_v4().simple().to_string(),
            fields,
            hash,
        };
        let bytes = encode(&record)?;

        self.customers
            .compare_and_swap(record.id.as_bytes(), None as Option<&[u8]>, Some(bytes))?
            .map_err(|_| DbError::Conflict(record.id.clone()))?;

        tracing::debug!(id = %record.id, "customer record inserted");
        Ok(record)
    }

    /// Fetch a record by id.
    pub fn find_by_id(&self, id: &str) -> DbResult<Option<CustomerRecord>> {
        match self.customers.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Fetch a record only if its stored hash equals `hash`.
    pub fn find_by_id_and_hash(&self, id: &str, hash: &str) -> DbResult<Option<CustomerRecord>> {
        Ok(self.find_by_id(id)?.filter(|r| r.hash == hash))
    }

    /// Replace the fields and hash of an existing record.
    ///
    /// Returns the document as it was before the write, or `None` (and
    /// writes nothing) if no record has this id.
    pub fn update_by_id(
        &self,
        id: &str,
        fields: CustomerFields,
        hash: String,
    ) -> DbResult<Option<CustomerRecord>> {
        let updated = encode(&CustomerRecord {
            id: id.to_string(),
            fields,
            hash,
        })?;

        // Returning `None` for a missing key leaves the slot empty.
        let previous = self
            .customers
            .fetch_and_update(id.as_bytes(), |old| old.map(|_| updated.clone()))?;

        previous.map(|bytes| decode(&bytes)).transpose()
    }

    /// Put `previous` back, but only while the slot still holds exactly
    /// `written`. Used to undo an update whose ledger anchor was rejected.
    ///
    /// Returns `false` and writes nothing if another writer replaced the
    /// document in the meantime.
    pub fn restore(&self, previous: &CustomerRecord, written: &CustomerRecord) -> DbResult<bool> {
        let swapped = self.customers.compare_and_swap(
            previous.id.as_bytes(),
            Some(encode(written)?),
            Some(encode(previous)?),
        )?;
        Ok(swapped.is_ok())
    }

    /// Number of stored records.
    pub fn count(&self) -> usize {
        self.customers.len()
    }

    /// Block until all pending writes are durable.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn encode(record: &CustomerRecord) -> DbResult<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| DbError::Serialization(e.to_string()))
}

fn decode(bytes: &[u8]) -> DbResult<CustomerRecord> {
    serde_json::from_slice(bytes).map_err(|e| DbError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
