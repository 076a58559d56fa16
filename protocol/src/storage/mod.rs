//! # Storage Module
//!
//! The local half of every anchored record. [`RecordDb`] persists customer
//! documents in sled; the ledger holds only `(id, hash)` pairs, so this is
//! the single place the actual field values live.

pub mod db;

pub use db::{DbError, DbResult, RecordDb};
