// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Anchorbook Protocol — Core Library
//!
//! Customer records live in a document store; a SHA-256 digest of each
//! record lives on a smart-contract ledger. A record is only ever served
//! back when the two agree, so an edit to the store that never made it to
//! the ledger is caught on the next read.
//!
//! ## Architecture
//!
//! - **config** — Protocol constants, network passphrases, ledger settings.
//! - **crypto** — SHA-256 helpers and the Ed25519 signing key.
//! - **record** — Customer fields, validation, the canonical content hash.
//! - **storage** — sled-backed record store.
//! - **ledger** — Typed contract values, transactions, RPC transports, the
//!   sandbox ledger, and the client that submits and polls.
//! - **anchor** — The create / update / verify protocol tying it together.
//!
//! ## Flow
//!
//! ```text
//! create:  validate → hash → store.insert → ledger create_customer(id, hash)
//! update:  validate → hash → store.update → ledger update_customer(id, hash)
//! verify:  ledger get_customer_by_id(id) → store.find_by_id_and_hash
//! ```

pub mod anchor;
pub mod config;
pub mod crypto;
pub mod ledger;
pub mod record;
pub mod storage;
