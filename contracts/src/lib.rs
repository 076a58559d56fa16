//! # Anchorbook Contracts
//!
//! Contract logic run by the ledger. One contract today:
//!
//! - **Customer Registry** — the `id → content hash` anchors that the
//!   record store is verified against.
//!
//! Contracts implement [`anchorbook_protocol::ledger::ContractHost`], so the
//! same code runs inside the sandbox ledger and in tests.

pub mod customer_registry;

pub use customer_registry::{ContractError, Customer, CustomerRegistry};
