//! # Ledger Client Layer
//!
//! Everything needed to invoke functions on the customer-registry contract
//! and wait for them to settle.
//!
//! ```text
//! value.rs       — ScVal typed values, native decoding, canonical bytes
//! transaction.rs — invocation envelope, builder, network-scoped hash, signing
//! rpc.rs         — LedgerRpc trait, status enums, JSON-RPC wire types
//! http.rs        — LedgerRpc over HTTP JSON-RPC (reqwest)
//! sandbox.rs     — in-process LedgerRpc hosting one ContractHost
//! client.rs      — LedgerClient: build → simulate → sign → send → poll
//! error.rs       — LedgerError
//! ```

pub mod client;
pub mod error;
pub mod http;
pub mod rpc;
pub mod sandbox;
pub mod transaction;
pub mod value;

pub use client::LedgerClient;
pub use error::LedgerError;
pub use http::HttpLedgerRpc;
pub use rpc::{
    GetTransactionResponse, LedgerRpc, SendResponse, SendStatus, SimulateResponse, TxStatus,
};
pub use sandbox::{
    ContractHost, ContractStorage, Fault, HostError, SandboxConfig, SandboxLedger, Settlement,
};
pub use transaction::{Account, LedgerTransaction, TransactionBuilder};
pub use value::{ScMapEntry, ScVal};
