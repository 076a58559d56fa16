//! # Ledger RPC Surface
//!
//! The four calls the client needs from a ledger endpoint, behind the
//! [`LedgerRpc`] trait, plus the JSON-RPC 2.0 wire types used by the HTTP
//! transport.
//!
//! | Method                | Purpose                                          |
//! |-----------------------|--------------------------------------------------|
//! | `getAccount`          | Current sequence number of the signing account   |
//! | `simulateTransaction` | Dry-run an invocation, resolve its resource fee  |
//! | `sendTransaction`     | Submit a signed transaction                      |
//! | `getTransaction`      | Settlement status and return value by hash       |
//!
//! Two implementations exist: [`super::http::HttpLedgerRpc`] for a real
//! endpoint and [`super::sandbox::SandboxLedger`] for an in-process ledger.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::LedgerError;
use super::transaction::{Account, LedgerTransaction};
use super::value::ScVal;

// ---------------------------------------------------------------------------
// LedgerRpc Trait
// ---------------------------------------------------------------------------

/// Transport-agnostic access to a ledger endpoint.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Look up an account. Fails with [`LedgerError::AccountNotFound`] if
    /// the ledger has never seen it.
    async fn get_account(&self, account_id: &str) -> Result<Account, LedgerError>;

    /// Dry-run the transaction's invocation against current state.
    async fn simulate_transaction(
        &self,
        tx: &LedgerTransaction,
    ) -> Result<SimulateResponse, LedgerError>;

    /// Submit a signed transaction.
    async fn send_transaction(&self, tx: &LedgerTransaction) -> Result<SendResponse, LedgerError>;

    /// Settlement status of a previously submitted transaction.
    async fn get_transaction(&self, hash: &str) -> Result<GetTransactionResponse, LedgerError>;
}

// ---------------------------------------------------------------------------
// Response Payloads
// ---------------------------------------------------------------------------

/// Result of `simulateTransaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateResponse {
    /// Ledger sequence the simulation ran against.
    pub latest_ledger: u32,
    /// Resource fee the transaction must carry, in stroops.
    #[serde(default)]
    pub min_resource_fee: u32,
    /// Value the invocation would return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ScVal>,
    /// Set when the invocation would fail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Status returned by `sendTransaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SendStatus {
    /// Accepted; inclusion is pending.
    Pending,
    /// Already submitted earlier; inclusion may be pending or done.
    Duplicate,
    /// Not accepted right now. Nothing was queued.
    TryAgainLater,
    /// Rejected.
    Error,
}

impl SendStatus {
    /// `true` if the transaction is (or already was) on its way into the
    /// ledger and should be polled.
    pub fn is_accepted(&self) -> bool {
        matches!(self, SendStatus::Pending | SendStatus::Duplicate)
    }
}

impl fmt::Display for SendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SendStatus::Pending => "PENDING",
            SendStatus::Duplicate => "DUPLICATE",
            SendStatus::TryAgainLater => "TRY_AGAIN_LATER",
            SendStatus::Error => "ERROR",
        })
    }
}

/// Result of `sendTransaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub hash: String,
    pub status: SendStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_result: Option<String>,
}

/// Settlement status returned by `getTransaction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    NotFound,
    Success,
    Failed,
}

/// Result of `getTransaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetTransactionResponse {
    pub status: TxStatus,
    /// Ledger sequence the transaction was included in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger: Option<u32>,
    /// Contract return value, present on `SUCCESS`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_value: Option<ScVal>,
    /// Failure detail, present on `FAILED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl GetTransactionResponse {
    pub fn not_found() -> Self {
        Self {
            status: TxStatus::NotFound,
            ledger: None,
            return_value: None,
            result: None,
        }
    }
}

// ---------------------------------------------------------------------------
// JSON-RPC 2.0 Envelope
// ---------------------------------------------------------------------------

/// Methods spoken to the ledger endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerMethod {
    #[serde(rename = "getAccount")]
    GetAccount,
    #[serde(rename = "simulateTransaction")]
    SimulateTransaction,
    #[serde(rename = "sendTransaction")]
    SendTransaction,
    #[serde(rename = "getTransaction")]
    GetTransaction,
}

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Always "2.0".
    pub jsonrpc: String,
    pub id: u64,
    pub method: LedgerMethod,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl RpcRequest {
    pub fn new(id: u64, method: LedgerMethod, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method,
            params,
        }
    }
}

/// A JSON-RPC 2.0 response. Exactly one of `result` or `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Error code the endpoint uses for an unknown account.
pub const ACCOUNT_NOT_FOUND_CODE: i32 = -32002;

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    pub fn account_not_found(account_id: &str) -> Self {
        Self {
            code: ACCOUNT_NOT_FOUND_CODE,
            message: format!("account not found: {}", account_id),
            data: None,
        }
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: msg.into(),
            data: None,
        }
    }
}
