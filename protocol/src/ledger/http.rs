//! JSON-RPC over HTTP transport for [`LedgerRpc`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::error::LedgerError;
use super::rpc::{
    GetTransactionResponse, LedgerMethod, LedgerRpc, RpcRequest, RpcResponse, SendResponse,
    SimulateResponse, ACCOUNT_NOT_FOUND_CODE,
};
use super::transaction::{Account, LedgerTransaction};
use crate::config::RPC_REQUEST_TIMEOUT;

/// Talks JSON-RPC 2.0 to a ledger endpoint over HTTP(S).
#[derive(Debug)]
pub struct HttpLedgerRpc {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl HttpLedgerRpc {
    pub fn new(url: impl Into<String>) -> Result<Self, LedgerError> {
        Self::with_timeout(url, RPC_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn round_trip(
        &self,
        method: LedgerMethod,
        params: serde_json::Value,
    ) -> Result<RpcResponse, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, params);

        tracing::trace!(?method, id, url = %self.url, "ledger rpc request");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::Transport(format!(
                "{:?} returned HTTP {}",
                method, status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| LedgerError::Decode(e.to_string()))
    }

    async fn call<R: DeserializeOwned>(
        &self,
        method: LedgerMethod,
        params: serde_json::Value,
    ) -> Result<R, LedgerError> {
        let envelope = self.round_trip(method, params).await?;

        if let Some(err) = envelope.error {
            return Err(LedgerError::Transport(format!(
                "{:?} failed ({}): {}",
                method, err.code, err.message
            )));
        }

        let result = envelope
            .result
            .ok_or_else(|| LedgerError::Decode(format!("{:?} returned no result", method)))?;
        serde_json::from_value(result).map_err(|e| LedgerError::Decode(e.to_string()))
    }
}

#[async_trait]
impl LedgerRpc for HttpLedgerRpc {
    async fn get_account(&self, account_id: &str) -> Result<Account, LedgerError> {
        // A missing account has its own error code and must not surface as a
        // transport failure.
        let envelope = self
            .round_trip(LedgerMethod::GetAccount, json!({ "account": account_id }))
            .await?;

        match (envelope.result, envelope.error) {
            (_, Some(err)) if err.code == ACCOUNT_NOT_FOUND_CODE => {
                Err(LedgerError::AccountNotFound(account_id.to_string()))
            }
            (_, Some(err)) => Err(LedgerError::Transport(format!(
                "getAccount failed ({}): {}",
                err.code, err.message
            ))),
            (Some(result), None) => {
                serde_json::from_value(result).map_err(|e| LedgerError::Decode(e.to_string()))
            }
            (None, None) => Err(LedgerError::Decode("getAccount returned no result".into())),
        }
    }

    async fn simulate_transaction(
        &self,
        tx: &LedgerTransaction,
    ) -> Result<SimulateResponse, LedgerError> {
        self.call(LedgerMethod::SimulateTransaction, json!({ "transaction": tx }))
            .await
    }

    async fn send_transaction(&self, tx: &LedgerTransaction) -> Result<SendResponse, LedgerError> {
        self.call(LedgerMethod::SendTransaction, json!({ "transaction": tx }))
            .await
    }

    async fn get_transaction(&self, hash: &str) -> Result<GetTransactionResponse, LedgerError> {
        self.call(LedgerMethod::GetTransaction, json!({ "hash": hash }))
            .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::rpc::{RpcError, SendStatus, TxStatus};
    use crate::ledger::transaction::TransactionBuilder;
    use crate::ledger::value::ScVal;
    use axum::{routing::post, Json, Router};

    /// Canned JSON-RPC endpoint.
    async fn fake_endpoint(Json(req): Json<RpcRequest>) -> Json<RpcResponse> {
        let id = json!(req.id);
        let resp = match req.method {
            LedgerMethod::GetAccount => {
                let account = req.params["account"].as_str().unwrap_or_default().to_string();
                if account == "missing" {
                    RpcResponse::error(id, RpcError::account_not_found(&account))
                } else {
                    RpcResponse::success(id, json!({ "account_id": account, "sequence": 9 }))
                }
            }
            LedgerMethod::SimulateTransaction => RpcResponse::success(
                id,
                json!({ "latestLedger": 3, "minResourceFee": 4200, "result": { "type": "void" } }),
            ),
            LedgerMethod::SendTransaction => {
                RpcResponse::success(id, json!({ "hash": "abcd", "status": "PENDING" }))
            }
            LedgerMethod::GetTransaction => {
                if req.params["hash"] == "abcd" {
                    RpcResponse::success(
                        id,
                        json!({ "status": "SUCCESS", "ledger": 4, "returnValue": { "type": "u32", "value": 1 } }),
                    )
                } else {
                    RpcResponse::error(id, RpcError::invalid_params("bad hash"))
                }
            }
        };
        Json(resp)
    }

    async fn spawn_endpoint() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/", post(fake_endpoint));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    fn tx() -> LedgerTransaction {
        let account = Account {
            account_id: "src".into(),
            sequence: 9,
        };
        TransactionBuilder::new(&account, 100)
            .invoke("CREG", "get_customer_by_id", vec![ScVal::string("x")])
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn get_account_decodes_result() {
        let rpc = HttpLedgerRpc::new(spawn_endpoint().await).unwrap();
        let account = rpc.get_account("src").await.unwrap();
        assert_eq!(account.sequence, 9);
    }

    #[tokio::test]
    async fn get_account_maps_not_found_code() {
        let rpc = HttpLedgerRpc::new(spawn_endpoint().await).unwrap();
        let err = rpc.get_account("missing").await.unwrap_err();
        assert_eq!(err, LedgerError::AccountNotFound("missing".into()));
    }

    #[tokio::test]
    async fn simulate_send_and_poll() {
        let rpc = HttpLedgerRpc::new(spawn_endpoint().await).unwrap();
        let tx = tx();

        let sim = rpc.simulate_transaction(&tx).await.unwrap();
        assert_eq!(sim.min_resource_fee, 4200);

        let sent = rpc.send_transaction(&tx).await.unwrap();
        assert_eq!(sent.status, SendStatus::Pending);

        let got = rpc.get_transaction(&sent.hash).await.unwrap();
        assert_eq!(got.status, TxStatus::Success);
        assert_eq!(got.return_value, Some(ScVal::U32(1)));
    }

    #[tokio::test]
    async fn rpc_error_object_becomes_transport_error() {
        let rpc = HttpLedgerRpc::new(spawn_endpoint().await).unwrap();
        let err = rpc.get_transaction("zzzz").await.unwrap_err();
        assert!(matches!(err, LedgerError::Transport(ref m) if m.contains("bad hash")));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        // Port 9 (discard) on localhost is not listening in test sandboxes.
        let rpc = HttpLedgerRpc::with_timeout("http://127.0.0.1:9/", Duration::from_millis(500))
            .unwrap();
        let err = rpc.get_transaction("abcd").await.unwrap_err();
        assert!(matches!(err, LedgerError::Transport(_)));
        assert!(!err.is_definitive());
    }
}
