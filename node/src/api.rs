//! # REST API
//!
//! Builds the axum router that exposes the customer-record interface.
//! All endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path              | Description                               |
//! |--------|-------------------|-------------------------------------------|
//! | GET    | `/health`         | Liveness probe                            |
//! | GET    | `/status`         | Node status summary                       |
//! | POST   | `/customers`      | Store a customer and anchor its hash      |
//! | GET    | `/customers/:id`  | Customer hash, verified against the ledger |
//! | PUT    | `/customers/:id`  | Replace a customer and re-anchor its hash |
//!
//! The ledger account acting for a request is taken from
//! `Authorization: Bearer <caller>`, then `?caller=`, then the node default.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, Path, Query, State},
    http::{header::AUTHORIZATION, request::Parts, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use anchorbook_protocol::anchor::{AnchorError, AnchorService};
use anchorbook_protocol::record::CustomerDraft;

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone. The service holds its store and ledger client behind
/// `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub service: AnchorService,
    pub metrics: SharedMetrics,
    /// The node's reported version string.
    pub version: String,
    pub network: String,
    pub contract_address: String,
    /// Ledger account used when a request does not name one.
    pub default_caller: String,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/customers", post(create_customer_handler))
        .route(
            "/customers/:id",
            get(get_customer_handler).put(update_customer_handler),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Caller Resolution
// ---------------------------------------------------------------------------

/// The ledger account a request acts as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub String);

#[derive(Debug, Deserialize)]
struct CallerQuery {
    caller: Option<String>,
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let bearer = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        if let Some(caller) = bearer {
            return Ok(Caller(caller));
        }

        let queried = Query::<CallerQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(q)| q.caller)
            .filter(|c| !c.is_empty());
        if let Some(caller) = queried {
            return Ok(Caller(caller));
        }

        Ok(Caller(state.default_caller.clone()))
    }
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    pub network: String,
    /// Customer-registry contract the node anchors to.
    pub contract_address: String,
    /// Hex public key that signs every ledger transaction.
    pub signer: String,
    /// Customer documents in the local store.
    pub record_count: usize,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Response payload for `POST /customers`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerResponse {
    pub customer_id: String,
    pub hash: String,
    /// Decoded return value of the contract call.
    pub blockchain_response: serde_json::Value,
}

/// Response payload for `PUT /customers/:id`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCustomerResponse {
    pub message: String,
    pub new_hash: String,
}

/// Response payload for `GET /customers/:id`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CustomerResponse {
    pub id: String,
    pub hash: String,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// An error ready to be rendered as `{"error": ...}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Map an anchoring failure. `action` prefixes server-side failures,
    /// e.g. "creating customer".
    fn from_anchor(err: AnchorError, action: &str) -> Self {
        let status = match &err {
            AnchorError::Validation(_) => StatusCode::BAD_REQUEST,
            AnchorError::NotFound(_) => StatusCode::NOT_FOUND,
            AnchorError::Ledger(_) | AnchorError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = if status.is_server_error() {
            tracing::error!(error = %err, "error {}", action);
            format!("Error {}: {}", action, err)
        } else {
            tracing::debug!(error = %err, "request rejected");
            err.to_string()
        };
        Self { status, message }
    }

    fn malformed(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: format!("malformed request body: {}", rejection.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status` — returns node status summary.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse {
        version: state.version.clone(),
        network: state.network.clone(),
        contract_address: state.contract_address.clone(),
        signer: state.service.ledger().signer().to_hex(),
        record_count: state.service.store().count(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `POST /customers` — store a new customer and anchor its hash.
async fn create_customer_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    body: Result<Json<CustomerDraft>, JsonRejection>,
) -> Result<Json<CreateCustomerResponse>, ApiError> {
    let Json(draft) = body.map_err(ApiError::malformed)?;

    match state.service.create(&caller, draft).await {
        Ok(receipt) => {
            state.metrics.customers_created_total.inc();
            Ok(Json(CreateCustomerResponse {
                customer_id: receipt.id,
                hash: receipt.hash,
                blockchain_response: receipt.ledger_response,
            }))
        }
        Err(e) => {
            state.metrics.record_failure(&e);
            Err(ApiError::from_anchor(e, "creating customer"))
        }
    }
}

/// `GET /customers/:id` — the customer's hash, if the store agrees with
/// the ledger anchor.
async fn get_customer_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Json<CustomerResponse>, ApiError> {
    match state.service.verify(&caller, &id).await {
        Ok(verified) => {
            state.metrics.customers_verified_total.inc();
            Ok(Json(CustomerResponse {
                id: verified.id,
                hash: verified.hash,
            }))
        }
        Err(e) => {
            state.metrics.record_failure(&e);
            Err(ApiError::from_anchor(e, "retrieving customer"))
        }
    }
}

/// `PUT /customers/:id` — replace all seven fields and re-anchor.
async fn update_customer_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    body: Result<Json<CustomerDraft>, JsonRejection>,
) -> Result<Json<UpdateCustomerResponse>, ApiError> {
    let Json(draft) = body.map_err(ApiError::malformed)?;

    match state.service.update(&caller, &id, draft).await {
        Ok(receipt) => {
            state.metrics.customers_updated_total.inc();
            Ok(Json(UpdateCustomerResponse {
                message: "Customer updated successfully.".into(),
                new_hash: receipt.new_hash,
            }))
        }
        Err(e) => {
            state.metrics.record_failure(&e);
            Err(ApiError::from_anchor(e, "updating customer"))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    use anchorbook_contracts::CustomerRegistry;
    use anchorbook_protocol::config::{LedgerSettings, Network};
    use anchorbook_protocol::crypto::{is_hex_digest, LedgerKeypair};
    use anchorbook_protocol::ledger::{
        Fault, LedgerClient, LedgerRpc, SandboxConfig, SandboxLedger, ScVal,
    };
    use anchorbook_protocol::record::CustomerFields;
    use anchorbook_protocol::storage::RecordDb;

    const CONTRACT: &str = "CREGISTRY";
    const DEFAULT_CALLER: &str = "GDEFAULT";

    /// App state over a temporary store and a sandbox ledger running the
    /// registry contract.
    fn test_app_state() -> (AppState, Arc<SandboxLedger<CustomerRegistry>>) {
        let signer = LedgerKeypair::generate();
        let sandbox = Arc::new(SandboxLedger::new(
            CustomerRegistry,
            SandboxConfig::new(CONTRACT, Network::Standalone)
                .with_authorized_signer(signer.public_key()),
        ));
        let settings = LedgerSettings::new(CONTRACT, Network::Standalone)
            .with_polling(Duration::from_millis(2), Duration::from_secs(2));
        let rpc: Arc<dyn LedgerRpc> = sandbox.clone();
        let ledger = LedgerClient::new(rpc, signer, settings);
        let store = Arc::new(RecordDb::open_temporary().expect("temp db"));

        let state = AppState {
            service: AnchorService::new(store, ledger),
            metrics: Arc::new(crate::metrics::NodeMetrics::new().expect("metrics")),
            version: "0.1.0-test".into(),
            network: Network::Standalone.to_string(),
            contract_address: CONTRACT.into(),
            default_caller: DEFAULT_CALLER.into(),
        };
        (state, sandbox)
    }

    fn alice() -> serde_json::Value {
        serde_json::json!({
            "name": "Alice",
            "address": "1 Main St",
            "phone": "555-0100",
            "email": "alice@example.com",
            "dob": "1990-01-01",
            "gender": "F",
            "country": "US"
        })
    }

    /// Sends a request and returns (status, parsed JSON body).
    async fn send(
        router: &Router,
        req: Request<Body>,
    ) -> (StatusCode, serde_json::Value) {
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    async fn get(router: &Router, path: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        send(router, req).await
    }

    async fn with_json(
        router: &Router,
        method: &str,
        path: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        send(router, req).await
    }

    // -- 1. Health and status ------------------------------------------------

    #[tokio::test]
    async fn health_returns_ok() {
        let (state, _) = test_app_state();
        let router = create_router(state);
        let (status, body) = get(&router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn status_reports_contract_and_record_count() {
        let (state, _) = test_app_state();
        let router = create_router(state.clone());
        with_json(&router, "POST", "/customers", alice()).await;

        let (status, body) = get(&router, "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["contract_address"], CONTRACT);
        assert_eq!(body["network"], "standalone");
        assert_eq!(body["record_count"], 1);
        assert_eq!(body["signer"], state.service.ledger().signer().to_hex());
    }

    // -- 2. Create -----------------------------------------------------------

    #[tokio::test]
    async fn create_returns_id_and_hash() {
        let (state, _) = test_app_state();
        let router = create_router(state.clone());

        let (status, body) = with_json(&router, "POST", "/customers", alice()).await;
        assert_eq!(status, StatusCode::OK);
        let hash = body["hash"].as_str().unwrap();
        assert!(is_hex_digest(hash));
        assert!(body["blockchainResponse"].is_null());

        let fields: CustomerFields = serde_json::from_value(alice()).unwrap();
        assert_eq!(hash, fields.content_hash());
        assert_eq!(state.metrics.customers_created_total.get(), 1);
    }

    #[tokio::test]
    async fn create_missing_email_is_400_without_side_effects() {
        let (state, sandbox) = test_app_state();
        let router = create_router(state.clone());
        let mut body = alice();
        body.as_object_mut().unwrap().remove("email");

        let (status, resp) = with_json(&router, "POST", "/customers", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(resp["error"].as_str().unwrap().contains("email"));
        assert_eq!(state.service.store().count(), 0);
        assert_eq!(sandbox.submitted_count(), 0);
    }

    #[tokio::test]
    async fn create_malformed_body_is_400() {
        let (state, _) = test_app_state();
        let router = create_router(state);
        let req = Request::builder()
            .method("POST")
            .uri("/customers")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let (status, body) = send(&router, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("malformed"));
    }

    #[tokio::test]
    async fn create_ledger_failure_is_500_and_keeps_record() {
        let (state, sandbox) = test_app_state();
        let router = create_router(state.clone());
        sandbox.inject_fault(Fault::Simulation("contract trapped".into()));

        let (status, body) = with_json(&router, "POST", "/customers", alice()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Error creating customer:"));
        assert_eq!(state.service.store().count(), 1);
        assert_eq!(
            state
                .metrics
                .ledger_failures_total
                .with_label_values(&["simulation"])
                .get(),
            1
        );
    }

    // -- 3. Read -------------------------------------------------------------

    #[tokio::test]
    async fn get_unknown_customer_is_404() {
        let (state, _) = test_app_state();
        let router = create_router(state.clone());
        let (status, body) = get(&router, "/customers/nobody").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
        assert_eq!(state.metrics.verification_failures_total.get(), 1);
    }

    #[tokio::test]
    async fn get_detects_store_tampering() {
        let (state, _) = test_app_state();
        let router = create_router(state.clone());
        let (_, created) = with_json(&router, "POST", "/customers", alice()).await;
        let id = created["customerId"].as_str().unwrap();

        let mut edited: CustomerFields = serde_json::from_value(alice()).unwrap();
        edited.country = "CA".into();
        let hash = edited.content_hash();
        state
            .service
            .store()
            .update_by_id(id, edited, hash)
            .unwrap()
            .unwrap();

        let (status, _) = get(&router, &format!("/customers/{}", id)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // -- 4. Update -----------------------------------------------------------

    #[tokio::test]
    async fn update_unknown_customer_is_404() {
        let (state, sandbox) = test_app_state();
        let router = create_router(state);
        let (status, _) = with_json(&router, "PUT", "/customers/nobody", alice()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(sandbox.submitted_count(), 0);
    }

    #[tokio::test]
    async fn update_validates_fields() {
        let (state, _) = test_app_state();
        let router = create_router(state);
        let (_, created) = with_json(&router, "POST", "/customers", alice()).await;
        let id = created["customerId"].as_str().unwrap();

        let mut body = alice();
        body["name"] = serde_json::json!("");
        let (status, _) = with_json(&router, "PUT", &format!("/customers/{}", id), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_rejected_by_ledger_is_500_and_restores() {
        let (state, sandbox) = test_app_state();
        let router = create_router(state);
        let (_, created) = with_json(&router, "POST", "/customers", alice()).await;
        let id = created["customerId"].as_str().unwrap().to_string();
        let original_hash = created["hash"].clone();

        sandbox.inject_fault(Fault::Rejected("txInternalError".into()));
        let mut body = alice();
        body["phone"] = serde_json::json!("555-0199");
        let (status, resp) = with_json(&router, "PUT", &format!("/customers/{}", id), body).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp["error"]
            .as_str()
            .unwrap()
            .starts_with("Error updating customer:"));

        let (status, got) = get(&router, &format!("/customers/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(got["hash"], original_hash);
    }

    // -- 5. Caller resolution ------------------------------------------------

    #[tokio::test]
    async fn caller_precedence_bearer_then_query_then_default() {
        let (state, sandbox) = test_app_state();
        let router = create_router(state);

        let req = Request::builder()
            .method("POST")
            .uri("/customers?caller=GQUERY")
            .header("content-type", "application/json")
            .header("authorization", "Bearer GBEARER")
            .body(Body::from(serde_json::to_vec(&alice()).unwrap()))
            .unwrap();
        assert_eq!(send(&router, req).await.0, StatusCode::OK);
        with_json(&router, "POST", "/customers?caller=GQUERY", alice()).await;
        with_json(&router, "POST", "/customers", alice()).await;

        // Each caller's account sequence advanced exactly once.
        for account in ["GBEARER", "GQUERY", DEFAULT_CALLER] {
            let acct = sandbox.get_account(account).await.unwrap();
            assert_eq!(acct.sequence, 1, "account {}", account);
        }
    }

    // -- 6. End-to-end scenario ----------------------------------------------

    #[tokio::test]
    async fn alice_create_read_update_read() {
        let (state, sandbox) = test_app_state();
        let router = create_router(state);

        let (status, created) = with_json(&router, "POST", "/customers", alice()).await;
        assert_eq!(status, StatusCode::OK);
        let id = created["customerId"].as_str().unwrap().to_string();
        let h1 = created["hash"].as_str().unwrap().to_string();

        let (status, got) = get(&router, &format!("/customers/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(got["id"], id.as_str());
        assert_eq!(got["hash"], h1.as_str());

        let mut body = alice();
        body["gender"] = serde_json::json!("NB");
        let (status, updated) =
            with_json(&router, "PUT", &format!("/customers/{}", id), body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["message"], "Customer updated successfully.");
        let h2 = updated["newHash"].as_str().unwrap().to_string();
        assert_ne!(h1, h2);

        let (status, got) = get(&router, &format!("/customers/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(got["hash"], h2.as_str());

        let anchor = sandbox
            .query("get_customer_by_id", &[ScVal::string(&id)])
            .unwrap();
        assert_eq!(anchor.to_native()["hash"], h2.as_str());
    }
}
