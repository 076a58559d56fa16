//! # Prometheus Metrics
//!
//! Exposes operational metrics for the node. Scraped by Prometheus at the
//! `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] under
//! the `anchorbook` prefix so they do not collide with any default global
//! registry consumers.

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

use anchorbook_protocol::anchor::AnchorError;
use anchorbook_protocol::ledger::{
    Account, GetTransactionResponse, LedgerError, LedgerRpc, LedgerTransaction, SendResponse,
    SimulateResponse,
};

/// Holds all Prometheus metric handles for the node.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Customers stored and anchored.
    pub customers_created_total: IntCounter,
    /// Customers whose new hash was anchored.
    pub customers_updated_total: IntCounter,
    /// Reads whose stored record matched the ledger anchor.
    pub customers_verified_total: IntCounter,
    /// Reads that found no anchor, or a store record that disagreed with it.
    pub verification_failures_total: IntCounter,
    /// Failed ledger invocations, by [`LedgerError::kind`].
    pub ledger_failures_total: IntCounterVec,
    /// Ledger RPC calls, by method.
    pub ledger_rpc_requests_total: IntCounterVec,
    /// Ledger RPC round-trip latency, by method.
    pub ledger_rpc_latency_seconds: HistogramVec,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("anchorbook".into()), None)?;

        let customers_created_total = IntCounter::new(
            "customers_created_total",
            "Customers stored and anchored on the ledger",
        )?;
        registry.register(Box::new(customers_created_total.clone()))?;

        let customers_updated_total = IntCounter::new(
            "customers_updated_total",
            "Customer updates whose new hash was anchored",
        )?;
        registry.register(Box::new(customers_updated_total.clone()))?;

        let customers_verified_total = IntCounter::new(
            "customers_verified_total",
            "Customer reads that matched their ledger anchor",
        )?;
        registry.register(Box::new(customers_verified_total.clone()))?;

        let verification_failures_total = IntCounter::new(
            "verification_failures_total",
            "Customer reads with no anchor or a mismatching stored record",
        )?;
        registry.register(Box::new(verification_failures_total.clone()))?;

        let ledger_failures_total = IntCounterVec::new(
            Opts::new("ledger_failures_total", "Failed ledger invocations by error kind"),
            &["kind"],
        )?;
        registry.register(Box::new(ledger_failures_total.clone()))?;

        let ledger_rpc_requests_total = IntCounterVec::new(
            Opts::new("ledger_rpc_requests_total", "Ledger RPC calls by method"),
            &["method"],
        )?;
        registry.register(Box::new(ledger_rpc_requests_total.clone()))?;

        let ledger_rpc_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "ledger_rpc_latency_seconds",
                "Ledger RPC round-trip latency in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0,
            ]),
            &["method"],
        )?;
        registry.register(Box::new(ledger_rpc_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            customers_created_total,
            customers_updated_total,
            customers_verified_total,
            verification_failures_total,
            ledger_failures_total,
            ledger_rpc_requests_total,
            ledger_rpc_latency_seconds,
        })
    }

    /// Count a failed anchor operation under the right metric.
    pub fn record_failure(&self, err: &AnchorError) {
        match err {
            AnchorError::Ledger(e) => self.ledger_failures_total.with_label_values(&[e.kind()]).inc(),
            AnchorError::NotFound(_) => self.verification_failures_total.inc(),
            AnchorError::Validation(_) | AnchorError::Store(_) => {}
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// MeteredLedgerRpc
// ---------------------------------------------------------------------------

/// Wraps a [`LedgerRpc`] and records call counts and latency per method.
pub struct MeteredLedgerRpc {
    inner: Arc<dyn LedgerRpc>,
    metrics: SharedMetrics,
}

impl MeteredLedgerRpc {
    pub fn new(inner: Arc<dyn LedgerRpc>, metrics: SharedMetrics) -> Self {
        Self { inner, metrics }
    }

    fn start(&self, method: &str) -> prometheus::HistogramTimer {
        self.metrics
            .ledger_rpc_requests_total
            .with_label_values(&[method])
            .inc();
        self.metrics
            .ledger_rpc_latency_seconds
            .with_label_values(&[method])
            .start_timer()
    }
}

#[async_trait]
impl LedgerRpc for MeteredLedgerRpc {
    async fn get_account(&self, account_id: &str) -> Result<Account, LedgerError> {
        let _timer = self.start("getAccount");
        self.inner.get_account(account_id).await
    }

    async fn simulate_transaction(
        &self,
        tx: &LedgerTransaction,
    ) -> Result<SimulateResponse, LedgerError> {
        let _timer = self.start("simulateTransaction");
        self.inner.simulate_transaction(tx).await
    }

    async fn send_transaction(&self, tx: &LedgerTransaction) -> Result<SendResponse, LedgerError> {
        let _timer = self.start("sendTransaction");
        self.inner.send_transaction(tx).await
    }

    async fn get_transaction(&self, hash: &str) -> Result<GetTransactionResponse, LedgerError> {
        let _timer = self.start("getTransaction");
        self.inner.get_transaction(hash).await
    }
}
