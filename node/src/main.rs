// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Anchorbook Node
//!
//! Entry point for the `anchorbook-node` binary. Parses CLI arguments,
//! initializes logging and metrics, opens the record store, connects the
//! ledger client and serves the customer API.
//!
//! The binary supports three subcommands:
//!
//! - `serve`   — start the API and metrics servers
//! - `keygen`  — generate a ledger signing key
//! - `version` — print build version information
//!
//! On SIGINT or SIGTERM, `serve` wakes requests still polling the ledger
//! and lets them finish before flushing the record store.

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;

use anchorbook_contracts::CustomerRegistry;
use anchorbook_protocol::anchor::AnchorService;
use anchorbook_protocol::config::{LedgerSettings, PROTOCOL_VERSION};
use anchorbook_protocol::crypto::LedgerKeypair;
use anchorbook_protocol::ledger::{
    HttpLedgerRpc, LedgerClient, LedgerRpc, SandboxConfig, SandboxLedger,
};
use anchorbook_protocol::storage::RecordDb;

use cli::{AnchorbookCli, Commands, LedgerBackend};
use logging::LogFormat;
use metrics::{MeteredLedgerRpc, NodeMetrics};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = AnchorbookCli::parse();

    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Keygen => {
            keygen();
            Ok(())
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the API server and the metrics endpoint.
async fn serve(args: cli::ServeArgs) -> Result<()> {
    logging::init_logging(
        "anchorbook_node=info,anchorbook_protocol=info,tower_http=debug",
        LogFormat::from(args.log_format),
    );

    tracing::info!(
        port = args.port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        network = %args.network,
        ledger = ?args.ledger,
        contract = %args.contract_address,
        "starting anchorbook-node"
    );

    // --- Record store ---
    let db_path = args.data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;
    let store = Arc::new(
        RecordDb::open(&db_path)
            .with_context(|| format!("failed to open record store at {}", db_path.display()))?,
    );
    tracing::info!(path = %db_path.display(), records = store.count(), "record store opened");

    // --- Signing key ---
    let signer = LedgerKeypair::from_hex(&args.private_key)
        .context("PRIVATE_KEY is not a valid hex Ed25519 seed")?;
    tracing::info!(signer = %signer.public_key(), "ledger signing key loaded");

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);

    // --- Ledger ---
    let backend: Arc<dyn LedgerRpc> = match args.ledger {
        LedgerBackend::Rpc => {
            let url = args
                .rpc_url
                .as_deref()
                .context("--rpc-url (RPC_URL) is required with --ledger rpc")?;
            tracing::info!(%url, "using JSON-RPC ledger");
            Arc::new(HttpLedgerRpc::new(url).context("failed to build ledger RPC client")?)
        }
        LedgerBackend::Sandbox => {
            tracing::warn!("using in-process sandbox ledger; anchors are lost on restart");
            Arc::new(SandboxLedger::new(
                CustomerRegistry,
                SandboxConfig::new(&args.contract_address, args.network)
                    .with_authorized_signer(signer.public_key()),
            ))
        }
    };
    let rpc: Arc<dyn LedgerRpc> =
        Arc::new(MeteredLedgerRpc::new(backend, Arc::clone(&node_metrics)));

    let settings = LedgerSettings::new(&args.contract_address, args.network).with_polling(
        Duration::from_millis(args.poll_interval_ms),
        Duration::from_secs(args.poll_timeout_secs),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ledger = LedgerClient::new(rpc, signer, settings).with_shutdown(shutdown_rx);

    // --- Application state ---
    let app_state = api::AppState {
        service: AnchorService::new(Arc::clone(&store), ledger),
        metrics: Arc::clone(&node_metrics),
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            PROTOCOL_VERSION,
        ),
        network: args.network.to_string(),
        contract_address: args.contract_address.clone(),
        default_caller: args.default_caller.clone(),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.port);
    let api_listener = TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    run_servers(
        (api_listener, api_router),
        (metrics_listener, metrics_router),
        async {
            shutdown_signal().await;
            tracing::info!("shutdown signal received");
        },
        shutdown_tx,
    )
    .await;

    store.flush().context("failed to flush record store")?;
    tracing::info!("anchorbook-node stopped");
    Ok(())
}

/// Serves both routers until `stop` resolves, then drains them.
///
/// `shutdown_tx` flips before the API server stops accepting, so requests
/// still polling the ledger end with `Cancelled` and answer normally.
async fn run_servers(
    (api_listener, api_router): (TcpListener, Router),
    (metrics_listener, metrics_router): (TcpListener, Router),
    stop: impl Future<Output = ()> + Send + 'static,
    shutdown_tx: watch::Sender<bool>,
) {
    let mut metrics_rx = shutdown_tx.subscribe();
    let metrics_server = tokio::spawn(async move {
        axum::serve(metrics_listener, metrics_router)
            .with_graceful_shutdown(async move {
                let _ = metrics_rx.wait_for(|stopping| *stopping).await;
            })
            .await
    });

    let api_shutdown = async move {
        stop.await;
        let _ = shutdown_tx.send(true);
    };
    if let Err(e) = axum::serve(api_listener, api_router)
        .with_graceful_shutdown(api_shutdown)
        .await
    {
        tracing::error!("API server error: {}", e);
    }

    match metrics_server.await {
        Ok(Err(e)) => tracing::error!("Metrics server error: {}", e),
        Err(e) => tracing::error!("Metrics server task failed: {}", e),
        Ok(Ok(())) => {}
    }
}

/// Generates a fresh signing key and prints both halves.
fn keygen() {
    let keypair = LedgerKeypair::generate();
    println!("Secret key : {}", keypair.secret_key_hex());
    println!("Public key : {}", keypair.public_key().to_hex());
    println!();
    println!("Set PRIVATE_KEY to the secret key. Keep it out of version control.");
}

/// Prints version information to stdout.
fn print_version() {
    println!("anchorbook-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol        {}", PROTOCOL_VERSION);
    println!("rustc           {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. If a handler cannot be
/// installed that branch never completes.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
