//! # CLI Interface
//!
//! Defines the command-line argument structure for `anchorbook-node` using
//! `clap` derive. Every `serve` flag falls back to an environment variable
//! so the node can be configured entirely through its environment.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use anchorbook_protocol::config::{Network, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT};

/// Anchorbook node.
///
/// Serves the customer-record HTTP API, keeps records in a local store and
/// anchors their content hashes on a smart-contract ledger.
#[derive(Parser, Debug)]
#[command(
    name = "anchorbook-node",
    about = "Hash-anchored customer record service",
    version,
    propagate_version = true
)]
pub struct AnchorbookCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API.
    Serve(ServeArgs),
    /// Generate a fresh ledger signing key and print it.
    Keygen,
    /// Print version information and exit.
    Version,
}

/// Which ledger the node anchors against.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerBackend {
    /// A JSON-RPC ledger endpoint at `--rpc-url`.
    Rpc,
    /// An in-process sandbox ledger running the registry contract.
    Sandbox,
}

/// Log output format flag.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

/// Arguments for the `serve` subcommand.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Port for the customer API.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "METRICS_PORT", default_value_t = 9464)]
    pub metrics_port: u16,

    /// Directory holding the record store. Created on first run.
    #[arg(long, short = 'd', env = "ANCHORBOOK_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Ledger JSON-RPC endpoint. Required with `--ledger rpc`.
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: Option<String>,

    /// Address of the customer-registry contract.
    #[arg(long, env = "CONTRACT_ADDRESS")]
    pub contract_address: String,

    /// Hex-encoded Ed25519 seed of the key that signs every transaction.
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,

    /// Ledger account used when a request names no caller.
    #[arg(long, env = "DEFAULT_CALLER")]
    pub default_caller: String,

    /// Ledger network: public, testnet, futurenet or standalone.
    #[arg(long, env = "NETWORK", default_value_t = Network::Testnet)]
    pub network: Network,

    /// Ledger backend.
    #[arg(long, env = "LEDGER_BACKEND", value_enum, default_value_t = LedgerBackend::Rpc)]
    pub ledger: LedgerBackend,

    /// Delay between transaction status polls, in milliseconds.
    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64)]
    pub poll_interval_ms: u64,

    /// Give up polling a submitted transaction after this many seconds.
    #[arg(long, env = "POLL_TIMEOUT_SECS", default_value_t = DEFAULT_POLL_TIMEOUT.as_secs())]
    pub poll_timeout_secs: u64,

    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormatArg::Pretty)]
    pub log_format: LogFormatArg,
}
