//! # Protocol Configuration & Constants
//!
//! Every magic number in Anchorbook lives here. Ledger fees, validity
//! windows, polling cadence and the network passphrases that scope
//! transaction signatures to a single network.
//!
//! Runtime configuration (endpoints, keys, ports) is parsed by the node
//! binary; this module only holds the defaults it falls back to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Protocol version string reported by the node's status endpoint.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Network Passphrases
// ---------------------------------------------------------------------------

/// Public network. Real fees.
pub const PUBLIC_PASSPHRASE: &str = "Public Global Stellar Network ; September 2015";

/// Test network. The default for every deployment that hasn't opted out.
pub const TESTNET_PASSPHRASE: &str = "Test SDF Network ; September 2015";

/// Future network, a preview of upcoming protocol versions.
pub const FUTURENET_PASSPHRASE: &str = "Test SDF Future Network ; October 2022";

/// Standalone network used by local quickstart containers and the sandbox.
pub const STANDALONE_PASSPHRASE: &str = "Standalone Network ; February 2017";

// ---------------------------------------------------------------------------
// Transaction Parameters
// ---------------------------------------------------------------------------

/// Inclusion fee per operation, in stroops. Resource fees resolved during
/// preparation are added on top of this.
pub const BASE_FEE: u32 = 100;

/// How long a built transaction stays valid before the ledger refuses it.
pub const TX_VALIDITY_WINDOW: Duration = Duration::from_secs(30);

/// Delay between two `getTransaction` polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on how long a submitted transaction is polled before the
/// client reports it as still pending. Matches the validity window: once the
/// window closes the ledger will never include the transaction.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout applied to every HTTP round-trip to the ledger RPC endpoint.
pub const RPC_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

// ---------------------------------------------------------------------------
// Contract Functions
// ---------------------------------------------------------------------------

/// Registers a new `(id, hash)` anchor.
pub const FN_CREATE_CUSTOMER: &str = "create_customer";

/// Reads the anchor for an id. Returns empty strings when absent.
pub const FN_GET_CUSTOMER: &str = "get_customer_by_id";

/// Overwrites the hash of an existing anchor.
pub const FN_UPDATE_CUSTOMER: &str = "update_customer";

// ---------------------------------------------------------------------------
// Network Selection
// ---------------------------------------------------------------------------

/// The ledger network a deployment talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Public,
    #[default]
    Testnet,
    Futurenet,
    Standalone,
}

impl Network {
    /// The passphrase mixed into every transaction hash on this network.
    pub fn passphrase(&self) -> &'static str {
        match self {
            Network::Public => PUBLIC_PASSPHRASE,
            Network::Testnet => TESTNET_PASSPHRASE,
            Network::Futurenet => FUTURENET_PASSPHRASE,
            Network::Standalone => STANDALONE_PASSPHRASE,
        }
    }

    /// Short name, mainly for logging and the status endpoint.
    pub fn name(&self) -> &'static str {
        match self {
            Network::Public => "public",
            Network::Testnet => "testnet",
            Network::Futurenet => "futurenet",
            Network::Standalone => "standalone",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" | "mainnet" => Ok(Network::Public),
            "testnet" => Ok(Network::Testnet),
            "futurenet" => Ok(Network::Futurenet),
            "standalone" | "local" => Ok(Network::Standalone),
            other => Err(format!("unknown network: {}", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger Client Settings
// ---------------------------------------------------------------------------

/// Everything the ledger client needs to build and settle transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSettings {
    /// Address of the customer-registry contract.
    pub contract_address: String,
    /// Network the contract is deployed on.
    pub network: Network,
    /// Inclusion fee per transaction, in stroops.
    pub base_fee: u32,
    /// Validity window applied to every built transaction.
    pub tx_validity: Duration,
    /// Delay between status polls.
    pub poll_interval: Duration,
    /// Give up polling after this long and report the tx as still pending.
    pub poll_timeout: Duration,
}

impl LedgerSettings {
    /// Settings with protocol defaults for the given contract and network.
    pub fn new(contract_address: impl Into<String>, network: Network) -> Self {
        Self {
            contract_address: contract_address.into(),
            network,
            base_fee: BASE_FEE,
            tx_validity: TX_VALIDITY_WINDOW,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Override the polling cadence.
    pub fn with_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.poll_timeout = timeout;
        self
    }
}
