//! Wallet configuration

use serde::{Deserialize, Serialize};

use crate::crypto::keys::ChainKind;
use crate::error::{Error, Result};

/// Default Solana cluster
pub const DEFAULT_SOLANA_RPC_URL: &str = "https://api.devnet.solana.com";

/// Default Ethereum endpoint
pub const DEFAULT_ETHEREUM_RPC_URL: &str = "https://ethereum-sepolia-rpc.publicnode.com";

/// Default delay between confirmation polls
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// JSON-RPC endpoints for one chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEndpoint {
    /// Endpoint used to build and submit transactions
    pub rpc_url: String,
    /// Endpoint used for balance queries, the RPC endpoint if unset
    #[serde(default)]
    pub balance_url: Option<String>,
    /// Bearer token sent with every request (if required)
    #[serde(default)]
    pub api_key: Option<String>,
}

impl ChainEndpoint {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            balance_url: None,
            api_key: None,
        }
    }

    /// URL for balance queries
    pub fn balance_url(&self) -> &str {
        self.balance_url.as_deref().unwrap_or(&self.rpc_url)
    }

    fn from_env(prefix: &str, default_url: &str) -> Self {
        let rpc_url = std::env::var(format!("{}_RPC_URL", prefix))
            .unwrap_or_else(|_| default_url.to_string());

        Self {
            rpc_url,
            balance_url: std::env::var(format!("{}_BALANCE_URL", prefix)).ok(),
            api_key: std::env::var(format!("{}_API_KEY", prefix)).ok(),
        }
    }
}

/// Wallet configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Solana endpoints
    pub solana: ChainEndpoint,
    /// Ethereum endpoints
    pub ethereum: ChainEndpoint,
    /// Delay between confirmation polls in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub confirmation_poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            solana: ChainEndpoint::new(DEFAULT_SOLANA_RPC_URL),
            ethereum: ChainEndpoint::new(DEFAULT_ETHEREUM_RPC_URL),
            confirmation_poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl WalletConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        let confirmation_poll_interval_ms = std::env::var("CONFIRMATION_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| DEFAULT_POLL_INTERVAL_MS.to_string())
            .parse()
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS);

        Self {
            solana: ChainEndpoint::from_env("SOLANA", DEFAULT_SOLANA_RPC_URL),
            ethereum: ChainEndpoint::from_env("ETHEREUM", DEFAULT_ETHEREUM_RPC_URL),
            confirmation_poll_interval_ms,
        }
    }

    /// Parse configuration from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn endpoint(&self, chain: ChainKind) -> &ChainEndpoint {
        match chain {
            ChainKind::Solana => &self.solana,
            ChainKind::Ethereum => &self.ethereum,
        }
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.confirmation_poll_interval_ms)
    }
}
