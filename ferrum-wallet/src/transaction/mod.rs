//! Transaction functionality
//!
//! This module builds, signs and submits native transfers and waits until
//! the network reports them final.

pub mod types;
mod ethereum;
mod solana;
pub mod provider;

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::error;

use crate::account::validate_address;
use crate::config::WalletConfig;
use crate::crypto::keys::ChainKind;
use crate::error::{Error, Result};
use provider::{HttpTransport, RpcTransport};

pub use types::*;
pub use ethereum::*;
pub use solana::*;

/// Dispatches transfers to the engine of the sender's chain
pub struct TransactionEngine {
    solana: SolanaEngine,
    ethereum: EthereumEngine,
}

impl TransactionEngine {
    pub fn new(
        solana: Arc<dyn RpcTransport>,
        ethereum: Arc<dyn RpcTransport>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            solana: SolanaEngine::new(solana, poll_interval),
            ethereum: EthereumEngine::new(ethereum, poll_interval),
        }
    }

    /// Engine submitting to the configured RPC endpoints
    pub fn from_config(config: &WalletConfig) -> Self {
        Self::new(
            Arc::new(HttpTransport::rpc(&config.solana)),
            Arc::new(HttpTransport::rpc(&config.ethereum)),
            config.poll_interval(),
        )
    }

    /// Validate, sign, submit and wait for a terminal state.
    ///
    /// Amount and recipient are checked before any request is made. Nothing
    /// is retried.
    pub async fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt> {
        let chain = request.chain();

        if request.amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(format!("{} must be positive", request.amount)));
        }
        validate_address(&request.to_address, chain)?;

        let result = match chain {
            ChainKind::Solana => self.solana.transfer(request).await,
            ChainKind::Ethereum => self.ethereum.transfer(request).await,
        };

        if let Err(e) = &result {
            error!(chain = %chain, from = %request.from.address(), to = %request.to_address, error = %e, "Transfer failed");
        }
        result
    }

    /// Request a devnet airdrop to `address`; Solana only
    pub async fn request_airdrop(&self, chain: ChainKind, address: &str, lamports: u64) -> Result<String> {
        match chain {
            ChainKind::Solana => self.solana.request_airdrop(address, lamports).await,
            ChainKind::Ethereum => Err(Error::NotSupported("Airdrops are only available on Solana".to_string())),
        }
    }
}
