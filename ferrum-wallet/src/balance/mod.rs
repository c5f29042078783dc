//! Balance retrieval
//!
//! Reads native balances over JSON-RPC and converts them from the chain's
//! smallest unit (lamports, wei) into its display unit. Failures never
//! propagate: they resolve to a zero balance plus the error that caused it.

use std::sync::Arc;

use futures::future::join_all;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::account::BalanceTarget;
use crate::config::WalletConfig;
use crate::crypto::keys::ChainKind;
use crate::error::{Error, Result};
use crate::transaction::provider::{HttpTransport, RpcTransport};

/// Outcome of one balance query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceReading {
    /// Balance in the chain's display unit, zero on failure
    pub balance: Decimal,
    /// Why the query failed, if it did
    pub error: Option<Error>,
}

impl BalanceReading {
    fn ok(balance: Decimal) -> Self {
        Self { balance, error: None }
    }

    fn failed(error: Error) -> Self {
        Self {
            balance: Decimal::ZERO,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-chain balance reader
#[derive(Clone)]
pub struct BalanceOracle {
    solana: Arc<dyn RpcTransport>,
    ethereum: Arc<dyn RpcTransport>,
}

impl BalanceOracle {
    pub fn new(solana: Arc<dyn RpcTransport>, ethereum: Arc<dyn RpcTransport>) -> Self {
        Self { solana, ethereum }
    }

    /// Oracle reading from the configured balance endpoints
    pub fn from_config(config: &WalletConfig) -> Self {
        Self::new(
            Arc::new(HttpTransport::balance(&config.solana)),
            Arc::new(HttpTransport::balance(&config.ethereum)),
        )
    }

    fn transport(&self, chain: ChainKind) -> &dyn RpcTransport {
        match chain {
            ChainKind::Solana => self.solana.as_ref(),
            ChainKind::Ethereum => self.ethereum.as_ref(),
        }
    }

    /// Fetch the balance of `address` with a single request.
    ///
    /// An empty address reads as zero without touching the network.
    pub async fn fetch_balance(&self, address: &str, chain: ChainKind) -> BalanceReading {
        if address.is_empty() {
            return BalanceReading::ok(Decimal::ZERO);
        }

        match self.query(address, chain).await {
            Ok(balance) => {
                debug!(chain = %chain, address, %balance, "Fetched balance");
                BalanceReading::ok(balance)
            }
            Err(e) => {
                let error = Error::BalanceFetchFailed(e.to_string());
                warn!(chain = %chain, address, error = %error, "Balance fetch failed, using 0");
                BalanceReading::failed(error)
            }
        }
    }

    /// Fetch every target concurrently; readings come back in target order
    pub async fn fetch_all(&self, targets: &[BalanceTarget]) -> Vec<BalanceReading> {
        join_all(
            targets
                .iter()
                .map(|target| self.fetch_balance(&target.address, target.chain)),
        )
        .await
    }

    async fn query(&self, address: &str, chain: ChainKind) -> Result<Decimal> {
        let params = match chain {
            ChainKind::Solana => json!([address]),
            ChainKind::Ethereum => json!([address, "latest"]),
        };
        let result = self.transport(chain).call(chain.balance_method(), params).await?;

        let smallest_units = match chain {
            ChainKind::Solana => parse_lamports(&result)?,
            ChainKind::Ethereum => parse_wei(&result)?,
        };
        to_display_units(smallest_units, chain)
    }
}

/// `{ "context": ..., "value": <u64> }`
fn parse_lamports(result: &Value) -> Result<u128> {
    result
        .get("value")
        .and_then(Value::as_u64)
        .map(u128::from)
        .ok_or_else(|| Error::Serialization(format!("Malformed getBalance result: {}", result)))
}

/// `"0x..."` hex quantity
fn parse_wei(result: &Value) -> Result<u128> {
    let malformed = || Error::Serialization(format!("Malformed eth_getBalance result: {}", result));

    let digits = result
        .as_str()
        .and_then(|s| s.strip_prefix("0x"))
        .ok_or_else(malformed)?;

    u128::from_str_radix(digits, 16).map_err(|_| malformed())
}

/// Scale an integer amount of the smallest unit down to the display unit
pub fn to_display_units(amount: u128, chain: ChainKind) -> Result<Decimal> {
    let amount = i128::try_from(amount)
        .map_err(|_| Error::Serialization(format!("Balance {} out of range", amount)))?;

    Decimal::try_from_i128_with_scale(amount, chain.decimals())
        .map(|d| d.normalize())
        .map_err(|e| Error::Serialization(format!("Balance {} out of range: {}", amount, e)))
}
