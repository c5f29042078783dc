//! Wallet session
//!
//! One seed, its account registry, and the balance and transaction services
//! working on it. Every operation returns a classified [`Error`] instead of
//! notifying anyone directly.

use std::collections::HashMap;

use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::info;

use crate::account::{Account, AccountRegistry, BalanceTarget};
use crate::balance::{BalanceOracle, BalanceReading};
use crate::config::WalletConfig;
use crate::crypto::keys::{ChainKind, DerivationIndex};
use crate::crypto::mnemonic::{generate_mnemonic, MnemonicStrength};
use crate::error::{Error, Result};
use crate::transaction::{TransactionEngine, TransferReceipt, TransferRequest};

/// Result of refreshing one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceUpdate {
    pub target: BalanceTarget,
    pub reading: BalanceReading,
}

/// A wallet session
pub struct WalletSession {
    registry: RwLock<AccountRegistry>,
    oracle: BalanceOracle,
    engine: TransactionEngine,
}

impl WalletSession {
    /// Generate a new 12-word mnemonic
    pub fn generate_seed() -> Result<String> {
        generate_mnemonic(MnemonicStrength::default())
    }

    /// Open a session for `phrase` talking to the configured endpoints
    pub fn from_mnemonic(phrase: &str, config: &WalletConfig) -> Result<Self> {
        Ok(Self::new(
            AccountRegistry::from_mnemonic(phrase)?,
            BalanceOracle::from_config(config),
            TransactionEngine::from_config(config),
        ))
    }

    pub fn new(registry: AccountRegistry, oracle: BalanceOracle, engine: TransactionEngine) -> Self {
        Self {
            registry: RwLock::new(registry),
            oracle,
            engine,
        }
    }

    /// Derive and register the next account of `chain`
    pub async fn derive_next_account(&self, chain: ChainKind) -> Result<Account> {
        let mut registry = self.registry.write().await;
        registry.add_next(chain).cloned()
    }

    /// Remove an account; the other indices are unchanged
    pub async fn remove_account(&self, chain: ChainKind, index: DerivationIndex) -> Result<()> {
        self.registry.write().await.remove(chain, index)
    }

    /// Accounts whose address or label contains `query`, ignoring case
    pub async fn search_accounts(&self, query: &str) -> Vec<Account> {
        self.registry.read().await.search(query).cloned().collect()
    }

    /// All accounts in display order
    pub async fn accounts(&self) -> Vec<Account> {
        self.registry.read().await.accounts().to_vec()
    }

    pub async fn account(&self, chain: ChainKind, index: DerivationIndex) -> Result<Account> {
        self.registry
            .read()
            .await
            .get(chain, index)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("{} account {}", chain, index)))
    }

    /// Sum of cached balances, without unit conversion across chains
    pub async fn total_balance(&self) -> Decimal {
        self.registry.read().await.total_balance()
    }

    /// Refresh every balance concurrently.
    ///
    /// No lock is held while requests are in flight. The results are then
    /// written in a single step, so readers see either all old or all new
    /// balances. Failed reads store zero and are reported in the returned
    /// updates.
    pub async fn refresh_all_balances(&self) -> Vec<BalanceUpdate> {
        let targets = self.registry.read().await.snapshot();
        let readings = self.oracle.fetch_all(&targets).await;

        let updates: Vec<BalanceUpdate> = targets
            .into_iter()
            .zip(readings)
            .map(|(target, reading)| BalanceUpdate { target, reading })
            .collect();

        let balances: HashMap<_, _> = updates
            .iter()
            .map(|u| ((u.target.chain, u.target.index), u.reading.balance))
            .collect();
        self.registry.write().await.apply_balances(&balances);

        let failed = updates.iter().filter(|u| !u.reading.is_ok()).count();
        info!(accounts = updates.len(), failed, "Refreshed balances");
        updates
    }

    /// Send `amount` from account (`chain`, `index`) to `to_address`.
    ///
    /// SOL amounts are in SOL; ETH amounts are a wei count.
    pub async fn send_transfer(
        &self,
        chain: ChainKind,
        index: DerivationIndex,
        to_address: &str,
        amount: Decimal,
    ) -> Result<TransferReceipt> {
        let from = self.account(chain, index).await?;
        self.engine
            .transfer(&TransferRequest::new(from, to_address, amount))
            .await
    }

    /// Request a devnet airdrop to an account; only Solana has a faucet
    pub async fn request_airdrop(
        &self,
        chain: ChainKind,
        index: DerivationIndex,
        lamports: u64,
    ) -> Result<String> {
        let account = self.account(chain, index).await?;
        self.engine
            .request_airdrop(chain, account.address(), lamports)
            .await
    }
}
