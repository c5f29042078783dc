//! Account registry

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::crypto::keys::{derive_key_pair, ChainKind, DerivationIndex, PrivateKey, PublicKey};
use crate::crypto::mnemonic::{mnemonic_to_seed, Seed};
use crate::error::{Error, Result};

/// Label shown for the first account of a chain
pub const MAIN_ACCOUNT_LABEL: &str = "Main Account";

/// A derived account.
///
/// Cloning an account shares the private key handle instead of copying the
/// key bytes; the bytes are wiped once the last handle is dropped.
#[derive(Clone)]
pub struct Account {
    index: DerivationIndex,
    chain: ChainKind,
    private_key: Arc<PrivateKey>,
    public_key: PublicKey,
    address: String,
    balance: Decimal,
}

impl Account {
    /// Derive account `index` on `chain` from `seed`, with a zero balance
    pub fn derive(seed: &Seed, chain: ChainKind, index: DerivationIndex) -> Result<Self> {
        let key_pair = derive_key_pair(seed, chain, index)?;
        let address = key_pair.address()?;
        let (private_key, public_key) = key_pair.into_parts();

        Ok(Self {
            index,
            chain,
            private_key: Arc::new(private_key),
            public_key,
            address,
            balance: Decimal::ZERO,
        })
    }

    pub fn index(&self) -> DerivationIndex {
        self.index
    }

    pub fn chain(&self) -> ChainKind {
        self.chain
    }

    /// Chain-native public address
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Last balance fetched for this account, in the chain's display unit
    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn derivation_path(&self) -> String {
        self.chain.derivation_path(self.index)
    }

    /// Display label: "Main Account" for index 0, "Account {index}" otherwise
    pub fn label(&self) -> String {
        if self.index == 0 {
            MAIN_ACCOUNT_LABEL.to_string()
        } else {
            format!("Account {}", self.index)
        }
    }

    pub(crate) fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    fn with_balance(&self, balance: Decimal) -> Self {
        Self { balance, ..self.clone() }
    }

    /// `query` must already be lowercase
    fn matches(&self, query: &str) -> bool {
        query.is_empty()
            || self.address.to_lowercase().contains(query)
            || self.label().to_lowercase().contains(query)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("index", &self.index)
            .field("chain", &self.chain)
            .field("address", &self.address)
            .field("balance", &self.balance)
            .finish_non_exhaustive()
    }
}

/// Where to look up one account's balance during a refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceTarget {
    pub chain: ChainKind,
    pub index: DerivationIndex,
    pub address: String,
}

/// Ordered collection of the accounts derived in one session.
///
/// Insertion order is display order. Indices come from a per-chain counter
/// that removal never rewinds, so a removed index is never handed out again.
/// Mutation needs `&mut self`; a single owner is expected to drive it.
pub struct AccountRegistry {
    seed: Seed,
    accounts: Vec<Account>,
    next_index: BTreeMap<ChainKind, DerivationIndex>,
}

impl AccountRegistry {
    /// Create an empty registry for a seed
    pub fn new(seed: Seed) -> Self {
        Self {
            seed,
            accounts: Vec::new(),
            next_index: BTreeMap::new(),
        }
    }

    /// Create an empty registry from a mnemonic phrase
    pub fn from_mnemonic(phrase: &str) -> Result<Self> {
        Ok(Self::new(mnemonic_to_seed(phrase)?))
    }

    /// Derive the next account for `chain` and append it
    pub fn add_next(&mut self, chain: ChainKind) -> Result<&Account> {
        let index = self.next_index.get(&chain).copied().unwrap_or(0);
        let account = Account::derive(&self.seed, chain, index)?;

        info!(chain = %chain, index, address = %account.address(), "Derived new account");

        self.next_index.insert(chain, index + 1);
        self.accounts.push(account);
        let last = self.accounts.len() - 1;
        Ok(&self.accounts[last])
    }

    /// Remove an account without renumbering the others
    pub fn remove(&mut self, chain: ChainKind, index: DerivationIndex) -> Result<()> {
        let before = self.accounts.len();
        self.accounts.retain(|a| !(a.chain == chain && a.index == index));

        if self.accounts.len() == before {
            return Err(Error::NotFound(format!("{} account {}", chain, index)));
        }

        info!(chain = %chain, index, "Removed account");
        Ok(())
    }

    /// Accounts whose address or label contains `query`, ignoring case.
    ///
    /// The iterator is lazy and can be cloned to restart it. An empty query
    /// matches every account.
    pub fn search<'a>(&'a self, query: &str) -> impl Iterator<Item = &'a Account> + Clone + 'a {
        let query = query.to_lowercase();
        self.accounts.iter().filter(move |account| account.matches(&query))
    }

    /// Sum of cached balances over all accounts, without unit conversion
    pub fn total_balance(&self) -> Decimal {
        self.accounts.iter().map(Account::balance).sum()
    }

    pub fn get(&self, chain: ChainKind, index: DerivationIndex) -> Option<&Account> {
        self.accounts.iter().find(|a| a.chain == chain && a.index == index)
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Addresses to query for a balance refresh
    pub fn snapshot(&self) -> Vec<BalanceTarget> {
        self.accounts
            .iter()
            .map(|a| BalanceTarget {
                chain: a.chain,
                index: a.index,
                address: a.address.clone(),
            })
            .collect()
    }

    /// Replace cached balances in one step.
    ///
    /// Accounts missing from `updates` keep their balance; updates for
    /// accounts removed in the meantime are ignored.
    pub fn apply_balances(&mut self, updates: &HashMap<(ChainKind, DerivationIndex), Decimal>) {
        let accounts = self
            .accounts
            .iter()
            .map(|a| match updates.get(&(a.chain, a.index)) {
                Some(balance) => a.with_balance(*balance),
                None => a.clone(),
            })
            .collect();

        self.accounts = accounts;
        debug!(updated = updates.len(), "Applied balance snapshot");
    }
}

impl fmt::Debug for AccountRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountRegistry")
            .field("accounts", &self.accounts)
            .field("next_index", &self.next_index)
            .finish_non_exhaustive()
    }
}
