//! Ferrum Wallet Core - deterministic multi-chain accounts
//!
//! This library derives Solana and Ethereum accounts from a single BIP-39
//! mnemonic, keeps them in an ordered registry, reads their balances over
//! JSON-RPC, and signs and submits native transfers.

pub mod error;
pub mod config;
pub mod crypto;
pub mod account;
pub mod balance;
pub mod transaction;
pub mod session;

// Re-export commonly used types for convenience
pub use error::{Error, Result};
pub use config::WalletConfig;
pub use crypto::keys::{ChainKind, DerivationIndex};
pub use account::{Account, AccountRegistry};
pub use balance::{BalanceOracle, BalanceReading};
pub use transaction::{TransactionEngine, TransferReceipt, TransferRequest};
pub use session::{BalanceUpdate, WalletSession};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_seed_opens_a_session() {
        let phrase = WalletSession::generate_seed().unwrap();
        assert_eq!(phrase.split_whitespace().count(), 12);
        assert!(WalletSession::from_mnemonic(&phrase, &WalletConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_mnemonic_is_rejected() {
        let result = WalletSession::from_mnemonic("not a real phrase", &WalletConfig::default());
        assert!(matches!(result, Err(Error::InvalidMnemonic(_))));
    }
}
