//! Ferrum Wallet CLI
//!
//! Derives accounts from a mnemonic, reads balances and sends native
//! transfers against the endpoints configured in the environment.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ferrum_wallet::crypto::mnemonic::{generate_mnemonic, MnemonicStrength};
use ferrum_wallet::transaction::LAMPORTS_PER_SOL;
use ferrum_wallet::{ChainKind, DerivationIndex, WalletConfig, WalletSession};

#[derive(Parser)]
#[command(name = "ferrum")]
#[command(about = "Ferrum Wallet command line")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Wallet mnemonic phrase
    #[arg(long, env = "FERRUM_MNEMONIC", global = true, hide_env_values = true)]
    mnemonic: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a new mnemonic phrase
    Generate {
        /// 24 words instead of 12
        #[arg(long)]
        words24: bool,
    },
    /// List derived addresses
    Derive {
        /// sol or eth
        #[arg(long, default_value = "sol")]
        chain: ChainKind,
        /// Number of accounts
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Derive accounts and fetch their balances
    Balance {
        #[arg(long, default_value = "sol")]
        chain: ChainKind,
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Send a native transfer (SOL in SOL, ETH in wei)
    Send {
        #[arg(long, default_value = "sol")]
        chain: ChainKind,
        /// Index of the sending account
        #[arg(long, default_value_t = 0)]
        index: DerivationIndex,
        /// Recipient address
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: Decimal,
    },
    /// Request a devnet airdrop
    Airdrop {
        #[arg(long, default_value_t = 0)]
        index: DerivationIndex,
        #[arg(long, default_value_t = LAMPORTS_PER_SOL)]
        lamports: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Commands::Generate { words24 } = cli.command {
        let strength = if words24 {
            MnemonicStrength::Words24
        } else {
            MnemonicStrength::Words12
        };
        println!("{}", generate_mnemonic(strength)?);
        return Ok(());
    }

    let mnemonic = cli
        .mnemonic
        .as_deref()
        .context("No mnemonic given; pass --mnemonic or set FERRUM_MNEMONIC")?;
    let config = WalletConfig::from_env();
    info!(solana = %config.solana.rpc_url, ethereum = %config.ethereum.rpc_url, "Using endpoints");

    let session = WalletSession::from_mnemonic(mnemonic, &config)?;

    match cli.command {
        Commands::Generate { .. } => {}
        Commands::Derive { chain, count } => {
            derive_accounts(&session, chain, count).await?;
            for account in session.accounts().await {
                println!("{:<14} {:<20} {}", account.label(), account.derivation_path(), account.address());
                println!("{:<14} {}", "", chain.explorer_url(account.address()));
            }
        }
        Commands::Balance { chain, count } => {
            derive_accounts(&session, chain, count).await?;
            for update in session.refresh_all_balances().await {
                match update.reading.error {
                    Some(e) => println!("{}  error: {}", update.target.address, e),
                    None => println!("{}  {} {}", update.target.address, update.reading.balance, chain),
                }
            }
            println!("total: {} {}", session.total_balance().await, chain);
        }
        Commands::Send { chain, index, to, amount } => {
            derive_accounts(&session, chain, account_count(index)?).await?;
            let receipt = session
                .send_transfer(chain, index, &to, amount)
                .await
                .context("Transfer failed")?;
            println!("{}", receipt.tx_identifier);
            println!("{}", receipt.explorer_url());
        }
        Commands::Airdrop { index, lamports } => {
            derive_accounts(&session, ChainKind::Solana, account_count(index)?).await?;
            let signature = session
                .request_airdrop(ChainKind::Solana, index, lamports)
                .await
                .context("Airdrop failed")?;
            println!("{}", signature);
        }
    }

    Ok(())
}

/// Number of accounts to derive so that `index` exists
fn account_count(index: DerivationIndex) -> Result<u32> {
    index
        .checked_add(1)
        .with_context(|| format!("Account index {} is out of range", index))
}

async fn derive_accounts(session: &WalletSession, chain: ChainKind, count: u32) -> Result<()> {
    for _ in 0..count {
        session.derive_next_account(chain).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_count() {
        assert_eq!(account_count(0).unwrap(), 1);
        assert_eq!(account_count(4).unwrap(), 5);
        assert!(account_count(u32::MAX).is_err());
    }
}
