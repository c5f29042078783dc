//! Error types for the ferrum-wallet library

use serde_json::Value;
use thiserror::Error;

/// Custom error type for wallet operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("Key derivation failed: {0}")]
    DerivationFailure(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("Transaction rejected: {0}")]
    TransactionRejected(String),

    #[error("Balance fetch failed: {0}")]
    BalanceFetchFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// JSON-RPC `error` member; `data` holds node details such as
    /// preflight simulation logs
    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl Error {
    /// Sort a failure raised while submitting or confirming a transfer into
    /// `InsufficientFunds` or `TransactionRejected`.
    ///
    /// Errors that are already classified pass through untouched.
    pub fn into_submission_error(self) -> Self {
        match self {
            Error::InsufficientFunds(_)
            | Error::TransactionRejected(_)
            | Error::InvalidAddress(_)
            | Error::InvalidAmount(_) => self,
            Error::Rpc { message, data, .. } => {
                let short = indicates_insufficient_funds(&message)
                    || data.as_ref().is_some_and(data_indicates_insufficient_funds);
                if short {
                    Error::InsufficientFunds(message)
                } else {
                    Error::TransactionRejected(message)
                }
            }
            other => {
                let message = other.to_string();
                if indicates_insufficient_funds(&message) {
                    Error::InsufficientFunds(message)
                } else {
                    Error::TransactionRejected(message)
                }
            }
        }
    }
}

fn indicates_insufficient_funds(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("insufficient funds")
        || message.contains("insufficient lamports")
        || message.contains("insufficient balance")
        || message.contains("no record of a prior credit")
}

/// Inspect Solana preflight details: program logs and the simulation error.
fn data_indicates_insufficient_funds(data: &Value) -> bool {
    let logged = data
        .get("logs")
        .and_then(Value::as_array)
        .is_some_and(|logs| logs.iter().filter_map(Value::as_str).any(indicates_insufficient_funds));

    let err = data.get("err").unwrap_or(&Value::Null);

    // "InsufficientFundsForFee", { "InsufficientFundsForRent": { .. } }
    let fee_or_rent = err.as_str().is_some_and(|e| e.starts_with("InsufficientFunds"))
        || err
            .as_object()
            .is_some_and(|e| e.keys().any(|k| k.starts_with("InsufficientFunds")));

    // System Program error 1: the source cannot cover the transfer
    let system_transfer = err
        .get("InstructionError")
        .and_then(|e| e.get(1))
        .and_then(|e| e.get("Custom"))
        .and_then(Value::as_u64)
        == Some(1);

    logged || fee_or_rent || system_transfer
}

/// Result type for wallet operations
pub type Result<T> = std::result::Result<T, Error>;
