//! Common transaction types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::crypto::keys::ChainKind;

/// Transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Submitted, not yet confirmed
    Pending,
    /// Confirmed (SOL) or mined (ETH)
    Confirmed,
    /// Executed with an error
    Failed,
}

/// A native transfer from one registry account
#[derive(Debug, Clone)]
pub struct TransferRequest {
    /// Sending account; its key signs the transaction
    pub from: Account,
    /// Recipient address on the sender's chain
    pub to_address: String,
    /// SOL in display units, or a raw wei count for ETH
    pub amount: Decimal,
}

impl TransferRequest {
    pub fn new(from: Account, to_address: impl Into<String>, amount: Decimal) -> Self {
        Self {
            from,
            to_address: to_address.into(),
            amount,
        }
    }

    pub fn chain(&self) -> ChainKind {
        self.from.chain()
    }
}

/// Outcome of a completed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// Chain the transfer ran on
    pub chain: ChainKind,
    /// Signature (SOL, base58) or transaction hash (ETH, 0x hex)
    pub tx_identifier: String,
    /// Whether the network reported the transfer as final
    pub confirmed: bool,
}

impl TransferReceipt {
    pub fn status(&self) -> TransactionStatus {
        if self.confirmed {
            TransactionStatus::Confirmed
        } else {
            TransactionStatus::Pending
        }
    }

    /// Block explorer page for the transaction
    pub fn explorer_url(&self) -> String {
        format!("{}/tx/{}", self.chain.explorer_base(), self.tx_identifier)
    }
}
