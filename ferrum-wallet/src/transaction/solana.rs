//! Solana transaction functionality
//!
//! Transfers are built as legacy transactions holding a single System Program
//! `Transfer` instruction, signed with the sender's ed25519 key and submitted
//! over JSON-RPC.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use ed25519_dalek::{Signer, SigningKey};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::crypto::keys::{ChainKind, PrivateKey};
use crate::error::{Error, Result};
use super::provider::{call_as, RpcTransport};
use super::types::{TransactionStatus, TransferReceipt, TransferRequest};

/// Lamports in one SOL
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// System Program id, base58 `11111111111111111111111111111111`
pub const SYSTEM_PROGRAM_ID: [u8; 32] = [0u8; 32];

/// System Program instruction tag for `Transfer`
const SYSTEM_TRANSFER: u32 = 2;

/// Recent blockhash and the last block height at which it is accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentBlockhash {
    pub blockhash: [u8; 32],
    pub last_valid_block_height: u64,
}

#[derive(Deserialize)]
struct RpcContextual<T> {
    value: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcBlockhash {
    blockhash: String,
    last_valid_block_height: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcSignatureStatus {
    #[serde(default)]
    err: Option<Value>,
    #[serde(default)]
    confirmation_status: Option<String>,
}

impl RpcSignatureStatus {
    fn status(&self) -> TransactionStatus {
        if self.err.as_ref().is_some_and(|e| !e.is_null()) {
            return TransactionStatus::Failed;
        }
        match self.confirmation_status.as_deref() {
            Some("confirmed") | Some("finalized") => TransactionStatus::Confirmed,
            _ => TransactionStatus::Pending,
        }
    }
}

/// Solana transfer engine
pub struct SolanaEngine {
    /// Cluster RPC
    transport: Arc<dyn RpcTransport>,
    /// Delay between signature status polls
    poll_interval: Duration,
}

impl SolanaEngine {
    /// Create a new Solana engine
    pub fn new(transport: Arc<dyn RpcTransport>, poll_interval: Duration) -> Self {
        Self {
            transport,
            poll_interval,
        }
    }

    /// Sign, submit and wait until the cluster reports the transfer confirmed.
    ///
    /// The recipient and amount must already be validated.
    pub async fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt> {
        let lamports = sol_to_lamports(request.amount)?;
        let from = decode_pubkey(request.from.address())?;
        let to = decode_pubkey(&request.to_address)?;

        let signature = self
            .send_and_confirm(request, &from, &to, lamports)
            .await
            .map_err(Error::into_submission_error)?;

        Ok(TransferReceipt {
            chain: ChainKind::Solana,
            tx_identifier: signature,
            confirmed: true,
        })
    }

    async fn send_and_confirm(
        &self,
        request: &TransferRequest,
        from: &[u8; 32],
        to: &[u8; 32],
        lamports: u64,
    ) -> Result<String> {
        let recent = self.latest_blockhash().await?;
        let message = transfer_message(from, to, lamports, &recent.blockhash);
        let transaction = sign_message(request.from.private_key(), from, &message)?;

        let signature = self.submit(&transaction).await?;
        info!(
            from = %request.from.address(),
            to = %request.to_address,
            lamports,
            %signature,
            "Submitted SOL transfer"
        );

        self.await_confirmation(&signature, recent.last_valid_block_height).await?;
        Ok(signature)
    }

    /// Ask a devnet or testnet faucet for `lamports`; returns the airdrop
    /// signature without waiting for confirmation
    pub async fn request_airdrop(&self, address: &str, lamports: u64) -> Result<String> {
        decode_pubkey(address)?;
        if lamports == 0 {
            return Err(Error::InvalidAmount("Airdrop amount must be positive".to_string()));
        }

        let signature: String = call_as(
            self.transport.as_ref(),
            "requestAirdrop",
            json!([address, lamports]),
        )
        .await?;

        info!(address, lamports, %signature, "Requested airdrop");
        Ok(signature)
    }

    /// Fetch a blockhash at `confirmed` commitment
    pub async fn latest_blockhash(&self) -> Result<RecentBlockhash> {
        let response: RpcContextual<RpcBlockhash> = call_as(
            self.transport.as_ref(),
            "getLatestBlockhash",
            json!([{ "commitment": "confirmed" }]),
        )
        .await?;

        let bytes = bs58::decode(&response.value.blockhash)
            .into_vec()
            .map_err(|e| Error::Serialization(format!("Invalid blockhash: {}", e)))?;
        let blockhash: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::Serialization("Blockhash must be 32 bytes".to_string()))?;

        Ok(RecentBlockhash {
            blockhash,
            last_valid_block_height: response.value.last_valid_block_height,
        })
    }

    async fn submit(&self, transaction: &[u8]) -> Result<String> {
        let encoded = general_purpose::STANDARD.encode(transaction);
        call_as(
            self.transport.as_ref(),
            "sendTransaction",
            json!([encoded, { "encoding": "base64", "preflightCommitment": "confirmed" }]),
        )
        .await
    }

    /// Poll until the signature is confirmed or fails, or its blockhash expires.
    ///
    /// The transaction is already broadcast, so a failed poll is logged and
    /// retried rather than reported.
    async fn await_confirmation(&self, signature: &str, last_valid_block_height: u64) -> Result<()> {
        loop {
            match self.signature_status(signature).await {
                Ok(Some(status)) => match status.status() {
                    TransactionStatus::Confirmed => return Ok(()),
                    TransactionStatus::Failed => {
                        return Err(Error::TransactionRejected(format!(
                            "{} failed: {}",
                            signature,
                            status.err.unwrap_or_default()
                        )));
                    }
                    TransactionStatus::Pending => {}
                },
                Ok(None) => match self.block_height().await {
                    Ok(height) if height > last_valid_block_height => {
                        return Err(Error::TransactionRejected(format!(
                            "{} expired at block height {}",
                            signature, last_valid_block_height
                        )));
                    }
                    Ok(_) => {}
                    Err(e) => warn!(%signature, error = %e, "Block height poll failed"),
                },
                Err(e) => warn!(%signature, error = %e, "Signature status poll failed"),
            }

            debug!(%signature, "Waiting for confirmation");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn block_height(&self) -> Result<u64> {
        call_as(
            self.transport.as_ref(),
            "getBlockHeight",
            json!([{ "commitment": "confirmed" }]),
        )
        .await
    }

    /// `None` while the cluster has not seen the signature
    async fn signature_status(&self, signature: &str) -> Result<Option<RpcSignatureStatus>> {
        let response: RpcContextual<Vec<Option<RpcSignatureStatus>>> = call_as(
            self.transport.as_ref(),
            "getSignatureStatuses",
            json!([[signature], { "searchTransactionHistory": false }]),
        )
        .await?;

        Ok(response.value.into_iter().next().flatten())
    }
}

/// Convert SOL to lamports, truncating sub-lamport digits
pub fn sol_to_lamports(amount: Decimal) -> Result<u64> {
    amount
        .checked_mul(Decimal::from(LAMPORTS_PER_SOL))
        .map(|lamports| lamports.trunc())
        .and_then(|lamports| lamports.to_u64())
        .filter(|lamports| *lamports > 0)
        .ok_or_else(|| Error::InvalidAmount(format!("{} SOL is not a positive lamport amount", amount)))
}

/// Decode a base58 address into a 32-byte public key
pub fn decode_pubkey(address: &str) -> Result<[u8; 32]> {
    bs58::decode(address)
        .into_vec()
        .ok()
        .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
        .ok_or_else(|| Error::InvalidAddress(address.to_string()))
}

/// Serialize the legacy message of a single System Program transfer.
///
/// The sender is the only signer and pays the fee. A transfer to oneself
/// lists the sender once.
pub fn transfer_message(from: &[u8; 32], to: &[u8; 32], lamports: u64, recent_blockhash: &[u8; 32]) -> Vec<u8> {
    let mut account_keys: Vec<&[u8; 32]> = vec![from];
    if to != from {
        account_keys.push(to);
    }
    account_keys.push(&SYSTEM_PROGRAM_ID);

    let program_index = (account_keys.len() - 1) as u8;
    let to_index = if to == from { 0u8 } else { 1u8 };

    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());

    let mut message = Vec::with_capacity(3 + 32 * account_keys.len() + 32 + 20);

    // required signatures, read-only signed, read-only unsigned
    message.extend_from_slice(&[1, 0, 1]);

    encode_length(account_keys.len(), &mut message);
    for key in &account_keys {
        message.extend_from_slice(*key);
    }

    message.extend_from_slice(recent_blockhash);

    encode_length(1, &mut message);
    message.push(program_index);
    encode_length(2, &mut message);
    message.extend_from_slice(&[0, to_index]);
    encode_length(data.len(), &mut message);
    message.extend_from_slice(&data);

    message
}

/// Sign `message` and serialize the resulting single-signer transaction
pub fn sign_message(private_key: &PrivateKey, signer: &[u8; 32], message: &[u8]) -> Result<Vec<u8>> {
    if private_key.chain() != ChainKind::Solana {
        return Err(Error::DerivationFailure("Not a Solana private key".to_string()));
    }

    let signing_key = SigningKey::from_bytes(private_key.as_bytes());
    if signing_key.verifying_key().as_bytes() != signer {
        return Err(Error::DerivationFailure("Private key does not match the sender".to_string()));
    }

    let signature = signing_key.sign(message);

    let mut transaction = Vec::with_capacity(1 + 64 + message.len());
    encode_length(1, &mut transaction);
    transaction.extend_from_slice(&signature.to_bytes());
    transaction.extend_from_slice(message);
    Ok(transaction)
}

/// Solana's compact-u16 length prefix
fn encode_length(len: usize, out: &mut Vec<u8>) {
    let mut rem = len as u16;
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            out.push(byte);
            break;
        }
        byte |= 0x80;
        out.push(byte);
    }
}
