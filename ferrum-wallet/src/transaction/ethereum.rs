//! Ethereum transaction functionality

use std::sync::Arc;
use std::time::Duration;

use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest as EthersTransactionRequest, U256, U64};
use ethers_signers::{LocalWallet, Signer};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::crypto::keys::{ChainKind, PrivateKey};
use crate::error::{Error, Result};
use super::provider::{call_as, RpcTransport};
use super::types::{TransferReceipt, TransferRequest};

/// Ethereum transfer engine
pub struct EthereumEngine {
    /// JSON-RPC provider
    transport: Arc<dyn RpcTransport>,
    /// Delay between receipt polls
    poll_interval: Duration,
}

impl EthereumEngine {
    /// Create a new Ethereum engine
    pub fn new(transport: Arc<dyn RpcTransport>, poll_interval: Duration) -> Self {
        Self {
            transport,
            poll_interval,
        }
    }

    /// Sign, submit and wait until the transfer is mined.
    ///
    /// `request.amount` is taken as a wei count as is; any fraction is dropped.
    pub async fn transfer(&self, request: &TransferRequest) -> Result<TransferReceipt> {
        let value = wei_amount(request.amount)?;
        let from = parse_address(request.from.address())?;
        let to = parse_address(&request.to_address)?;

        let hash = self
            .send_and_confirm(request.from.private_key(), from, to, value)
            .await
            .map_err(Error::into_submission_error)?;

        Ok(TransferReceipt {
            chain: ChainKind::Ethereum,
            tx_identifier: hash,
            confirmed: true,
        })
    }

    async fn send_and_confirm(
        &self,
        private_key: &PrivateKey,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<String> {
        let transport = self.transport.as_ref();

        let chain_id: U64 = call_as(transport, "eth_chainId", json!([])).await?;
        let nonce: U256 = call_as(transport, "eth_getTransactionCount", json!([from, "pending"])).await?;
        let gas_price: U256 = call_as(transport, "eth_gasPrice", json!([])).await?;
        let gas: U256 = call_as(
            transport,
            "eth_estimateGas",
            json!([{ "from": from, "to": to, "value": value }]),
        )
        .await?;

        let tx: TypedTransaction = EthersTransactionRequest::new()
            .from(from)
            .to(to)
            .value(value)
            .nonce(nonce)
            .gas(gas)
            .gas_price(gas_price)
            .chain_id(chain_id.as_u64())
            .into();

        let raw = sign_eip155_transaction(private_key, from, &tx)?;
        let hash: String = call_as(transport, "eth_sendRawTransaction", json!([raw])).await?;

        info!(
            from = ?from,
            to = ?to,
            %value,
            nonce = %nonce,
            %hash,
            "Submitted ETH transfer"
        );

        self.await_receipt(&hash).await?;
        Ok(hash)
    }

    /// Poll until a receipt exists; a receipt with status 0 is a rejection.
    ///
    /// Failed polls are logged and retried since the transaction may still
    /// be mined.
    async fn await_receipt(&self, hash: &str) -> Result<()> {
        loop {
            let receipt: Result<Option<Value>> =
                call_as(self.transport.as_ref(), "eth_getTransactionReceipt", json!([hash])).await;

            match receipt {
                Ok(Some(receipt)) => {
                    let status = receipt.get("status").and_then(Value::as_str);
                    if status == Some("0x0") {
                        return Err(Error::TransactionRejected(format!("{} reverted", hash)));
                    }
                    return Ok(());
                }
                Ok(None) => debug!(%hash, "Waiting for receipt"),
                Err(e) => warn!(%hash, error = %e, "Receipt poll failed"),
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Whole wei in `amount`; must be positive
pub fn wei_amount(amount: Decimal) -> Result<U256> {
    amount
        .trunc()
        .to_u128()
        .filter(|wei| *wei > 0)
        .map(U256::from)
        .ok_or_else(|| Error::InvalidAmount(format!("{} is not a positive wei amount", amount)))
}

fn parse_address(address: &str) -> Result<Address> {
    address
        .parse()
        .map_err(|e| Error::InvalidAddress(format!("{}: {}", address, e)))
}

/// Sign `tx` as `from` and return the RLP encoded signed transaction
pub fn sign_eip155_transaction(private_key: &PrivateKey, from: Address, tx: &TypedTransaction) -> Result<Bytes> {
    if private_key.chain() != ChainKind::Ethereum {
        return Err(Error::DerivationFailure("Not an Ethereum private key".to_string()));
    }

    let wallet = LocalWallet::from_bytes(private_key.as_bytes())
        .map_err(|e| Error::DerivationFailure(format!("Invalid private key: {}", e)))?;
    if wallet.address() != from {
        return Err(Error::DerivationFailure("Private key does not match the sender".to_string()));
    }

    let signature = wallet
        .sign_transaction_sync(tx)
        .map_err(|e| Error::TransactionRejected(format!("Signing failed: {}", e)))?;

    Ok(tx.rlp_signed(&signature))
}
