//! Tests for transaction functionality

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use rust_decimal::Decimal;
use serde_json::json;

use ferrum_wallet::account::AccountRegistry;
use ferrum_wallet::balance::BalanceOracle;
use ferrum_wallet::transaction::provider::MockTransport;
use ferrum_wallet::transaction::{TransactionEngine, LAMPORTS_PER_SOL};
use ferrum_wallet::{ChainKind, Error, WalletSession};

const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
const ETH_RECIPIENT: &str = "0x9858EfFD232B4033E47d90003D41EC34EcaEda94";
const BLOCKHASH: &str = "11111111111111111111111111111111";
const SIGNATURE: &str = "5VERv8NMvzbJMEkV8xnrLkEaWRtSz9CosKDYjCJjBRnbJLgp8uirBgmQpjKhoR4tjF3ZpRzrFmBV6UjKdiSZkQUW";
const TX_HASH: &str = "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b";

struct Harness {
    session: WalletSession,
    solana: Arc<MockTransport>,
    ethereum: Arc<MockTransport>,
}

fn harness() -> Harness {
    let solana = Arc::new(MockTransport::new());
    let ethereum = Arc::new(MockTransport::new());

    let registry = AccountRegistry::from_mnemonic(MNEMONIC).unwrap();
    let oracle = BalanceOracle::new(solana.clone(), ethereum.clone());
    let engine = TransactionEngine::new(solana.clone(), ethereum.clone(), Duration::from_millis(1));

    Harness {
        session: WalletSession::new(registry, oracle, engine),
        solana,
        ethereum,
    }
}

fn script_solana_submission(mock: &MockTransport) {
    mock.respond(
        "getLatestBlockhash",
        json!({ "context": { "slot": 10 }, "value": { "blockhash": BLOCKHASH, "lastValidBlockHeight": 150 } }),
    );
    mock.respond("sendTransaction", json!(SIGNATURE));
}

fn script_ethereum_submission(mock: &MockTransport) {
    mock.respond("eth_chainId", json!("0xaa36a7"));
    mock.respond("eth_getTransactionCount", json!("0x2"));
    mock.respond("eth_gasPrice", json!("0x3b9aca00"));
    mock.respond("eth_estimateGas", json!("0x5208"));
    mock.respond("eth_sendRawTransaction", json!(TX_HASH));
}

#[tokio::test]
async fn test_invalid_recipient_makes_no_network_call() {
    let h = harness();
    h.session.derive_next_account(ChainKind::Solana).await.unwrap();
    h.session.derive_next_account(ChainKind::Ethereum).await.unwrap();

    let err = h
        .session
        .send_transfer(ChainKind::Solana, 0, "not-an-address", Decimal::ONE)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidAddress(_)));

    let err = h
        .session
        .send_transfer(ChainKind::Ethereum, 0, "0x1234", Decimal::ONE)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidAddress(_)));

    assert_eq!(h.solana.call_count(), 0);
    assert_eq!(h.ethereum.call_count(), 0);
}

#[tokio::test]
async fn test_non_positive_amount_makes_no_network_call() {
    let h = harness();
    h.session.derive_next_account(ChainKind::Ethereum).await.unwrap();

    for amount in [Decimal::ZERO, Decimal::new(-1, 0)] {
        let err = h
            .session
            .send_transfer(ChainKind::Ethereum, 0, ETH_RECIPIENT, amount)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));
    }

    assert_eq!(h.ethereum.call_count(), 0);
}

#[tokio::test]
async fn test_unknown_sender_is_not_found() {
    let h = harness();

    let err = h
        .session
        .send_transfer(ChainKind::Solana, 4, BLOCKHASH, Decimal::ONE)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn test_solana_transfer_confirms() {
    let h = harness();
    h.session.derive_next_account(ChainKind::Solana).await.unwrap();
    let recipient = h.session.derive_next_account(ChainKind::Solana).await.unwrap();

    script_solana_submission(&h.solana);
    h.solana
        .respond("getSignatureStatuses", json!({ "context": { "slot": 11 }, "value": [null] }))
        .respond(
            "getSignatureStatuses",
            json!({ "context": { "slot": 12 }, "value": [{ "slot": 12, "confirmations": 0, "err": null, "confirmationStatus": "processed" }] }),
        )
        .respond(
            "getSignatureStatuses",
            json!({ "context": { "slot": 13 }, "value": [{ "slot": 12, "confirmations": 1, "err": null, "confirmationStatus": "confirmed" }] }),
        );
    h.solana.respond("getBlockHeight", json!(100));

    let receipt = h
        .session
        .send_transfer(ChainKind::Solana, 0, recipient.address(), Decimal::new(15, 1))
        .await
        .unwrap();

    assert_eq!(receipt.chain, ChainKind::Solana);
    assert_eq!(receipt.tx_identifier, SIGNATURE);
    assert!(receipt.confirmed);
    assert_eq!(h.solana.calls_to("sendTransaction"), 1);
    assert_eq!(h.solana.calls_to("getSignatureStatuses"), 3);

    // the submitted transaction carries 1.5 SOL in lamports
    let params = h.solana.params_of("sendTransaction");
    assert_eq!(params[0][1]["encoding"], "base64");
    let encoded = params[0][0].as_str().unwrap();
    let transaction = general_purpose::STANDARD.decode(encoded).unwrap();
    let lamports = u64::from_le_bytes(transaction[transaction.len() - 8..].try_into().unwrap());
    assert_eq!(lamports, 3 * LAMPORTS_PER_SOL / 2);
}

#[tokio::test]
async fn test_solana_insufficient_funds() {
    let h = harness();
    h.session.derive_next_account(ChainKind::Solana).await.unwrap();
    let recipient = h.session.derive_next_account(ChainKind::Solana).await.unwrap();

    h.solana.respond(
        "getLatestBlockhash",
        json!({ "context": { "slot": 10 }, "value": { "blockhash": BLOCKHASH, "lastValidBlockHeight": 150 } }),
    );
    h.solana.fail(
        "sendTransaction",
        Error::Rpc {
            code: -32002,
            message: "Transaction simulation failed: Attempt to debit an account but found no record of a prior credit.".to_string(),
            data: None,
        },
    );

    let err = h
        .session
        .send_transfer(ChainKind::Solana, 0, recipient.address(), Decimal::ONE)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InsufficientFunds(_)));
    assert_eq!(h.solana.calls_to("getSignatureStatuses"), 0);
}

#[tokio::test]
async fn test_solana_failed_status_is_rejected() {
    let h = harness();
    h.session.derive_next_account(ChainKind::Solana).await.unwrap();
    let recipient = h.session.derive_next_account(ChainKind::Solana).await.unwrap();

    script_solana_submission(&h.solana);
    h.solana.respond(
        "getSignatureStatuses",
        json!({ "context": { "slot": 12 }, "value": [{ "slot": 12, "err": { "InstructionError": [0, "InvalidAccountData"] }, "confirmationStatus": "confirmed" }] }),
    );

    let err = h
        .session
        .send_transfer(ChainKind::Solana, 0, recipient.address(), Decimal::ONE)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TransactionRejected(_)));
}

#[tokio::test]
async fn test_solana_expired_blockhash_is_rejected() {
    let h = harness();
    h.session.derive_next_account(ChainKind::Solana).await.unwrap();
    let recipient = h.session.derive_next_account(ChainKind::Solana).await.unwrap();

    script_solana_submission(&h.solana);
    h.solana.respond("getSignatureStatuses", json!({ "context": { "slot": 12 }, "value": [null] }));
    h.solana.respond("getBlockHeight", json!(149)).respond("getBlockHeight", json!(151));

    let err = h
        .session
        .send_transfer(ChainKind::Solana, 0, recipient.address(), Decimal::ONE)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TransactionRejected(_)));
    assert_eq!(h.solana.calls_to("getBlockHeight"), 2);
}

#[tokio::test]
async fn test_ethereum_transfer_waits_for_receipt() {
    let h = harness();
    let sender = h.session.derive_next_account(ChainKind::Ethereum).await.unwrap();

    script_ethereum_submission(&h.ethereum);
    h.ethereum
        .respond("eth_getTransactionReceipt", json!(null))
        .respond("eth_getTransactionReceipt", json!(null))
        .respond("eth_getTransactionReceipt", json!({ "transactionHash": TX_HASH, "status": "0x1" }));

    let receipt = h
        .session
        .send_transfer(ChainKind::Ethereum, 0, ETH_RECIPIENT, Decimal::new(1_000, 0))
        .await
        .unwrap();

    assert_eq!(receipt.chain, ChainKind::Ethereum);
    assert_eq!(receipt.tx_identifier, TX_HASH);
    assert!(receipt.confirmed);
    assert_eq!(h.ethereum.calls_to("eth_getTransactionReceipt"), 3);

    let nonce_params = h.ethereum.params_of("eth_getTransactionCount");
    assert_eq!(nonce_params[0][0].as_str().unwrap().to_lowercase(), sender.address().to_lowercase());
    assert_eq!(nonce_params[0][1], "pending");

    // amount is passed through as wei
    let estimate = h.ethereum.params_of("eth_estimateGas");
    assert_eq!(estimate[0][0]["value"], "0x3e8");

    let raw = h.ethereum.params_of("eth_sendRawTransaction");
    assert!(raw[0][0].as_str().unwrap().starts_with("0x"));
}

#[tokio::test]
async fn test_ethereum_insufficient_funds() {
    let h = harness();
    h.session.derive_next_account(ChainKind::Ethereum).await.unwrap();

    script_ethereum_submission(&h.ethereum);
    h.ethereum.fail(
        "eth_sendRawTransaction",
        Error::Rpc {
            code: -32000,
            message: "insufficient funds for gas * price + value".to_string(),
            data: None,
        },
    );

    let err = h
        .session
        .send_transfer(ChainKind::Ethereum, 0, ETH_RECIPIENT, Decimal::new(1_000, 0))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InsufficientFunds(_)));
    assert_eq!(h.ethereum.calls_to("eth_getTransactionReceipt"), 0);
}

#[tokio::test]
async fn test_ethereum_other_failure_is_rejected() {
    let h = harness();
    h.session.derive_next_account(ChainKind::Ethereum).await.unwrap();

    script_ethereum_submission(&h.ethereum);
    h.ethereum.fail("eth_gasPrice", Error::Network("connection refused".to_string()));

    let err = h
        .session
        .send_transfer(ChainKind::Ethereum, 0, ETH_RECIPIENT, Decimal::new(1_000, 0))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TransactionRejected(_)));
    assert_eq!(h.ethereum.calls_to("eth_sendRawTransaction"), 0);
}

#[tokio::test]
async fn test_ethereum_reverted_receipt_is_rejected() {
    let h = harness();
    h.session.derive_next_account(ChainKind::Ethereum).await.unwrap();

    script_ethereum_submission(&h.ethereum);
    h.ethereum
        .respond("eth_getTransactionReceipt", json!({ "transactionHash": TX_HASH, "status": "0x0" }));

    let err = h
        .session
        .send_transfer(ChainKind::Ethereum, 0, ETH_RECIPIENT, Decimal::new(1_000, 0))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TransactionRejected(_)));
}

#[tokio::test]
async fn test_airdrop() {
    let h = harness();
    let account = h.session.derive_next_account(ChainKind::Solana).await.unwrap();
    h.session.derive_next_account(ChainKind::Ethereum).await.unwrap();

    h.solana.respond("requestAirdrop", json!(SIGNATURE));
    let signature = h
        .session
        .request_airdrop(ChainKind::Solana, 0, LAMPORTS_PER_SOL)
        .await
        .unwrap();

    assert_eq!(signature, SIGNATURE);
    assert_eq!(
        h.solana.params_of("requestAirdrop"),
        vec![json!([account.address(), LAMPORTS_PER_SOL])]
    );

    let err = h
        .session
        .request_airdrop(ChainKind::Ethereum, 0, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotSupported(_)));
    assert_eq!(h.ethereum.call_count(), 0);
}

#[tokio::test]
async fn test_solana_short_balance_in_preflight_logs() {
    let h = harness();
    h.session.derive_next_account(ChainKind::Solana).await.unwrap();
    let recipient = h.session.derive_next_account(ChainKind::Solana).await.unwrap();

    h.solana.respond(
        "getLatestBlockhash",
        json!({ "context": { "slot": 10 }, "value": { "blockhash": BLOCKHASH, "lastValidBlockHeight": 150 } }),
    );
    h.solana.fail(
        "sendTransaction",
        Error::Rpc {
            code: -32002,
            message: "Transaction simulation failed: Error processing Instruction 0: custom program error: 0x1".to_string(),
            data: Some(json!({
                "err": { "InstructionError": [0, { "Custom": 1 }] },
                "logs": [
                    "Program 11111111111111111111111111111111 invoke [1]",
                    "Transfer: insufficient lamports 1000, need 1000000000",
                    "Program 11111111111111111111111111111111 failed: custom program error: 0x1"
                ]
            })),
        },
    );

    let err = h
        .session
        .send_transfer(ChainKind::Solana, 0, recipient.address(), Decimal::ONE)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InsufficientFunds(_)));
    assert_eq!(h.solana.calls_to("getSignatureStatuses"), 0);
}

#[tokio::test]
async fn test_solana_confirmation_survives_failed_poll() {
    let h = harness();
    h.session.derive_next_account(ChainKind::Solana).await.unwrap();
    let recipient = h.session.derive_next_account(ChainKind::Solana).await.unwrap();

    script_solana_submission(&h.solana);
    h.solana
        .fail("getSignatureStatuses", Error::Network("connection reset".to_string()))
        .respond("getSignatureStatuses", json!({ "context": { "slot": 11 }, "value": [null] }))
        .respond(
            "getSignatureStatuses",
            json!({ "context": { "slot": 13 }, "value": [{ "slot": 12, "confirmations": 1, "err": null, "confirmationStatus": "confirmed" }] }),
        );
    h.solana
        .fail("getBlockHeight", Error::Network("connection reset".to_string()))
        .respond("getBlockHeight", json!(100));

    let receipt = h
        .session
        .send_transfer(ChainKind::Solana, 0, recipient.address(), Decimal::ONE)
        .await
        .unwrap();

    assert_eq!(receipt.tx_identifier, SIGNATURE);
    assert!(receipt.confirmed);
    assert_eq!(h.solana.calls_to("sendTransaction"), 1);
    assert_eq!(h.solana.calls_to("getSignatureStatuses"), 3);
    assert_eq!(h.solana.calls_to("getBlockHeight"), 1);
}

#[tokio::test]
async fn test_ethereum_receipt_survives_failed_poll() {
    let h = harness();
    h.session.derive_next_account(ChainKind::Ethereum).await.unwrap();

    script_ethereum_submission(&h.ethereum);
    h.ethereum
        .fail("eth_getTransactionReceipt", Error::Network("connection reset".to_string()))
        .respond("eth_getTransactionReceipt", json!({ "transactionHash": TX_HASH, "status": "0x1" }));

    let receipt = h
        .session
        .send_transfer(ChainKind::Ethereum, 0, ETH_RECIPIENT, Decimal::new(1_000, 0))
        .await
        .unwrap();

    assert_eq!(receipt.tx_identifier, TX_HASH);
    assert!(receipt.confirmed);
    assert_eq!(h.ethereum.calls_to("eth_sendRawTransaction"), 1);
    assert_eq!(h.ethereum.calls_to("eth_getTransactionReceipt"), 2);
}
