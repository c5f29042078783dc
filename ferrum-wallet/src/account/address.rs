//! Recipient address validation

use ethers::types::Address as EthAddress;
use ethers::utils::to_checksum;

use crate::crypto::keys::ChainKind;
use crate::error::{Error, Result};

/// Check that `address` is a syntactically valid account address on `chain`.
///
/// Solana addresses must decode from base58 to a 32-byte key. Ethereum
/// addresses must be `0x` followed by 40 hex digits; a mixed-case address
/// must also carry a correct EIP-55 checksum.
pub fn validate_address(address: &str, chain: ChainKind) -> Result<()> {
    match chain {
        ChainKind::Solana => validate_solana_address(address),
        ChainKind::Ethereum => validate_ethereum_address(address),
    }
}

fn validate_solana_address(address: &str) -> Result<()> {
    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|e| Error::InvalidAddress(format!("{}: {}", address, e)))?;

    if bytes.len() != 32 {
        return Err(Error::InvalidAddress(format!(
            "{}: expected 32 bytes, got {}",
            address,
            bytes.len()
        )));
    }
    Ok(())
}

fn validate_ethereum_address(address: &str) -> Result<()> {
    let digits = address
        .strip_prefix("0x")
        .ok_or_else(|| Error::InvalidAddress(format!("{}: missing 0x prefix", address)))?;

    if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidAddress(format!("{}: expected 20 hex bytes", address)));
    }

    let is_mixed_case = digits.chars().any(|c| c.is_ascii_lowercase())
        && digits.chars().any(|c| c.is_ascii_uppercase());
    if is_mixed_case {
        let parsed: EthAddress = address
            .parse()
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", address, e)))?;
        if to_checksum(&parsed, None) != address {
            return Err(Error::InvalidAddress(format!("{}: bad EIP-55 checksum", address)));
        }
    }
    Ok(())
}
