//! Common key derivation functionality

use std::fmt;
use std::str::FromStr;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::mnemonic::Seed;
use crate::error::{Error, Result};

/// Position of an account in a chain's derivation tree
pub type DerivationIndex = u32;

/// Hardened offset for BIP-32 / SLIP-0010 child indices
pub(crate) const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Supported chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    /// Solana
    Solana,
    /// Ethereum and EVM compatible chains
    Ethereum,
}

/// Signature curve used by a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    Ed25519,
    Secp256k1,
}

impl ChainKind {
    pub const ALL: [ChainKind; 2] = [ChainKind::Solana, ChainKind::Ethereum];

    /// Ticker of the native asset
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Solana => "SOL",
            Self::Ethereum => "ETH",
        }
    }

    /// Curve of the chain's keys; selects SLIP-0010 or BIP-32 derivation
    pub fn curve(&self) -> Curve {
        match self {
            Self::Solana => Curve::Ed25519,
            Self::Ethereum => Curve::Secp256k1,
        }
    }

    /// Number of decimals between the display unit and the smallest unit
    /// (lamports, wei)
    pub fn decimals(&self) -> u32 {
        match self {
            Self::Solana => 9,
            Self::Ethereum => 18,
        }
    }

    /// BIP-44 derivation path for an account index
    pub fn derivation_path(&self, index: DerivationIndex) -> String {
        match self {
            Self::Solana => format!("m/44'/501'/{}'/0'", index),
            Self::Ethereum => format!("m/44'/60'/{}'/0/0", index),
        }
    }

    /// JSON-RPC method used to read a native balance
    pub fn balance_method(&self) -> &'static str {
        match self {
            Self::Solana => "getBalance",
            Self::Ethereum => "eth_getBalance",
        }
    }

    /// Block explorer root
    pub fn explorer_base(&self) -> &'static str {
        match self {
            Self::Solana => "https://explorer.solana.com",
            Self::Ethereum => "https://etherscan.io",
        }
    }

    /// Block explorer page for an address
    pub fn explorer_url(&self, address: &str) -> String {
        format!("{}/address/{}", self.explorer_base(), address)
    }
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for ChainKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sol" | "solana" => Ok(Self::Solana),
            "eth" | "ethereum" => Ok(Self::Ethereum),
            other => Err(Error::NotSupported(format!("Unknown chain: {}", other))),
        }
    }
}

/// A private key for a specific chain.
///
/// 32 bytes in the chain-native format: the ed25519 seed for Solana, the
/// secp256k1 scalar for Ethereum. Wiped on drop and never printed.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey {
    bytes: [u8; 32],
    #[zeroize(skip)]
    chain: ChainKind,
}

impl PrivateKey {
    pub(crate) fn new(bytes: [u8; 32], chain: ChainKind) -> Self {
        Self { bytes, chain }
    }

    /// Raw key bytes, only handed to signing code inside the crate
    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    pub fn chain(&self) -> ChainKind {
        self.chain
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("chain", &self.chain)
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A public key for a specific chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    /// 32-byte ed25519 key or 65-byte uncompressed secp256k1 point
    bytes: Vec<u8>,
    chain: ChainKind,
}

impl PublicKey {
    pub fn new(bytes: Vec<u8>, chain: ChainKind) -> Self {
        Self { bytes, chain }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn chain(&self) -> ChainKind {
        self.chain
    }
}

/// A key pair for a specific chain
#[derive(Debug)]
pub struct KeyPair {
    private_key: PrivateKey,
    public_key: PublicKey,
}

impl KeyPair {
    /// Create a new key pair
    pub fn new(private_key: PrivateKey, public_key: PublicKey) -> Result<Self> {
        if private_key.chain() != public_key.chain() {
            return Err(Error::DerivationFailure("Key chain mismatch".to_string()));
        }
        Ok(Self { private_key, public_key })
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn chain(&self) -> ChainKind {
        self.private_key.chain()
    }

    /// Chain-native address of the public key
    pub fn address(&self) -> Result<String> {
        match self.chain() {
            ChainKind::Solana => super::solana::public_key_to_address(&self.public_key),
            ChainKind::Ethereum => super::ethereum::public_key_to_address(&self.public_key),
        }
    }

    pub(crate) fn into_parts(self) -> (PrivateKey, PublicKey) {
        (self.private_key, self.public_key)
    }
}

/// Derive the key pair of account `index` on `chain`.
///
/// The path comes from [`ChainKind::derivation_path`] and is not
/// configurable. Any node that cannot be derived fails the whole call.
pub fn derive_key_pair(seed: &Seed, chain: ChainKind, index: DerivationIndex) -> Result<KeyPair> {
    if seed.is_empty() {
        return Err(Error::DerivationFailure("Seed cannot be empty".to_string()));
    }
    if index >= HARDENED_OFFSET {
        return Err(Error::DerivationFailure(format!(
            "Account index {} is out of the hardened range",
            index
        )));
    }

    let path = chain.derivation_path(index);
    match chain.curve() {
        Curve::Ed25519 => super::solana::derive_solana_key_pair(seed.as_bytes(), &path),
        Curve::Secp256k1 => super::ethereum::derive_ethereum_key_pair(seed.as_bytes(), &path),
    }
}

/// Parse a BIP-32 derivation path such as `m/44'/60'/0'/0/0`
pub(crate) fn parse_derivation_path(path: &str) -> Result<Vec<u32>> {
    let rest = path
        .strip_prefix("m/")
        .ok_or_else(|| Error::DerivationFailure(format!("Invalid derivation path: {}", path)))?;

    let mut result = Vec::new();
    for component in rest.split('/') {
        if component.is_empty() {
            continue;
        }

        let invalid = || {
            Error::DerivationFailure(format!("Invalid derivation path component: {}", component))
        };

        let index = match component.strip_suffix('\'') {
            Some(hardened) => {
                let index = hardened.parse::<u32>().map_err(|_| invalid())?;
                if index >= HARDENED_OFFSET {
                    return Err(invalid());
                }
                index | HARDENED_OFFSET
            }
            None => {
                let index = component.parse::<u32>().map_err(|_| invalid())?;
                if index >= HARDENED_OFFSET {
                    return Err(invalid());
                }
                index
            }
        };

        result.push(index);
    }

    Ok(result)
}

/// HMAC-SHA512 keyed with `key` over the concatenated `parts`, split into
/// (IL, IR) as both BIP-32 and SLIP-0010 use it
pub(crate) fn split_hmac(key: &[u8], parts: &[&[u8]]) -> Result<([u8; 32], [u8; 32])> {
    let mut mac = Hmac::<Sha512>::new_from_slice(key)
        .map_err(|e| Error::DerivationFailure(format!("HMAC error: {}", e)))?;
    for part in parts {
        mac.update(part);
    }
    let mut result = mac.finalize().into_bytes();

    let mut left = [0u8; 32];
    let mut right = [0u8; 32];
    left.copy_from_slice(&result[0..32]);
    right.copy_from_slice(&result[32..64]);
    result.as_mut_slice().zeroize();

    Ok((left, right))
}
