//! Mnemonic phrase generation and seed derivation

use std::fmt;

use bip39::Mnemonic;
use rand::{rngs::OsRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{Error, Result};

/// Supported mnemonic strengths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MnemonicStrength {
    /// 12 words (128 bits)
    #[default]
    Words12,
    /// 24 words (256 bits)
    Words24,
}

impl MnemonicStrength {
    /// Get entropy length in bytes
    fn entropy_bytes(&self) -> usize {
        match self {
            Self::Words12 => 16,
            Self::Words24 => 32,
        }
    }
}

/// BIP-39 seed bytes for one session.
///
/// Immutable once produced and wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Seed(Vec<u8>);

impl Seed {
    /// Wrap raw seed bytes, e.g. a known test vector.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Get the raw seed bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seed([REDACTED; {}])", self.0.len())
    }
}

/// Generate a new random mnemonic phrase with the specified strength
pub fn generate_mnemonic(strength: MnemonicStrength) -> Result<String> {
    let mut entropy = Zeroizing::new(vec![0u8; strength.entropy_bytes()]);
    OsRng.fill_bytes(&mut entropy);

    let mnemonic = Mnemonic::from_entropy(&entropy)
        .map_err(|e| Error::InvalidMnemonic(e.to_string()))?;

    Ok(mnemonic.to_string())
}

/// Validate a mnemonic phrase against the English wordlist and its checksum
pub fn validate_mnemonic(phrase: &str) -> Result<()> {
    Mnemonic::parse_normalized(phrase)
        .map(|_| ())
        .map_err(|e| Error::InvalidMnemonic(e.to_string()))
}

/// Turn a mnemonic phrase into its 64-byte seed.
///
/// No passphrase is mixed in, so the same phrase always yields the same seed.
pub fn mnemonic_to_seed(phrase: &str) -> Result<Seed> {
    let mnemonic = Mnemonic::parse_normalized(phrase)
        .map_err(|e| Error::InvalidMnemonic(e.to_string()))?;

    let seed = Zeroizing::new(mnemonic.to_seed(""));
    Ok(Seed::from_bytes(seed.to_vec()))
}
