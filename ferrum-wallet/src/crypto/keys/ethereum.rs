//! Ethereum key derivation (BIP-32, secp256k1)

use ethers::types::Address;
use ethers::utils::to_checksum;
use secp256k1::{All, PublicKey as Secp256k1PublicKey, Scalar, Secp256k1, SecretKey};
use zeroize::{Zeroize, Zeroizing};

use crate::error::{Error, Result};
use super::derivation::{parse_derivation_path, split_hmac, ChainKind, KeyPair, PrivateKey, PublicKey, HARDENED_OFFSET};

const MASTER_SECRET: &[u8] = b"Bitcoin seed";

/// Derive an Ethereum key pair from a seed and derivation path
pub fn derive_ethereum_key_pair(seed: &[u8], path: &str) -> Result<KeyPair> {
    let secp = Secp256k1::new();
    let secret_key = derive_secp256k1_secret(&secp, seed, path)?;
    let public_key = Secp256k1PublicKey::from_secret_key(&secp, &secret_key);

    let private_key = PrivateKey::new(secret_key.secret_bytes(), ChainKind::Ethereum);
    let public_key = PublicKey::new(public_key.serialize_uncompressed().to_vec(), ChainKind::Ethereum);

    KeyPair::new(private_key, public_key)
}

/// Walk `path` from the BIP-32 master node and return the final secret key.
///
/// An invalid intermediate key fails the derivation instead of skipping to
/// the next index.
pub(crate) fn derive_secp256k1_secret(secp: &Secp256k1<All>, seed: &[u8], path: &str) -> Result<SecretKey> {
    if seed.is_empty() {
        return Err(Error::DerivationFailure("Seed cannot be empty".to_string()));
    }

    let path_components = parse_derivation_path(path)?;

    let (mut key_bytes, chain_code) = split_hmac(MASTER_SECRET, &[seed])?;
    let mut chain_code = Zeroizing::new(chain_code);
    let master = SecretKey::from_slice(&key_bytes);
    key_bytes.zeroize();
    let mut secret_key = master
        .map_err(|e| Error::DerivationFailure(format!("Invalid master key: {}", e)))?;

    for index in path_components {
        let (child, child_chain_code) = derive_child_key(secp, &secret_key, &chain_code, index)?;
        secret_key = child;
        chain_code = Zeroizing::new(child_chain_code);
    }

    Ok(secret_key)
}

/// Derive a child key from a parent key
fn derive_child_key(
    secp: &Secp256k1<All>,
    parent: &SecretKey,
    parent_chain_code: &[u8; 32],
    index: u32,
) -> Result<(SecretKey, [u8; 32])> {
    let (mut tweak, chain_code) = if index >= HARDENED_OFFSET {
        let mut parent_bytes = parent.secret_bytes();
        let out = split_hmac(parent_chain_code, &[&[0u8][..], &parent_bytes[..], &index.to_be_bytes()[..]]);
        parent_bytes.zeroize();
        out?
    } else {
        let parent_public = Secp256k1PublicKey::from_secret_key(secp, parent);
        split_hmac(parent_chain_code, &[&parent_public.serialize()[..], &index.to_be_bytes()[..]])?
    };

    // child = IL + k_par (mod n); IL >= n or a zero sum is invalid
    let il = SecretKey::from_slice(&tweak)
        .map_err(|e| Error::DerivationFailure(format!("Invalid child key at index {}: {}", index, e)));
    tweak.zeroize();

    let child = il?
        .add_tweak(&Scalar::from(*parent))
        .map_err(|e| Error::DerivationFailure(format!("Key addition error at index {}: {}", index, e)))?;

    Ok((child, chain_code))
}

/// Get the EIP-55 checksummed Ethereum address of a public key
pub fn public_key_to_address(public_key: &PublicKey) -> Result<String> {
    if public_key.chain() != ChainKind::Ethereum {
        return Err(Error::DerivationFailure("Not an Ethereum public key".to_string()));
    }

    let public_key = public_key.as_bytes();

    // Uncompressed SEC1 point: 0x04 || X || Y
    if public_key.len() != 65 || public_key[0] != 0x04 {
        return Err(Error::DerivationFailure("Invalid Ethereum public key length".to_string()));
    }

    let key_hash = keccak256(&public_key[1..]);
    let address = Address::from_slice(&key_hash[12..]);

    Ok(to_checksum(&address, None))
}

/// Calculate the Keccak-256 hash of data
fn keccak256(data: &[u8]) -> [u8; 32] {
    use sha3::{Digest, Keccak256};
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}
