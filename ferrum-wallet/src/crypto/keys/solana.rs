//! Solana key derivation (SLIP-0010, ed25519)

use ed25519_dalek::SigningKey;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{Error, Result};
use super::derivation::{parse_derivation_path, split_hmac, ChainKind, KeyPair, PrivateKey, PublicKey, HARDENED_OFFSET};

const MASTER_SECRET: &[u8] = b"ed25519 seed";

/// Derive a Solana key pair from a seed and derivation path.
///
/// SLIP-0010 only defines hardened children for ed25519, so every segment of
/// `path` must be hardened.
pub fn derive_solana_key_pair(seed: &[u8], path: &str) -> Result<KeyPair> {
    let secret = derive_ed25519_secret(seed, path)?;

    let signing_key = SigningKey::from_bytes(&secret);
    let verifying_key = signing_key.verifying_key();

    let private_key = PrivateKey::new(*secret, ChainKind::Solana);
    let public_key = PublicKey::new(verifying_key.to_bytes().to_vec(), ChainKind::Solana);

    KeyPair::new(private_key, public_key)
}

/// Walk `path` from the SLIP-0010 master node and return the 32-byte
/// ed25519 secret of the final node.
pub(crate) fn derive_ed25519_secret(seed: &[u8], path: &str) -> Result<Zeroizing<[u8; 32]>> {
    if seed.is_empty() {
        return Err(Error::DerivationFailure("Seed cannot be empty".to_string()));
    }

    let path_components = parse_derivation_path(path)?;
    if let Some(soft) = path_components.iter().find(|i| **i < HARDENED_OFFSET) {
        return Err(Error::DerivationFailure(format!(
            "ed25519 derivation requires hardened segments, got {} in {}",
            soft, path
        )));
    }

    let (mut secret_key, mut chain_code) = split_hmac(MASTER_SECRET, &[seed])?;

    for index in path_components {
        let (child_key, child_chain_code) = split_hmac(
            &chain_code,
            &[&[0u8][..], &secret_key[..], &index.to_be_bytes()[..]],
        )?;
        secret_key.zeroize();
        chain_code.zeroize();
        secret_key = child_key;
        chain_code = child_chain_code;
    }

    chain_code.zeroize();
    let out = Zeroizing::new(secret_key);
    secret_key.zeroize();
    Ok(out)
}

/// Get the Solana address from a public key
pub fn public_key_to_address(public_key: &PublicKey) -> Result<String> {
    if public_key.chain() != ChainKind::Solana {
        return Err(Error::DerivationFailure("Not a Solana public key".to_string()));
    }

    let public_key = public_key.as_bytes();
    if public_key.len() != 32 {
        return Err(Error::DerivationFailure("Invalid Solana public key length".to_string()));
    }

    Ok(bs58::encode(public_key).into_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // SLIP-0010 test vector 1 for ed25519
    const VECTOR_SEED: &str = "000102030405060708090a0b0c0d0e0f";

    #[test]
    fn test_slip10_master_key() {
        let seed = hex::decode(VECTOR_SEED).unwrap();
        let (key, chain_code) = split_hmac(MASTER_SECRET, &[seed.as_slice()]).unwrap();

        assert_eq!(
            hex::encode(key),
            "2b4be7f19ee27bbf30c667b642d5f4aa69fd169872f8fc3059c08ebae2eb19e7"
        );
        assert_eq!(
            hex::encode(chain_code),
            "90046a93de5380a72b5e45010748567d5ea02bbf6522f979e05c0d8d8ca9fffb"
        );
    }

    #[test]
    fn test_slip10_first_hardened_child() {
        let seed = hex::decode(VECTOR_SEED).unwrap();
        let secret = derive_ed25519_secret(&seed, "m/0'").unwrap();

        assert_eq!(
            hex::encode(*secret),
            "68e0fe46dfb67e368c75379acec591dad19df3cde26e63b93a8e704f1dade7a3"
        );

        let key_pair = derive_solana_key_pair(&seed, "m/0'").unwrap();
        assert_eq!(
            hex::encode(key_pair.public_key().as_bytes()),
            "8c8a13df77a28f3445213a0f432fde644acaa215fc72dcdf300d5efaa85d350c"
        );
    }

    #[test]
    fn test_soft_segment_is_rejected() {
        let seed = hex::decode(VECTOR_SEED).unwrap();
        let err = derive_solana_key_pair(&seed, "m/44'/501'/0'/0").unwrap_err();
        assert!(matches!(err, Error::DerivationFailure(_)));
    }

    #[test]
    fn test_address_is_base58_public_key() {
        let seed = hex::decode(VECTOR_SEED).unwrap();
        let key_pair = derive_solana_key_pair(&seed, "m/44'/501'/0'/0'").unwrap();
        let address = public_key_to_address(key_pair.public_key()).unwrap();

        let decoded = bs58::decode(&address).into_vec().unwrap();
        assert_eq!(decoded.as_slice(), key_pair.public_key().as_bytes());
    }
}
