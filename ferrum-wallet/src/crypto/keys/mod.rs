//! Key derivation and management
//!
//! This module derives chain-appropriate key pairs and addresses from a
//! BIP-39 seed for every supported chain.

pub mod ethereum;
pub mod solana;
mod derivation;

pub use derivation::*;
