//! # Keccak-256 Hashing
//!
//! The hash Ethereum uses for addresses and message digests.

use sha3::{Digest, Keccak256};

/// 256-bit hash output.
pub type Hash = [u8; 32];

/// Hash data with Keccak-256 (one-shot).
pub fn keccak256(data: &[u8]) -> Hash {
    Keccak256::digest(data).into()
}
