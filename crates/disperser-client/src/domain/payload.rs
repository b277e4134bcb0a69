//! # Payload Validation
//!
//! A blob is interpreted as a sequence of 32-byte big-endian field elements.
//! Every element must be strictly below the BN254 scalar field modulus; a
//! short trailing chunk is right-padded with zeros before the check.

use crate::domain::errors::ValidationError;
use shared_types::{BYTES_PER_SYMBOL, MAX_BLOB_BYTES, U256};

/// BN254 scalar field modulus
/// `21888242871839275222246405745257275088548364400416034343698204186575808495617`.
pub const BN254_MODULUS: U256 = U256([
    0x43e1_f593_f000_0001,
    0x2833_e848_79b9_7091,
    0xb850_45b6_8181_585d,
    0x3064_4e72_e131_a029,
]);

/// Number of symbols a payload of `len` bytes occupies.
pub fn symbol_count(len: usize) -> u64 {
    len.div_ceil(BYTES_PER_SYMBOL) as u64
}

/// Check that `data` decomposes into canonical field elements.
pub fn validate_payload(data: &[u8]) -> Result<(), ValidationError> {
    if data.is_empty() {
        return Err(ValidationError::EmptyPayload);
    }
    if data.len() > MAX_BLOB_BYTES {
        return Err(ValidationError::TooLarge {
            len: data.len(),
            max: MAX_BLOB_BYTES,
        });
    }

    for (chunk_index, chunk) in data.chunks(BYTES_PER_SYMBOL).enumerate() {
        let mut element = [0u8; BYTES_PER_SYMBOL];
        element[..chunk.len()].copy_from_slice(chunk);
        if U256::from_big_endian(&element) >= BN254_MODULUS {
            return Err(ValidationError::InvalidFieldElement { chunk_index });
        }
    }

    Ok(())
}
