//! # ECDSA Signatures (secp256k1)
//!
//! Signing keys backing the payment signer and the blob-request signer.
//!
//! ## Security Properties
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - Secret key material zeroized on drop
//!
//! ## Identifiers
//!
//! - `to_hex()`: `0x` + compressed public key, used as the blob-request account id
//! - `to_eth_address()`: `0x` + last 20 bytes of Keccak-256 over the uncompressed
//!   point, used as the payment account id

use crate::hashing::keccak256;
use crate::CryptoError;
use k256::ecdsa::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};
use zeroize::Zeroize;

/// Compressed secp256k1 public key (33 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Secp256k1PublicKey([u8; 33]);

impl Secp256k1PublicKey {
    /// Create from compressed bytes (33 bytes, starting with 0x02 or 0x03).
    pub fn from_bytes(bytes: [u8; 33]) -> Result<Self, CryptoError> {
        // Validate it's a valid compressed point
        VerifyingKey::from_sec1_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    /// Parse the `0x`-prefixed (or bare) hex form produced by [`Self::to_hex`].
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let raw = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        let bytes: [u8; 33] = raw
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: 33,
                actual: raw.len(),
            })?;
        Self::from_bytes(bytes)
    }

    /// Get raw compressed bytes.
    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }

    /// `0x`-prefixed hex of the compressed key.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Ethereum-style address derived from this key.
    pub fn to_eth_address(&self) -> Result<String, CryptoError> {
        let verifying_key =
            VerifyingKey::from_sec1_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;
        let uncompressed = verifying_key.to_encoded_point(false);
        // Skip the 0x04 SEC1 tag
        let digest = keccak256(&uncompressed.as_bytes()[1..]);
        Ok(format!("0x{}", hex::encode(&digest[12..])))
    }

    /// Verify a signature.
    pub fn verify(
        &self,
        message: &[u8],
        signature: &Secp256k1Signature,
    ) -> Result<(), CryptoError> {
        let verifying_key =
            VerifyingKey::from_sec1_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;

        let sig = Signature::from_slice(&signature.0).map_err(|_| CryptoError::InvalidSignature)?;

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }
}

/// ECDSA signature (64 bytes, r||s format).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Secp256k1Signature([u8; 64]);

impl Secp256k1Signature {
    /// Create from bytes (64 bytes).
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, checking the length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; 64] = bytes.try_into().map_err(|_| CryptoError::InvalidSignature)?;
        Ok(Self(array))
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Owned copy of the raw bytes.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

/// secp256k1 ECDSA keypair.
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
}

impl Secp256k1KeyPair {
    /// Generate random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_bytes((&bytes).into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Create from a hex-encoded secret key, with or without `0x`.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let mut raw = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        let result = match <[u8; 32]>::try_from(raw.as_slice()) {
            Ok(mut bytes) => {
                let keypair = Self::from_bytes(bytes);
                bytes.zeroize();
                keypair
            }
            Err(_) => Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: raw.len(),
            }),
        };
        raw.zeroize();
        result
    }

    /// Get public key (compressed, 33 bytes).
    pub fn public_key(&self) -> Secp256k1PublicKey {
        let verifying_key = self.signing_key.verifying_key();
        let sec1_bytes = verifying_key.to_sec1_bytes();
        // SEC1 compressed public key is always exactly 33 bytes
        let mut bytes = [0u8; 33];
        bytes.copy_from_slice(&sec1_bytes[..33]);
        Secp256k1PublicKey(bytes)
    }

    /// Sign a message (deterministic RFC 6979, SHA-256 prehash).
    pub fn sign(&self, message: &[u8]) -> Secp256k1Signature {
        let sig: Signature = self.signing_key.sign(message);
        let bytes: [u8; 64] = sig.to_bytes().into();
        Secp256k1Signature(bytes)
    }
}

impl Drop for Secp256k1KeyPair {
    fn drop(&mut self) {
        // Zeroize secret key material
        let mut bytes: [u8; 32] = self.signing_key.to_bytes().into();
        bytes.zeroize();
    }
}
