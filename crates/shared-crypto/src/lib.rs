//! # Shared Crypto
//!
//! Signing primitives consumed by the disperser client's signers.
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `ecdsa` | secp256k1 | Payment headers, challenge responses, account ids |
//! | `hashing` | Keccak-256 | Ethereum-style addresses, signing digests |
//!
//! ## Security Properties
//!
//! - **secp256k1**: RFC 6979 deterministic nonces, secret key zeroized on drop
//! - **Keys never leave the process**: only signatures and public identifiers are exported

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecdsa;
pub mod errors;
pub mod hashing;

// Re-exports
pub use ecdsa::{Secp256k1KeyPair, Secp256k1PublicKey, Secp256k1Signature};
pub use errors::CryptoError;
pub use hashing::{keccak256, Hash};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
