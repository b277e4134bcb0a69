//! # Local Key Signers
//!
//! secp256k1 signers holding their key in process memory.
//!
//! | Signer | Account id | Signs |
//! |--------|------------|-------|
//! | [`LocalBlobRequestSigner`] | `0x` + compressed public key | `keccak256(nonce BE)` |
//! | [`LocalPaymentSigner`] | Ethereum-style address | `keccak256(payload)` |

use crate::domain::SignerError;
use crate::ports::{BlobRequestSigner, PaymentSigner};
use shared_crypto::{keccak256, Secp256k1KeyPair};
use shared_types::{AccountId, BlobAuthHeader, PaymentHeader};

/// Blob-request signer backed by a local key.
pub struct LocalBlobRequestSigner {
    key: Secp256k1KeyPair,
}

impl LocalBlobRequestSigner {
    /// Wrap an existing key.
    pub fn new(key: Secp256k1KeyPair) -> Self {
        Self { key }
    }

    /// Load from a hex private key (`0x` optional).
    pub fn from_hex(private_key: &str) -> Result<Self, SignerError> {
        Secp256k1KeyPair::from_hex(private_key)
            .map(Self::new)
            .map_err(|e| SignerError::SigningFailed(e.to_string()))
    }
}

impl BlobRequestSigner for LocalBlobRequestSigner {
    fn account_id(&self) -> Result<AccountId, SignerError> {
        Ok(AccountId::new(self.key.public_key().to_hex()))
    }

    fn sign_blob_request(&self, header: &BlobAuthHeader) -> Result<Vec<u8>, SignerError> {
        let digest = keccak256(&header.to_signing_bytes());
        Ok(self.key.sign(&digest).to_vec())
    }
}

/// Payment signer backed by a local key.
pub struct LocalPaymentSigner {
    key: Secp256k1KeyPair,
    account_id: AccountId,
}

impl LocalPaymentSigner {
    /// Wrap an existing key.
    pub fn new(key: Secp256k1KeyPair) -> Result<Self, SignerError> {
        let address = key
            .public_key()
            .to_eth_address()
            .map_err(|e| SignerError::SigningFailed(e.to_string()))?;
        Ok(Self {
            key,
            account_id: AccountId::new(address),
        })
    }

    /// Load from a hex private key (`0x` optional).
    pub fn from_hex(private_key: &str) -> Result<Self, SignerError> {
        let key = Secp256k1KeyPair::from_hex(private_key)
            .map_err(|e| SignerError::SigningFailed(e.to_string()))?;
        Self::new(key)
    }

    fn sign_digest(&self, payload: &[u8]) -> Vec<u8> {
        self.key.sign(&keccak256(payload)).to_vec()
    }
}

impl PaymentSigner for LocalPaymentSigner {
    fn account_id(&self) -> AccountId {
        self.account_id.clone()
    }

    fn sign_payment_header(&self, header: &PaymentHeader) -> Result<Vec<u8>, SignerError> {
        Ok(self.sign_digest(&header.to_signing_bytes()))
    }

    fn sign_account_id(&self, account_id: &AccountId) -> Result<Vec<u8>, SignerError> {
        Ok(self.sign_digest(account_id.as_str().as_bytes()))
    }
}
