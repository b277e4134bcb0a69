//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Identity**: `AccountId`, `QuorumNumber`
//! - **Blobs**: `BlobStatus`, `BlobInfo`, `BlobAuthHeader`
//! - **Payments**: `ActiveReservation`, `OnDemandPayment`, `GlobalPaymentParams`,
//!   `PaymentHeader`, `PaymentMode`

use serde::{Deserialize, Serialize};
use std::fmt;

// Re-export U256 from primitive-types for use across all crates
pub use primitive_types::U256;

/// Number of payload bytes that make up one symbol (one field element).
pub const BYTES_PER_SYMBOL: usize = 32;

/// Largest blob a disperser accepts, in bytes.
pub const MAX_BLOB_BYTES: usize = 16 * 1024 * 1024;

/// Identifier of a storage quorum.
pub type QuorumNumber = u8;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// Account identifier, a `0x`-prefixed hex string.
///
/// Payment accounts use the 20-byte Ethereum-style address; blob-request
/// signers use their hex-encoded public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct AccountId(String);

impl AccountId {
    /// Wrap an already formatted identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if no identifier was set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for AccountId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// =============================================================================
// CLUSTER B: BLOBS
// =============================================================================

/// Server-reported processing state of a dispersed blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlobStatus {
    /// The server has no record of the blob.
    Unknown,
    /// Accepted and queued for encoding.
    Processing,
    /// Included in a batch confirmed on chain.
    Confirmed,
    /// Dispersal failed permanently.
    Failed,
    /// The confirming batch has been finalized.
    Finalized,
    /// Not enough operator signatures were collected.
    InsufficientSignatures,
    /// Chunks are being sent to operators.
    Dispersing,
}

impl BlobStatus {
    /// Convert a wire status code. Returns `None` for codes this client does not know.
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            1 => Some(Self::Processing),
            2 => Some(Self::Confirmed),
            3 => Some(Self::Failed),
            4 => Some(Self::Finalized),
            5 => Some(Self::InsufficientSignatures),
            6 => Some(Self::Dispersing),
            _ => None,
        }
    }

    /// Wire status code.
    pub fn code(self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::Processing => 1,
            Self::Confirmed => 2,
            Self::Failed => 3,
            Self::Finalized => 4,
            Self::InsufficientSignatures => 5,
            Self::Dispersing => 6,
        }
    }
}

/// Location of a confirmed blob inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlobInfo {
    /// Hash of the batch header the blob was included in.
    pub batch_header_hash: Vec<u8>,
    /// Index of the blob inside the batch.
    pub blob_index: u32,
    /// Block at which the batch was confirmed.
    pub confirmation_block_number: u64,
}

/// Data signed by the blob-request signer to answer an authentication challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlobAuthHeader {
    /// Account the dispersal is made on behalf of.
    pub account_id: AccountId,
    /// Challenge nonce issued by the server.
    pub nonce: u32,
}

impl BlobAuthHeader {
    /// Bytes the blob-request signer commits to: the nonce as `u32 BE`.
    pub fn to_signing_bytes(&self) -> [u8; 4] {
        self.nonce.to_be_bytes()
    }
}

// =============================================================================
// CLUSTER C: PAYMENTS
// =============================================================================

/// A time-bounded, rate-limited payment plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ActiveReservation {
    /// Unix seconds at which the reservation becomes usable (inclusive).
    pub start_timestamp: u64,
    /// Unix seconds at which the reservation expires (exclusive).
    pub end_timestamp: u64,
    /// Reserved bandwidth in symbols per second.
    pub symbols_per_second: u64,
    /// Quorums the reservation may be used for.
    pub quorum_numbers: Vec<QuorumNumber>,
}

impl ActiveReservation {
    /// `start <= now < end`.
    pub fn is_active(&self, now: u64) -> bool {
        self.start_timestamp <= now && now < self.end_timestamp
    }

    /// Every requested quorum is covered by this reservation.
    pub fn covers_quorums(&self, requested: &[QuorumNumber]) -> bool {
        requested.iter().all(|q| self.quorum_numbers.contains(q))
    }

    /// Symbols one bin may absorb for the given window length.
    pub fn bin_capacity(&self, reservation_window: u64) -> u64 {
        self.symbols_per_second.saturating_mul(reservation_window)
    }
}

/// Pay-per-use fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OnDemandPayment {
    /// Cumulative payment deposited on chain for this account.
    pub cumulative_payment: U256,
}

/// Network-wide pricing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GlobalPaymentParams {
    /// Length of one reservation bin in seconds.
    pub reservation_window: u64,
    /// Price of one symbol on the on-demand path.
    pub price_per_symbol: u64,
    /// Minimum number of symbols billed per on-demand request.
    pub min_num_symbols: u64,
}

/// How a dispersal is paid for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMode {
    /// Charged against the reservation bin with this index.
    Reservation {
        /// `floor(now / reservation_window)` at accounting time.
        bin_index: u64,
    },
    /// Charged on demand; the value is the account's new cumulative payment.
    OnDemand {
        /// Cumulative payment after this request.
        cumulative_payment: U256,
    },
}

/// Per-request payment proof attached to a paid dispersal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentHeader {
    /// Paying account.
    pub account_id: AccountId,
    /// Payment path chosen by the accountant.
    pub mode: PaymentMode,
}

impl PaymentHeader {
    /// True if the header references a reservation bin.
    pub fn is_reservation(&self) -> bool {
        matches!(self.mode, PaymentMode::Reservation { .. })
    }

    /// Cumulative payment carried by the header (zero for reservation mode).
    pub fn cumulative_payment(&self) -> U256 {
        match &self.mode {
            PaymentMode::Reservation { .. } => U256::zero(),
            PaymentMode::OnDemand { cumulative_payment } => *cumulative_payment,
        }
    }

    /// Canonical byte encoding the payment signature commits to.
    ///
    /// Layout: `len(account_id) as u32 BE || account_id || tag || value`, where
    /// `tag` is `0` followed by the bin index as `u64 BE` for reservations, or
    /// `1` followed by the cumulative payment as 32 bytes BE for on-demand.
    pub fn to_signing_bytes(&self) -> Vec<u8> {
        let account = self.account_id.as_str().as_bytes();
        let mut out = Vec::with_capacity(4 + account.len() + 1 + 32);
        out.extend_from_slice(&(account.len() as u32).to_be_bytes());
        out.extend_from_slice(account);
        match &self.mode {
            PaymentMode::Reservation { bin_index } => {
                out.push(0);
                out.extend_from_slice(&bin_index.to_be_bytes());
            }
            PaymentMode::OnDemand { cumulative_payment } => {
                out.push(1);
                let mut value = [0u8; 32];
                cumulative_payment.to_big_endian(&mut value);
                out.extend_from_slice(&value);
            }
        }
        out
    }
}
