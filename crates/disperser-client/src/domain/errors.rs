//! # Domain Errors
//!
//! Error taxonomy surfaced by every client operation.
//!
//! Client-side faults (`Validation`, `Signer`, `UninitializedAccountant`) are
//! kept apart from server and transport faults (`Rpc`, `ConnectionInit`) so a
//! caller can tell whether resubmitting the same request can ever succeed.

use shared_types::{RpcStatus, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Payload rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Zero-length payload.
    #[error("payload is empty")]
    EmptyPayload,

    /// Payload longer than a disperser accepts.
    #[error("payload is {len} bytes, above the {max}-byte limit")]
    TooLarge {
        /// Payload length
        len: usize,
        /// Accepted maximum
        max: usize,
    },

    /// A 32-byte chunk is not a canonical field element.
    #[error(
        "chunk {chunk_index} is not a canonical field element: value must be below the BN254 scalar modulus \
         21888242871839275222246405745257275088548364400416034343698204186575808495617"
    )]
    InvalidFieldElement {
        /// Zero-based index of the offending 32-byte chunk
        chunk_index: usize,
    },
}

/// Signer missing or unable to sign.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    /// The operation needs a signer that was not supplied.
    #[error("no {role} signer configured")]
    NotConfigured {
        /// `"payment"` or `"blob request"`
        role: &'static str,
    },

    /// The signer refused or failed.
    #[error("signing failed: {0}")]
    SigningFailed(String),
}

/// Server-reported or transport-level call failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// The server answered with an error status.
    #[error("server returned {code:?}: {message}")]
    Status {
        /// Failure class
        code: StatusCode,
        /// Server message
        message: String,
    },

    /// The call did not finish before its deadline.
    #[error("deadline of {timeout:?} exceeded")]
    DeadlineExceeded {
        /// Deadline that elapsed
        timeout: Duration,
    },

    /// The connection broke mid-call.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with something this client cannot interpret.
    #[error("malformed reply: {0}")]
    MalformedReply(String),

    /// The request could not be framed. Nothing was sent.
    #[error("request not sent: {0}")]
    Unsendable(String),
}

impl From<RpcStatus> for RpcError {
    fn from(status: RpcStatus) -> Self {
        Self::Status {
            code: status.code,
            message: status.message,
        }
    }
}

/// Disperser client error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisperserError {
    /// The shared connection could not be established. A later call retries.
    #[error("failed to initialize connection: {0}")]
    ConnectionInit(String),

    /// Payload failed client-side validation.
    #[error("invalid payload: {0}")]
    Validation(#[from] ValidationError),

    /// Paid dispersal before a successful payment-state sync.
    #[error("accountant is not initialized; sync payment state first")]
    UninitializedAccountant,

    /// The authenticated stream delivered an unexpected message.
    #[error("protocol sequence error in state {state}: expected {expected}, received {received}")]
    ProtocolSequence {
        /// Handshake state at the time
        state: &'static str,
        /// Message shape the state requires
        expected: &'static str,
        /// Message shape actually received
        received: String,
    },

    /// Signer missing or failing.
    #[error("signer error: {0}")]
    Signer(#[from] SignerError),

    /// The call itself failed.
    #[error("rpc error: {0}")]
    Rpc(#[from] RpcError),
}

impl DisperserError {
    /// Whether resubmitting the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionInit(_) => true,
            Self::Rpc(RpcError::DeadlineExceeded { .. }) | Self::Rpc(RpcError::Transport(_)) => true,
            Self::Rpc(RpcError::Status { code, .. }) => {
                matches!(code, StatusCode::Unavailable | StatusCode::DeadlineExceeded)
            }
            Self::Rpc(RpcError::MalformedReply(_))
            | Self::Rpc(RpcError::Unsendable(_))
            | Self::Validation(_)
            | Self::UninitializedAccountant
            | Self::ProtocolSequence { .. }
            | Self::Signer(_) => false,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionInit(_) => "connection_init",
            Self::Validation(_) => "validation",
            Self::UninitializedAccountant => "uninitialized_accountant",
            Self::ProtocolSequence { .. } => "protocol_sequence",
            Self::Signer(_) => "signer",
            Self::Rpc(RpcError::DeadlineExceeded { .. }) => "deadline_exceeded",
            Self::Rpc(_) => "rpc",
        }
    }
}

impl From<RpcStatus> for DisperserError {
    fn from(status: RpcStatus) -> Self {
        Self::Rpc(status.into())
    }
}
