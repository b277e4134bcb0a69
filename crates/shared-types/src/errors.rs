//! # Error Types
//!
//! Status values a disperser reports when it rejects a call.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse server-side failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    /// Request was malformed or failed validation.
    InvalidArgument,
    /// Authentication data was missing or did not verify.
    Unauthenticated,
    /// Authenticated, but not allowed to perform the call.
    PermissionDenied,
    /// Rate limit or payment budget exhausted.
    ResourceExhausted,
    /// Requested blob or account was not found.
    NotFound,
    /// Server cannot serve the call right now.
    Unavailable,
    /// Server gave up before finishing.
    DeadlineExceeded,
    /// Server bug.
    Internal,
    /// Anything else.
    Unknown,
}

/// Error status returned by the disperser in place of a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code:?}: {message}")]
pub struct RpcStatus {
    /// Failure class.
    pub code: StatusCode,
    /// Human readable description.
    pub message: String,
}

impl RpcStatus {
    /// Build a status.
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// `InvalidArgument` status.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidArgument, message)
    }

    /// `Unauthenticated` status.
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Unauthenticated, message)
    }

    /// `NotFound` status.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NotFound, message)
    }

    /// `Internal` status.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, message)
    }
}
