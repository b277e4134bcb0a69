//! # Inbound Ports
//!
//! API exposed to applications that disperse blobs.

use crate::domain::DisperserError;
use async_trait::async_trait;
use shared_types::{BlobStatus, BlobStatusReply, QuorumNumber};
use std::time::Duration;

/// How a dispersal is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispersalMode {
    /// Single unary call, no payment.
    Plain,
    /// Challenge/response over a bidirectional stream, signed by the blob-request signer.
    Authenticated,
    /// Single unary call carrying a signed payment header.
    Paid,
}

impl DispersalMode {
    /// Label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Authenticated => "authenticated",
            Self::Paid => "paid",
        }
    }
}

/// One blob submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispersalRequest {
    /// Raw blob bytes.
    pub data: Vec<u8>,
    /// Requested quorums.
    pub quorums: Vec<QuorumNumber>,
    /// Call shape.
    pub mode: DispersalMode,
    /// Overrides the configured dispersal deadline.
    pub timeout: Option<Duration>,
}

impl DispersalRequest {
    /// New request in `mode`, no quorums, default deadline.
    pub fn new(mode: DispersalMode, data: Vec<u8>) -> Self {
        Self {
            data,
            quorums: Vec::new(),
            mode,
            timeout: None,
        }
    }

    /// Plain dispersal.
    pub fn plain(data: Vec<u8>) -> Self {
        Self::new(DispersalMode::Plain, data)
    }

    /// Authenticated dispersal.
    pub fn authenticated(data: Vec<u8>) -> Self {
        Self::new(DispersalMode::Authenticated, data)
    }

    /// Paid dispersal.
    pub fn paid(data: Vec<u8>) -> Self {
        Self::new(DispersalMode::Paid, data)
    }

    /// Set the requested quorums.
    pub fn with_quorums(mut self, quorums: impl Into<Vec<QuorumNumber>>) -> Self {
        self.quorums = quorums.into();
        self
    }

    /// Set a per-call deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Server acknowledgement of a dispersal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispersalReceipt {
    /// Status at submission time.
    pub status: BlobStatus,
    /// Identifier for [`DisperserApi::get_blob_status`].
    pub request_id: Vec<u8>,
}

/// Disperser client API - inbound port.
#[async_trait]
pub trait DisperserApi: Send + Sync {
    /// Submit a blob using the call shape named by `request.mode`.
    async fn disperse(&self, request: DispersalRequest) -> Result<DispersalReceipt, DisperserError>;

    /// Plain dispersal.
    async fn disperse_blob(
        &self,
        data: Vec<u8>,
        quorums: &[QuorumNumber],
    ) -> Result<DispersalReceipt, DisperserError> {
        self.disperse(DispersalRequest::plain(data).with_quorums(quorums))
            .await
    }

    /// Authenticated dispersal.
    async fn disperse_blob_authenticated(
        &self,
        data: Vec<u8>,
        quorums: &[QuorumNumber],
    ) -> Result<DispersalReceipt, DisperserError> {
        self.disperse(DispersalRequest::authenticated(data).with_quorums(quorums))
            .await
    }

    /// Paid dispersal.
    async fn disperse_paid_blob(
        &self,
        data: Vec<u8>,
        quorums: &[QuorumNumber],
    ) -> Result<DispersalReceipt, DisperserError> {
        self.disperse(DispersalRequest::paid(data).with_quorums(quorums))
            .await
    }

    /// Current status of a previous dispersal.
    async fn get_blob_status(&self, request_id: &[u8]) -> Result<BlobStatusReply, DisperserError>;

    /// Fetch a confirmed blob.
    async fn retrieve_blob(
        &self,
        batch_header_hash: &[u8],
        blob_index: u32,
    ) -> Result<Vec<u8>, DisperserError>;

    /// Fetch the account's payment state from the server and install it.
    async fn init_payment_state(&self) -> Result<(), DisperserError>;

    /// Tear down the shared connection. A later call reconnects.
    async fn close(&self) -> Result<(), DisperserError>;
}
