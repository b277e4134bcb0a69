//! # RPC Messages
//!
//! Request and reply payloads of the disperser service, plus the `Frame`
//! envelope used by stream-oriented transports to multiplex calls.
//!
//! ## Call Shapes
//!
//! | Call | Shape |
//! |------|-------|
//! | `DisperseBlob` | unary |
//! | `DispersePaidBlob` | unary |
//! | `DisperseBlobAuthenticated` | bidirectional stream, 2 requests / 2 replies |
//! | `GetBlobStatus` | unary |
//! | `RetrieveBlob` | unary |
//! | `GetPaymentState` | unary |

use crate::entities::*;
use crate::errors::RpcStatus;
use serde::{Deserialize, Serialize};

// =============================================================================
// DISPERSAL
// =============================================================================

/// Unauthenticated (or first authenticated) dispersal request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DisperseBlobRequest {
    /// Raw blob bytes.
    pub data: Vec<u8>,
    /// Quorums in addition to the network's required ones.
    pub custom_quorum_numbers: Vec<u32>,
    /// Requester account, set only on the authenticated path.
    pub account_id: Option<AccountId>,
}

/// Reply to any dispersal call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DisperseBlobReply {
    /// Wire `BlobStatus` code.
    pub result: u32,
    /// Opaque identifier for later status queries.
    pub request_id: Vec<u8>,
}

/// Dispersal paid for with a signed payment header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispersePaidBlobRequest {
    /// Raw blob bytes.
    pub data: Vec<u8>,
    /// Quorums the blob is dispersed to.
    pub quorum_numbers: Vec<u32>,
    /// Accountant decision for this request.
    pub payment_header: PaymentHeader,
    /// Payment signer's signature over `payment_header.to_signing_bytes()`.
    pub payment_signature: Vec<u8>,
}

// =============================================================================
// AUTHENTICATED STREAM
// =============================================================================

/// Signed answer to the server challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AuthenticationData {
    /// Blob-request signer's signature over the challenge.
    pub authentication_data: Vec<u8>,
}

/// Challenge issued by the server after the first stream message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlobAuthChallenge {
    /// Nonce the client must sign.
    pub challenge_parameter: u32,
}

/// Client-to-server message on the authenticated stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticatedRequest {
    /// First message: the dispersal itself.
    DisperseRequest(DisperseBlobRequest),
    /// Second message: the signed challenge.
    AuthenticationData(AuthenticationData),
}

/// Server-to-client message on the authenticated stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticatedReply {
    /// First reply: challenge to sign.
    BlobAuthHeader(BlobAuthChallenge),
    /// Final reply: dispersal result.
    DisperseReply(DisperseBlobReply),
}

impl AuthenticatedReply {
    /// Short name of the payload shape, used in protocol errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BlobAuthHeader(_) => "BlobAuthHeader",
            Self::DisperseReply(_) => "DisperseReply",
        }
    }
}

// =============================================================================
// QUERIES
// =============================================================================

/// Status query for a previous dispersal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlobStatusRequest {
    /// Identifier returned by a dispersal call.
    pub request_id: Vec<u8>,
}

/// Status reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlobStatusReply {
    /// Wire `BlobStatus` code.
    pub status: u32,
    /// Present once the blob is confirmed.
    pub info: Option<BlobInfo>,
}

impl BlobStatusReply {
    /// Decoded status, `None` for an unknown code.
    pub fn blob_status(&self) -> Option<BlobStatus> {
        BlobStatus::from_code(self.status)
    }
}

/// Fetch a confirmed blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RetrieveBlobRequest {
    /// Batch the blob was confirmed in.
    pub batch_header_hash: Vec<u8>,
    /// Index inside the batch.
    pub blob_index: u32,
}

/// Retrieved blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RetrieveBlobReply {
    /// Original blob bytes.
    pub data: Vec<u8>,
}

/// Payment-state query, signed by the payment signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GetPaymentStateRequest {
    /// Account whose state is requested.
    pub account_id: AccountId,
    /// Signature over the account id.
    pub signature: Vec<u8>,
}

/// Authoritative payment state of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GetPaymentStateReply {
    /// Network pricing parameters.
    pub payment_global_params: Option<GlobalPaymentParams>,
    /// Symbols already charged to the current bin.
    pub current_bin_usage: u64,
    /// Symbols already charged to the next bin.
    pub next_bin_usage: u64,
    /// Symbols borrowed from the next bin.
    pub overflow_bin_usage: u64,
    /// Reservation, if the account holds one.
    pub reservation: Option<ActiveReservation>,
    /// Cumulative on-demand payment the server has accepted so far.
    pub cumulative_payment: U256,
    /// Cumulative payment deposited on chain.
    pub onchain_cumulative_payment: U256,
}

// =============================================================================
// TRANSPORT FRAMES
// =============================================================================

/// Unary request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcRequest {
    /// `DisperseBlob`.
    DisperseBlob(DisperseBlobRequest),
    /// `DispersePaidBlob`.
    DispersePaidBlob(DispersePaidBlobRequest),
    /// `GetBlobStatus`.
    GetBlobStatus(BlobStatusRequest),
    /// `RetrieveBlob`.
    RetrieveBlob(RetrieveBlobRequest),
    /// `GetPaymentState`.
    GetPaymentState(GetPaymentStateRequest),
}

impl RpcRequest {
    /// Method name, for logs.
    pub fn method(&self) -> &'static str {
        match self {
            Self::DisperseBlob(_) => "DisperseBlob",
            Self::DispersePaidBlob(_) => "DispersePaidBlob",
            Self::GetBlobStatus(_) => "GetBlobStatus",
            Self::RetrieveBlob(_) => "RetrieveBlob",
            Self::GetPaymentState(_) => "GetPaymentState",
        }
    }
}

/// Unary reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcResponse {
    /// Reply to either dispersal call.
    Disperse(DisperseBlobReply),
    /// Reply to `GetBlobStatus`.
    BlobStatus(BlobStatusReply),
    /// Reply to `RetrieveBlob`.
    RetrieveBlob(RetrieveBlobReply),
    /// Reply to `GetPaymentState`.
    PaymentState(GetPaymentStateReply),
}

impl RpcResponse {
    /// Variant name, for protocol errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Disperse(_) => "Disperse",
            Self::BlobStatus(_) => "BlobStatus",
            Self::RetrieveBlob(_) => "RetrieveBlob",
            Self::PaymentState(_) => "PaymentState",
        }
    }
}

/// Body of a transport frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameBody {
    /// Client → server unary call.
    Request(RpcRequest),
    /// Server → client unary reply or error.
    Response(Result<RpcResponse, RpcStatus>),
    /// Client → server message on an authenticated stream. The first one opens the stream.
    StreamRequest(AuthenticatedRequest),
    /// Server → client message on an authenticated stream.
    StreamReply(AuthenticatedReply),
    /// Server terminated the stream with an error.
    StreamError(RpcStatus),
    /// Either side tears the stream down.
    StreamClose,
}

/// Multiplexing envelope: every call or stream owns one `call_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Client-assigned call identifier.
    pub call_id: u64,
    /// Payload.
    pub body: FrameBody,
}

impl Frame {
    /// Build a frame.
    pub fn new(call_id: u64, body: FrameBody) -> Self {
        Self { call_id, body }
    }
}
