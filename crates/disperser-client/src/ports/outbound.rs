//! # Outbound Ports
//!
//! Traits for external dependencies (transport, signers, clock).

use crate::config::DisperserConfig;
use crate::domain::{DisperserError, RpcError, SignerError};
use async_trait::async_trait;
use shared_types::{
    AccountId, AuthenticatedReply, AuthenticatedRequest, BlobAuthHeader, BlobStatusReply,
    BlobStatusRequest, DisperseBlobReply, DisperseBlobRequest, DispersePaidBlobRequest,
    GetPaymentStateReply, GetPaymentStateRequest, PaymentHeader, RetrieveBlobReply,
    RetrieveBlobRequest,
};
use std::sync::Arc;

/// Established channel to a disperser - outbound port.
///
/// One instance is shared by every concurrent caller; implementations
/// multiplex independent calls over it.
#[async_trait]
pub trait DisperserRpc: Send + Sync {
    /// `DisperseBlob` unary call.
    async fn disperse_blob(
        &self,
        request: DisperseBlobRequest,
    ) -> Result<DisperseBlobReply, RpcError>;

    /// `DispersePaidBlob` unary call.
    async fn disperse_paid_blob(
        &self,
        request: DispersePaidBlobRequest,
    ) -> Result<DisperseBlobReply, RpcError>;

    /// Open a fresh `DisperseBlobAuthenticated` stream.
    async fn open_authenticated_stream(&self) -> Result<Box<dyn AuthenticatedStream>, RpcError>;

    /// `GetBlobStatus` unary call.
    async fn get_blob_status(&self, request: BlobStatusRequest)
        -> Result<BlobStatusReply, RpcError>;

    /// `RetrieveBlob` unary call.
    async fn retrieve_blob(
        &self,
        request: RetrieveBlobRequest,
    ) -> Result<RetrieveBlobReply, RpcError>;

    /// `GetPaymentState` unary call.
    async fn get_payment_state(
        &self,
        request: GetPaymentStateRequest,
    ) -> Result<GetPaymentStateReply, RpcError>;

    /// True once the channel can no longer carry calls (peer hang-up,
    /// socket failure, shutdown). A closed channel is replaced on next use.
    fn is_closed(&self) -> bool;

    /// Release the channel. In-flight calls fail with a transport error.
    async fn shutdown(&self);
}

/// One authenticated dispersal stream - outbound port.
///
/// Dropping the stream tears it down.
#[async_trait]
pub trait AuthenticatedStream: Send {
    /// Send the next client message.
    async fn send(&mut self, message: AuthenticatedRequest) -> Result<(), RpcError>;

    /// Wait for the next server message.
    async fn recv(&mut self) -> Result<AuthenticatedReply, RpcError>;
}

/// Channel factory - outbound port.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Dial the configured disperser.
    async fn connect(&self, config: &DisperserConfig)
        -> Result<Arc<dyn DisperserRpc>, DisperserError>;
}

/// Signs authentication challenges. The key never leaves the signer.
pub trait BlobRequestSigner: Send + Sync {
    /// Account the requests are made for.
    fn account_id(&self) -> Result<AccountId, SignerError>;

    /// Signature over `header.to_signing_bytes()`.
    fn sign_blob_request(&self, header: &BlobAuthHeader) -> Result<Vec<u8>, SignerError>;
}

/// Signs payment artifacts. The key never leaves the signer.
pub trait PaymentSigner: Send + Sync {
    /// Paying account.
    fn account_id(&self) -> AccountId;

    /// Signature over `header.to_signing_bytes()`.
    fn sign_payment_header(&self, header: &PaymentHeader) -> Result<Vec<u8>, SignerError>;

    /// Signature over the account id, proving ownership for `GetPaymentState`.
    fn sign_account_id(&self, account_id: &AccountId) -> Result<Vec<u8>, SignerError>;
}

/// Time source abstraction for testability - outbound port.
pub trait TimeSource: Send + Sync {
    /// Current Unix time in seconds.
    fn now(&self) -> u64;
}
