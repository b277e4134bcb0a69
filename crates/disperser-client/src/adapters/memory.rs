//! # In-Memory Disperser
//!
//! A process-local disperser and connector for tests and local development.
//! Records every request it receives and lets tests inject failures,
//! latency and misbehaving authentication streams.

use crate::config::DisperserConfig;
use crate::domain::{DisperserError, RpcError};
use crate::ports::{AuthenticatedStream, Connector, DisperserRpc};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{
    AccountId, AuthenticatedReply, AuthenticatedRequest, BlobAuthChallenge, BlobInfo, BlobStatus,
    BlobStatusReply, BlobStatusRequest, DisperseBlobReply, DisperseBlobRequest,
    DispersePaidBlobRequest, GetPaymentStateReply, GetPaymentStateRequest, RetrieveBlobReply,
    RetrieveBlobRequest, RpcStatus,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How the in-memory disperser answers an authenticated stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamBehavior {
    /// Challenge, then the dispersal result.
    #[default]
    Honest,
    /// Dispersal result where the challenge belongs.
    ReplyInsteadOfChallenge,
    /// A second challenge where the result belongs.
    ChallengeTwice,
    /// Error status right after the first message.
    Reject(RpcStatus),
}

/// One completed authenticated exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedDispersal {
    /// Account the first message named.
    pub account_id: Option<AccountId>,
    /// Challenge issued.
    pub nonce: u32,
    /// Signature received for the challenge.
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Vec<u8>,
    status: BlobStatus,
    info: Option<BlobInfo>,
}

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    blobs: HashMap<Vec<u8>, StoredBlob>,
    paid: Vec<DispersePaidBlobRequest>,
    authenticated: Vec<AuthenticatedDispersal>,
    payment_state: GetPaymentStateReply,
    payment_state_requests: Vec<GetPaymentStateRequest>,
    failure: Option<RpcStatus>,
    delay: Option<Duration>,
    stream_behavior: StreamBehavior,
    shutdowns: usize,
    hung_up: bool,
}

impl MemoryState {
    fn store(&mut self, data: Vec<u8>) -> DisperseBlobReply {
        self.next_id += 1;
        let request_id = format!("req-{}", self.next_id).into_bytes();
        self.blobs.insert(
            request_id.clone(),
            StoredBlob {
                data,
                status: BlobStatus::Processing,
                info: None,
            },
        );
        DisperseBlobReply {
            result: BlobStatus::Processing.code(),
            request_id,
        }
    }
}

/// In-memory disperser.
#[derive(Clone, Default)]
pub struct InMemoryDisperser {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryDisperser {
    /// Empty disperser with no payment state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply served by `GetPaymentState`.
    pub fn set_payment_state(&self, reply: GetPaymentStateReply) {
        self.state.lock().payment_state = reply;
    }

    /// Fail every unary call with `status` until cleared with `None`.
    pub fn fail_calls_with(&self, status: Option<RpcStatus>) {
        self.state.lock().failure = status;
    }

    /// Delay every call by `delay`.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.lock().delay = delay;
    }

    /// Behavior of subsequently opened authenticated streams.
    pub fn set_stream_behavior(&self, behavior: StreamBehavior) {
        self.state.lock().stream_behavior = behavior;
    }

    /// Mark a dispersed blob as confirmed at `(batch_header_hash, blob_index)`.
    pub fn confirm(&self, request_id: &[u8], batch_header_hash: Vec<u8>, blob_index: u32) -> bool {
        let mut state = self.state.lock();
        match state.blobs.get_mut(request_id) {
            Some(blob) => {
                blob.status = BlobStatus::Confirmed;
                blob.info = Some(BlobInfo {
                    batch_header_hash,
                    blob_index,
                    confirmation_block_number: 1,
                });
                true
            }
            None => false,
        }
    }

    /// Paid dispersals received so far, in arrival order.
    pub fn paid_requests(&self) -> Vec<DispersePaidBlobRequest> {
        self.state.lock().paid.clone()
    }

    /// Completed authenticated exchanges.
    pub fn authenticated_dispersals(&self) -> Vec<AuthenticatedDispersal> {
        self.state.lock().authenticated.clone()
    }

    /// `GetPaymentState` requests received.
    pub fn payment_state_requests(&self) -> Vec<GetPaymentStateRequest> {
        self.state.lock().payment_state_requests.clone()
    }

    /// Number of blobs accepted, all modes.
    pub fn blob_count(&self) -> usize {
        self.state.lock().blobs.len()
    }

    /// Drop the current channel as if the server hung up. Calls fail with a
    /// transport error until a connector dials again.
    pub fn hang_up(&self) {
        self.state.lock().hung_up = true;
    }

    /// Times `shutdown` was called.
    pub fn shutdown_count(&self) -> usize {
        self.state.lock().shutdowns
    }

    async fn begin_call(&self) -> Result<(), RpcError> {
        let (failure, delay) = {
            let state = self.state.lock();
            if state.hung_up {
                return Err(RpcError::Transport("connection closed by peer".into()));
            }
            (state.failure.clone(), state.delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match failure {
            Some(status) => Err(status.into()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DisperserRpc for InMemoryDisperser {
    async fn disperse_blob(
        &self,
        request: DisperseBlobRequest,
    ) -> Result<DisperseBlobReply, RpcError> {
        self.begin_call().await?;
        Ok(self.state.lock().store(request.data))
    }

    async fn disperse_paid_blob(
        &self,
        request: DispersePaidBlobRequest,
    ) -> Result<DisperseBlobReply, RpcError> {
        self.begin_call().await?;
        let mut state = self.state.lock();
        state.paid.push(request.clone());
        Ok(state.store(request.data))
    }

    async fn open_authenticated_stream(&self) -> Result<Box<dyn AuthenticatedStream>, RpcError> {
        let behavior = {
            let state = self.state.lock();
            if state.hung_up {
                return Err(RpcError::Transport("connection closed by peer".into()));
            }
            state.stream_behavior.clone()
        };
        Ok(Box::new(MemoryStream {
            disperser: self.clone(),
            behavior,
            request: None,
            nonce: None,
            pending: VecDeque::new(),
        }))
    }

    async fn get_blob_status(
        &self,
        request: BlobStatusRequest,
    ) -> Result<BlobStatusReply, RpcError> {
        self.begin_call().await?;
        let state = self.state.lock();
        match state.blobs.get(&request.request_id) {
            Some(blob) => Ok(BlobStatusReply {
                status: blob.status.code(),
                info: blob.info.clone(),
            }),
            None => Ok(BlobStatusReply {
                status: BlobStatus::Unknown.code(),
                info: None,
            }),
        }
    }

    async fn retrieve_blob(
        &self,
        request: RetrieveBlobRequest,
    ) -> Result<RetrieveBlobReply, RpcError> {
        self.begin_call().await?;
        let state = self.state.lock();
        state
            .blobs
            .values()
            .find(|blob| {
                blob.info.as_ref().is_some_and(|info| {
                    info.batch_header_hash == request.batch_header_hash
                        && info.blob_index == request.blob_index
                })
            })
            .map(|blob| RetrieveBlobReply {
                data: blob.data.clone(),
            })
            .ok_or_else(|| RpcStatus::not_found("no confirmed blob at that location").into())
    }

    async fn get_payment_state(
        &self,
        request: GetPaymentStateRequest,
    ) -> Result<GetPaymentStateReply, RpcError> {
        self.begin_call().await?;
        let mut state = self.state.lock();
        state.payment_state_requests.push(request);
        Ok(state.payment_state.clone())
    }

    fn is_closed(&self) -> bool {
        self.state.lock().hung_up
    }

    async fn shutdown(&self) {
        self.state.lock().shutdowns += 1;
    }
}

struct MemoryStream {
    disperser: InMemoryDisperser,
    behavior: StreamBehavior,
    request: Option<DisperseBlobRequest>,
    nonce: Option<u32>,
    pending: VecDeque<Result<AuthenticatedReply, RpcError>>,
}

#[async_trait]
impl AuthenticatedStream for MemoryStream {
    async fn send(&mut self, message: AuthenticatedRequest) -> Result<(), RpcError> {
        match (message, self.nonce) {
            (AuthenticatedRequest::DisperseRequest(request), None) => {
                let nonce = 1000 + self.disperser.state.lock().next_id as u32;
                self.nonce = Some(nonce);
                let reply = match &self.behavior {
                    StreamBehavior::ReplyInsteadOfChallenge => {
                        Ok(AuthenticatedReply::DisperseReply(DisperseBlobReply::default()))
                    }
                    StreamBehavior::Reject(status) => Err(status.clone().into()),
                    StreamBehavior::Honest | StreamBehavior::ChallengeTwice => {
                        Ok(AuthenticatedReply::BlobAuthHeader(BlobAuthChallenge {
                            challenge_parameter: nonce,
                        }))
                    }
                };
                self.request = Some(request);
                self.pending.push_back(reply);
            }
            (AuthenticatedRequest::AuthenticationData(auth), Some(nonce)) => {
                if self.behavior == StreamBehavior::ChallengeTwice {
                    self.pending
                        .push_back(Ok(AuthenticatedReply::BlobAuthHeader(BlobAuthChallenge {
                            challenge_parameter: nonce,
                        })));
                    return Ok(());
                }
                let request = self.request.take().unwrap_or_default();
                let mut state = self.disperser.state.lock();
                state.authenticated.push(AuthenticatedDispersal {
                    account_id: request.account_id.clone(),
                    nonce,
                    signature: auth.authentication_data,
                });
                let reply = state.store(request.data);
                self.pending
                    .push_back(Ok(AuthenticatedReply::DisperseReply(reply)));
            }
            _ => {
                self.pending.push_back(Err(RpcStatus::invalid_argument(
                    "unexpected message on authenticated stream",
                )
                .into()));
            }
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<AuthenticatedReply, RpcError> {
        let delay = self.disperser.state.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.pending
            .pop_front()
            .unwrap_or_else(|| Err(RpcError::Transport("no reply pending".into())))
    }
}

/// Connector handing out one shared [`InMemoryDisperser`].
pub struct MemoryConnector {
    disperser: InMemoryDisperser,
    connects: AtomicUsize,
    failures: AtomicUsize,
    delay: Option<Duration>,
}

impl MemoryConnector {
    /// Connector for `disperser`.
    pub fn new(disperser: InMemoryDisperser) -> Self {
        Self {
            disperser,
            connects: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Wait `delay` inside every connect call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the next `n` connect calls.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Connect calls made so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(
        &self,
        _config: &DisperserConfig,
    ) -> Result<Arc<dyn DisperserRpc>, DisperserError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let should_fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(DisperserError::ConnectionInit(
                "injected connect failure".into(),
            ));
        }
        self.disperser.state.lock().hung_up = false;
        Ok(Arc::new(self.disperser.clone()))
    }
}
