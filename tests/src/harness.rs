//! # Test Disperser
//!
//! A TCP disperser that speaks the client's frame protocol. It verifies
//! challenge signatures and tracks the highest cumulative payment it has
//! accepted per account, rejecting payments that do not increase it.
//!
//! [`TestDisperser::hang_up`] drops every open connection, as a restart
//! would, while the listener keeps accepting new ones.
//!
//! Blobs are confirmed as soon as they are stored: status queries report
//! `Confirmed` at batch [`BATCH_HEADER_HASH`], with the blob index equal to
//! the dispersal sequence number.

use disperser_client::adapters::tcp::{read_frame, write_frame};
use disperser_client::DisperserConfig;
use parking_lot::Mutex;
use shared_crypto::{keccak256, Secp256k1PublicKey, Secp256k1Signature};
use shared_types::{
    AccountId, AuthenticatedReply, AuthenticatedRequest, BlobAuthChallenge, BlobInfo, BlobStatus,
    BlobStatusReply, DisperseBlobReply, DisperseBlobRequest, DispersePaidBlobRequest, Frame,
    FrameBody, GetPaymentStateReply, PaymentMode, RetrieveBlobReply, RpcRequest, RpcResponse,
    RpcStatus, U256,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// Batch every blob is confirmed into.
pub const BATCH_HEADER_HASH: [u8; 32] = [0xBA; 32];

#[derive(Default)]
struct ServerState {
    next_index: u32,
    blobs: HashMap<Vec<u8>, (u32, Vec<u8>)>,
    paid: Vec<DispersePaidBlobRequest>,
    highest_payment: HashMap<AccountId, U256>,
    payment_state: GetPaymentStateReply,
    verified_challenges: usize,
    rejected_challenges: usize,
    connections: usize,
}

impl ServerState {
    fn store(&mut self, data: Vec<u8>) -> DisperseBlobReply {
        self.next_index += 1;
        let index = self.next_index;
        let request_id = index.to_be_bytes().to_vec();
        self.blobs.insert(request_id.clone(), (index, data));
        DisperseBlobReply {
            result: BlobStatus::Processing.code(),
            request_id,
        }
    }

    fn accept_paid(&mut self, request: DispersePaidBlobRequest) -> Result<RpcResponse, RpcStatus> {
        let header = &request.payment_header;
        if let PaymentMode::OnDemand { cumulative_payment } = header.mode {
            let last = self
                .highest_payment
                .entry(header.account_id.clone())
                .or_default();
            if cumulative_payment <= *last {
                return Err(RpcStatus::invalid_argument(format!(
                    "cumulative payment {cumulative_payment} does not exceed {last}"
                )));
            }
            *last = cumulative_payment;
        }
        let data = request.data.clone();
        self.paid.push(request);
        Ok(RpcResponse::Disperse(self.store(data)))
    }

    fn unary(&mut self, request: RpcRequest) -> Result<RpcResponse, RpcStatus> {
        match request {
            RpcRequest::DisperseBlob(request) => Ok(RpcResponse::Disperse(self.store(request.data))),
            RpcRequest::DispersePaidBlob(request) => self.accept_paid(request),
            RpcRequest::GetBlobStatus(request) => {
                let reply = match self.blobs.get(&request.request_id) {
                    Some((index, _)) => BlobStatusReply {
                        status: BlobStatus::Confirmed.code(),
                        info: Some(BlobInfo {
                            batch_header_hash: BATCH_HEADER_HASH.to_vec(),
                            blob_index: *index,
                            confirmation_block_number: 100,
                        }),
                    },
                    None => BlobStatusReply {
                        status: BlobStatus::Unknown.code(),
                        info: None,
                    },
                };
                Ok(RpcResponse::BlobStatus(reply))
            }
            RpcRequest::RetrieveBlob(request) => {
                if request.batch_header_hash != BATCH_HEADER_HASH {
                    return Err(RpcStatus::not_found("unknown batch"));
                }
                self.blobs
                    .values()
                    .find(|(index, _)| *index == request.blob_index)
                    .map(|(_, data)| RpcResponse::RetrieveBlob(RetrieveBlobReply { data: data.clone() }))
                    .ok_or_else(|| RpcStatus::not_found("unknown blob index"))
            }
            RpcRequest::GetPaymentState(_) => {
                Ok(RpcResponse::PaymentState(self.payment_state.clone()))
            }
        }
    }
}

struct StreamSession {
    request: DisperseBlobRequest,
    nonce: u32,
}

/// In-process disperser listening on an ephemeral local port.
pub struct TestDisperser {
    addr: SocketAddr,
    state: Arc<Mutex<ServerState>>,
    hang_up: broadcast::Sender<()>,
    accept_task: JoinHandle<()>,
}

impl TestDisperser {
    /// Bind to `127.0.0.1:0` and start accepting connections.
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(Mutex::new(ServerState::default()));
        let (hang_up, _) = broadcast::channel(4);

        let accept_state = state.clone();
        let accept_hang_up = hang_up.clone();
        let accept_task = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                accept_state.lock().connections += 1;
                tokio::spawn(serve_connection(
                    socket,
                    accept_state.clone(),
                    accept_hang_up.subscribe(),
                ));
            }
        });

        Ok(Self {
            addr,
            state,
            hang_up,
            accept_task,
        })
    }

    /// Client config pointing at this server.
    pub fn config(&self) -> DisperserConfig {
        let mut config = DisperserConfig::new(self.addr.ip().to_string(), self.addr.port());
        config.timeout = Duration::from_secs(5);
        config.connect_timeout = Duration::from_secs(2);
        config
    }

    /// Reply served by `GetPaymentState`.
    pub fn set_payment_state(&self, reply: GetPaymentStateReply) {
        self.state.lock().payment_state = reply;
    }

    /// Paid dispersals accepted so far.
    pub fn paid_requests(&self) -> Vec<DispersePaidBlobRequest> {
        self.state.lock().paid.clone()
    }

    /// Challenges answered with a valid signature.
    pub fn verified_challenges(&self) -> usize {
        self.state.lock().verified_challenges
    }

    /// Challenges answered with a bad signature.
    pub fn rejected_challenges(&self) -> usize {
        self.state.lock().rejected_challenges
    }

    /// Close every open connection.
    pub fn hang_up(&self) {
        let _ = self.hang_up.send(());
    }

    /// Connections accepted so far.
    pub fn connections(&self) -> usize {
        self.state.lock().connections
    }
}

impl Drop for TestDisperser {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn serve_connection(
    socket: TcpStream,
    state: Arc<Mutex<ServerState>>,
    mut hang_up: broadcast::Receiver<()>,
) {
    let (mut reader, mut writer) = socket.into_split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Frame>();

    let writer_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if write_frame(&mut writer, &frame).await.is_err() {
                break;
            }
        }
    });

    let mut sessions: HashMap<u64, StreamSession> = HashMap::new();
    loop {
        let frame = tokio::select! {
            read = read_frame(&mut reader) => match read {
                Ok(Some(frame)) => frame,
                _ => break,
            },
            _ = hang_up.recv() => break,
        };
        let call_id = frame.call_id;
        let body = match frame.body {
            FrameBody::Request(request) => Some(FrameBody::Response(state.lock().unary(request))),
            FrameBody::StreamRequest(message) => {
                Some(handle_stream(call_id, message, &mut sessions, &state))
            }
            FrameBody::StreamClose => {
                sessions.remove(&call_id);
                None
            }
            _ => None,
        };
        if let Some(body) = body {
            if outbound.send(Frame::new(call_id, body)).is_err() {
                break;
            }
        }
    }
    drop(outbound);
    let _ = writer_task.await;
}

fn handle_stream(
    call_id: u64,
    message: AuthenticatedRequest,
    sessions: &mut HashMap<u64, StreamSession>,
    state: &Mutex<ServerState>,
) -> FrameBody {
    match message {
        AuthenticatedRequest::DisperseRequest(request) if !sessions.contains_key(&call_id) => {
            let nonce = rand::random::<u32>();
            sessions.insert(call_id, StreamSession { request, nonce });
            FrameBody::StreamReply(AuthenticatedReply::BlobAuthHeader(BlobAuthChallenge {
                challenge_parameter: nonce,
            }))
        }
        AuthenticatedRequest::AuthenticationData(auth) => {
            let Some(session) = sessions.remove(&call_id) else {
                return FrameBody::StreamError(RpcStatus::invalid_argument(
                    "authentication data before dispersal request",
                ));
            };
            let mut state = state.lock();
            if !signature_matches(&session, &auth.authentication_data) {
                state.rejected_challenges += 1;
                return FrameBody::StreamError(RpcStatus::unauthenticated(
                    "challenge signature does not verify",
                ));
            }
            state.verified_challenges += 1;
            let reply = state.store(session.request.data);
            FrameBody::StreamReply(AuthenticatedReply::DisperseReply(reply))
        }
        AuthenticatedRequest::DisperseRequest(_) => {
            sessions.remove(&call_id);
            FrameBody::StreamError(RpcStatus::invalid_argument("duplicate dispersal request"))
        }
    }
}

fn signature_matches(session: &StreamSession, signature: &[u8]) -> bool {
    let Some(account_id) = &session.request.account_id else {
        return false;
    };
    let (Ok(public_key), Ok(signature)) = (
        Secp256k1PublicKey::from_hex(account_id.as_str()),
        Secp256k1Signature::from_slice(signature),
    ) else {
        return false;
    };
    public_key
        .verify(&keccak256(&session.nonce.to_be_bytes()), &signature)
        .is_ok()
}
