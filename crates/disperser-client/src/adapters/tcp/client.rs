//! Multiplexed frame channel and the TCP connector that dials it.
//!
//! One reader task routes inbound frames to the waiting call by `call_id`;
//! one writer task owns the write half. Unary calls wait on a oneshot,
//! authenticated streams on an unbounded mpsc.
//!
//! Frames are encoded by the calling task, so a request that cannot be
//! framed fails alone. Only socket errors and peer hang-ups close the
//! channel.

use super::codec::{encode_frame, read_frame, write_encoded};
use crate::config::DisperserConfig;
use crate::domain::{DisperserError, RpcError};
use crate::ports::{AuthenticatedStream, Connector, DisperserRpc};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{
    AuthenticatedReply, AuthenticatedRequest, BlobStatusReply, BlobStatusRequest,
    DisperseBlobReply, DisperseBlobRequest, DispersePaidBlobRequest, Frame, FrameBody,
    GetPaymentStateReply, GetPaymentStateRequest, RetrieveBlobReply, RetrieveBlobRequest,
    RpcRequest, RpcResponse,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type UnaryReply = Result<RpcResponse, RpcError>;
type StreamReply = Result<AuthenticatedReply, RpcError>;

enum Route {
    Unary(oneshot::Sender<UnaryReply>),
    Stream(mpsc::UnboundedSender<StreamReply>),
}

#[derive(Default)]
struct RouteTable {
    closed: Option<String>,
    routes: HashMap<u64, Route>,
}

type SharedRoutes = Arc<Mutex<RouteTable>>;

fn encode(frame: &Frame) -> Result<Vec<u8>, RpcError> {
    encode_frame(frame).map_err(|e| RpcError::Unsendable(e.to_string()))
}

impl RouteTable {
    fn register(&mut self, call_id: u64, route: Route) -> Result<(), RpcError> {
        if let Some(reason) = &self.closed {
            return Err(RpcError::Transport(reason.clone()));
        }
        self.routes.insert(call_id, route);
        Ok(())
    }

    fn close(&mut self, reason: &str) {
        self.closed = Some(reason.to_string());
        for (_, route) in self.routes.drain() {
            let err = RpcError::Transport(reason.to_string());
            match route {
                Route::Unary(tx) => {
                    let _ = tx.send(Err(err));
                }
                Route::Stream(tx) => {
                    let _ = tx.send(Err(err));
                }
            }
        }
    }
}

// Removes a unary route if the caller stops waiting (deadline, cancellation).
struct RouteGuard {
    routes: SharedRoutes,
    call_id: u64,
}

impl Drop for RouteGuard {
    fn drop(&mut self) {
        self.routes.lock().routes.remove(&self.call_id);
    }
}

/// Call-multiplexing channel over any byte stream.
pub struct MultiplexedChannel {
    next_call_id: AtomicU64,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    routes: SharedRoutes,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MultiplexedChannel {
    /// Start the reader and writer tasks on `io`.
    pub fn spawn<S>(io: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (mut read_half, mut write_half) = tokio::io::split(io);
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let routes: SharedRoutes = Arc::new(Mutex::new(RouteTable::default()));

        let writer_routes = routes.clone();
        let writer = tokio::spawn(async move {
            while let Some(encoded) = outbound_rx.recv().await {
                if let Err(e) = write_encoded(&mut write_half, &encoded).await {
                    warn!(error = %e, "Frame write failed");
                    writer_routes.lock().close(&format!("write failed: {e}"));
                    break;
                }
            }
        });

        let reader_routes = routes.clone();
        let reader = tokio::spawn(async move {
            let reason = loop {
                match read_frame(&mut read_half).await {
                    Ok(Some(frame)) => dispatch(&reader_routes, frame),
                    Ok(None) => break "connection closed by peer".to_string(),
                    Err(e) => break format!("read failed: {e}"),
                }
            };
            debug!(%reason, "Reader task stopped");
            reader_routes.lock().close(&reason);
        });

        Self {
            next_call_id: AtomicU64::new(1),
            outbound,
            routes,
            tasks: Mutex::new(vec![reader, writer]),
        }
    }

    fn allocate_call_id(&self) -> u64 {
        self.next_call_id.fetch_add(1, Ordering::Relaxed)
    }

    /// True once the peer hung up or the socket failed.
    pub fn is_closed(&self) -> bool {
        self.routes.lock().closed.is_some()
    }

    async fn call(&self, request: RpcRequest) -> Result<RpcResponse, RpcError> {
        let call_id = self.allocate_call_id();
        let method = request.method();
        let encoded = encode(&Frame::new(call_id, FrameBody::Request(request)))?;
        let (tx, rx) = oneshot::channel();
        self.routes.lock().register(call_id, Route::Unary(tx))?;
        let _guard = RouteGuard {
            routes: self.routes.clone(),
            call_id,
        };

        debug!(call_id, method, bytes = encoded.len(), "Sending unary call");
        self.outbound
            .send(encoded)
            .map_err(|_| RpcError::Transport("connection closed".into()))?;

        rx.await
            .map_err(|_| RpcError::Transport("connection closed before reply".into()))?
    }
}

fn dispatch(routes: &SharedRoutes, frame: Frame) {
    let call_id = frame.call_id;
    let mut table = routes.lock();
    match frame.body {
        FrameBody::Response(result) => {
            if let Some(Route::Unary(tx)) = table.routes.remove(&call_id) {
                let _ = tx.send(result.map_err(RpcError::from));
            }
        }
        FrameBody::StreamReply(reply) => {
            if let Some(Route::Stream(tx)) = table.routes.get(&call_id) {
                let _ = tx.send(Ok(reply));
            }
        }
        FrameBody::StreamError(status) => {
            if let Some(Route::Stream(tx)) = table.routes.remove(&call_id) {
                let _ = tx.send(Err(status.into()));
            }
        }
        FrameBody::StreamClose => {
            table.routes.remove(&call_id);
        }
        FrameBody::Request(_) | FrameBody::StreamRequest(_) => {
            warn!(call_id, "Ignoring client-bound request frame from server");
        }
    }
}

fn unexpected(expected: &str, got: &RpcResponse) -> RpcError {
    RpcError::MalformedReply(format!("expected {expected} reply, got {}", got.kind()))
}

#[async_trait]
impl DisperserRpc for MultiplexedChannel {
    async fn disperse_blob(
        &self,
        request: DisperseBlobRequest,
    ) -> Result<DisperseBlobReply, RpcError> {
        match self.call(RpcRequest::DisperseBlob(request)).await? {
            RpcResponse::Disperse(reply) => Ok(reply),
            other => Err(unexpected("Disperse", &other)),
        }
    }

    async fn disperse_paid_blob(
        &self,
        request: DispersePaidBlobRequest,
    ) -> Result<DisperseBlobReply, RpcError> {
        match self.call(RpcRequest::DispersePaidBlob(request)).await? {
            RpcResponse::Disperse(reply) => Ok(reply),
            other => Err(unexpected("Disperse", &other)),
        }
    }

    async fn open_authenticated_stream(&self) -> Result<Box<dyn AuthenticatedStream>, RpcError> {
        let call_id = self.allocate_call_id();
        let (tx, inbound) = mpsc::unbounded_channel();
        self.routes.lock().register(call_id, Route::Stream(tx))?;
        debug!(call_id, "Opened authenticated stream");
        Ok(Box::new(FramedAuthenticatedStream {
            call_id,
            outbound: self.outbound.clone(),
            inbound,
            routes: self.routes.clone(),
        }))
    }

    async fn get_blob_status(
        &self,
        request: BlobStatusRequest,
    ) -> Result<BlobStatusReply, RpcError> {
        match self.call(RpcRequest::GetBlobStatus(request)).await? {
            RpcResponse::BlobStatus(reply) => Ok(reply),
            other => Err(unexpected("BlobStatus", &other)),
        }
    }

    async fn retrieve_blob(
        &self,
        request: RetrieveBlobRequest,
    ) -> Result<RetrieveBlobReply, RpcError> {
        match self.call(RpcRequest::RetrieveBlob(request)).await? {
            RpcResponse::RetrieveBlob(reply) => Ok(reply),
            other => Err(unexpected("RetrieveBlob", &other)),
        }
    }

    async fn get_payment_state(
        &self,
        request: GetPaymentStateRequest,
    ) -> Result<GetPaymentStateReply, RpcError> {
        match self.call(RpcRequest::GetPaymentState(request)).await? {
            RpcResponse::PaymentState(reply) => Ok(reply),
            other => Err(unexpected("PaymentState", &other)),
        }
    }

    fn is_closed(&self) -> bool {
        MultiplexedChannel::is_closed(self)
    }

    async fn shutdown(&self) {
        self.routes.lock().close("channel shut down");
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

impl Drop for MultiplexedChannel {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}

/// Authenticated stream riding on a [`MultiplexedChannel`].
struct FramedAuthenticatedStream {
    call_id: u64,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    inbound: mpsc::UnboundedReceiver<StreamReply>,
    routes: SharedRoutes,
}

#[async_trait]
impl AuthenticatedStream for FramedAuthenticatedStream {
    async fn send(&mut self, message: AuthenticatedRequest) -> Result<(), RpcError> {
        let encoded = encode(&Frame::new(self.call_id, FrameBody::StreamRequest(message)))?;
        self.outbound
            .send(encoded)
            .map_err(|_| RpcError::Transport("connection closed".into()))
    }

    async fn recv(&mut self) -> Result<AuthenticatedReply, RpcError> {
        match self.inbound.recv().await {
            Some(reply) => reply,
            None => Err(RpcError::Transport("stream closed by server".into())),
        }
    }
}

impl Drop for FramedAuthenticatedStream {
    fn drop(&mut self) {
        self.routes.lock().routes.remove(&self.call_id);
        if let Ok(encoded) = encode(&Frame::new(self.call_id, FrameBody::StreamClose)) {
            let _ = self.outbound.send(encoded);
        }
    }
}

/// Plain TCP connector.
///
/// Does not provide TLS: a config asking for a secure transport is refused
/// so that a TLS-capable [`Connector`] can be injected instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(
        &self,
        config: &DisperserConfig,
    ) -> Result<Arc<dyn DisperserRpc>, DisperserError> {
        if config.use_secure_transport {
            return Err(DisperserError::ConnectionInit(
                "secure transport requested but TcpConnector has no TLS support".into(),
            ));
        }

        let address = config.address();
        let stream = TcpStream::connect(&address)
            .await
            .map_err(|e| DisperserError::ConnectionInit(format!("dial {address}: {e}")))?;
        stream
            .set_nodelay(true)
            .map_err(|e| DisperserError::ConnectionInit(format!("configure {address}: {e}")))?;

        info!(%address, "Connected to disperser");
        Ok(Arc::new(MultiplexedChannel::spawn(stream)))
    }
}
