//! # Disperser Client
//!
//! Application service implementing [`DisperserApi`] over one shared,
//! lazily established connection.
//!
//! ## Call Flow
//!
//! ```text
//! disperse(request)
//!   ├── validate payload            (no network on failure)
//!   ├── connection.get()            (shared, retried after a failed dial)
//!   └── by mode
//!       ├── Plain          DisperseBlob
//!       ├── Paid           Accountant::account_blob → DispersePaidBlob
//!       └── Authenticated  open stream → request → challenge → auth data → reply
//! ```
//!
//! Every dispersal runs under the request's deadline, or the configured one.
//! Status and retrieval reads use [`STATUS_CALL_TIMEOUT`].

use super::accountant::Accountant;
use super::deadline::with_deadline;
use super::payment_sync::PaymentStateSync;
use crate::adapters::{LazyConnection, SystemTimeSource, TcpConnector};
use crate::config::{ConfigError, DisperserConfig, STATUS_CALL_TIMEOUT};
use crate::domain::{
    validate_payload, AuthenticatedHandshake, DisperserError, RpcError, SignerError,
};
use crate::ports::{
    BlobRequestSigner, Connector, DispersalMode, DispersalReceipt, DispersalRequest,
    DisperserApi, DisperserRpc, PaymentSigner, TimeSource,
};
use async_trait::async_trait;
use disperser_telemetry::metrics;
use shared_types::{
    AccountId, BlobAuthHeader, BlobStatus, BlobStatusReply, BlobStatusRequest, DisperseBlobReply,
    DisperseBlobRequest, DispersePaidBlobRequest, QuorumNumber, RetrieveBlobRequest,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Builder for [`DisperserClient`].
pub struct DisperserClientBuilder {
    config: DisperserConfig,
    connector: Option<Arc<dyn Connector>>,
    blob_signer: Option<Arc<dyn BlobRequestSigner>>,
    payment_signer: Option<Arc<dyn PaymentSigner>>,
    time_source: Option<Arc<dyn TimeSource>>,
}

impl DisperserClientBuilder {
    /// Transport factory. Defaults to [`TcpConnector`].
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Signer for authenticated dispersal.
    pub fn blob_request_signer(mut self, signer: Arc<dyn BlobRequestSigner>) -> Self {
        self.blob_signer = Some(signer);
        self
    }

    /// Signer for paid dispersal and payment-state sync.
    pub fn payment_signer(mut self, signer: Arc<dyn PaymentSigner>) -> Self {
        self.payment_signer = Some(signer);
        self
    }

    /// Clock used for reservation bins. Defaults to the system clock.
    pub fn time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = Some(time_source);
        self
    }

    /// Validate the config and build the client. Nothing is dialed yet.
    pub fn build(self) -> Result<DisperserClient, ConfigError> {
        self.config.validate()?;

        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(TcpConnector));
        let clock = self
            .time_source
            .unwrap_or_else(|| Arc::new(SystemTimeSource));
        let accountant = Arc::new(Accountant::new(self.payment_signer, clock));

        Ok(DisperserClient {
            connection: LazyConnection::new(self.config.clone(), connector),
            payment_sync: PaymentStateSync::new(accountant.clone()),
            accountant,
            blob_signer: self.blob_signer,
            config: self.config,
        })
    }
}

/// Disperser client.
pub struct DisperserClient {
    config: DisperserConfig,
    connection: LazyConnection,
    accountant: Arc<Accountant>,
    payment_sync: PaymentStateSync,
    blob_signer: Option<Arc<dyn BlobRequestSigner>>,
}

impl DisperserClient {
    /// Start building a client for `config`.
    pub fn builder(config: DisperserConfig) -> DisperserClientBuilder {
        DisperserClientBuilder {
            config,
            connector: None,
            blob_signer: None,
            payment_signer: None,
            time_source: None,
        }
    }

    /// Configuration the client was built with.
    pub fn config(&self) -> &DisperserConfig {
        &self.config
    }

    /// Local payment accounting.
    pub fn accountant(&self) -> &Accountant {
        &self.accountant
    }

    /// True while the shared connection is established.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    async fn dispatch(&self, request: DispersalRequest) -> Result<DispersalReceipt, DisperserError> {
        validate_payload(&request.data)?;
        let limit = request.timeout.unwrap_or(self.config.timeout);

        let reply = match request.mode {
            DispersalMode::Plain => {
                let rpc = self.connection.get().await?;
                let call = rpc.disperse_blob(DisperseBlobRequest {
                    data: request.data,
                    custom_quorum_numbers: wire_quorums(&request.quorums),
                    account_id: None,
                });
                with_deadline("DisperseBlob", limit, call).await?
            }
            DispersalMode::Paid => {
                let rpc = self.connection.get().await?;
                let (payment_header, payment_signature) = self
                    .accountant
                    .account_blob(request.data.len(), &request.quorums)?;
                let call = rpc.disperse_paid_blob(DispersePaidBlobRequest {
                    data: request.data,
                    quorum_numbers: wire_quorums(&request.quorums),
                    payment_header,
                    payment_signature,
                });
                with_deadline("DispersePaidBlob", limit, call).await?
            }
            DispersalMode::Authenticated => {
                self.disperse_authenticated(request.data, &request.quorums, limit)
                    .await?
            }
        };

        let receipt = receipt_from(reply)?;
        info!(
            status = ?receipt.status,
            request_id = %hex::encode(&receipt.request_id),
            "Blob dispersed"
        );
        Ok(receipt)
    }

    async fn disperse_authenticated(
        &self,
        data: Vec<u8>,
        quorums: &[QuorumNumber],
        limit: Duration,
    ) -> Result<DisperseBlobReply, DisperserError> {
        let signer = self
            .blob_signer
            .as_ref()
            .ok_or(SignerError::NotConfigured {
                role: "blob request",
            })?;
        let account_id = signer.account_id()?;
        let rpc = self.connection.get().await?;

        let mut handshake = AuthenticatedHandshake::new(DisperseBlobRequest {
            data,
            custom_quorum_numbers: wire_quorums(quorums),
            account_id: Some(account_id.clone()),
        });
        let exchange = run_handshake(rpc.as_ref(), &mut handshake, signer.as_ref(), account_id);
        let result = match tokio::time::timeout(limit, exchange).await {
            Ok(result) => result,
            Err(_) => Err(RpcError::DeadlineExceeded { timeout: limit }.into()),
        };

        if let Err(e) = &result {
            let state = match e {
                DisperserError::ProtocolSequence { state, .. } => *state,
                _ => handshake.fail().name(),
            };
            metrics::record_handshake_failure(state);
            warn!(state, error = %e, "Authenticated dispersal aborted");
        }
        result
    }
}

// The stream lives only inside this future; dropping it on error or
// deadline tears the stream down.
async fn run_handshake(
    rpc: &dyn DisperserRpc,
    handshake: &mut AuthenticatedHandshake,
    signer: &dyn BlobRequestSigner,
    account_id: AccountId,
) -> Result<DisperseBlobReply, DisperserError> {
    let mut stream = rpc.open_authenticated_stream().await?;

    stream.send(handshake.request_message()?).await?;
    let challenge = handshake.receive_challenge(stream.recv().await?)?;
    debug!(nonce = challenge.challenge_parameter, "Received challenge");

    let signature = signer.sign_blob_request(&BlobAuthHeader {
        account_id,
        nonce: challenge.challenge_parameter,
    })?;
    stream.send(handshake.authentication_message(signature)?).await?;

    handshake.expect_final_reply()?;
    handshake.receive_final_reply(stream.recv().await?)
}

fn wire_quorums(quorums: &[QuorumNumber]) -> Vec<u32> {
    quorums.iter().map(|&q| u32::from(q)).collect()
}

fn receipt_from(reply: DisperseBlobReply) -> Result<DispersalReceipt, DisperserError> {
    let status = BlobStatus::from_code(reply.result).ok_or_else(|| {
        RpcError::MalformedReply(format!("unknown blob status code {}", reply.result))
    })?;
    Ok(DispersalReceipt {
        status,
        request_id: reply.request_id,
    })
}

#[async_trait]
impl DisperserApi for DisperserClient {
    async fn disperse(&self, request: DispersalRequest) -> Result<DispersalReceipt, DisperserError> {
        let mode = request.mode.as_str();
        let span = info_span!(
            "disperse",
            mode,
            correlation_id = %Uuid::new_v4(),
            bytes = request.data.len(),
        );

        let result = self.dispatch(request).instrument(span).await;
        match &result {
            Ok(_) => metrics::record_dispersal(mode, "success"),
            Err(e) => metrics::record_dispersal(mode, e.kind()),
        }
        result
    }

    async fn get_blob_status(&self, request_id: &[u8]) -> Result<BlobStatusReply, DisperserError> {
        let rpc = self.connection.get().await?;
        let call = rpc.get_blob_status(BlobStatusRequest {
            request_id: request_id.to_vec(),
        });
        let reply = with_deadline("GetBlobStatus", STATUS_CALL_TIMEOUT, call).await?;
        if reply.blob_status().is_none() {
            return Err(RpcError::MalformedReply(format!(
                "unknown blob status code {}",
                reply.status
            ))
            .into());
        }
        Ok(reply)
    }

    async fn retrieve_blob(
        &self,
        batch_header_hash: &[u8],
        blob_index: u32,
    ) -> Result<Vec<u8>, DisperserError> {
        let rpc = self.connection.get().await?;
        let call = rpc.retrieve_blob(RetrieveBlobRequest {
            batch_header_hash: batch_header_hash.to_vec(),
            blob_index,
        });
        let reply = with_deadline("RetrieveBlob", STATUS_CALL_TIMEOUT, call).await?;
        Ok(reply.data)
    }

    async fn init_payment_state(&self) -> Result<(), DisperserError> {
        let rpc = self.connection.get().await?;
        self.payment_sync.initialize(rpc.as_ref()).await
    }

    async fn close(&self) -> Result<(), DisperserError> {
        self.connection.close().await;
        Ok(())
    }
}
