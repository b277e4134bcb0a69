//! # Disperser Client
//!
//! Client for a blob-dispersal network: submits blobs over one long-lived
//! connection and meters paid dispersals locally.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Dispersal Modes
//!
//! | Mode | Call | Needs |
//! |------|------|-------|
//! | Plain | `DisperseBlob` | nothing |
//! | Authenticated | `DisperseBlobAuthenticated` stream | blob-request signer |
//! | Paid | `DispersePaidBlob` | payment signer + synced payment state |
//!
//! ## Payment Metering
//!
//! The [`Accountant`] charges each paid blob to the account's reservation
//! (current bin, then a one-time borrow from the next bin) and falls back to
//! on-demand billing with a strictly increasing cumulative payment. Every
//! decision is committed under one lock, so concurrent callers never share
//! reservation capacity or a cumulative-payment value.
//!
//! ## Module Structure
//!
//! ```text
//! disperser-client/
//! ├── domain/          # Ledger, payload validation, handshake state machine, errors
//! ├── ports/           # DisperserApi (inbound) + transport, signer, clock traits (outbound)
//! ├── adapters/        # Lazy connection, TCP transport, in-memory disperser, signers, clocks
//! ├── application/     # Accountant, PaymentStateSync, DisperserClient
//! └── config.rs        # DisperserConfig
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use disperser_client::{DisperserApi, DisperserClient, DisperserConfig, LocalPaymentSigner};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let signer = LocalPaymentSigner::from_hex(&std::env::var("PAYMENT_KEY")?)?;
//! let client = DisperserClient::builder(DisperserConfig::new("disperser.local", 32001))
//!     .payment_signer(Arc::new(signer))
//!     .build()?;
//!
//! client.init_payment_state().await?;
//! let receipt = client.disperse_paid_blob(vec![0u8; 64], &[0]).await?;
//! let status = client.get_blob_status(&receipt.request_id).await?;
//! # let _ = status;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::{
    FixedTimeSource, InMemoryDisperser, LazyConnection, LocalBlobRequestSigner,
    LocalPaymentSigner, MemoryConnector, MultiplexedChannel, StreamBehavior, SystemTimeSource,
    TcpConnector,
};
pub use application::{Accountant, DisperserClient, DisperserClientBuilder, PaymentStateSync};
pub use config::{ConfigError, DisperserConfig, STATUS_CALL_TIMEOUT};
pub use domain::{
    symbol_count, validate_payload, AuthenticatedHandshake, BinUsageState, Charge,
    DisperserError, HandshakeState, PaymentLedger, RpcError, SignerError, ValidationError,
    BN254_MODULUS,
};
pub use ports::{
    AuthenticatedStream, BlobRequestSigner, Connector, DispersalMode, DispersalReceipt,
    DispersalRequest, DisperserApi, DisperserRpc, PaymentSigner, TimeSource,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
