//! # Adapters Module
//!
//! Implementations of the outbound ports.
//!
//! - `connection`: lazy, retryable establishment of the shared channel
//! - `tcp`: framed TCP transport
//! - `memory`: in-process disperser for tests and local runs
//! - `signer`: local secp256k1 signers
//! - `clock`: system and fixed time sources

pub mod clock;
pub mod connection;
pub mod memory;
pub mod signer;
pub mod tcp;

pub use clock::{FixedTimeSource, SystemTimeSource};
pub use connection::LazyConnection;
pub use memory::{AuthenticatedDispersal, InMemoryDisperser, MemoryConnector, StreamBehavior};
pub use signer::{LocalBlobRequestSigner, LocalPaymentSigner};
pub use tcp::{MultiplexedChannel, TcpConnector};
