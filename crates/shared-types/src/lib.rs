//! # Shared Types Crate
//!
//! Domain entities and RPC wire messages for the blob-dispersal client.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: Everything that crosses the transport is
//!   defined here, so the client, its transports and test servers agree on
//!   one encoding.
//! - **Transport Agnostic**: Messages are plain serde types; framing and
//!   connection management live in the client's adapters.
//! - **Big Integers**: Cumulative payments are `U256` values.

pub mod entities;
pub mod errors;
pub mod rpc;

pub use entities::*;
pub use errors::*;
pub use rpc::*;
