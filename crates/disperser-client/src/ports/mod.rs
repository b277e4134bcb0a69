//! # Ports Module
//!
//! Hexagonal architecture ports (traits).

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
