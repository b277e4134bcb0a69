//! # Domain Module
//!
//! Pure client logic: payload rules, the payment ledger, the handshake
//! state machine, and the error taxonomy. No I/O happens here.

pub mod errors;
pub mod handshake;
pub mod ledger;
pub mod payload;

pub use errors::*;
pub use handshake::*;
pub use ledger::*;
pub use payload::*;
