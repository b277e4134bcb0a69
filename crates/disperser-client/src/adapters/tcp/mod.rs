//! # TCP Transport
//!
//! Concrete [`Connector`](crate::ports::Connector) speaking length-prefixed
//! `bincode` frames over one TCP connection.
//!
//! ## Multiplexing
//!
//! | Call shape | Routing |
//! |------------|---------|
//! | Unary | one `call_id`, one `Request` frame, one `Response` frame |
//! | Authenticated stream | one `call_id` for every `StreamRequest`/`StreamReply`; `StreamClose` on drop |
//!
//! The codec is public so test servers can speak the same framing.

pub mod client;
pub mod codec;

pub use client::{MultiplexedChannel, TcpConnector};
pub use codec::{encode_frame, read_frame, write_encoded, write_frame, FrameError, MAX_FRAME_LEN};
