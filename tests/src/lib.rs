//! # Disperser Client Test Suite
//!
//! Cross-crate tests that exercise the client the way an application does.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # In-process TCP disperser speaking the frame protocol
//! └── integration/      # Concurrency, connection, handshake, payment sync, TCP end to end
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p disperser-tests
//!
//! # By area
//! cargo test -p disperser-tests integration::concurrency::
//! cargo test -p disperser-tests integration::tcp_end_to_end::
//! ```

#![allow(dead_code)]

pub mod harness;
