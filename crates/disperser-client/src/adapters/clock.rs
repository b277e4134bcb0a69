//! # Clocks
//!
//! Wall clock for production, settable clock for tests.

use crate::ports::TimeSource;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// System wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> u64 {
        // A clock before 1970 reads as 0
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// A time source that returns a fixed, settable timestamp.
///
/// Useful for deterministic testing where time progression needs to be controlled.
#[derive(Debug, Default)]
pub struct FixedTimeSource {
    timestamp: AtomicU64,
}

impl FixedTimeSource {
    /// Create a new fixed time source with the given timestamp (in seconds).
    pub fn new(timestamp: u64) -> Self {
        Self {
            timestamp: AtomicU64::new(timestamp),
        }
    }

    /// Move the clock to `timestamp`.
    pub fn set(&self, timestamp: u64) {
        self.timestamp.store(timestamp, Ordering::SeqCst);
    }

    /// Move the clock forward by `secs`.
    pub fn advance(&self, secs: u64) {
        self.timestamp.fetch_add(secs, Ordering::SeqCst);
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> u64 {
        self.timestamp.load(Ordering::SeqCst)
    }
}
