//! Prometheus metrics for the disperser client.
//!
//! All metrics follow the naming convention: `disperser_<metric>_<unit>`
//!
//! Counters work whether or not [`register_metrics`] was called; registration
//! only makes them visible to [`encode_metrics`].

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // DISPERSAL METRICS
    // =========================================================================

    /// Dispersal calls by mode and outcome
    pub static ref DISPERSALS: IntCounterVec = IntCounterVec::new(
        Opts::new("disperser_dispersals_total", "Dispersal calls issued by the client"),
        &["mode", "outcome"]  // mode: plain/authenticated/paid, outcome: success/error kind
    ).expect("metric creation failed");

    /// Authenticated handshakes that ended in the failed state
    pub static ref HANDSHAKE_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("disperser_handshake_failures_total", "Authenticated handshakes that failed"),
        &["state"]  // state the handshake was in when it failed
    ).expect("metric creation failed");

    // =========================================================================
    // ACCOUNTING METRICS
    // =========================================================================

    /// Symbols charged by payment path
    pub static ref SYMBOLS_CHARGED: IntCounterVec = IntCounterVec::new(
        Opts::new("disperser_symbols_charged_total", "Symbols charged per payment path"),
        &["path"]  // path: reservation/overflow/on_demand
    ).expect("metric creation failed");

    /// Payment-state syncs by outcome
    pub static ref PAYMENT_STATE_SYNCS: IntCounterVec = IntCounterVec::new(
        Opts::new("disperser_payment_state_syncs_total", "Payment state syncs"),
        &["outcome"]  // outcome: success/failed
    ).expect("metric creation failed");

    // =========================================================================
    // TRANSPORT METRICS
    // =========================================================================

    /// Connection attempts
    pub static ref CONNECTION_ATTEMPTS: IntCounterVec = IntCounterVec::new(
        Opts::new("disperser_connection_attempts_total", "Transport connection attempts"),
        &["outcome"]  // outcome: success/failed
    ).expect("metric creation failed");
}

/// Handle kept by the telemetry guard
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
///
/// Calling this more than once is harmless.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(DISPERSALS.clone()),
        Box::new(HANDSHAKE_FAILURES.clone()),
        Box::new(SYMBOLS_CHARGED.clone()),
        Box::new(PAYMENT_STATE_SYNCS.clone()),
        Box::new(CONNECTION_ATTEMPTS.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Count a finished dispersal.
pub fn record_dispersal(mode: &str, outcome: &str) {
    DISPERSALS.with_label_values(&[mode, outcome]).inc();
}

/// Count symbols charged to a payment path.
pub fn record_symbols_charged(path: &str, symbols: u64) {
    SYMBOLS_CHARGED.with_label_values(&[path]).inc_by(symbols);
}

/// Count a payment-state sync.
pub fn record_payment_state_sync(outcome: &str) {
    PAYMENT_STATE_SYNCS.with_label_values(&[outcome]).inc();
}

/// Count a connection attempt.
pub fn record_connection_attempt(outcome: &str) {
    CONNECTION_ATTEMPTS.with_label_values(&[outcome]).inc();
}

/// Count a handshake that failed in `state`.
pub fn record_handshake_failure(state: &str) {
    HANDSHAKE_FAILURES.with_label_values(&[state]).inc();
}
