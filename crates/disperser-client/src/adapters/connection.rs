//! # Lazy Connection
//!
//! Establishes the shared channel on first use.
//!
//! ## States
//!
//! | State | Next caller |
//! |-------|-------------|
//! | `Idle` | starts an attempt |
//! | `Connecting` | awaits the same attempt |
//! | `Ready` | reuses the channel, or dials again if it has closed |
//!
//! A failed attempt returns the state to `Idle`, so the failure is reported
//! to every caller that joined the attempt and the next call dials again.
//! A `Ready` channel whose peer hung up is treated the same way.

use crate::config::DisperserConfig;
use crate::domain::DisperserError;
use crate::ports::{Connector, DisperserRpc};
use disperser_telemetry::metrics;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

type ConnectResult = Result<Arc<dyn DisperserRpc>, DisperserError>;
type ConnectAttempt = Shared<BoxFuture<'static, ConnectResult>>;

enum ConnectionState {
    Idle,
    Connecting {
        generation: u64,
        attempt: ConnectAttempt,
    },
    Ready(Arc<dyn DisperserRpc>),
}

struct Inner {
    state: ConnectionState,
    generation: u64,
}

/// Lazily established, shared channel.
pub struct LazyConnection {
    config: DisperserConfig,
    connector: Arc<dyn Connector>,
    inner: Mutex<Inner>,
}

impl LazyConnection {
    /// Nothing is dialed until [`Self::get`] is called.
    pub fn new(config: DisperserConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            inner: Mutex::new(Inner {
                state: ConnectionState::Idle,
                generation: 0,
            }),
        }
    }

    /// True once a channel is established and not closed.
    pub fn is_connected(&self) -> bool {
        matches!(&self.inner.lock().state, ConnectionState::Ready(rpc) if !rpc.is_closed())
    }

    /// Shared channel, dialing it if needed.
    pub async fn get(&self) -> ConnectResult {
        let (generation, attempt, stale) = {
            let mut inner = self.inner.lock();
            let stale = match &inner.state {
                ConnectionState::Ready(rpc) if !rpc.is_closed() => return Ok(rpc.clone()),
                ConnectionState::Ready(rpc) => Some(rpc.clone()),
                _ => None,
            };
            if stale.is_some() {
                inner.state = ConnectionState::Idle;
            }
            let (generation, attempt) = match &inner.state {
                ConnectionState::Connecting {
                    generation,
                    attempt,
                } => (*generation, attempt.clone()),
                _ => {
                    inner.generation += 1;
                    let generation = inner.generation;
                    let attempt = self.start_attempt(generation);
                    inner.state = ConnectionState::Connecting {
                        generation,
                        attempt: attempt.clone(),
                    };
                    (generation, attempt)
                }
            };
            (generation, attempt, stale)
        };

        if let Some(stale) = stale {
            warn!(address = %self.config.address(), generation, "Disperser channel closed, redialing");
            stale.shutdown().await;
        }

        let result = attempt.await;

        let mut inner = self.inner.lock();
        // A close() or a newer attempt since then owns the state
        let current = matches!(
            inner.state,
            ConnectionState::Connecting { generation: g, .. } if g == generation
        );
        if current {
            inner.state = match &result {
                Ok(rpc) => ConnectionState::Ready(rpc.clone()),
                Err(_) => ConnectionState::Idle,
            };
        }
        result
    }

    /// Drop the channel. The next [`Self::get`] dials again.
    pub async fn close(&self) {
        let previous = {
            let mut inner = self.inner.lock();
            std::mem::replace(&mut inner.state, ConnectionState::Idle)
        };
        if let ConnectionState::Ready(rpc) = previous {
            rpc.shutdown().await;
            info!(address = %self.config.address(), "Disperser connection closed");
        }
    }

    fn start_attempt(&self, generation: u64) -> ConnectAttempt {
        let connector = self.connector.clone();
        let config = self.config.clone();
        async move {
            let address = config.address();
            debug!(%address, generation, "Dialing disperser");
            let dial = connector.connect(&config);
            let result = match tokio::time::timeout(config.connect_timeout, dial).await {
                Ok(result) => result,
                Err(_) => Err(DisperserError::ConnectionInit(format!(
                    "dial {address} timed out after {:?}",
                    config.connect_timeout
                ))),
            };
            match &result {
                Ok(_) => {
                    metrics::record_connection_attempt("success");
                    info!(%address, generation, "Disperser connection established");
                }
                Err(e) => {
                    metrics::record_connection_attempt("failed");
                    warn!(%address, generation, error = %e, "Disperser connection failed");
                }
            }
            result
        }
        .boxed()
        .shared()
    }
}
