//! Per-call deadlines.

use crate::domain::{DisperserError, RpcError};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

/// Run `call`, failing with `DeadlineExceeded` once `limit` elapses.
pub(crate) async fn with_deadline<T, F>(
    method: &'static str,
    limit: Duration,
    call: F,
) -> Result<T, DisperserError>
where
    F: Future<Output = Result<T, RpcError>>,
{
    match timeout(limit, call).await {
        Ok(result) => result.map_err(DisperserError::from),
        Err(_) => {
            warn!(method, timeout = ?limit, "Call exceeded deadline");
            Err(RpcError::DeadlineExceeded { timeout: limit }.into())
        }
    }
}
