//! # Payment State Sync
//!
//! Fetches the account's authoritative payment state and installs it into
//! the [`Accountant`] as one unit. A failed sync leaves the accountant as it
//! was.

use super::accountant::Accountant;
use super::deadline::with_deadline;
use crate::config::STATUS_CALL_TIMEOUT;
use crate::domain::{BinUsageState, DisperserError, RpcError, SignerError};
use crate::ports::DisperserRpc;
use disperser_telemetry::metrics;
use shared_types::{GetPaymentStateReply, GetPaymentStateRequest, OnDemandPayment};
use std::sync::Arc;
use tracing::{info, warn};

/// Seeds and refreshes an [`Accountant`].
pub struct PaymentStateSync {
    accountant: Arc<Accountant>,
}

impl PaymentStateSync {
    /// Sync into `accountant`, signing requests with its payment signer.
    pub fn new(accountant: Arc<Accountant>) -> Self {
        Self { accountant }
    }

    /// Fetch and install the payment state.
    pub async fn initialize(&self, rpc: &dyn DisperserRpc) -> Result<(), DisperserError> {
        let result = self.fetch_and_install(rpc).await;
        match &result {
            Ok(()) => metrics::record_payment_state_sync("success"),
            Err(e) => {
                metrics::record_payment_state_sync("failed");
                warn!(error = %e, "Payment state sync failed; keeping previous state");
            }
        }
        result
    }

    async fn fetch_and_install(&self, rpc: &dyn DisperserRpc) -> Result<(), DisperserError> {
        let signer = self
            .accountant
            .signer()
            .ok_or(SignerError::NotConfigured { role: "payment" })?;
        let account_id = signer.account_id();
        let signature = signer.sign_account_id(&account_id)?;

        let reply = with_deadline(
            "GetPaymentState",
            STATUS_CALL_TIMEOUT,
            rpc.get_payment_state(GetPaymentStateRequest {
                account_id: account_id.clone(),
                signature,
            }),
        )
        .await?;

        self.install(reply)?;
        info!(%account_id, "Payment state synced");
        Ok(())
    }

    /// Install a reply obtained elsewhere.
    pub fn install(&self, reply: GetPaymentStateReply) -> Result<(), DisperserError> {
        let params = reply.payment_global_params.ok_or_else(|| {
            RpcError::MalformedReply("payment state reply has no global params".into())
        })?;

        self.accountant.install(
            params,
            reply.reservation,
            OnDemandPayment {
                cumulative_payment: reply.onchain_cumulative_payment,
            },
            BinUsageState {
                current: reply.current_bin_usage,
                next: reply.next_bin_usage,
                overflow: reply.overflow_bin_usage,
            },
            reply.cumulative_payment,
        );
        Ok(())
    }
}
