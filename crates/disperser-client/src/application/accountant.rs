//! # Accountant
//!
//! Owns the payment ledger behind one lock and turns each paid dispersal
//! into a signed payment header.
//!
//! The decide-and-commit step runs entirely under the lock, so concurrent
//! callers always receive disjoint slices of the budget. Signing happens
//! after the lock is released; the lock is never held across I/O.

use crate::domain::{
    symbol_count, BinUsageState, Charge, DisperserError, PaymentLedger, SignerError,
    ValidationError,
};
use crate::ports::{PaymentSigner, TimeSource};
use disperser_telemetry::metrics;
use parking_lot::Mutex;
use shared_types::{
    ActiveReservation, GlobalPaymentParams, OnDemandPayment, PaymentHeader, PaymentMode,
    QuorumNumber, U256,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Local payment metering for one account.
pub struct Accountant {
    ledger: Mutex<Option<PaymentLedger>>,
    signer: Option<Arc<dyn PaymentSigner>>,
    clock: Arc<dyn TimeSource>,
}

impl Accountant {
    /// Uninitialized accountant; paid dispersal fails until [`Self::install`].
    pub fn new(signer: Option<Arc<dyn PaymentSigner>>, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            ledger: Mutex::new(None),
            signer,
            clock,
        }
    }

    /// Payment signer, if one was configured.
    pub fn signer(&self) -> Option<&Arc<dyn PaymentSigner>> {
        self.signer.as_ref()
    }

    /// Replace the whole payment state in one step.
    pub fn install(
        &self,
        params: GlobalPaymentParams,
        reservation: Option<ActiveReservation>,
        on_demand: OnDemandPayment,
        usage: BinUsageState,
        cumulative_payment: U256,
    ) {
        if params.price_per_symbol == 0 {
            warn!("Payment state has a zero price per symbol; on-demand payments will repeat");
        }
        let mut ledger = self.ledger.lock();
        let now = self.clock.now();
        *ledger = Some(PaymentLedger::new(
            params,
            reservation,
            on_demand,
            usage,
            cumulative_payment,
            now,
        ));
    }

    /// Charge a payload of `data_len` bytes and sign the resulting header.
    pub fn account_blob(
        &self,
        data_len: usize,
        quorums: &[QuorumNumber],
    ) -> Result<(PaymentHeader, Vec<u8>), DisperserError> {
        let symbols = symbol_count(data_len);
        if symbols == 0 {
            return Err(ValidationError::EmptyPayload.into());
        }

        let (signer, charge, exceeds_deposit) = {
            let mut guard = self.ledger.lock();
            let ledger = guard
                .as_mut()
                .ok_or(DisperserError::UninitializedAccountant)?;
            let signer = self
                .signer
                .as_ref()
                .ok_or(SignerError::NotConfigured { role: "payment" })?;
            let now = self.clock.now();
            let charge = ledger.charge(now, symbols, quorums);
            (signer, charge, ledger.exceeds_deposit())
        };
        let account_id = signer.account_id();

        let mode = match charge {
            Charge::Reservation {
                bin_index,
                symbols,
                borrowed,
            } => {
                debug!(%account_id, symbols, borrowed, bin_index, "Charged to reservation");
                metrics::record_symbols_charged("reservation", symbols - borrowed);
                if borrowed > 0 {
                    metrics::record_symbols_charged("overflow", borrowed);
                }
                PaymentMode::Reservation { bin_index }
            }
            Charge::OnDemand {
                billed_symbols,
                cost,
                cumulative_payment,
            } => {
                debug!(
                    %account_id,
                    symbols = billed_symbols,
                    %cost,
                    %cumulative_payment,
                    "Charged on demand"
                );
                metrics::record_symbols_charged("on_demand", billed_symbols);
                if exceeds_deposit {
                    warn!(
                        %account_id,
                        %cumulative_payment,
                        "Cumulative payment exceeds on-chain deposit; server may reject"
                    );
                }
                PaymentMode::OnDemand { cumulative_payment }
            }
        };

        let header = PaymentHeader { account_id, mode };
        let signature = signer.sign_payment_header(&header)?;
        Ok((header, signature))
    }

    /// True once payment state has been installed.
    pub fn is_initialized(&self) -> bool {
        self.ledger.lock().is_some()
    }

    /// Copy of the current ledger.
    pub fn snapshot(&self) -> Option<PaymentLedger> {
        self.ledger.lock().clone()
    }

    /// Installed pricing parameters.
    pub fn params(&self) -> Option<GlobalPaymentParams> {
        self.ledger.lock().as_ref().map(PaymentLedger::params)
    }

    /// Installed reservation.
    pub fn reservation(&self) -> Option<ActiveReservation> {
        self.ledger
            .lock()
            .as_ref()
            .and_then(|l| l.reservation().cloned())
    }

    /// Installed on-chain deposit baseline.
    pub fn on_demand(&self) -> Option<OnDemandPayment> {
        self.ledger.lock().as_ref().map(|l| l.on_demand().clone())
    }

    /// Current bin counters.
    pub fn usage(&self) -> Option<BinUsageState> {
        self.ledger.lock().as_ref().map(PaymentLedger::usage)
    }

    /// Current cumulative payment.
    pub fn cumulative_payment(&self) -> Option<U256> {
        self.ledger
            .lock()
            .as_ref()
            .map(PaymentLedger::cumulative_payment)
    }
}
