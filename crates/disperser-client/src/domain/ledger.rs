//! # Payment Ledger
//!
//! The client's local copy of an account's payment state and the
//! decide-and-commit step that charges one dispersal against it.
//!
//! ## Charging Order
//!
//! 1. Roll the bin counters forward to the bin containing `now`.
//! 2. Reservation, if active for `now`, covering every requested quorum:
//!    - fits the current bin: charge it there;
//!    - otherwise borrow the excess from the next bin, at most once per bin
//!      and never more than one bin can hold.
//! 3. On-demand: `max(symbols, min_num_symbols) * price_per_symbol` is added
//!    to the cumulative payment.
//!
//! The ledger never refuses a charge. Whether the account can afford it is
//! decided by the server.
//!
//! Distinct on-demand charges get distinct cumulative payments only while
//! `price_per_symbol` is non-zero. A zero price leaves the counter where it
//! is, and the server rejects the repeated value.

use serde::{Deserialize, Serialize};
use shared_types::{ActiveReservation, GlobalPaymentParams, OnDemandPayment, QuorumNumber, U256};

/// Reservation consumption counters, in symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BinUsageState {
    /// Symbols charged to the current bin.
    pub current: u64,
    /// Symbols already committed against the next bin.
    pub next: u64,
    /// Symbols the current bin borrowed from the next one.
    pub overflow: u64,
}

/// Outcome of charging one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Charge {
    /// Covered by the reservation.
    Reservation {
        /// Bin the request was charged to.
        bin_index: u64,
        /// Symbols charged.
        symbols: u64,
        /// Part of `symbols` borrowed from bin `bin_index + 1`.
        borrowed: u64,
    },
    /// Paid on demand.
    OnDemand {
        /// Symbols billed, after the minimum floor.
        billed_symbols: u64,
        /// Price of this request.
        cost: U256,
        /// Cumulative payment after this request.
        cumulative_payment: U256,
    },
}

/// Local payment state of one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentLedger {
    params: GlobalPaymentParams,
    reservation: Option<ActiveReservation>,
    on_demand: OnDemandPayment,
    usage: BinUsageState,
    bin_index: u64,
    cumulative_payment: U256,
}

impl PaymentLedger {
    /// Build a ledger from synced state, keyed to the bin containing `now`.
    pub fn new(
        params: GlobalPaymentParams,
        reservation: Option<ActiveReservation>,
        on_demand: OnDemandPayment,
        usage: BinUsageState,
        cumulative_payment: U256,
        now: u64,
    ) -> Self {
        let bin_index = bin_index_at(now, params.reservation_window);
        Self {
            params,
            reservation,
            on_demand,
            usage,
            bin_index,
            cumulative_payment,
        }
    }

    /// Pricing parameters.
    pub fn params(&self) -> GlobalPaymentParams {
        self.params
    }

    /// Reservation terms, if any.
    pub fn reservation(&self) -> Option<&ActiveReservation> {
        self.reservation.as_ref()
    }

    /// On-chain deposit baseline.
    pub fn on_demand(&self) -> &OnDemandPayment {
        &self.on_demand
    }

    /// Bin counters.
    pub fn usage(&self) -> BinUsageState {
        self.usage
    }

    /// Bin the counters are keyed to.
    pub fn bin_index(&self) -> u64 {
        self.bin_index
    }

    /// Running on-demand cumulative payment.
    pub fn cumulative_payment(&self) -> U256 {
        self.cumulative_payment
    }

    /// True once on-demand spending has gone past the on-chain deposit.
    pub fn exceeds_deposit(&self) -> bool {
        self.cumulative_payment > self.on_demand.cumulative_payment
    }

    /// Decide how a request of `symbols` symbols is paid for and commit it.
    pub fn charge(&mut self, now: u64, symbols: u64, quorums: &[QuorumNumber]) -> Charge {
        self.roll_forward(now);

        if let Some(capacity) = self.usable_capacity(now, quorums) {
            if let Some(borrowed) = self.try_reserve(symbols, capacity) {
                return Charge::Reservation {
                    bin_index: self.bin_index,
                    symbols,
                    borrowed,
                };
            }
        }

        let billed_symbols = symbols.max(self.params.min_num_symbols);
        let cost = U256::from(billed_symbols).saturating_mul(U256::from(self.params.price_per_symbol));
        self.cumulative_payment = self.cumulative_payment.saturating_add(cost);
        Charge::OnDemand {
            billed_symbols,
            cost,
            cumulative_payment: self.cumulative_payment,
        }
    }

    // Bin index only moves forward; a clock stepping backwards keeps the cached bin.
    fn roll_forward(&mut self, now: u64) {
        if self.params.reservation_window == 0 {
            return;
        }
        let current = bin_index_at(now, self.params.reservation_window);
        if current <= self.bin_index {
            return;
        }
        if current - self.bin_index == 1 {
            self.usage = BinUsageState {
                current: self.usage.next,
                next: 0,
                overflow: 0,
            };
        } else {
            self.usage = BinUsageState::default();
        }
        self.bin_index = current;
    }

    fn usable_capacity(&self, now: u64, quorums: &[QuorumNumber]) -> Option<u64> {
        let reservation = self.reservation.as_ref()?;
        if self.params.reservation_window == 0
            || !reservation.is_active(now)
            || !reservation.covers_quorums(quorums)
        {
            return None;
        }
        let capacity = reservation.bin_capacity(self.params.reservation_window);
        (capacity > 0).then_some(capacity)
    }

    // Returns the borrowed amount on success.
    fn try_reserve(&mut self, symbols: u64, capacity: u64) -> Option<u64> {
        let usage = &mut self.usage;
        let total = usage.current.saturating_add(symbols);
        if total <= capacity {
            usage.current = total;
            return Some(0);
        }

        if usage.overflow != 0 || symbols > capacity || usage.current >= capacity {
            return None;
        }
        let excess = total - capacity;
        if excess > capacity.saturating_sub(usage.next) {
            return None;
        }
        usage.current = capacity;
        usage.next += excess;
        usage.overflow = excess;
        Some(excess)
    }
}

/// `floor(now / window)`, zero when reservations are disabled.
pub fn bin_index_at(now: u64, reservation_window: u64) -> u64 {
    now.checked_div(reservation_window).unwrap_or(0)
}
