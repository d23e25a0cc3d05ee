//! Billing Ticker: the local usage clock.
//!
//! Counts billable seconds one tick at a time and emits a charge request
//! at every whole unit boundary. The ticker never reads a wall clock; a
//! suspended process resumes exactly where it left off and the committed
//! ledger remains the sole authority for billed duration.

use counsel_ledger_core::{ChargeKind, Credits};

use crate::config::SessionConfig;

/// A charge the controller should attempt to commit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargeRequest {
    pub kind: ChargeKind,
    pub unit_index: u32,
    pub amount: Credits,
}

/// Tick-driven usage clock emitting per-unit charge requests.
#[derive(Debug)]
pub struct BillingTicker {
    unit_seconds: u64,
    unit_cost: Credits,
    initial_fee: Option<Credits>,
    /// Billable seconds accumulated across all established stretches.
    elapsed_seconds: u64,
    /// Next per-unit index to charge, starting at 1.
    next_unit: u32,
    initial_fee_emitted: bool,
    stopped: bool,
}

impl BillingTicker {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            unit_seconds: config.unit_seconds(),
            unit_cost: config.unit_cost,
            initial_fee: config.initial_fee,
            elapsed_seconds: 0,
            next_unit: 1,
            initial_fee_emitted: false,
            stopped: false,
        }
    }

    /// The connection stabilized. Returns the one-time initial fee on the
    /// first stabilization only; reconnections never duplicate it.
    pub fn on_established(&mut self) -> Option<ChargeRequest> {
        if self.stopped || self.initial_fee_emitted {
            return None;
        }
        self.initial_fee_emitted = true;
        let fee = self.initial_fee?;
        Some(ChargeRequest {
            kind: ChargeKind::InitialFee,
            unit_index: 0,
            amount: fee,
        })
    }

    /// Advance one billable second. The controller only calls this while
    /// the stabilizer trusts the connection. Returns a charge request at
    /// each whole unit boundary.
    pub fn on_tick(&mut self) -> Option<ChargeRequest> {
        if self.stopped {
            return None;
        }
        self.elapsed_seconds += 1;
        if self.elapsed_seconds >= u64::from(self.next_unit) * self.unit_seconds {
            let request = ChargeRequest {
                kind: ChargeKind::PerUnit,
                unit_index: self.next_unit,
                amount: self.unit_cost,
            };
            self.next_unit += 1;
            return Some(request);
        }
        None
    }

    /// Stop billing permanently (finalization or a rejected charge).
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Billable seconds accumulated so far.
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    /// Completed units charged so far.
    pub fn billed_units(&self) -> u32 {
        self.next_unit - 1
    }
}
