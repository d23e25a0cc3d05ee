//! Engine tunables.
//!
//! The debounce and no-show windows are configuration, not correctness
//! invariants; every duration is consumed at one-second resolution because
//! the engine's timers are driven by the controller's tick, never by
//! wall-clock arithmetic.

use std::time::Duration;

use counsel_ledger_core::Credits;

/// Configuration for one participant's session engine.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Continuous peer presence required before the connection is trusted
    /// for billing.
    pub debounce_window: Duration,
    /// Length of one charged billing unit.
    pub billing_unit: Duration,
    /// How long to wait for the counterpart to stabilize before cancelling
    /// a pending session.
    pub no_show_window: Duration,
    /// Credits charged per completed billing unit.
    pub unit_cost: Credits,
    /// One-time connection fee, charged after the first stabilization.
    pub initial_fee: Option<Credits>,
    /// Emit an advisory warning when the payer's balance drops below this.
    /// Never alters billing behavior.
    pub low_balance_threshold: Option<Credits>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            debounce_window: Duration::from_secs(3),
            billing_unit: Duration::from_secs(60),
            no_show_window: Duration::from_secs(60),
            unit_cost: 5,
            initial_fee: None,
            low_balance_threshold: None,
        }
    }
}

impl SessionConfig {
    /// Set the stabilization debounce window.
    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    /// Set the billing unit length.
    pub fn with_billing_unit(mut self, unit: Duration) -> Self {
        self.billing_unit = unit;
        self
    }

    /// Set the no-show window.
    pub fn with_no_show_window(mut self, window: Duration) -> Self {
        self.no_show_window = window;
        self
    }

    /// Set the per-unit cost in credits.
    pub fn with_unit_cost(mut self, cost: Credits) -> Self {
        self.unit_cost = cost;
        self
    }

    /// Charge a one-time connection fee.
    pub fn with_initial_fee(mut self, fee: Credits) -> Self {
        self.initial_fee = Some(fee);
        self
    }

    /// Warn when the balance drops below the threshold.
    pub fn with_low_balance_threshold(mut self, threshold: Credits) -> Self {
        self.low_balance_threshold = Some(threshold);
        self
    }

    /// Debounce window in whole seconds, at least 1.
    pub fn debounce_seconds(&self) -> u64 {
        self.debounce_window.as_secs().max(1)
    }

    /// Billing unit in whole seconds, at least 1.
    pub fn unit_seconds(&self) -> u64 {
        self.billing_unit.as_secs().max(1)
    }

    /// No-show window in whole seconds, at least 1.
    pub fn no_show_seconds(&self) -> u64 {
        self.no_show_window.as_secs().max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_windows() {
        let config = SessionConfig::default();
        assert_eq!(config.debounce_seconds(), 3);
        assert_eq!(config.unit_seconds(), 60);
        assert_eq!(config.no_show_seconds(), 60);
        assert_eq!(config.initial_fee, None);
    }

    #[test]
    fn sub_second_windows_round_up_to_one() {
        let config = SessionConfig::default().with_debounce_window(Duration::from_millis(200));
        assert_eq!(config.debounce_seconds(), 1);
    }
}
