//! No-show Timeout Guard.
//!
//! A single fixed-window timer armed while awaiting the counterpart in a
//! pending session. Expiry drives the session to cancelled with zero
//! billing; the guard is cancelled the instant the connection stabilizes.

use tracing::debug;

/// Tick-driven no-show timer.
#[derive(Debug)]
pub struct NoShowGuard {
    window_seconds: u64,
    remaining: Option<u64>,
}

impl NoShowGuard {
    pub fn new(window_seconds: u64) -> Self {
        Self {
            window_seconds,
            remaining: None,
        }
    }

    /// Start the window. A second arm while running is a no-op; the guard
    /// is a single fixed window, not a sliding one.
    pub fn arm(&mut self) {
        if self.remaining.is_none() {
            debug!("no-show guard armed for {}s", self.window_seconds);
            self.remaining = Some(self.window_seconds);
        }
    }

    /// Stop the window (the connection stabilized, or the session ended).
    pub fn cancel(&mut self) {
        if self.remaining.take().is_some() {
            debug!("no-show guard cancelled");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.remaining.is_some()
    }

    /// Advance one second. Returns true exactly once, when the window
    /// expires.
    pub fn on_tick(&mut self) -> bool {
        match self.remaining {
            Some(0) | None => false,
            Some(remaining) => {
                let remaining = remaining - 1;
                if remaining == 0 {
                    self.remaining = None;
                    debug!("no-show guard expired");
                    true
                } else {
                    self.remaining = Some(remaining);
                    false
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_exactly_once_after_window() {
        let mut guard = NoShowGuard::new(3);
        guard.arm();
        assert!(!guard.on_tick());
        assert!(!guard.on_tick());
        assert!(guard.on_tick());
        assert!(!guard.on_tick());
        assert!(!guard.is_armed());
    }

    #[test]
    fn cancel_prevents_expiry() {
        let mut guard = NoShowGuard::new(2);
        guard.arm();
        assert!(!guard.on_tick());
        guard.cancel();
        assert!(!guard.on_tick());
        assert!(!guard.is_armed());
    }

    #[test]
    fn unarmed_guard_never_fires() {
        let mut guard = NoShowGuard::new(1);
        assert!(!guard.on_tick());
    }

    #[test]
    fn rearm_while_running_does_not_slide() {
        let mut guard = NoShowGuard::new(3);
        guard.arm();
        guard.on_tick();
        guard.on_tick();
        guard.arm();
        assert!(guard.on_tick());
    }
}
