//! Connection Stabilizer: the trust gate for billing.
//!
//! Raw peer-presence signals are debounced into one `established` per
//! connection attempt. Presence lost before the window elapses discards
//! the pending stabilization; presence lost afterwards ends the attempt
//! (billing pauses) without finalizing the session, and a returning peer
//! starts a fresh attempt that must stabilize again.

use tracing::debug;

/// Debounces peer presence into per-attempt `established` events.
#[derive(Debug)]
pub struct ConnectionStabilizer {
    debounce_seconds: u64,
    peer_present: bool,
    /// Consecutive seconds of presence within the current attempt.
    present_for: u64,
    /// Latched for the current attempt once the window elapses.
    established: bool,
    /// Whether any attempt ever established; the no-show guard keys off
    /// this, not off the current attempt.
    ever_established: bool,
}

impl ConnectionStabilizer {
    pub fn new(debounce_seconds: u64) -> Self {
        Self {
            debounce_seconds,
            peer_present: false,
            present_for: 0,
            established: false,
            ever_established: false,
        }
    }

    /// The counterpart's media became visible; a connection attempt
    /// begins (or continues).
    pub fn on_peer_published(&mut self) {
        if !self.peer_present {
            self.peer_present = true;
            self.present_for = 0;
        }
    }

    /// The counterpart's media went away. A pre-window attempt is
    /// discarded; a post-`established` loss ends the attempt and pauses
    /// billing.
    pub fn on_peer_unpublished(&mut self) {
        if self.peer_present {
            debug!(
                "peer presence lost ({})",
                if self.established {
                    "billing paused"
                } else {
                    "stabilization discarded"
                }
            );
        }
        self.peer_present = false;
        self.present_for = 0;
        self.established = false;
    }

    /// Advance one second. Returns true exactly once per attempt, when
    /// continuous presence reaches the debounce window.
    pub fn on_tick(&mut self) -> bool {
        if !self.peer_present || self.established {
            return false;
        }
        self.present_for += 1;
        if self.present_for >= self.debounce_seconds {
            self.established = true;
            self.ever_established = true;
            debug!("connection established after {}s of presence", self.present_for);
            return true;
        }
        false
    }

    /// Whether billing is trusted right now.
    pub fn is_established(&self) -> bool {
        self.established
    }

    /// Whether any attempt ever established.
    pub fn ever_established(&self) -> bool {
        self.ever_established
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn establishes_once_after_debounce() {
        let mut stabilizer = ConnectionStabilizer::new(3);
        stabilizer.on_peer_published();

        assert!(!stabilizer.on_tick());
        assert!(!stabilizer.on_tick());
        assert!(stabilizer.on_tick());
        assert!(stabilizer.is_established());

        // Latched; no second emission within the attempt.
        assert!(!stabilizer.on_tick());
    }

    #[test]
    fn presence_lost_before_window_discards_attempt() {
        let mut stabilizer = ConnectionStabilizer::new(3);
        stabilizer.on_peer_published();
        assert!(!stabilizer.on_tick());
        assert!(!stabilizer.on_tick());

        stabilizer.on_peer_unpublished();
        assert!(!stabilizer.on_tick());
        assert!(!stabilizer.is_established());

        // The fresh attempt needs the full window again.
        stabilizer.on_peer_published();
        assert!(!stabilizer.on_tick());
        assert!(!stabilizer.on_tick());
        assert!(stabilizer.on_tick());
    }

    #[test]
    fn post_established_loss_pauses_without_unlatching_history() {
        let mut stabilizer = ConnectionStabilizer::new(2);
        stabilizer.on_peer_published();
        stabilizer.on_tick();
        assert!(stabilizer.on_tick());

        stabilizer.on_peer_unpublished();
        assert!(!stabilizer.is_established());
        assert!(stabilizer.ever_established());

        // Re-stabilization emits established again for the new attempt.
        stabilizer.on_peer_published();
        assert!(!stabilizer.on_tick());
        assert!(stabilizer.on_tick());
    }

    #[test]
    fn no_ticks_count_without_presence() {
        let mut stabilizer = ConnectionStabilizer::new(1);
        for _ in 0..10 {
            assert!(!stabilizer.on_tick());
        }
        assert!(!stabilizer.is_established());
    }
}
