//! Event types flowing through the engine.
//!
//! Transport callbacks, user commands, the 1 s timer and the status
//! subscription all converge on one single-consumer [`EngineEvent`] queue,
//! so no component ever observes a re-entrant side effect from a nested
//! callback.

use counsel_ledger_core::{Credits, EndReason, SessionId, SessionStatus, Settlement, StatusChange};
use serde::{Deserialize, Serialize};

/// Raw presence signals from the media transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The counterpart published a media track.
    PeerMediaPublished,
    /// The counterpart's media track went away.
    PeerMediaUnpublished,
    /// The counterpart left the channel; an explicit termination signal.
    PeerLeft,
    /// Our own connection state changed.
    ConnectionStateChanged(ConnectionState),
}

/// Local transport connection state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConnectionState {
    Connected,
    Reconnecting,
    Failed,
}

/// Commands issued by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// End the session now.
    Hangup,
    /// Publish or unpublish the local media track.
    ToggleMedia,
}

/// Everything the session controller consumes, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A transport presence signal.
    Transport(TransportEvent),
    /// A presentation-layer command.
    Command(Command),
    /// A session status transition observed through the persistence layer.
    StatusChanged(StatusChange),
}

/// Events the engine emits toward the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// The connection stabilized; billing is now trusted.
    Established,
    /// One second of billable time elapsed.
    Tick { elapsed_seconds: u64 },
    /// The payer's balance dropped below the configured threshold.
    /// Advisory only.
    LowBalanceWarning { balance: Credits },
    /// The session reached its terminal state.
    Terminal(SessionSummary),
}

/// The summary rendered when a session ends.
///
/// Authoritative summaries come from the committed [`Settlement`]; a
/// non-authoritative one is the local best-effort view produced when the
/// settlement call itself failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub end_reason: EndReason,
    pub duration_seconds: u64,
    pub total_credits: Credits,
    /// False only for the degraded, locally-computed view.
    pub authoritative: bool,
}

impl From<Settlement> for SessionSummary {
    fn from(settlement: Settlement) -> Self {
        SessionSummary {
            session_id: settlement.session_id,
            status: settlement.status,
            end_reason: settlement.end_reason,
            duration_seconds: settlement.duration_seconds,
            total_credits: settlement.earnings,
            authoritative: true,
        }
    }
}
