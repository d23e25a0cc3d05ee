use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Credits are integer units; fractional charges do not exist.
pub type Credits = u64;

/// Session ID type
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(format!("session-{}", uuid::Uuid::new_v4()))
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User ID type, shared by clients and providers.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Consultation modality.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Modality {
    Video,
    Audio,
}

/// Session lifecycle status.
///
/// Transitions are monotonic and one-directional:
/// `Pending -> Active -> Completed`, `Pending -> Cancelled`, or
/// `Active -> Completed`. Nothing ever leaves a terminal state.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum SessionStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Why a session reached its terminal state.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum EndReason {
    /// Either participant hung up an active session.
    Hangup,
    /// Explicit cancel before the connection ever stabilized.
    CancelledBeforeConnect,
    /// The counterpart never reached a stable connection in time.
    CounterpartTimeout,
    /// A unit charge was rejected; the session cannot continue.
    InsufficientFunds,
    /// The media transport failed beyond recovery.
    TransportError,
}

/// Charge classification on the billing ledger.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ChargeKind {
    /// One-time connection fee, charged at most once per session.
    InitialFee,
    /// One completed billing unit of consultation time.
    PerUnit,
}

/// A committed entry on the append-only billing ledger.
///
/// The idempotency key is `(session_id, kind, unit_index)`; at most one
/// event per key is ever committed. `unit_index` is 0 for the initial fee
/// and a monotonically increasing counter starting at 1 for per-unit
/// charges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingEvent {
    pub session_id: SessionId,
    pub kind: ChargeKind,
    pub unit_index: u32,
    pub amount: Credits,
    pub committed_at: DateTime<Utc>,
}

/// One metered consultation between a client and a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub client: UserId,
    pub provider: UserId,
    pub modality: Modality,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    /// Set by the atomic start operation; `None` while pending.
    pub started_at: Option<DateTime<Utc>>,
    /// Frozen once the session is terminal.
    pub duration_seconds: u64,
    /// Always equal to the sum of this session's committed billing events.
    pub total_credits: Credits,
    pub end_reason: Option<EndReason>,
}

/// Result of the atomic start operation.
#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    /// This caller won the transition to `Active`.
    Started { started_at: DateTime<Utc> },
    /// The other participant started the session first.
    AlreadyActive { started_at: DateTime<Utc> },
    /// The session was already terminal; nothing to start.
    AlreadyTerminal(SessionStatus),
}

/// Result of an idempotent charge commit.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// The charge was applied; the payer's balance after the debit.
    Committed {
        event: BillingEvent,
        balance_after: Credits,
    },
    /// A commit with this idempotency key already happened; no-op.
    AlreadyCommitted(BillingEvent),
    /// Applying the charge would drive the balance negative. Nothing was
    /// debited.
    InsufficientFunds { balance: Credits, required: Credits },
    /// The session reached a terminal state before this commit landed.
    SessionClosed,
}

/// The frozen result of the one-time settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub end_reason: EndReason,
    pub duration_seconds: u64,
    /// Sum of committed billing events; what the provider earned.
    pub earnings: Credits,
}

/// A status transition observed through the subscription channel.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub end_reason: Option<EndReason>,
}

/// Status breakdown across all stored sessions.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SessionStats {
    pub total: usize,
    pub pending: usize,
    pub active: usize,
    pub completed: usize,
    pub cancelled: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!SessionStatus::Pending.is_terminal());
        assert!(!SessionStatus::Active.is_terminal());
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Cancelled.is_terminal());
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
