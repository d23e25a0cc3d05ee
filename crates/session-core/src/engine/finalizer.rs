//! Finalization Coordinator: the single settlement path.
//!
//! Locally idempotent through a one-shot latch, remotely idempotent
//! through the ledger's atomic finalize. Every exit path (hangup, remote
//! end, no-show, rejected charge, transport failure) funnels through here,
//! and media resources are released exactly once regardless of whether the
//! settlement call succeeds.

use std::sync::Arc;

use counsel_ledger_core::{Credits, EndReason, SessionId, SessionLedger, SessionStatus};
use tracing::{debug, info, warn};

use crate::adapters::transport::MediaTransport;
use crate::events::SessionSummary;

/// Why finalization was triggered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FinalizeTrigger {
    /// The local participant hung up, or the peer-left signal arrived,
    /// after the connection had stabilized at least once.
    Hangup,
    /// Hangup or peer departure before the connection ever stabilized.
    CancelledBeforeConnect,
    /// The persistence layer reported a terminal status written by the
    /// counterpart; the committed result already exists.
    RemoteEnded,
    /// The no-show guard expired.
    NoShow,
    /// A unit charge was rejected.
    InsufficientFunds,
    /// The local transport failed beyond recovery.
    TransportFailure,
}

impl FinalizeTrigger {
    fn reason(&self) -> EndReason {
        match self {
            // For a remote end the reason is already frozen; the value
            // passed here is ignored by the idempotent finalize.
            FinalizeTrigger::Hangup | FinalizeTrigger::RemoteEnded => EndReason::Hangup,
            FinalizeTrigger::CancelledBeforeConnect => EndReason::CancelledBeforeConnect,
            FinalizeTrigger::NoShow => EndReason::CounterpartTimeout,
            FinalizeTrigger::InsufficientFunds => EndReason::InsufficientFunds,
            FinalizeTrigger::TransportFailure => EndReason::TransportError,
        }
    }

    fn degraded_status(&self) -> SessionStatus {
        match self {
            FinalizeTrigger::NoShow | FinalizeTrigger::CancelledBeforeConnect => {
                SessionStatus::Cancelled
            }
            _ => SessionStatus::Completed,
        }
    }
}

/// One-shot settlement coordinator for a single session.
pub struct FinalizationCoordinator {
    session_id: SessionId,
    ledger: Arc<dyn SessionLedger>,
    transport: Arc<dyn MediaTransport>,
    latched: bool,
    media_released: bool,
}

impl FinalizationCoordinator {
    pub fn new(
        session_id: SessionId,
        ledger: Arc<dyn SessionLedger>,
        transport: Arc<dyn MediaTransport>,
    ) -> Self {
        Self {
            session_id,
            ledger,
            transport,
            latched: false,
            media_released: false,
        }
    }

    /// Whether finalization already started; later triggers are ignored.
    pub fn is_latched(&self) -> bool {
        self.latched
    }

    /// Release local media resources. Idempotent; never fails the caller.
    pub async fn release_media(&mut self) {
        if self.media_released {
            return;
        }
        self.media_released = true;
        if let Err(e) = self.transport.leave().await {
            warn!("media release for {} reported: {}", self.session_id, e);
        }
    }

    /// Drive the session to its terminal state. Returns `None` if a prior
    /// trigger already latched finalization; otherwise the summary to
    /// render: authoritative when the settlement committed, degraded and
    /// locally computed when the settlement call failed.
    pub async fn finalize(
        &mut self,
        trigger: FinalizeTrigger,
        duration_hint: u64,
        local_total: Credits,
    ) -> Option<SessionSummary> {
        if self.latched {
            debug!(
                "finalize {:?} ignored for {}; already finalizing",
                trigger, self.session_id
            );
            return None;
        }
        self.latched = true;
        info!("finalizing {} ({:?})", self.session_id, trigger);

        // Resource release must not depend on the settlement call.
        self.release_media().await;

        match self
            .ledger
            .finalize_session(&self.session_id, Some(duration_hint), trigger.reason())
            .await
        {
            Ok(settlement) => Some(settlement.into()),
            Err(e) => {
                warn!(
                    "settlement for {} failed, degrading to local summary: {}",
                    self.session_id, e
                );
                Some(SessionSummary {
                    session_id: self.session_id.clone(),
                    status: trigger.degraded_status(),
                    end_reason: trigger.reason(),
                    duration_seconds: duration_hint,
                    total_credits: local_total,
                    authoritative: false,
                })
            }
        }
    }
}
