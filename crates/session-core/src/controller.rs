//! Session Controller: the top-level orchestrator.
//!
//! Composes the stabilizer, ticker, guard, finalizer and synchronizer
//! against the media transport and persistence collaborators. Transport
//! presence, user commands and remote status changes are all funneled into
//! one single-consumer queue and processed in arrival order alongside a
//! one-second timer, so no component ever re-enters another from a nested
//! callback.

use std::sync::Arc;
use std::time::Duration;

use counsel_ledger_core::{
    CommitOutcome, Credits, SessionId, SessionLedger, SessionRecord, StartOutcome,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapters::{MediaTransport, TokenIssuer};
use crate::config::SessionConfig;
use crate::engine::{
    synchronizer, BillingTicker, ChargeRequest, ConnectionStabilizer, FinalizationCoordinator,
    FinalizeTrigger, NoShowGuard,
};
use crate::errors::{Result, SessionError};
use crate::events::{Command, ConnectionState, EngineEvent, SessionSummary, TransportEvent, UiEvent};
use crate::types::Role;

/// Cloneable command surface handed to the presentation layer.
#[derive(Clone)]
pub struct SessionHandle {
    queue: mpsc::UnboundedSender<EngineEvent>,
}

impl SessionHandle {
    /// End the session now.
    pub fn hangup(&self) {
        let _ = self.queue.send(EngineEvent::Command(Command::Hangup));
    }

    /// Publish or unpublish the local media track.
    pub fn toggle_media(&self) {
        let _ = self.queue.send(EngineEvent::Command(Command::ToggleMedia));
    }
}

/// Drives one participant's side of a metered session from join to
/// terminal summary.
pub struct SessionController {
    config: SessionConfig,
    role: Role,
    session: SessionRecord,
    ledger: Arc<dyn SessionLedger>,
    transport: Arc<dyn MediaTransport>,
    tokens: Arc<dyn TokenIssuer>,

    queue_tx: mpsc::UnboundedSender<EngineEvent>,
    queue_rx: mpsc::UnboundedReceiver<EngineEvent>,
    ui_tx: mpsc::UnboundedSender<UiEvent>,
    ui_rx: Option<mpsc::UnboundedReceiver<UiEvent>>,
    balance_tx: watch::Sender<Credits>,

    stabilizer: ConnectionStabilizer,
    ticker: BillingTicker,
    guard: NoShowGuard,
    finalizer: FinalizationCoordinator,

    /// Seconds since join, by tick count. The duration hint handed to
    /// finalize; never an input to billing.
    joined_seconds: u64,
    /// Credits this process saw committed, for the degraded summary.
    local_total: Credits,
    media_published: bool,
    tasks: Vec<JoinHandle<()>>,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        role: Role,
        session: SessionRecord,
        ledger: Arc<dyn SessionLedger>,
        transport: Arc<dyn MediaTransport>,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let (balance_tx, _) = watch::channel(0);
        let stabilizer = ConnectionStabilizer::new(config.debounce_seconds());
        let ticker = BillingTicker::new(&config);
        let guard = NoShowGuard::new(config.no_show_seconds());
        let finalizer =
            FinalizationCoordinator::new(session.id.clone(), ledger.clone(), transport.clone());
        Self {
            config,
            role,
            session,
            ledger,
            transport,
            tokens,
            queue_tx,
            queue_rx,
            ui_tx,
            ui_rx: Some(ui_rx),
            balance_tx,
            stabilizer,
            ticker,
            guard,
            finalizer,
            joined_seconds: 0,
            local_total: 0,
            media_published: false,
            tasks: Vec::new(),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session.id
    }

    /// Command surface for the presentation layer.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            queue: self.queue_tx.clone(),
        }
    }

    /// Take the presentation event receiver. Yields `None` after the
    /// first call.
    pub fn take_ui_events(&mut self) -> Option<mpsc::UnboundedReceiver<UiEvent>> {
        self.ui_rx.take()
    }

    /// Read replica of the payer's balance, refreshed after each commit.
    /// Display only; the ledger is the authority.
    pub fn balance_watch(&self) -> watch::Receiver<Credits> {
        self.balance_tx.subscribe()
    }

    /// Run the session to its terminal state and return the summary.
    pub async fn run(mut self) -> Result<SessionSummary> {
        let result = self.run_inner().await;
        if result.is_err() {
            // No exit path may leave media resources held.
            self.finalizer.release_media().await;
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        result
    }

    async fn run_inner(&mut self) -> Result<SessionSummary> {
        let local_user = match self.role {
            Role::Client => self.session.client.clone(),
            Role::Provider => self.session.provider.clone(),
        };
        info!(
            "joining session {} as {} ({})",
            self.session.id, self.role, local_user
        );

        // A counterpart may have ended the session before we arrived.
        let record = self.ledger.get_session(&self.session.id).await?;
        if record.status.is_terminal() {
            let summary = self
                .finalizer
                .finalize(FinalizeTrigger::RemoteEnded, 0, 0)
                .await
                .ok_or_else(|| SessionError::invalid_state("finalizer latched before run"))?;
            self.emit_ui(UiEvent::Terminal(summary.clone()));
            return Ok(summary);
        }
        self.session = record;

        let credentials = self.tokens.issue(&self.session.id, &local_user).await?;
        self.transport.join(&credentials).await?;
        if let Err(e) = self.transport.publish().await {
            self.finalizer.release_media().await;
            return Err(e);
        }
        self.media_published = true;

        let mut transport_events = self
            .transport
            .take_events()
            .await
            .ok_or_else(|| SessionError::invalid_state("transport events already consumed"))?;
        let queue = self.queue_tx.clone();
        self.tasks.push(tokio::spawn(async move {
            while let Some(event) = transport_events.recv().await {
                if queue.send(EngineEvent::Transport(event)).is_err() {
                    break;
                }
            }
        }));
        self.tasks.push(synchronizer::spawn(
            self.ledger.clone(),
            self.session.id.clone(),
            self.queue_tx.clone(),
        ));

        if !self.session.status.is_terminal() && self.session.started_at.is_none() {
            self.guard.arm();
        }

        let payer = self.session.client.clone();
        let balance = self.ledger.balance(&payer).await?;
        self.balance_tx.send_replace(balance);

        // First tick one second after join; a tick at t=0 would count a
        // second that never elapsed.
        let start = tokio::time::Instant::now() + Duration::from_secs(1);
        let mut ticks = tokio::time::interval_at(start, Duration::from_secs(1));

        loop {
            tokio::select! {
                biased;
                maybe_event = self.queue_rx.recv() => {
                    // The controller holds its own sender; recv is never None.
                    let Some(event) = maybe_event else {
                        return Err(SessionError::invalid_state("engine queue closed"));
                    };
                    if let Some(summary) = self.handle_event(event).await? {
                        return Ok(summary);
                    }
                }
                _ = ticks.tick() => {
                    if let Some(summary) = self.handle_tick().await? {
                        return Ok(summary);
                    }
                }
            }
        }
    }

    async fn handle_tick(&mut self) -> Result<Option<SessionSummary>> {
        self.joined_seconds += 1;

        if self.guard.on_tick() {
            warn!(
                "counterpart for {} never stabilized within {}s",
                self.session.id,
                self.config.no_show_seconds()
            );
            return self.finish_with(FinalizeTrigger::NoShow).await;
        }

        if self.stabilizer.on_tick() {
            return self.on_established().await;
        }

        if self.stabilizer.is_established() {
            if let Some(request) = self.ticker.on_tick() {
                if let Some(summary) = self.apply_charge(request).await? {
                    return Ok(Some(summary));
                }
            }
            self.emit_ui(UiEvent::Tick {
                elapsed_seconds: self.ticker.elapsed_seconds(),
            });
        }

        Ok(None)
    }

    /// The stabilizer just latched `established` for this attempt.
    async fn on_established(&mut self) -> Result<Option<SessionSummary>> {
        self.guard.cancel();

        match self.ledger.start_session(&self.session.id).await? {
            StartOutcome::Started { started_at } => {
                info!("session {} started by this side", self.session.id);
                self.session.started_at = Some(started_at);
            }
            StartOutcome::AlreadyActive { started_at } => {
                debug!("session {} already started by counterpart", self.session.id);
                self.session.started_at = Some(started_at);
            }
            StartOutcome::AlreadyTerminal(_) => {
                return self.finish_with(FinalizeTrigger::RemoteEnded).await;
            }
        }

        self.emit_ui(UiEvent::Established);

        if let Some(request) = self.ticker.on_established() {
            if let Some(summary) = self.apply_charge(request).await? {
                return Ok(Some(summary));
            }
        }
        Ok(None)
    }

    async fn apply_charge(&mut self, request: ChargeRequest) -> Result<Option<SessionSummary>> {
        let outcome = self
            .ledger
            .commit_billing_event(
                &self.session.id,
                request.kind,
                request.unit_index,
                request.amount,
            )
            .await?;

        match outcome {
            CommitOutcome::Committed {
                event,
                balance_after,
            } => {
                debug!(
                    "committed {:?} unit {} for {}",
                    event.kind, event.unit_index, self.session.id
                );
                self.local_total += event.amount;
                self.balance_tx.send_replace(balance_after);
                if let Some(threshold) = self.config.low_balance_threshold {
                    if balance_after < threshold {
                        self.emit_ui(UiEvent::LowBalanceWarning {
                            balance: balance_after,
                        });
                    }
                }
                Ok(None)
            }
            CommitOutcome::AlreadyCommitted(event) => {
                // The counterpart's ticker beat us to this unit.
                self.local_total += event.amount;
                Ok(None)
            }
            CommitOutcome::InsufficientFunds { balance, required } => {
                warn!(
                    "unit {} rejected for {}: balance {} < required {}",
                    request.unit_index, self.session.id, balance, required
                );
                self.ticker.stop();
                self.finish_with(FinalizeTrigger::InsufficientFunds).await
            }
            CommitOutcome::SessionClosed => self.finish_with(FinalizeTrigger::RemoteEnded).await,
        }
    }

    async fn handle_event(&mut self, event: EngineEvent) -> Result<Option<SessionSummary>> {
        match event {
            EngineEvent::Transport(TransportEvent::PeerMediaPublished) => {
                self.stabilizer.on_peer_published();
                Ok(None)
            }
            EngineEvent::Transport(TransportEvent::PeerMediaUnpublished) => {
                self.stabilizer.on_peer_unpublished();
                Ok(None)
            }
            EngineEvent::Transport(TransportEvent::PeerLeft) => {
                info!("counterpart left session {}", self.session.id);
                self.finish_with(self.hangup_trigger()).await
            }
            EngineEvent::Transport(TransportEvent::ConnectionStateChanged(state)) => {
                if state == ConnectionState::Failed {
                    return self.finish_with(FinalizeTrigger::TransportFailure).await;
                }
                debug!("connection state for {}: {:?}", self.session.id, state);
                Ok(None)
            }
            EngineEvent::Command(Command::Hangup) => {
                info!("local hangup for {}", self.session.id);
                self.finish_with(self.hangup_trigger()).await
            }
            EngineEvent::Command(Command::ToggleMedia) => {
                if self.media_published {
                    self.transport.unpublish().await?;
                } else {
                    self.transport.publish().await?;
                }
                self.media_published = !self.media_published;
                Ok(None)
            }
            EngineEvent::StatusChanged(change) => {
                if change.status.is_terminal() && !self.finalizer.is_latched() {
                    info!(
                        "session {} ended remotely ({:?})",
                        self.session.id, change.end_reason
                    );
                    self.ticker.stop();
                    return self.finish_with(FinalizeTrigger::RemoteEnded).await;
                }
                Ok(None)
            }
        }
    }

    /// A hangup before the connection ever stabilized is a cancellation,
    /// not a completed consultation.
    fn hangup_trigger(&self) -> FinalizeTrigger {
        if self.stabilizer.ever_established() {
            FinalizeTrigger::Hangup
        } else {
            FinalizeTrigger::CancelledBeforeConnect
        }
    }

    /// Funnel every exit path through the finalizer and surface the
    /// terminal summary.
    async fn finish_with(&mut self, trigger: FinalizeTrigger) -> Result<Option<SessionSummary>> {
        self.ticker.stop();
        self.guard.cancel();
        let summary = self
            .finalizer
            .finalize(trigger, self.joined_seconds, self.local_total)
            .await;
        if let Some(summary) = &summary {
            self.emit_ui(UiEvent::Terminal(summary.clone()));
        }
        Ok(summary)
    }

    fn emit_ui(&self, event: UiEvent) {
        let _ = self.ui_tx.send(event);
    }
}
