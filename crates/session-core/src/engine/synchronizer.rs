//! Status Synchronizer.
//!
//! Observes the session's status transitions through the persistence
//! layer's subscription channel and forwards them into the controller's
//! event queue. When the counterpart ends the session first, this is how
//! the local process converges on the committed terminal result.

use std::sync::Arc;

use counsel_ledger_core::{SessionId, SessionLedger};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::events::EngineEvent;

/// Spawn the subscription pump. The task ends when a terminal status has
/// been forwarded, when the stream closes, or when the controller goes
/// away.
pub fn spawn(
    ledger: Arc<dyn SessionLedger>,
    session_id: SessionId,
    queue: mpsc::UnboundedSender<EngineEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stream = match ledger.subscribe(&session_id).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("status subscription for {} failed: {}", session_id, e);
                return;
            }
        };

        while let Some(item) = stream.next().await {
            let change = match item {
                Ok(change) => change,
                Err(e) => {
                    // A lagged receiver missed intermediate transitions;
                    // the next delivered change carries the current state.
                    warn!("status stream for {} lagged: {}", session_id, e);
                    continue;
                }
            };
            let terminal = change.status.is_terminal();
            debug!("observed status change for {}: {}", session_id, change.status);
            if queue.send(EngineEvent::StatusChanged(change)).is_err() {
                return;
            }
            if terminal {
                return;
            }
        }
    })
}
