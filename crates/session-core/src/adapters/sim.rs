//! In-process simulated transport.
//!
//! Two endpoints share a room; publishing on one side surfaces as a
//! presence event on the other. Used by the integration tests and the
//! runnable examples to exercise the full two-participant lifecycle
//! without a real media stack.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::adapters::transport::{MediaTransport, TransportCredentials};
use crate::errors::{Result, SessionError};
use crate::events::TransportEvent;

struct EndpointState {
    joined: bool,
    published: bool,
    tx: mpsc::UnboundedSender<TransportEvent>,
    leave_calls: u32,
    /// One-shot injected failure for the next join call.
    join_error: Option<String>,
}

struct RoomState {
    sides: [EndpointState; 2],
}

/// A simulated media channel shared by two endpoints.
pub struct SimulatedRoom;

impl SimulatedRoom {
    /// Create the two linked endpoints of a fresh room.
    pub fn pair() -> (SimulatedTransport, SimulatedTransport) {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(RoomState {
            sides: [
                EndpointState {
                    joined: false,
                    published: false,
                    tx: tx_a,
                    leave_calls: 0,
                    join_error: None,
                },
                EndpointState {
                    joined: false,
                    published: false,
                    tx: tx_b,
                    leave_calls: 0,
                    join_error: None,
                },
            ],
        }));
        (
            SimulatedTransport {
                state: state.clone(),
                side: 0,
                events: Mutex::new(Some(rx_a)),
            },
            SimulatedTransport {
                state,
                side: 1,
                events: Mutex::new(Some(rx_b)),
            },
        )
    }
}

/// One endpoint of a [`SimulatedRoom`].
pub struct SimulatedTransport {
    state: Arc<Mutex<RoomState>>,
    side: usize,
    events: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
}

impl SimulatedTransport {
    fn other(side: usize) -> usize {
        1 - side
    }

    /// How many times `leave` was called on this endpoint. The engine
    /// guarantees exactly one.
    pub async fn leave_calls(&self) -> u32 {
        self.state.lock().await.sides[self.side].leave_calls
    }

    /// Make the next `join` call fail with a transport error.
    pub async fn inject_join_error(&self, message: impl Into<String>) {
        self.state.lock().await.sides[self.side].join_error = Some(message.into());
    }
}

#[async_trait]
impl MediaTransport for SimulatedTransport {
    async fn join(&self, credentials: &TransportCredentials) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(message) = state.sides[self.side].join_error.take() {
            return Err(SessionError::transport(message));
        }
        if credentials.token.is_empty() || credentials.is_expired() {
            return Err(SessionError::transport("rejected credentials"));
        }

        state.sides[self.side].joined = true;
        debug!("sim transport side {} joined {}", self.side, credentials.channel);

        // Learn about a counterpart that was already publishing.
        let other = Self::other(self.side);
        if state.sides[other].joined && state.sides[other].published {
            let _ = state.sides[self.side].tx.send(TransportEvent::PeerMediaPublished);
        }
        Ok(())
    }

    async fn publish(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.sides[self.side].joined {
            return Err(SessionError::transport("publish before join"));
        }
        if state.sides[self.side].published {
            return Ok(());
        }
        state.sides[self.side].published = true;

        let other = Self::other(self.side);
        if state.sides[other].joined {
            let _ = state.sides[other].tx.send(TransportEvent::PeerMediaPublished);
        }
        Ok(())
    }

    async fn unpublish(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.sides[self.side].published {
            return Ok(());
        }
        state.sides[self.side].published = false;

        let other = Self::other(self.side);
        if state.sides[other].joined {
            let _ = state.sides[other].tx.send(TransportEvent::PeerMediaUnpublished);
        }
        Ok(())
    }

    async fn leave(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.sides[self.side].leave_calls += 1;
        if !state.sides[self.side].joined {
            return Ok(());
        }
        state.sides[self.side].joined = false;
        let was_published = state.sides[self.side].published;
        state.sides[self.side].published = false;

        let other = Self::other(self.side);
        if state.sides[other].joined {
            if was_published {
                let _ = state.sides[other].tx.send(TransportEvent::PeerMediaUnpublished);
            }
            let _ = state.sides[other].tx.send(TransportEvent::PeerLeft);
        }
        debug!("sim transport side {} left", self.side);
        Ok(())
    }

    async fn take_events(&self) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        self.events.lock().await.take()
    }
}
