//! Metered real-time consultation sessions.
//!
//! This crate drives one participant's side of a paid consultation from
//! join to settlement: it debounces raw transport presence into a trusted
//! `established` signal, meters billable time in whole units against the
//! billing ledger, guards against counterpart no-shows, and funnels every
//! exit path through a single idempotent finalization step.
//!
//! The [`SessionController`] is the entry point. It composes the pure
//! tick-driven state machines in [`engine`] with three injected
//! collaborators: a [`SessionLedger`](counsel_ledger_core::SessionLedger)
//! for persistence and billing, a [`MediaTransport`](adapters::MediaTransport)
//! for the real-time channel, and a [`TokenIssuer`](adapters::TokenIssuer)
//! for join credentials.
//!
//! ```no_run
//! use std::sync::Arc;
//! use counsel_ledger_core::{InMemoryLedger, Modality, SessionLedger, UserId};
//! use counsel_session_core::adapters::{SimulatedRoom, StaticTokenIssuer};
//! use counsel_session_core::{Role, SessionConfig, SessionController};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let ledger = Arc::new(InMemoryLedger::new());
//! let client = UserId::new("client-1");
//! let provider = UserId::new("provider-1");
//! ledger.deposit(&client, 100).await;
//! let record = ledger
//!     .create_session(&client, &provider, Modality::Video)
//!     .await?;
//!
//! let (client_room, _provider_room) = SimulatedRoom::pair();
//! let controller = SessionController::new(
//!     SessionConfig::default(),
//!     Role::Client,
//!     record,
//!     ledger,
//!     Arc::new(client_room),
//!     Arc::new(StaticTokenIssuer::default()),
//! );
//! let summary = controller.run().await?;
//! println!("session ended: {} credits", summary.total_credits);
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod config;
pub mod controller;
pub mod engine;
pub mod errors;
pub mod events;
pub mod types;

pub use config::SessionConfig;
pub use controller::{SessionController, SessionHandle};
pub use errors::{Result, SessionError};
pub use events::{SessionSummary, UiEvent};
pub use types::Role;
