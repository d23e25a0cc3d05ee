//! Adapter seams toward the external collaborators.
//!
//! The engine has no opinion on codecs or network transport details; it
//! consumes presence events and issues join/publish/leave calls through
//! [`MediaTransport`], and obtains short-lived channel credentials through
//! [`TokenIssuer`].

pub mod sim;
pub mod token;
pub mod transport;

pub use sim::{SimulatedRoom, SimulatedTransport};
pub use token::{StaticTokenIssuer, TokenIssuer};
pub use transport::{MediaTransport, TransportCredentials};
