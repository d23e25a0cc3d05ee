//! Shared infrastructure for Counsel services.
//!
//! Currently this covers the tracing/logging bootstrap used by example
//! binaries and services that embed the session engine. Library crates only
//! emit `tracing` events and never install a subscriber themselves.

pub mod logging;

pub use logging::{init_logging, parse_log_level, LoggingConfig, LoggingError};
