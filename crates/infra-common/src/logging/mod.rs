//! Logging configuration and setup.

mod setup;

pub use setup::{init_logging, parse_log_level, LoggingConfig, LoggingError};
