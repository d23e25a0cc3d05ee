use std::str::FromStr;

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Errors raised while bootstrapping the logging system.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The provided log level string did not parse.
    #[error("invalid log level: {0}")]
    InvalidLevel(String),

    /// A global subscriber was already installed.
    #[error("logging already initialized")]
    AlreadyInitialized,
}

/// Configuration for the logging system.
///
/// `RUST_LOG` always wins over the configured level, so operators can raise
/// verbosity per-module without a redeploy.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default log level when `RUST_LOG` is unset.
    pub level: Level,
    /// Emit JSON lines instead of the human-readable format.
    pub json: bool,
    /// Include file and line information in events.
    pub file_info: bool,
    /// Application name, included in the startup banner.
    pub app_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: Level::INFO,
            json: false,
            file_info: false,
            app_name: "counsel".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Create a configuration with the given level and application name.
    pub fn new(level: Level, app_name: impl Into<String>) -> Self {
        LoggingConfig {
            level,
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    /// Emit JSON lines.
    pub fn with_json(mut self) -> Self {
        self.json = true;
        self
    }

    /// Include file and line information.
    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }
}

/// Install the global tracing subscriber from the provided configuration.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = EnvFilter::from_default_env().add_directive(config.level.into());

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_file(config.file_info)
        .with_line_number(config.file_info);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|_| LoggingError::AlreadyInitialized)?;

    tracing::info!(
        "{} v{} logging initialized",
        config.app_name,
        env!("CARGO_PKG_VERSION")
    );
    Ok(())
}

/// Parse a log level from a string such as `"debug"`.
pub fn parse_log_level(level: &str) -> Result<Level, LoggingError> {
    Level::from_str(level).map_err(|_| LoggingError::InvalidLevel(level.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels() {
        assert_eq!(parse_log_level("info").unwrap(), Level::INFO);
        assert_eq!(parse_log_level("TRACE").unwrap(), Level::TRACE);
    }

    #[test]
    fn rejects_unknown_level() {
        assert!(matches!(
            parse_log_level("chatty"),
            Err(LoggingError::InvalidLevel(_))
        ));
    }

    #[test]
    fn default_config_is_plain_info() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(!config.json);
    }
}
