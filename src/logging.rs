//! Diagnostic logging setup.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the application. [`init_logging`] installs a stderr formatter with an
//! `EnvFilter`, which is what the `chorus` binary uses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Configuration for diagnostic logging.
///
/// # Example
///
/// ```rust
/// use chorus::logging::{LogLevel, LoggingConfig};
///
/// let config = LoggingConfig::new().with_level(LogLevel::Debug).with_ansi(false);
/// assert!(config.enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether logging is enabled.
    pub enabled: bool,
    /// Level used when `RUST_LOG` is not set.
    pub level: LogLevel,
    /// Whether to colour the output.
    pub ansi: bool,
}

impl LoggingConfig {
    /// Creates a new LoggingConfig with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a disabled logging configuration.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Sets the log level filter.
    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Enables or disables coloured output.
    #[must_use]
    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: LogLevel::default(),
            ansi: true,
        }
    }
}

/// Log level filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level - most verbose.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    Info,
    /// Warn level - default.
    #[default]
    Warn,
    /// Error level - least verbose.
    Error,
}

impl LogLevel {
    /// Converts to tracing_subscriber LevelFilter.
    #[must_use]
    pub fn to_filter(self) -> tracing_subscriber::filter::LevelFilter {
        match self {
            Self::Trace => tracing_subscriber::filter::LevelFilter::TRACE,
            Self::Debug => tracing_subscriber::filter::LevelFilter::DEBUG,
            Self::Info => tracing_subscriber::filter::LevelFilter::INFO,
            Self::Warn => tracing_subscriber::filter::LevelFilter::WARN,
            Self::Error => tracing_subscriber::filter::LevelFilter::ERROR,
        }
    }

    /// Returns the directive string understood by `EnvFilter`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(LoggingError::invalid_filter(
                other,
                "expected trace, debug, info, warn or error",
            )),
        }
    }
}

/// Errors that can occur during logging initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingError {
    /// The specific error that occurred.
    pub kind: LoggingErrorKind,
}

/// Specific logging error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingErrorKind {
    /// The filter directive could not be parsed.
    InvalidFilter {
        /// The directive that failed.
        directive: String,
        /// The parser message.
        reason: String,
    },
    /// Subscriber initialization failed.
    SubscriberInitFailed {
        /// The reason for failure.
        reason: String,
    },
}

impl LoggingError {
    /// Creates a new LoggingError with the given kind.
    #[must_use]
    pub fn new(kind: LoggingErrorKind) -> Self {
        Self { kind }
    }

    /// Creates an error for an unparseable filter directive.
    #[must_use]
    pub fn invalid_filter(directive: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(LoggingErrorKind::InvalidFilter {
            directive: directive.into(),
            reason: reason.into(),
        })
    }

    /// Creates an error for subscriber initialization failure.
    #[must_use]
    pub fn subscriber_init_failed(reason: impl Into<String>) -> Self {
        Self::new(LoggingErrorKind::SubscriberInitFailed {
            reason: reason.into(),
        })
    }
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LoggingErrorKind::InvalidFilter { directive, reason } => {
                write!(f, "invalid log filter '{directive}': {reason}")
            }
            LoggingErrorKind::SubscriberInitFailed { reason } => {
                write!(
                    f,
                    "failed to initialize tracing subscriber: {reason}; \
                     a subscriber may already be set"
                )
            }
        }
    }
}

impl std::error::Error for LoggingError {}

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Builds the filter: `RUST_LOG` when set, otherwise the configured level.
///
/// # Errors
///
/// Returns an error if `RUST_LOG` holds an invalid directive.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, LoggingError> {
    match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directive) if !directive.trim().is_empty() => EnvFilter::try_new(&directive)
            .map_err(|e| LoggingError::invalid_filter(directive, e.to_string())),
        _ => Ok(EnvFilter::new(config.level.as_str())),
    }
}

/// Installs the global stderr subscriber.
///
/// # Returns
///
/// `Ok(true)` if logging was initialized.
/// `Ok(false)` if logging is disabled or was already initialized.
///
/// # Errors
///
/// Returns an error if the filter is invalid or another subscriber was
/// installed outside this function.
pub fn init_logging(config: &LoggingConfig) -> Result<bool, LoggingError> {
    if !config.enabled {
        return Ok(false);
    }
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(false);
    }

    let filter = match build_filter(config) {
        Ok(filter) => filter,
        Err(e) => {
            INITIALIZED.store(false, Ordering::SeqCst);
            return Err(e);
        }
    };

    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(config.ansi)
                .with_target(false),
        )
        .with(filter)
        .try_init();

    match result {
        Ok(()) => Ok(true),
        Err(e) => Err(LoggingError::subscriber_init_failed(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logging_config_default_values() {
        let config = LoggingConfig::default();
        assert!(config.enabled);
        assert!(config.ansi);
        assert_eq!(config.level, LogLevel::Warn);
    }

    #[test]
    fn logging_config_builder_pattern() {
        let config = LoggingConfig::new()
            .with_level(LogLevel::Debug)
            .with_ansi(false);

        assert_eq!(config.level, LogLevel::Debug);
        assert!(!config.ansi);
    }

    #[test]
    fn logging_config_disabled() {
        let config = LoggingConfig::disabled();
        assert!(!config.enabled);
        assert_eq!(init_logging(&config), Ok(false));
    }

    #[test]
    fn log_level_parses_case_insensitively() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn log_level_to_filter() {
        assert_eq!(
            LogLevel::Trace.to_filter(),
            tracing_subscriber::filter::LevelFilter::TRACE
        );
        assert_eq!(
            LogLevel::Error.to_filter(),
            tracing_subscriber::filter::LevelFilter::ERROR
        );
    }

    #[test]
    fn logging_config_deserializes_partial_table() {
        let config: LoggingConfig = toml::from_str("level = \"info\"").unwrap();
        assert_eq!(config.level, LogLevel::Info);
        assert!(config.enabled);
    }

    #[test]
    fn logging_error_display() {
        let error = LoggingError::invalid_filter("=[", "bad directive");
        assert!(error.to_string().contains("=["));
    }
}
