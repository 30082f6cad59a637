//! Logging setup for processes embedding the state poller
//!
//! The poller itself only emits `tracing` events; this module installs a
//! subscriber for binaries and tests that want to see them.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No subscriber installed
    Silent,
    /// Compact human-readable output on stderr
    Development,
    /// Verbose output with source locations
    Debug,
    /// One JSON object per line, for log shippers
    Json,
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),
}

/// Initialize logging with the specified mode
///
/// # Environment Variables
///
/// - `THREAD_MGMT_LOG_LEVEL`: Override the filter (e.g. `info`, `state_poller=debug`)
/// - `RUST_LOG`: Used when `THREAD_MGMT_LOG_LEVEL` is not set
///
/// Does nothing if a global subscriber is already installed.
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    if is_initialized() {
        return Ok(());
    }

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let filter = create_env_filter("info")?;

            Registry::default()
                .with(fmt::layer().with_target(false).compact())
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let filter = create_env_filter("debug")?;

            Registry::default()
                .with(
                    fmt::layer()
                        .pretty()
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Json => {
            let filter = create_env_filter("info")?;

            Registry::default()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Initialize logging from environment variables
///
/// Reads `THREAD_MGMT_LOG_MODE`: `development`, `debug`, `json` or `silent`.
/// Defaults to development output.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    init_logging(mode_from_env())
}

fn mode_from_env() -> LoggingMode {
    match std::env::var("THREAD_MGMT_LOG_MODE").as_deref() {
        Ok("silent") => LoggingMode::Silent,
        Ok("debug") => LoggingMode::Debug,
        Ok("json") => LoggingMode::Json,
        _ => LoggingMode::Development,
    }
}

/// Create an environment filter with fallback to default level
fn create_env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    let directives = std::env::var("THREAD_MGMT_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default_level.to_string());

    EnvFilter::try_new(&directives).map_err(|e| LoggingError::InvalidFilter(e.to_string()))
}

/// Check if a global subscriber has been installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}
