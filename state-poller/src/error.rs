//! Error types for the state poller.

use device_registry::RegistryError;
use thiserror::Error;

/// Errors surfaced by the state poller service
///
/// Fetch, persistence and publish failures never reach the caller; they are
/// logged by the task that hit them.
#[derive(Debug, Error)]
pub enum PollerError {
    /// Reading the device configuration set failed; the refresh pass was aborted
    #[error("failed to read device configuration: {0}")]
    Store(#[from] RegistryError),

    /// `start` was called on a service that has already been started
    #[error("state poller service already started")]
    AlreadyStarted,

    /// The service has been stopped and no longer manages workers
    #[error("state poller service stopped")]
    Stopped,

    /// Invalid configuration provided
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type for state poller operations
pub type Result<T> = std::result::Result<T, PollerError>;
