//! Error types for the device registry.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::DeviceId;

/// Errors that can occur while reading or mutating the registry
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No device with the given id is registered
    #[error("device with id '{0}' not found")]
    NotFound(DeviceId),

    /// A device with the given id is already registered
    #[error("device with id '{0}' already exists")]
    AlreadyExists(DeviceId),

    /// The submitted configuration violates a registry constraint
    #[error("invalid config for device '{id}': {reason}")]
    InvalidConfig { id: DeviceId, reason: String },

    /// Reading or writing the backing file failed
    #[error("failed to access registry file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Registry contents could not be encoded or decoded
    #[error("failed to (de)serialize registry data: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
