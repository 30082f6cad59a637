//! Error types for device communication

use std::net::IpAddr;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to a device
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport level failure reaching the device
    #[error("network error talking to {address}: {message}")]
    Network { address: IpAddr, message: String },

    /// The device did not answer in time
    #[error("request to {address} timed out after {timeout:?}")]
    Timeout { address: IpAddr, timeout: Duration },

    /// The device answered with a payload that could not be decoded
    #[error("failed to decode device payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
