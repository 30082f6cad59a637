//! # device-gateway
//!
//! Request/response access to a single device: fetch its live state, push
//! defaults to it. The wire transport (CoAP over the mesh) lives behind the
//! [`DeviceGateway`] trait; this crate fixes the payload format, the device
//! endpoint convention and the per-request timeout.

mod error;

pub use error::{GatewayError, Result};

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use device_registry::{Defaults, DeviceState};

/// Port devices listen on for management requests
pub const DEVICE_COAP_PORT: u16 = 5683;

/// Path of the device state resource
pub const STATE_RESOURCE: &str = "api/state";

/// Path of the device settings resource
pub const SETTINGS_RESOURCE: &str = "api/settings";

/// Upper bound for a single request/response exchange
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A single request/response exchange with a device
///
/// Retry and timeout policy belong to the implementation; callers issue one
/// call per attempt.
#[async_trait]
pub trait DeviceGateway: Send + Sync {
    /// Fetch the device's current telemetry
    async fn fetch_state(&self, address: IpAddr) -> Result<DeviceState>;

    /// Push defaults to the device
    async fn push_defaults(&self, defaults: &Defaults, address: IpAddr) -> Result<()>;
}

/// Socket address string for a device, `[ip]:port`
pub fn endpoint(address: IpAddr) -> String {
    format!("[{}]:{}", address, DEVICE_COAP_PORT)
}

/// Decode the body of a state response
pub fn decode_state(payload: &[u8]) -> Result<DeviceState> {
    Ok(serde_json::from_slice(payload)?)
}

/// Encode defaults into the body of a settings request
pub fn encode_defaults(defaults: &Defaults) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(defaults)?)
}

/// Gateway adapter enforcing a deadline on every exchange
#[derive(Debug, Clone)]
pub struct TimeoutGateway<G> {
    inner: G,
    timeout: Duration,
}

impl<G: DeviceGateway> TimeoutGateway<G> {
    /// Wrap a gateway with the default [`REQUEST_TIMEOUT`]
    pub fn new(inner: G) -> Self {
        Self::with_timeout(inner, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(inner: G, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<G: DeviceGateway> DeviceGateway for TimeoutGateway<G> {
    async fn fetch_state(&self, address: IpAddr) -> Result<DeviceState> {
        tracing::debug!("Fetching state from {}", endpoint(address));
        tokio::time::timeout(self.timeout, self.inner.fetch_state(address))
            .await
            .map_err(|_| GatewayError::Timeout {
                address,
                timeout: self.timeout,
            })?
    }

    async fn push_defaults(&self, defaults: &Defaults, address: IpAddr) -> Result<()> {
        tracing::debug!("Pushing settings {:?} to {}", defaults, endpoint(address));
        tokio::time::timeout(self.timeout, self.inner.push_defaults(defaults, address))
            .await
            .map_err(|_| GatewayError::Timeout {
                address,
                timeout: self.timeout,
            })?
    }
}
