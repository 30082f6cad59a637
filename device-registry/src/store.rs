//! Store interface consumed by the polling subsystem

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{DeviceId, DeviceState, PollingConfig};
use crate::registry::Registry;

/// Configuration and telemetry store as seen by the state poller
///
/// Configuration changes made through the management API must become
/// visible to `polling_configs` eventually; no staleness bound is required.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// Current polling policy of every registered device
    async fn polling_configs(&self) -> Result<HashMap<DeviceId, PollingConfig>>;

    /// Record the latest telemetry for a device
    async fn persist_state(&self, id: &DeviceId, state: &DeviceState) -> Result<()>;
}

/// File-backed registries write through synchronously on the calling task.
/// The file holds one small JSON entry per device, so the write is short
/// enough to stay on the runtime thread; a registry that outgrows that
/// should move `write_atomic` onto `tokio::task::spawn_blocking`.
#[async_trait]
impl DeviceStore for Registry {
    async fn polling_configs(&self) -> Result<HashMap<DeviceId, PollingConfig>> {
        Ok(self
            .devices()
            .into_iter()
            .map(|(id, device)| (id, device.config.polling_config()))
            .collect())
    }

    async fn persist_state(&self, id: &DeviceId, state: &DeviceState) -> Result<()> {
        self.update_state(id, state.clone())
    }
}
