//! # device-registry
//!
//! Per-device configuration and last-known telemetry for a fleet of Thread
//! mesh sensor and display devices.
//!
//! The [`Registry`] keeps devices in memory and optionally writes every
//! mutation through to a JSON file. The [`DeviceStore`] trait is the narrow
//! view the state poller needs: the polling policy of every device, and a way
//! to record fresh telemetry.

pub mod error;
pub mod model;
pub mod registry;
pub mod store;

pub use error::{RegistryError, Result};
pub use model::{
    Defaults, Device, DeviceConfig, DeviceId, DeviceState, ParentInfo, PollingConfig,
    DEFAULT_POLLING_INTERVAL_SECS,
};
pub use registry::Registry;
pub use store::DeviceStore;
