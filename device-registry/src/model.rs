//! Device data model
//!
//! Field names follow the JSON layout devices and management clients already
//! speak (camelCase), so the same types serve the registry file, the device
//! state payload and the management API.

use std::fmt;
use std::net::{IpAddr, Ipv6Addr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default state polling interval for newly created devices
pub const DEFAULT_POLLING_INTERVAL_SECS: u32 = 600;

/// Unique identifier for a managed device
///
/// Opaque to the registry; typically the instance code printed on the device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        DeviceId::new(s)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        DeviceId::new(s)
    }
}

/// Settings pushed to the device itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Defaults {
    pub instance: String,
    pub tx_power: i32,
    pub poll_period: i32,
    #[serde(default)]
    pub display_type: String,
    #[serde(default)]
    pub hw_version: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            instance: "0000".to_string(),
            tx_power: 0,
            poll_period: 1000,
            display_type: String::new(),
            hw_version: String::new(),
        }
    }
}

/// Link quality information for the device's mesh parent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentInfo {
    pub rloc16: String,
    pub link_quality_in: i32,
    pub link_quality_out: i32,
    pub avg_rssi: i32,
    pub latest_rssi: i32,
}

/// Telemetry reported by a device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    #[serde(default)]
    pub addresses: Vec<IpAddr>,
    /// Supply voltage in millivolts
    pub vcc: i32,
    pub instance: String,
    pub tx_power: i32,
    pub poll_period: i32,
    pub parent: ParentInfo,
}

/// Server-side configuration of a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    /// Address used to reach the device, unknown until it first reports in
    pub main_ip: Option<IpAddr>,
    pub state_polling_enabled: bool,
    pub state_polling_interval_sec: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            main_ip: None,
            state_polling_enabled: false,
            state_polling_interval_sec: DEFAULT_POLLING_INTERVAL_SECS,
        }
    }
}

impl DeviceConfig {
    /// Project this configuration onto the polling policy
    ///
    /// A device cannot be polled without an address or with a zero interval,
    /// so polling is reported as disabled in either case.
    pub fn polling_config(&self) -> PollingConfig {
        match self.main_ip {
            Some(address) => PollingConfig {
                enabled: self.state_polling_enabled && self.state_polling_interval_sec > 0,
                interval_seconds: self.state_polling_interval_sec,
                target_address: address,
            },
            None => PollingConfig {
                enabled: false,
                interval_seconds: self.state_polling_interval_sec,
                target_address: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            },
        }
    }
}

/// A registered device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub defaults: Defaults,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<DeviceState>,
    pub config: DeviceConfig,
}

/// Desired polling policy for one device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    pub enabled: bool,
    pub interval_seconds: u32,
    pub target_address: IpAddr,
}

impl PollingConfig {
    pub fn enabled(interval_seconds: u32, target_address: IpAddr) -> Self {
        Self {
            enabled: true,
            interval_seconds,
            target_address,
        }
    }

    pub fn disabled(interval_seconds: u32, target_address: IpAddr) -> Self {
        Self {
            enabled: false,
            interval_seconds,
            target_address,
        }
    }

    /// Polling interval as a `Duration`
    pub fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval_seconds))
    }
}
