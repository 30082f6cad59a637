//! Broker message layout for device state

use chrono::{DateTime, SecondsFormat, Utc};
use device_registry::{DeviceState, ParentInfo};
use serde::{Deserialize, Serialize};

/// Tag identifying display-device status messages
pub const STATE_TAG: &str = "d";

/// Body of a state message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayStatus {
    pub instance: String,
    pub tag: String,
    #[serde(rename = "ts")]
    pub timestamp: String,
    pub vcc: i32,
    pub parent: ParentInfo,
}

impl DisplayStatus {
    pub fn from_state(state: &DeviceState, ts: DateTime<Utc>) -> Self {
        Self {
            instance: state.instance.clone(),
            tag: STATE_TAG.to_string(),
            timestamp: ts.to_rfc3339_opts(SecondsFormat::Secs, true),
            vcc: state.vcc,
            parent: state.parent.clone(),
        }
    }
}

/// An encoded message ready for the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    /// At-least-once delivery
    pub qos: u8,
    /// Retained so late subscribers see the last known state
    pub retain: bool,
}

/// Build the broker message for a device state observed at `ts`
pub fn publish_data_for_state(
    state: &DeviceState,
    ts: DateTime<Utc>,
) -> serde_json::Result<PublishMessage> {
    let topic = format!("/sensor/{}/{}/state", state.instance, STATE_TAG);
    let payload = serde_json::to_vec(&DisplayStatus::from_state(state, ts))?;

    Ok(PublishMessage {
        topic,
        payload,
        qos: 1,
        retain: true,
    })
}
