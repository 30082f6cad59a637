//! # telemetry
//!
//! Forwarding of freshly polled device state to the message broker.
//!
//! [`TelemetryPublisher`] is the fire-and-forget sink the state poller feeds.
//! [`ChannelPublisher`] maps each state onto the broker topic and payload
//! layout and hands it to whatever task owns the broker connection.

mod message;

pub use message::{publish_data_for_state, DisplayStatus, PublishMessage, STATE_TAG};

use device_registry::DeviceState;
use tokio::sync::mpsc;

/// Sink for device telemetry
///
/// Publishing never reports failure to the caller; implementations log and
/// drop what they cannot deliver.
pub trait TelemetryPublisher: Send + Sync {
    fn publish(&self, state: &DeviceState);
}

/// Publisher handing encoded messages to a broker connection task
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::Sender<PublishMessage>,
}

impl ChannelPublisher {
    /// Create a publisher and the receiving end for the broker task
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<PublishMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl TelemetryPublisher for ChannelPublisher {
    fn publish(&self, state: &DeviceState) {
        let message = match publish_data_for_state(state, chrono::Utc::now()) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(
                    "Failed to publish state for device {}. Error: {}",
                    state.instance,
                    e
                );
                return;
            }
        };

        if let Err(e) = self.tx.try_send(message) {
            tracing::warn!(
                "Can't publish state for device {}: {}",
                state.instance,
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(instance: &str, vcc: i32) -> DeviceState {
        DeviceState {
            instance: instance.to_string(),
            vcc,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_channel_publisher_forwards_messages() {
        let (publisher, mut rx) = ChannelPublisher::new(4);

        publisher.publish(&state("A100", 2980));
        publisher.publish(&state("A101", 3010));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.topic, "/sensor/A100/d/state");
        let second = rx.recv().await.unwrap();
        assert_eq!(second.topic, "/sensor/A101/d/state");
    }

    #[tokio::test]
    async fn test_channel_publisher_drops_when_full() {
        let (publisher, mut rx) = ChannelPublisher::new(1);

        publisher.publish(&state("A100", 2980));
        publisher.publish(&state("A100", 2990));

        let message = rx.recv().await.unwrap();
        let status: DisplayStatus = serde_json::from_slice(&message.payload).unwrap();
        assert_eq!(status.vcc, 2980);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_publisher_survives_closed_receiver() {
        let (publisher, rx) = ChannelPublisher::new(1);
        drop(rx);

        publisher.publish(&state("A100", 2980));
    }
}
