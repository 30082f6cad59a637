//! Hand-off of completed polls from device workers to the result consumer
//!
//! Many workers produce, one task consumes. The queue is bounded, so a slow
//! consumer blocks the worker that is trying to deliver; every other worker
//! keeps its own schedule until it, too, has something to deliver.

use device_registry::{DeviceId, DeviceState};
use tokio::sync::mpsc;

/// Telemetry fetched by one successful poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub device_id: DeviceId,
    pub state: DeviceState,
}

pub type ResultSender = mpsc::Sender<PollOutcome>;
pub type ResultReceiver = mpsc::Receiver<PollOutcome>;

/// Create the result queue
///
/// A capacity of 1 is the closest tokio gets to an unbuffered rendezvous;
/// zero is rounded up.
pub fn result_queue(capacity: usize) -> (ResultSender, ResultReceiver) {
    mpsc::channel(capacity.max(1))
}
