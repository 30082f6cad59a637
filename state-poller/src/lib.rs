//! # state-poller
//!
//! Keeps live telemetry polling in line with per-device configuration.
//!
//! ## Architecture
//!
//! 1. **Reconciliation**: [`StatePollerService::refresh`] reads the polling
//!    configuration of every device and creates, reconfigures or stops
//!    workers until exactly the enabled devices are polled
//! 2. **Workers**: each [`DevicePoller`] runs one timer loop, fetching the
//!    device state every interval plus a random jitter
//! 3. **Result queue**: workers hand successful fetches to a bounded queue;
//!    a full queue only delays the worker that is delivering
//! 4. **Result consumer**: one task persists each result to the store and
//!    forwards it to the telemetry publisher
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use state_poller::{PollerConfig, StatePollerService};
//!
//! let registry = Arc::new(device_registry::Registry::open("devices.json")?);
//! let (publisher, messages) = telemetry::ChannelPublisher::new(64);
//!
//! let service = StatePollerService::new(registry, gateway, Arc::new(publisher), PollerConfig::default())?;
//! service.start().await?;
//! ```

pub mod config;
pub mod error;
pub mod jitter;
pub mod logging;
pub mod poller;
pub mod queue;
pub mod service;

pub use config::PollerConfig;
pub use error::{PollerError, Result};
pub use jitter::Jitter;
pub use poller::{
    DevicePoller, DevicePollerFactory, PollerFactory, PollerPhase, PollerSettings, StatePoller,
};
pub use queue::{result_queue, PollOutcome, ResultReceiver, ResultSender};
pub use service::{PollingState, StatePollerService};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        PollOutcome, PollerConfig, PollerError, PollingState, Result, StatePoller,
        StatePollerService,
    };
}
