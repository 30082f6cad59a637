//! Configuration for the state poller service

use std::time::Duration;

use crate::error::{PollerError, Result};

/// Configuration for the StatePollerService
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    /// Upper bound of the random delay added to every poll
    /// Default: 60 seconds
    pub max_jitter: Duration,

    /// Number of poll results that may wait for the consumer before
    /// producing workers block
    /// Default: 1
    pub result_queue_capacity: usize,

    /// How long `stop` waits for the result consumer to exit
    /// Default: 5 seconds
    pub stop_timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_jitter: Duration::from_secs(60),
            result_queue_capacity: 1,
            stop_timeout: Duration::from_secs(5),
        }
    }
}

impl PollerConfig {
    /// Create a new PollerConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a PollerConfig that polls exactly on the configured interval
    pub fn no_jitter() -> Self {
        Self {
            max_jitter: Duration::ZERO,
            ..Default::default()
        }
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if self.result_queue_capacity == 0 {
            return Err(PollerError::Configuration(
                "Result queue capacity must be greater than 0".to_string(),
            ));
        }

        if self.stop_timeout == Duration::ZERO {
            return Err(PollerError::Configuration(
                "Stop timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    pub fn with_result_queue_capacity(mut self, capacity: usize) -> Self {
        self.result_queue_capacity = capacity;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }
}
