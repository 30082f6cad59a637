//! Randomized poll delays
//!
//! Devices sharing an interval would otherwise be polled in lockstep once
//! their workers were started by the same refresh.

use std::time::Duration;

use rand::Rng;

/// Source of uniformly distributed delays in `[0, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jitter {
    max: Duration,
}

impl Jitter {
    pub const fn new(max: Duration) -> Self {
        Self { max }
    }

    /// Jitter that always yields zero
    pub const fn none() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Draw a delay, millisecond resolution
    pub fn sample(&self) -> Duration {
        if self.max.is_zero() {
            return Duration::ZERO;
        }
        let max_ms = u64::try_from(self.max.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }
}

impl Default for Jitter {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}
