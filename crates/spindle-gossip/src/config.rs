//! Engine configuration.

use crate::error::{GossipError, Result};
use std::time::Duration;

/// Default wait between idle iterations when nothing wakes the engine.
pub const DEFAULT_IDLE_POLL: Duration = Duration::from_millis(50);

/// Default capacity of the event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Configuration for the gossip engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on how long the run loop sleeps when an iteration made no
    /// progress. Also the retry cadence when no eligible peer is available.
    pub idle_poll: Duration,

    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            idle_poll: DEFAULT_IDLE_POLL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Sets the idle poll interval.
    pub fn with_idle_poll(mut self, idle_poll: Duration) -> Self {
        self.idle_poll = idle_poll;
        self
    }

    /// Checks the configuration for values the run loop cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.idle_poll.is_zero() {
            return Err(GossipError::InvalidConfig(
                "idle_poll must be greater than zero".into(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(GossipError::InvalidConfig(
                "event_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
