use crate::frame::DEFAULT_BUFFER_CAPACITY;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and sizing knobs of a device session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Upper bound on a single blocking read from the port.
    pub read_timeout_ms: u64,
    /// Reader sleep between polls.
    pub idle_sleep_ms: u64,
    /// Reader sleep after a channel error.
    pub error_backoff_ms: u64,
    /// How long stop/disconnect wait for the reader to exit.
    pub join_timeout_ms: u64,
    /// Inbound buffer size in characters.
    pub buffer_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: 1000,
            idle_sleep_ms: 10,
            error_backoff_ms: 100,
            join_timeout_ms: 1000,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl SessionConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}
