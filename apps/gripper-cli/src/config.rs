use anyhow::{Context, Result};
use gripper_serial::{SessionConfig, DEFAULT_BAUD_RATE, USB_SERIAL_FILTER};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub baud_rate: u32,
    pub port_filter: String,
    /// How often the sensor panel samples the latest reading.
    pub poll_interval_ms: u64,
    pub stale_after_ms: u64,
    pub session: SessionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            port_filter: USB_SERIAL_FILTER.to_string(),
            poll_interval_ms: 100,
            stale_after_ms: 1000,
            session: SessionConfig::default(),
        }
    }
}

impl Config {
    /// Read `path` if it exists, otherwise fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}
