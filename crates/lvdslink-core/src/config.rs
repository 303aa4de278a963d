//! Bridge configuration
//!
//! Timing and line settings for one bridge channel, loadable from JSON so
//! deployment scripts can keep per-board overrides next to the device links.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bridge::{
    TransportError, DEFAULT_BAUD_RATE, DEFAULT_POLL_INTERVAL_MS, DEFAULT_SETTLE_MS,
    DEFAULT_START_TIMEOUT_MS,
};
use crate::tamarisk::TAMARISK_BAUD_RATE;

/// Default bridge device node when no `/dev/links/lvds*` link exists
pub const DEFAULT_DEVICE_PATH: &str = "/dev/v4l-subdev1";

/// Configuration for one bridge serial channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Bridge device node
    pub device_path: PathBuf,
    /// Emulated UART line rate
    pub baud_rate: u32,
    /// How long to wait for the first response byte
    pub start_timeout_ms: u64,
    /// Quiet time after the last byte before a response counts as complete
    pub settle_ms: u64,
    /// Receive-count polling period
    pub poll_interval_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from(DEFAULT_DEVICE_PATH),
            baud_rate: DEFAULT_BAUD_RATE,
            start_timeout_ms: DEFAULT_START_TIMEOUT_MS,
            settle_ms: DEFAULT_SETTLE_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl BridgeConfig {
    /// Default settings for `device_path`
    pub fn new(device_path: impl Into<PathBuf>) -> Self {
        Self {
            device_path: device_path.into(),
            ..Self::default()
        }
    }

    /// Settings for a Tamarisk thermal core, which ships at 57600 baud
    pub fn tamarisk(device_path: impl Into<PathBuf>) -> Self {
        Self {
            baud_rate: TAMARISK_BAUD_RATE,
            ..Self::new(device_path)
        }
    }

    /// Same settings with a different line rate
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, TransportError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| TransportError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| TransportError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&content)
    }

    /// Reject settings the polling loop cannot work with
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.baud_rate == 0 {
            return Err(TransportError::Config("baud_rate must be non-zero".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(TransportError::Config(
                "poll_interval_ms must be non-zero".into(),
            ));
        }
        if self.device_path.as_os_str().is_empty() {
            return Err(TransportError::Config("device_path is empty".into()));
        }
        Ok(())
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
