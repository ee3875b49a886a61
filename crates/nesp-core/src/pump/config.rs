//! Session configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::protocol::{DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS};

/// Delay between status polls while waiting for a run to finish
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Pump session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PumpConfig {
    /// Bus address (0-99)
    pub address: u8,
    /// Baud rate, used when opening a serial port
    pub baud_rate: u32,
    /// Reply timeout in milliseconds
    pub timeout_ms: u64,
    /// Status polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Safe mode timeout in seconds applied at connect; 0 keeps basic mode
    pub safe_mode_timeout: u8,
    /// Model number the connected pump must report, e.g. "1000"
    pub expected_model: Option<String>,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            address: 0,
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            safe_mode_timeout: 0,
            expected_model: None,
        }
    }
}

impl PumpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
