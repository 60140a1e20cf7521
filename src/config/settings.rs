use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::link::LinkSettings;

pub const CONFIG_PATH_ENV: &str = "ROBOT_BRIDGE_CONFIG";
pub const DEVICE_ENV: &str = "ROBOT_BRIDGE_DEVICE";
pub const BAUD_ENV: &str = "ROBOT_BRIDGE_BAUD";

#[cfg(target_os = "windows")]
const DEFAULT_DEVICE_PATH: &str = "COM11";
#[cfg(not(target_os = "windows"))]
const DEFAULT_DEVICE_PATH: &str = "/dev/ttyUSB0";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Bridge settings, loaded from an optional JSON file plus environment overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    pub device_path: String,
    pub baud_rate: u32,
    pub poll_interval_ms: u64,
    pub read_timeout_ms: u64,
    /// How long connecting may wait on the OS to open the device.
    pub open_timeout_ms: u64,
    /// Blocking timeout for each write and flush on the open port.
    pub io_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            device_path: DEFAULT_DEVICE_PATH.to_string(),
            baud_rate: 9600,
            poll_interval_ms: 1500,
            read_timeout_ms: 25,
            open_timeout_ms: 1000,
            io_timeout_ms: 100,
        }
    }
}

impl BridgeConfig {
    /// Load from `path` if given, then apply process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                log::info!("Loading bridge config from {}", path.display());
                Self::from_json(&std::fs::read_to_string(path)?)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(device) = lookup(DEVICE_ENV) {
            self.device_path = device;
        }
        if let Some(baud) = lookup(BAUD_ENV) {
            self.baud_rate = baud.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{} is not a baud rate: {}", BAUD_ENV, baud))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_path.trim().is_empty() {
            return Err(ConfigError::Invalid("device_path is empty".to_string()));
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::Invalid("baud_rate must be positive".to_string()));
        }
        let timings = [
            ("poll_interval_ms", self.poll_interval_ms),
            ("read_timeout_ms", self.read_timeout_ms),
            ("open_timeout_ms", self.open_timeout_ms),
            ("io_timeout_ms", self.io_timeout_ms),
        ];
        if let Some((name, _)) = timings.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{} must be positive", name)));
        }
        Ok(())
    }

    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            read_timeout_ms: self.read_timeout_ms,
        }
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}
