//! Configuration for the motion logger.

use crate::sensor::iio::DEFAULT_IIO_PATH;
use crate::sensor::types::SensorKind;
use crate::session::controller::ControllerConfig;
use crate::session::events::DEFAULT_LIVE_CADENCE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration for the logger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root for logs and the ledger
    pub data_path: PathBuf,

    /// Publish every Nth sample as a live event
    pub live_cadence: u32,

    /// Polling rate for hardware and synthetic sources
    pub sample_rate_hz: u32,

    /// Which sensor kinds to subscribe
    pub sources: SourceConfig,

    /// Where IIO devices are enumerated
    pub iio_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("motion-logger");

        Self {
            data_path: data_dir,
            live_cadence: DEFAULT_LIVE_CADENCE,
            sample_rate_hz: 50,
            sources: SourceConfig::default(),
            iio_path: PathBuf::from(DEFAULT_IIO_PATH),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `config_path`, or defaults if it does not exist.
    pub fn load_from(config_path: &Path) -> Result<Self, ConfigError> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, config_path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("motion-logger")
            .join("config.json")
    }

    /// Reject values the logger cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.live_cadence == 0 {
            return Err(ConfigError::Invalid("live_cadence must be at least 1".into()));
        }
        if self.sample_rate_hz == 0 {
            return Err(ConfigError::Invalid("sample_rate_hz must be at least 1".into()));
        }
        if !self.sources.any_enabled() {
            return Err(ConfigError::Invalid("at least one sensor must be enabled".into()));
        }
        Ok(())
    }

    /// Directory holding one CSV per session.
    pub fn logs_dir(&self) -> PathBuf {
        self.data_path.join("logs")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_path.join("ledger.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(self.logs_dir())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Settings for a [`crate::SessionController`].
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            logs_dir: self.logs_dir(),
            kinds: self.sources.kinds(),
            live_cadence: self.live_cadence,
        }
    }
}

/// Which sensor kinds to subscribe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub accel: bool,
    pub gyro: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            accel: true,
            gyro: true,
        }
    }
}

impl SourceConfig {
    /// Parse source configuration from a comma-separated string.
    pub fn from_csv(s: &str) -> Self {
        let sources: Vec<String> = s.split(',').map(|s| s.trim().to_lowercase()).collect();
        let has = |names: &[&str]| sources.iter().any(|s| s == "all" || names.contains(&s.as_str()));

        Self {
            accel: has(&["accel", "acc", "accelerometer"]),
            gyro: has(&["gyro", "gyroscope"]),
        }
    }

    /// Check if at least one source is enabled.
    pub fn any_enabled(&self) -> bool {
        self.accel || self.gyro
    }

    pub fn kinds(&self) -> Vec<SensorKind> {
        let mut kinds = Vec::new();
        if self.accel {
            kinds.push(SensorKind::Accel);
        }
        if self.gyro {
            kinds.push(SensorKind::Gyro);
        }
        kinds
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
