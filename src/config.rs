//! Configuration for the relay pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration, shared by both roles of the demo binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// How long a reading stays in the rolling window
    #[serde(with = "duration_serde")]
    pub retention_horizon: Duration,

    /// Liveness tick interval while measuring
    #[serde(with = "duration_serde")]
    pub tick_interval: Duration,

    /// Wake-guard timeout re-armed by each tick
    #[serde(with = "duration_serde")]
    pub wake_timeout: Duration,

    /// Simulated sensor settings
    pub sim: SimConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retention_horizon: Duration::from_secs(60),
            tick_interval: Duration::from_secs(1),
            wake_timeout: Duration::from_secs(60),
            sim: SimConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pulselink")
            .join("config.json")
    }
}

/// Settings for the simulated heart-rate source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Base rate the synthetic waveform swings around, in bpm
    pub base_bpm: f64,
    /// Samples per second
    pub sample_rate_hz: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            base_bpm: 72.0,
            sample_rate_hz: 1.0,
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
