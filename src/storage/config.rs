//! Rider and race configuration.
//!
//! Stored as TOML in the platform data directory. A missing file yields
//! defaults; a partial file fills unspecified keys with defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::racing::gradient::{
    DEFAULT_DEADBAND_PERCENT, DEFAULT_SEND_INTERVAL_SECS, DEFAULT_SMOOTHING_FACTOR,
    MAX_DIFFICULTY, MAX_SEND_INTERVAL_SECS, MIN_DIFFICULTY, MIN_SEND_INTERVAL_SECS,
};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application version
    pub version: String,
    /// Data directory path
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Rider settings
    pub rider: RiderSettings,
    /// Race settings
    pub race: RaceSettings,
    /// Trainer settings
    pub trainer: TrainerSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: PathBuf::new(),
            rider: RiderSettings::default(),
            race: RaceSettings::default(),
            trainer: TrainerSettings::default(),
        }
    }
}

impl AppConfig {
    /// Reject values the race loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::InvalidValue(msg.to_string()));

        if !(self.rider.weight_lbs > 0.0) {
            return invalid("rider.weight_lbs must be positive");
        }
        if self.race.laps == 0 {
            return invalid("race.laps must be at least 1");
        }
        if self.race.tick_interval_ms == 0 {
            return invalid("race.tick_interval_ms must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.race.smoothing_factor) {
            return invalid("race.smoothing_factor must be within 0..=1");
        }
        if !(MIN_SEND_INTERVAL_SECS..=MAX_SEND_INTERVAL_SECS)
            .contains(&self.race.gradient_interval_secs)
        {
            return invalid("race.gradient_interval_secs must be within 5..=10");
        }
        if !(self.race.gradient_deadband >= 0.0) {
            return invalid("race.gradient_deadband must not be negative");
        }
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&self.race.difficulty) {
            return invalid("race.difficulty must be within 0.5..=1.5");
        }
        Ok(())
    }
}

/// Rider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiderSettings {
    /// Name shown on records and high scores
    pub name: String,
    /// Rider weight in pounds
    pub weight_lbs: f64,
}

impl Default for RiderSettings {
    fn default() -> Self {
        Self {
            name: "Rider".to_string(),
            weight_lbs: 175.0,
        }
    }
}

/// Race settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceSettings {
    /// Course to race, by id
    pub course_id: Option<String>,
    /// GPX file imported as a course before racing
    pub gpx_path: Option<PathBuf>,
    /// Laps per session
    pub laps: u32,
    /// Countdown length in seconds
    pub countdown_secs: u32,
    /// Race loop period in milliseconds
    pub tick_interval_ms: u64,
    /// Per-tick gradient smoothing factor
    pub smoothing_factor: f64,
    /// Seconds between averaged gradient writes
    pub gradient_interval_secs: f64,
    /// Minimum gradient change in percent worth sending
    pub gradient_deadband: f64,
    /// Gradient scaling (0.5 = half as steep, 1.5 = half again)
    pub difficulty: f64,
    /// Checkpoints per course
    pub checkpoint_count: usize,
    /// Drive ERG mode at this wattage instead of simulating the route
    pub erg_watts: Option<u16>,
}

impl Default for RaceSettings {
    fn default() -> Self {
        Self {
            course_id: None,
            gpx_path: None,
            laps: 1,
            countdown_secs: 3,
            tick_interval_ms: 16,
            smoothing_factor: DEFAULT_SMOOTHING_FACTOR,
            gradient_interval_secs: DEFAULT_SEND_INTERVAL_SECS,
            gradient_deadband: DEFAULT_DEADBAND_PERCENT,
            difficulty: 1.0,
            checkpoint_count: 1,
            erg_watts: None,
        }
    }
}

/// Trainer connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerSettings {
    /// Race on simulated power instead of a trainer
    pub use_simulator: bool,
    /// Starting simulated power in watts
    pub simulator_power: u16,
    /// Only connect to trainers whose name contains this
    pub device_name: Option<String>,
    /// Discovery timeout in seconds
    pub discovery_timeout_secs: u64,
    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,
}

impl Default for TrainerSettings {
    fn default() -> Self {
        Self {
            use_simulator: false,
            simulator_power: 100,
            device_name: None,
            discovery_timeout_secs: 30,
            connection_timeout_secs: 10,
        }
    }
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "kickr-racer", "KickrRacer")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// Load application configuration from the default location.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let mut config = load_config_from(&get_config_path())?;
    config.data_dir = get_data_dir();
    Ok(config)
}

/// Load configuration from `path`, falling back to defaults if it is absent.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let mut config = if path.exists() {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        toml::from_str::<AppConfig>(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?
    } else {
        tracing::debug!("No config at {}, using defaults", path.display());
        AppConfig::default()
    };

    config.data_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(get_data_dir);
    config.validate()?;

    Ok(config)
}

/// Save application configuration to the default location.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &get_config_path())
}

/// Save configuration to `path`, creating parent directories.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}
