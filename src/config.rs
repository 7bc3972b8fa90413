/*!
 * Configuration types for Chronos
 *
 * Detection thresholds require on-site calibration (target a resting
 * differential of ~0 Pa), so everything that tunes the detector, the
 * heartbeat, or the activity classifier is externally supplied: a TOML file
 * first, then `CHRONOS_*` environment variable overrides. None of these
 * values affect the chain algorithm itself.
 */

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::Level;

use crate::error::{ChronosError, Result};

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// Main configuration for the tracker and tooling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChronosConfig {
    /// Differential-pressure drop that opens an event (Pa, positive)
    #[serde(default = "default_attack_threshold_pa")]
    pub attack_threshold_pa: f64,

    /// Weaker threshold that keeps an open event alive (Pa, positive).
    /// Must be strictly below `attack_threshold_pa`; the gap is the
    /// hysteresis band.
    #[serde(default = "default_attack_end_threshold_pa")]
    pub attack_end_threshold_pa: f64,

    /// Sampling rate of the cooperative loop
    #[serde(default = "default_sample_hz")]
    pub sample_hz: u32,

    /// Interval between heartbeat entries
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    /// Vibration magnitude at or below which the wearer counts as Still
    #[serde(default = "default_activity_still_max")]
    pub activity_still_max: f64,

    /// Vibration magnitude at or above which the wearer counts as Moving
    #[serde(default = "default_activity_moving_min")]
    pub activity_moving_min: f64,

    /// Path of the chained attack log
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,

    /// Deadline for one durable append to the chain log
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Upper bound on records parked in memory while storage is failing;
    /// beyond it the oldest parked record is dropped (with a warning) so a
    /// dead card cannot grow the queue without bound
    #[serde(default = "default_max_pending_records")]
    pub max_pending_records: usize,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Operational log file (None = stdout); distinct from the chain log
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_attack_threshold_pa() -> f64 {
    150.0
}

fn default_attack_end_threshold_pa() -> f64 {
    50.0
}

fn default_sample_hz() -> u32 {
    20
}

fn default_heartbeat_interval_secs() -> u64 {
    60
}

fn default_activity_still_max() -> f64 {
    1.2
}

fn default_activity_moving_min() -> f64 {
    2.5
}

fn default_log_path() -> PathBuf {
    PathBuf::from("attack_log.csv")
}

fn default_write_timeout_ms() -> u64 {
    500
}

fn default_max_pending_records() -> usize {
    256
}

impl Default for ChronosConfig {
    fn default() -> Self {
        Self {
            attack_threshold_pa: default_attack_threshold_pa(),
            attack_end_threshold_pa: default_attack_end_threshold_pa(),
            sample_hz: default_sample_hz(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            activity_still_max: default_activity_still_max(),
            activity_moving_min: default_activity_moving_min(),
            log_path: default_log_path(),
            write_timeout_ms: default_write_timeout_ms(),
            max_pending_records: default_max_pending_records(),
            log_level: LogLevel::default(),
            log_file: None,
        }
    }
}

impl ChronosConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Err(ChronosError::ConfigNotFound(path.clone()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config: ChronosConfig = toml::from_str(&contents)
            .map_err(|e| ChronosError::Config(format!("failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &PathBuf) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ChronosError::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `CHRONOS_*` environment variable overrides
    ///
    /// Recognized: `CHRONOS_ATTACK_THRESHOLD_PA`, `CHRONOS_ATTACK_END_THRESHOLD_PA`,
    /// `CHRONOS_SAMPLE_HZ`, `CHRONOS_HEARTBEAT_INTERVAL_SECS`,
    /// `CHRONOS_ACTIVITY_STILL_MAX`, `CHRONOS_ACTIVITY_MOVING_MIN`,
    /// `CHRONOS_LOG_PATH`. An unparseable value is a configuration error,
    /// not a silent fallback.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        override_f64(&mut self.attack_threshold_pa, "CHRONOS_ATTACK_THRESHOLD_PA")?;
        override_f64(
            &mut self.attack_end_threshold_pa,
            "CHRONOS_ATTACK_END_THRESHOLD_PA",
        )?;
        override_parse(&mut self.sample_hz, "CHRONOS_SAMPLE_HZ")?;
        override_parse(
            &mut self.heartbeat_interval_secs,
            "CHRONOS_HEARTBEAT_INTERVAL_SECS",
        )?;
        override_f64(&mut self.activity_still_max, "CHRONOS_ACTIVITY_STILL_MAX")?;
        override_f64(&mut self.activity_moving_min, "CHRONOS_ACTIVITY_MOVING_MIN")?;
        if let Ok(value) = std::env::var("CHRONOS_LOG_PATH") {
            self.log_path = PathBuf::from(value);
        }
        Ok(())
    }

    /// Fail fast on an inconsistent configuration
    ///
    /// An end threshold at or above the onset threshold could never close an
    /// opened event, so the device refuses to start logging with one.
    pub fn validate(&self) -> Result<()> {
        if !self.attack_threshold_pa.is_finite() || self.attack_threshold_pa <= 0.0 {
            return Err(ChronosError::Config(format!(
                "attack_threshold_pa must be a positive number of Pascals, got {}",
                self.attack_threshold_pa
            )));
        }
        if !self.attack_end_threshold_pa.is_finite() || self.attack_end_threshold_pa <= 0.0 {
            return Err(ChronosError::Config(format!(
                "attack_end_threshold_pa must be a positive number of Pascals, got {}",
                self.attack_end_threshold_pa
            )));
        }
        if self.attack_end_threshold_pa >= self.attack_threshold_pa {
            return Err(ChronosError::Config(format!(
                "attack_end_threshold_pa ({}) must be below attack_threshold_pa ({}); \
                 an inverted hysteresis band can never close an event",
                self.attack_end_threshold_pa, self.attack_threshold_pa
            )));
        }
        if self.sample_hz == 0 {
            return Err(ChronosError::Config(
                "sample_hz must be at least 1".to_string(),
            ));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(ChronosError::Config(
                "heartbeat_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.max_pending_records == 0 {
            return Err(ChronosError::Config(
                "max_pending_records must be at least 1".to_string(),
            ));
        }
        if self.activity_still_max > self.activity_moving_min {
            return Err(ChronosError::Config(format!(
                "activity_still_max ({}) must not exceed activity_moving_min ({})",
                self.activity_still_max, self.activity_moving_min
            )));
        }
        Ok(())
    }

    /// Period of one sampling tick
    pub fn sample_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.sample_hz as f64)
    }

    /// Deadline for one durable append
    pub fn write_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.write_timeout_ms)
    }
}

fn override_f64(slot: &mut f64, var: &str) -> Result<()> {
    if let Ok(value) = std::env::var(var) {
        *slot = value
            .parse::<f64>()
            .map_err(|_| ChronosError::Config(format!("{} is not a number: {:?}", var, value)))?;
    }
    Ok(())
}

fn override_parse<T: std::str::FromStr>(slot: &mut T, var: &str) -> Result<()> {
    if let Ok(value) = std::env::var(var) {
        *slot = value
            .parse::<T>()
            .map_err(|_| ChronosError::Config(format!("{} is invalid: {:?}", var, value)))?;
    }
    Ok(())
}
