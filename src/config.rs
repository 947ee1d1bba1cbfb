//! Run configuration.
//!
//! A [`Config`] is built once per invocation, from a TOML file when one is
//! found, and is treated as immutable for the rest of the run. Command-line
//! values are layered on top by the binary before the sweep starts.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// System-wide config location checked when `--config` is not given.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/callsweep/config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Master switch. When false every run is a dry run, whatever the
    /// caller asked for.
    /// Default: true
    #[serde(default = "default_cleanup_enabled")]
    pub cleanup_enabled: bool,

    /// Directory holding the recordings.
    #[serde(default)]
    pub recordings_dir: Option<PathBuf>,

    /// File extensions treated as recordings (case-insensitive).
    /// Default: wav, mp3, gsm, ogg
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Descend into subdirectories of `recordings_dir`.
    /// Default: false (direct children only)
    #[serde(default)]
    pub recursive: bool,

    /// Files modified more recently than this are left out of the inventory,
    /// since the telephony application may still be writing them.
    /// Default: 0 (consider every file)
    #[serde(default)]
    pub min_file_age_minutes: u64,

    /// Lock file guarding against overlapping runs.
    /// Default: `callsweep.lock` in the system temp directory
    #[serde(default)]
    pub lock_file: Option<PathBuf>,

    #[serde(default)]
    pub time_based: TimeBasedConfig,

    #[serde(default)]
    pub disk_based: DiskBasedConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cleanup_enabled: default_cleanup_enabled(),
            recordings_dir: None,
            extensions: default_extensions(),
            recursive: false,
            min_file_age_minutes: 0,
            lock_file: None,
            time_based: TimeBasedConfig::default(),
            disk_based: DiskBasedConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_cleanup_enabled() -> bool {
    true
}

fn default_extensions() -> Vec<String> {
    ["wav", "mp3", "gsm", "ogg"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Defaults for the age-based policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeBasedConfig {
    /// Recordings strictly older than this many days are removed.
    /// Default: 90
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for TimeBasedConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
        }
    }
}

fn default_retention_days() -> u32 {
    90
}

/// Defaults for the disk-pressure policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiskBasedConfig {
    /// Cleanup starts once usage is above this percentage.
    /// Default: 85
    #[serde(default = "default_threshold_percent")]
    pub threshold_percent: u8,

    /// Cleanup stops once usage is back down to this percentage.
    /// Default: 75
    #[serde(default = "default_target_percent")]
    pub target_percent: u8,
}

impl Default for DiskBasedConfig {
    fn default() -> Self {
        Self {
            threshold_percent: default_threshold_percent(),
            target_percent: default_target_percent(),
        }
    }
}

fn default_threshold_percent() -> u8 {
    85
}

fn default_target_percent() -> u8 {
    75
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default: pretty
    #[serde(default)]
    pub format: LogFormat,

    /// Filter directive, overridden by `RUST_LOG`.
    /// Default: info
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the system config and then
    /// the per-user config (`<config dir>/callsweep/config.toml`) are tried,
    /// falling back to built-in defaults when neither exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        for candidate in Self::search_paths() {
            if candidate.is_file() {
                return Self::from_file(&candidate);
            }
        }
        Ok(Self::default())
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(SYSTEM_CONFIG_PATH)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("callsweep").join("config.toml"));
        }
        paths
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check everything that can be checked without touching the filesystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extensions.iter().all(|e| e.trim_start_matches('.').is_empty()) {
            return Err(ConfigError::NoExtensions);
        }
        if self.recordings_dir.is_none() {
            return Err(ConfigError::NoDirectory);
        }
        if self.time_based.retention_days == 0 {
            return Err(ConfigError::ZeroRetention);
        }
        check_disk_thresholds(
            self.disk_based.threshold_percent,
            self.disk_based.target_percent,
        )
    }

    pub fn lock_path(&self) -> PathBuf {
        self.lock_file
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("callsweep.lock"))
    }
}

/// Both percentages in range and the target strictly below the threshold;
/// otherwise a disk-based run could never finish.
pub fn check_disk_thresholds(threshold: u8, target: u8) -> Result<(), ConfigError> {
    if threshold > 100 {
        return Err(ConfigError::PercentOutOfRange {
            name: "threshold_percent",
            value: threshold,
        });
    }
    if target > 100 {
        return Err(ConfigError::PercentOutOfRange {
            name: "target_percent",
            value: target,
        });
    }
    if target >= threshold {
        return Err(ConfigError::TargetNotBelowThreshold { threshold, target });
    }
    Ok(())
}
