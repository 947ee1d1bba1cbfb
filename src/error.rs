use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Invalid or unreadable configuration. Fatal, raised before scanning.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("retention_days must be a positive number of days")]
    ZeroRetention,

    #[error("{name} must be between 0 and 100, got {value}")]
    PercentOutOfRange { name: &'static str, value: u8 },

    #[error("target_percent ({target}) must be lower than threshold_percent ({threshold})")]
    TargetNotBelowThreshold { threshold: u8, target: u8 },

    #[error("at least one recording file extension must be configured")]
    NoExtensions,

    #[error("no recordings directory configured (set recordings_dir or pass --dir)")]
    NoDirectory,
}

/// The recordings directory could not be enumerated. Fatal, raised before planning.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("recordings directory {0} does not exist")]
    NotFound(PathBuf),

    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("cannot read recordings directory {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Filesystem capacity could not be read. Fatal, raised before planning.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("path {0} cannot be passed to statvfs")]
    InvalidPath(PathBuf),

    #[error("statvfs failed for {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("filesystem hosting {0} reports zero capacity")]
    ZeroCapacity(PathBuf),
}

/// A single planned file could not be removed. Recorded per file; never aborts a run.
#[derive(Debug, Error)]
pub enum DeletionError {
    #[error("file vanished before it could be removed")]
    Vanished,

    #[error("permission denied")]
    PermissionDenied,

    #[error("{0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for DeletionError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::Vanished,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Io(err),
        }
    }
}

/// Another run already holds the run lock, or the lock file is unusable.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("another cleanup run holds the lock {0}")]
    Held(PathBuf),

    #[error("cannot open lock file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors that abort a run before any deletion happens.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Lock(#[from] LockError),
}

pub type Result<T> = std::result::Result<T, SweepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_to_deletion_reasons() {
        let vanished: DeletionError = io::Error::from(io::ErrorKind::NotFound).into();
        assert!(matches!(vanished, DeletionError::Vanished));

        let denied: DeletionError = io::Error::from(io::ErrorKind::PermissionDenied).into();
        assert!(matches!(denied, DeletionError::PermissionDenied));
        assert_eq!(denied.to_string(), "permission denied");

        let other: DeletionError = io::Error::other("disk on fire").into();
        assert_eq!(other.to_string(), "disk on fire");
    }

    #[test]
    fn config_errors_render_their_parameters() {
        let err = ConfigError::TargetNotBelowThreshold {
            threshold: 80,
            target: 80,
        };
        assert_eq!(
            err.to_string(),
            "target_percent (80) must be lower than threshold_percent (80)"
        );
    }
}
