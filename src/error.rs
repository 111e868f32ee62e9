//! Unified error taxonomy for the benchmark harness.
//!
//! Each concern gets its own `thiserror` enum (mirrors the source this crate was
//! built from); all of them aggregate into one crate-wide [`Error`] via `#[from]`.

use thiserror::Error;

/// Platform adapter (C1): `midclt` calls and subprocess spawning.
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("resource busy: {0}")]
    Busy(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("transport error invoking '{cmd}': {reason}")]
    Transport { cmd: String, reason: String },

    #[error("failed to parse output of '{cmd}': {reason}")]
    Parse { cmd: String, reason: String },
}

/// Dataset manager (C2).
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("failed to create dataset on pool '{pool}': {reason}")]
    Creation { pool: String, reason: String },

    #[error("failed to delete dataset '{name}' after {attempts} attempts")]
    DeletionFailed { name: String, attempts: u32 },

    #[error("space check failed for pool '{pool}': {reason}")]
    SpaceCheckFailed { pool: String, reason: String },
}

/// Workload driver (C3).
#[derive(Error, Debug)]
pub enum WorkloadError {
    #[error("failed to spawn workload process: {0}")]
    SpawnFailed(String),

    #[error("workload cancelled")]
    Cancelled,

    #[error("I/O error during workload: {0}")]
    Io(#[from] std::io::Error),
}

/// Telemetry collectors (C4). Parse errors are logged and dropped per the
/// error-handling design (§7); only spawn failures propagate.
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("failed to spawn telemetry binary '{binary}': {reason}")]
    SpawnFailed { binary: String, reason: String },

    #[error("telemetry collector already running")]
    AlreadyRunning,
}

/// Configuration (CLI flags, batch files).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid block size: {0}")]
    InvalidBlockSize(String),

    #[error("iterations out of range (0..=100): {0}")]
    IterationsOutOfRange(i64),

    #[error("unknown pool: {0}")]
    UnknownPool(String),

    #[error("--unattended and batch mode require --confirm")]
    MissingConfirmation,

    #[error("failed to parse batch config '{path}': {reason}")]
    BatchParse { path: String, reason: String },

    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error reading config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Crate-wide error type. All component errors land here.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Workload(#[from] WorkloadError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("run cancelled by user")]
    Interrupted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// User-facing categorised line, per §7 ("every error prints a categorised
    /// warning/error line to the terminal").
    pub fn user_message(&self) -> String {
        match self {
            Error::Platform(e) => format!("[platform] {e}"),
            Error::Dataset(e) => format!("[dataset] {e}"),
            Error::Workload(e) => format!("[workload] {e}"),
            Error::Telemetry(e) => format!("[telemetry] {e}"),
            Error::Config(e) => format!("[config] {e}"),
            Error::Interrupted => "[interrupt] run cancelled by user".to_string(),
            Error::Io(e) => format!("[io] {e}"),
            Error::Json(e) => format!("[json] {e}"),
            Error::Yaml(e) => format!("[yaml] {e}"),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_error_display() {
        let err = PlatformError::Transport {
            cmd: "midclt call pool.query".to_string(),
            reason: "exit code 1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "transport error invoking 'midclt call pool.query': exit code 1"
        );
    }

    #[test]
    fn dataset_error_display() {
        let err = DatasetError::DeletionFailed {
            name: "tank/tn-bench".to_string(),
            attempts: 3,
        };
        assert_eq!(
            err.to_string(),
            "failed to delete dataset 'tank/tn-bench' after 3 attempts"
        );
    }

    #[test]
    fn user_message_categorises() {
        let err: Error = PlatformError::NotFound("tank".into()).into();
        assert!(err.user_message().starts_with("[platform]"));
    }

    #[test]
    fn result_alias_ok() {
        let r: Result<i32> = Ok(42);
        assert!(r.is_ok());
    }
}
