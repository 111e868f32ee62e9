//! tn-bench: a ZFS pool and disk benchmark/telemetry harness.
//!
//! The system is organized into functional modules:
//! - **error**: unified error type hierarchy
//! - **models**: core data structures and types
//! - **logging**: decoupled background-thread log persistence
//! - **config**: single-run and batch configuration loading/merging
//! - **platform**: NAS management API and subprocess adapter (C1)
//! - **dataset**: benchmark dataset lifecycle (C2)
//! - **workload**: parallel write/read workload driver (C3)
//! - **telemetry**: `zpool iostat`/`arcstat` collectors (C4)
//! - **phase_detector**: IOPS-stream phase classification (C5)
//! - **reducer**: summary statistics and named rollups (C6)
//! - **coordinator**: per-pool and whole-invocation orchestration (C7)
//! - **batch**: multi-run batch execution (C8)
//! - **persistence**: result record serialisation (C9)
//! - **cli**: non-interactive flag surface (§6)

#![allow(dead_code)]

pub mod error;
pub mod models;

pub mod logging;

pub mod config;

pub mod platform;
pub mod dataset;
pub mod workload;
pub mod telemetry;
pub mod phase_detector;
pub mod reducer;
pub mod coordinator;
pub mod batch;
pub mod persistence;
pub mod cli;

// Re-export the log crate for macro usage
pub use log;

pub use error::{Error, Result};
pub use logging::{LogCollector, LogLine};
pub use models::{BenchmarkRecord, PoolInfo, PoolResult, RunConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_constant() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_error_reexport() {
        let _: Result<i32> = Ok(42);
    }

    #[test]
    fn test_run_config_reexport() {
        let _ = RunConfig::default();
    }
}
