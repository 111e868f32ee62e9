//! Non-interactive CLI flag surface (§6). The interactive menu the original
//! tool drives its configuration from is out of scope; this only needs to
//! produce a `RunConfig` a caller can hand straight to the coordinator or
//! batch runner.

use crate::error::{ConfigError, Result};
use crate::models::{DiskBlockSize, DiskMode, PoolBlockSize, PoolBlockSizeWrapper, RunConfig};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "tn_bench", about = "ZFS pool benchmark and telemetry harness")]
pub struct Cli {
    /// Run non-interactively using flag values instead of the (unimplemented) menu.
    #[arg(long, alias = "auto")]
    pub unattended: bool,

    /// Comma-separated pool names to benchmark.
    #[arg(long, value_delimiter = ',')]
    pub pools: Vec<String>,

    #[arg(long, default_value_t = 2)]
    pub zfs_iterations: u32,

    #[arg(long, default_value_t = 0)]
    pub disk_iterations: u32,

    #[arg(long, default_value = "1M")]
    pub pool_block_size: String,

    #[arg(long, default_value = "1M")]
    pub disk_block_size: String,

    /// Comma-separated subset of {serial, parallel, seek_stress}.
    #[arg(long, value_delimiter = ',')]
    pub disk_modes: Vec<String>,

    #[arg(long, default_value_t = 4)]
    pub seek_threads: u32,

    #[arg(long, default_value_t = true)]
    pub cleanup: bool,

    /// Path to a single-run config file (JSON or YAML), applied before flags.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to a batch config file (JSON or YAML); mutually exclusive with `--config`.
    #[arg(long)]
    pub batch: Option<PathBuf>,

    #[arg(long, default_value = "./tn_bench_results.json")]
    pub output: PathBuf,

    /// Skip the confirmation prompt the interactive menu would show.
    #[arg(long)]
    pub confirm: bool,
}

fn parse_disk_mode(s: &str) -> Result<DiskMode> {
    match s.trim() {
        "serial" => Ok(DiskMode::Serial),
        "parallel" => Ok(DiskMode::Parallel),
        "seek_stress" => Ok(DiskMode::SeekStress),
        other => Err(ConfigError::InvalidBlockSize(format!("unknown disk mode: {other}")).into()),
    }
}

fn parse_disk_block_size(s: &str) -> Result<DiskBlockSize> {
    match s.trim().to_uppercase().as_str() {
        "4K" => Ok(DiskBlockSize::K4),
        "32K" => Ok(DiskBlockSize::K32),
        "128K" => Ok(DiskBlockSize::K128),
        "1M" => Ok(DiskBlockSize::M1),
        other => Err(ConfigError::InvalidBlockSize(other.to_string()).into()),
    }
}

/// Both thread-count sweeps cap at 100 iterations; the menu-driven original
/// this was lifted from treats anything above that as a typo, not a request.
fn validate_iterations(n: u32) -> Result<()> {
    if n > 100 {
        return Err(ConfigError::IterationsOutOfRange(n as i64).into());
    }
    Ok(())
}

/// Build a `RunConfig` from parsed flags, optionally layered on top of a
/// `--config` base file (flags win over the file, matching the batch
/// overlay's "run wins" rule). Validation runs before any run starts, so a
/// bad flag never costs partial work (§6 exit-code contract).
pub fn build_run_config(cli: &Cli) -> Result<RunConfig> {
    if cli.unattended && !cli.confirm {
        return Err(ConfigError::MissingConfirmation.into());
    }
    validate_iterations(cli.zfs_iterations)?;
    validate_iterations(cli.disk_iterations)?;

    let mut config = match &cli.config {
        Some(path) => crate::config::loader::load_config_from_file(path)?,
        None => RunConfig::default(),
    };

    if !cli.pools.is_empty() {
        config.selected_pools = cli.pools.clone();
    }
    config.zfs_iterations = cli.zfs_iterations;
    config.disk_iterations = cli.disk_iterations;
    config.pool_block_size = PoolBlockSizeWrapper(
        PoolBlockSize::from_str_loose(&cli.pool_block_size)
            .ok_or_else(|| ConfigError::InvalidBlockSize(cli.pool_block_size.clone()))?,
    );
    config.disk_block_size = parse_disk_block_size(&cli.disk_block_size)?;
    if !cli.disk_modes.is_empty() {
        config.disk_modes = cli
            .disk_modes
            .iter()
            .map(|s| parse_disk_mode(s))
            .collect::<Result<Vec<_>>>()?;
    }
    config.seek_threads = cli.seek_threads;
    config.cleanup = cli.cleanup;
    config.output_path = cli.output.clone();

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_unattended_invocation() {
        let cli = Cli::parse_from([
            "tn_bench",
            "--unattended",
            "--pools",
            "tank,backup",
            "--zfs-iterations",
            "3",
        ]);
        assert!(cli.unattended);
        assert_eq!(cli.pools, vec!["tank".to_string(), "backup".to_string()]);
        assert_eq!(cli.zfs_iterations, 3);
    }

    #[test]
    fn build_run_config_applies_pool_block_size() {
        let cli = Cli::parse_from(["tn_bench", "--pool-block-size", "4M"]);
        let config = build_run_config(&cli).unwrap();
        assert_eq!(config.pool_block_size.0, PoolBlockSize::M4);
    }

    #[test]
    fn build_run_config_rejects_unknown_disk_mode() {
        let cli = Cli::parse_from(["tn_bench", "--disk-modes", "bogus"]);
        assert!(build_run_config(&cli).is_err());
    }

    #[test]
    fn build_run_config_rejects_unattended_without_confirm() {
        let cli = Cli::parse_from(["tn_bench", "--unattended"]);
        assert!(build_run_config(&cli).is_err());
    }

    #[test]
    fn build_run_config_accepts_unattended_with_confirm() {
        let cli = Cli::parse_from(["tn_bench", "--unattended", "--confirm"]);
        assert!(build_run_config(&cli).is_ok());
    }

    #[test]
    fn build_run_config_rejects_iterations_over_cap() {
        let cli = Cli::parse_from(["tn_bench", "--zfs-iterations", "101"]);
        assert!(build_run_config(&cli).is_err());
    }
}
