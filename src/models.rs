//! Core data structures shared across the benchmark harness (spec §3).
//!
//! Block-size enums use a hand-rolled flexible `Deserialize` (accepting either
//! the canonical string form `"1M"` or a bare number of bytes) so batch config
//! overlays authored by hand don't have to match the wire format exactly.

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Block size for the pool workload driver and for dataset record size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PoolBlockSize {
    K16,
    K32,
    K64,
    K128,
    K256,
    K512,
    M1,
    M2,
    M4,
    M8,
    M16,
}

impl PoolBlockSize {
    pub fn bytes(self) -> u64 {
        match self {
            PoolBlockSize::K16 => 16 * 1024,
            PoolBlockSize::K32 => 32 * 1024,
            PoolBlockSize::K64 => 64 * 1024,
            PoolBlockSize::K128 => 128 * 1024,
            PoolBlockSize::K256 => 256 * 1024,
            PoolBlockSize::K512 => 512 * 1024,
            PoolBlockSize::M1 => 1024 * 1024,
            PoolBlockSize::M2 => 2 * 1024 * 1024,
            PoolBlockSize::M4 => 4 * 1024 * 1024,
            PoolBlockSize::M8 => 8 * 1024 * 1024,
            PoolBlockSize::M16 => 16 * 1024 * 1024,
        }
    }

    /// dd-style shorthand, also the record-size string passed to the platform
    /// API (uppercase, per §4.2).
    pub fn as_str(self) -> &'static str {
        match self {
            PoolBlockSize::K16 => "16K",
            PoolBlockSize::K32 => "32K",
            PoolBlockSize::K64 => "64K",
            PoolBlockSize::K128 => "128K",
            PoolBlockSize::K256 => "256K",
            PoolBlockSize::K512 => "512K",
            PoolBlockSize::M1 => "1M",
            PoolBlockSize::M2 => "2M",
            PoolBlockSize::M4 => "4M",
            PoolBlockSize::M8 => "8M",
            PoolBlockSize::M16 => "16M",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        let upper = s.trim().to_uppercase();
        Some(match upper.as_str() {
            "16K" => PoolBlockSize::K16,
            "32K" => PoolBlockSize::K32,
            "64K" => PoolBlockSize::K64,
            "128K" => PoolBlockSize::K128,
            "256K" => PoolBlockSize::K256,
            "512K" => PoolBlockSize::K512,
            "1M" => PoolBlockSize::M1,
            "2M" => PoolBlockSize::M2,
            "4M" => PoolBlockSize::M4,
            "8M" => PoolBlockSize::M8,
            "16M" => PoolBlockSize::M16,
            _ => return None,
        })
    }
}

impl<'de> Deserialize<'de> for PoolBlockSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct BlockSizeVisitor;

        impl<'de> Visitor<'de> for BlockSizeVisitor {
            type Value = PoolBlockSize;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a block size string like \"1M\" or a byte count")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                PoolBlockSize::from_str_loose(v)
                    .ok_or_else(|| de::Error::custom(format!("invalid pool block size: {v}")))
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                for variant in [
                    PoolBlockSize::K16,
                    PoolBlockSize::K32,
                    PoolBlockSize::K64,
                    PoolBlockSize::K128,
                    PoolBlockSize::K256,
                    PoolBlockSize::K512,
                    PoolBlockSize::M1,
                    PoolBlockSize::M2,
                    PoolBlockSize::M4,
                    PoolBlockSize::M8,
                    PoolBlockSize::M16,
                ] {
                    if variant.bytes() == v {
                        return Ok(variant);
                    }
                }
                Err(de::Error::custom(format!(
                    "{v} bytes is not one of the accepted pool block sizes"
                )))
            }
        }

        deserializer.deserialize_any(BlockSizeVisitor)
    }
}

/// Block size for the (out-of-scope-beyond-stub) disk benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiskBlockSize {
    #[serde(rename = "4K")]
    K4,
    #[serde(rename = "32K")]
    K32,
    #[serde(rename = "128K")]
    K128,
    #[serde(rename = "1M")]
    M1,
}

impl DiskBlockSize {
    pub fn bytes(self) -> u64 {
        match self {
            DiskBlockSize::K4 => 4 * 1024,
            DiskBlockSize::K32 => 32 * 1024,
            DiskBlockSize::K128 => 128 * 1024,
            DiskBlockSize::M1 => 1024 * 1024,
        }
    }
}

/// The three disk-benchmark capability variants named in spec §9's REDESIGN FLAGS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskMode {
    Serial,
    Parallel,
    SeekStress,
}

/// Newtype so `RunConfig` can derive `Default` while `PoolBlockSize` itself
/// has no natural zero variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolBlockSizeWrapper(pub PoolBlockSize);

impl Default for PoolBlockSizeWrapper {
    fn default() -> Self {
        PoolBlockSizeWrapper(PoolBlockSize::M1)
    }
}

/// Immutable run configuration, built by the CLI or batch layer (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub selected_pools: Vec<String>,
    pub zfs_iterations: u32,
    pub disk_iterations: u32,
    pub pool_block_size: PoolBlockSizeWrapper,
    pub disk_block_size: DiskBlockSize,
    pub disk_modes: Vec<DiskMode>,
    pub seek_threads: u32,
    pub collect_zpool_iostat: bool,
    pub zpool_iostat_interval_s: u32,
    pub zpool_iostat_warmup: u32,
    pub zpool_iostat_cooldown: u32,
    pub collect_arcstat: bool,
    pub arcstat_interval_s: u32,
    pub arcstat_warmup: u32,
    pub arcstat_cooldown: u32,
    pub cleanup: bool,
    pub force_cleanup: bool,
    pub retry_cleanup: u32,
    pub downsample_factor: u32,
    pub output_path: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            selected_pools: Vec::new(),
            zfs_iterations: 2,
            disk_iterations: 0,
            pool_block_size: PoolBlockSizeWrapper::default(),
            disk_block_size: DiskBlockSize::M1,
            disk_modes: Vec::new(),
            seek_threads: 4,
            collect_zpool_iostat: true,
            zpool_iostat_interval_s: 1,
            zpool_iostat_warmup: 3,
            zpool_iostat_cooldown: 3,
            collect_arcstat: true,
            arcstat_interval_s: 1,
            arcstat_warmup: 3,
            arcstat_cooldown: 3,
            cleanup: true,
            force_cleanup: false,
            retry_cleanup: 3,
            downsample_factor: 5,
            output_path: PathBuf::from("./tn_bench_results.json"),
        }
    }
}

/// Snapshot captured once per invocation (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub version: String,
    pub cpu_model: String,
    pub logical_cores: u32,
    pub physical_cores: u32,
    pub memory_bytes: u64,
    pub load_average_1m: f64,
    pub load_average_5m: f64,
    pub load_average_15m: f64,
    pub system_product: String,
}

/// A redundancy group of physical disks within a pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VdevInfo {
    pub name: String,
    pub vdev_type: String,
    pub disk_count: u32,
}

/// Per-pool snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolInfo {
    pub name: String,
    pub path: String,
    pub status: String,
    pub capacity_bytes: u64,
    pub topology: Vec<VdevInfo>,
}

/// Per-disk snapshot, pool membership resolved via a GUID map built once from
/// `PoolInfo` (unresolved disks map to `"none"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskInfo {
    pub name: String,
    pub model: String,
    pub serial: String,
    pub size_bytes: u64,
    pub zfs_guid: Option<String>,
    pub pool: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkloadPhase {
    Write,
    Read,
}

impl WorkloadPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkloadPhase::Write => "write",
            WorkloadPhase::Read => "read",
        }
    }
}

/// `(thread_count, phase, iteration_index)`, canonical label `"<threads>T-<phase>"`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorkloadSegment {
    pub thread_count: u32,
    pub phase: WorkloadPhase,
    pub iteration_index: u32,
}

impl WorkloadSegment {
    pub fn label(&self) -> String {
        format!("{}T-{}", self.thread_count, self.phase.as_str())
    }
}

/// One iteration's result: `(write_speed_mbps, read_speed_mbps, bytes_written)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IterationResult {
    pub write_speed_mbps: f64,
    pub read_speed_mbps: f64,
    pub bytes_written: u64,
}

/// Per-thread-count rollup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreadConfigResult {
    pub threads: u32,
    pub write_speeds: Vec<f64>,
    pub read_speeds: Vec<f64>,
    pub iterations: u32,
    pub bytes_written: u64,
}

impl ThreadConfigResult {
    pub fn average_write_speed(&self) -> f64 {
        average(&self.write_speeds)
    }

    pub fn average_read_speed(&self) -> f64 {
        average(&self.read_speeds)
    }
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Phase classification (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Warmup,
    SteadyState,
    Cooldown,
    Transition,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Warmup => "warmup",
            Phase::SteadyState => "steady_state",
            Phase::Cooldown => "cooldown",
            Phase::Transition => "transition",
        }
    }
}

/// A single row of pool-iostat telemetry (§3, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IostatSample {
    pub timestamp: f64,
    pub timestamp_iso: String,
    pub pool_name: String,
    pub capacity_used: String,
    pub capacity_avail: String,
    pub operations_read: f64,
    pub operations_write: f64,
    pub bandwidth_read: String,
    pub bandwidth_write: String,
    pub total_wait_read: String,
    pub total_wait_write: String,
    pub disk_wait_read: String,
    pub disk_wait_write: String,
    pub syncq_wait_read: String,
    pub syncq_wait_write: String,
    pub asyncq_wait_read: String,
    pub asyncq_wait_write: String,
    pub scrub_wait: String,
    pub trim_wait: String,
    pub phase: Option<Phase>,
    pub segment_label: String,
}

/// A single row of ARC telemetry (§3, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArcSample {
    pub timestamp: f64,
    pub hit_pct: f64,
    pub miss_pct: f64,
    pub arc_size_gib: f64,
    pub reads_per_sec: f64,
    pub hits_per_sec: f64,
    pub misses_per_sec: f64,
    pub demand_hit_pct: f64,
    pub demand_miss_pct: f64,
    pub prefetch_hit_pct: f64,
    pub prefetch_miss_pct: f64,
    pub mfu_size_pct: f64,
    pub mru_size_pct: f64,
    pub mfu_hits_per_sec: f64,
    pub mru_hits_per_sec: f64,
    pub l2_hit_pct: f64,
    pub l2_size_gib: f64,
    pub l2_bytes_mbps: f64,
    pub zfetch_hits_per_sec: f64,
    pub zfetch_misses_per_sec: f64,
    pub zfetch_issued_per_sec: f64,
    pub zfetch_ahead_per_sec: f64,
    pub segment_label: String,
}

/// `{phase, start_time, end_time, start_index, end_index, sample_count, segment_label}` (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseSpan {
    pub phase: Phase,
    pub start_time: f64,
    pub end_time: f64,
    pub start_index: usize,
    pub end_index: usize,
    pub sample_count: usize,
    pub segment_label: String,
}

impl PhaseSpan {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Per-collector telemetry stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IostatTelemetry {
    pub start_time: f64,
    pub end_time: f64,
    pub warmup_iterations: u32,
    pub cooldown_iterations: u32,
    pub samples: Vec<IostatSample>,
    pub phase_spans: Vec<PhaseSpan>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArcTelemetry {
    pub start_time: f64,
    pub end_time: f64,
    pub warmup_iterations: u32,
    pub cooldown_iterations: u32,
    pub has_l2arc: bool,
    pub samples: Vec<ArcSample>,
}

/// One pool's complete result (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolResult {
    pub info: PoolInfo,
    pub thread_results: Vec<ThreadConfigResult>,
    pub total_writes_gib: f64,
    pub dwpd: f64,
    pub duration_seconds: f64,
    pub zpool_iostat_telemetry: IostatTelemetry,
    pub arcstat_telemetry: ArcTelemetry,
    pub skipped: Option<String>,
}

/// Stub disk-benchmark result (capability interface only, §9 REDESIGN FLAGS).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskResult {
    pub name: String,
    pub model: String,
    pub serial: String,
    pub zfs_guid: Option<String>,
    pub pool: String,
    pub size_gib: f64,
    pub test_mode: String,
    pub speeds_mbps: Vec<f64>,
    pub iterations: u32,
}

impl DiskResult {
    pub fn average_speed_mbps(&self) -> f64 {
        average(&self.speeds_mbps)
    }
}

/// Whole-run record, stable schema `"1.0"` (§3, §4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    pub schema_version: String,
    pub start_timestamp: DateTime<Utc>,
    pub end_timestamp: DateTime<Utc>,
    pub duration_minutes: f64,
    pub config: RunConfig,
    pub system: SystemInfo,
    pub pools: Vec<PoolResult>,
    pub disks: Vec<DiskResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_block_size_round_trips_canonical_string() {
        assert_eq!(PoolBlockSize::from_str_loose("1m").unwrap().as_str(), "1M");
        assert_eq!(PoolBlockSize::M1.bytes(), 1024 * 1024);
    }

    #[test]
    fn pool_block_size_deserializes_from_bytes() {
        let v: PoolBlockSize = serde_json::from_str("1048576").unwrap();
        assert_eq!(v, PoolBlockSize::M1);
    }

    #[test]
    fn pool_block_size_rejects_unknown_string() {
        assert!(serde_json::from_str::<PoolBlockSize>("\"3M\"").is_err());
    }

    #[test]
    fn run_config_default_matches_spec_sizing() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.pool_block_size.0, PoolBlockSize::M1);
        assert_eq!(cfg.downsample_factor, 5);
    }

    #[test]
    fn workload_segment_label_format() {
        let seg = WorkloadSegment {
            thread_count: 4,
            phase: WorkloadPhase::Write,
            iteration_index: 1,
        };
        assert_eq!(seg.label(), "4T-write");
    }

    #[test]
    fn thread_config_result_averages_are_derived() {
        let mut r = ThreadConfigResult::default();
        r.write_speeds = vec![10.0, 20.0];
        assert_eq!(r.average_write_speed(), 15.0);
    }
}
