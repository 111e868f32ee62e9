//! Benchmark coordinator (C7): drives one pool's full sweep — dataset
//! lifecycle, telemetry collector lifecycle, and the thread-count sweep
//! itself — and assembles the pool's `PoolResult` (§4.7).
//!
//! The thread-count sweep is `[1, cores/4, cores/2, cores]`, each run for
//! `zfs_iterations` iterations. Segment changes are fanned out to both
//! telemetry collectors through a small forwarding thread that drains the
//! workload driver's segment channel and writes into each collector's
//! segment-label cell directly — the single-writer/single-reader cell stays
//! single-writer; this thread is its one writer.

use crate::dataset;
use crate::error::Result;
use crate::models::{BenchmarkRecord, PoolInfo, PoolResult, RunConfig, ThreadConfigResult};
use crate::platform;
use crate::telemetry::arc::ArcCollector;
use crate::telemetry::iostat::IostatCollector;
use crate::workload;
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use tokio::sync::watch;

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Drive writes per day: writes during the benchmark extrapolated to a
/// 24-hour period, as a multiple of pool capacity. Zero when capacity or
/// duration is unknown/zero rather than dividing by zero (§8 S5).
pub fn compute_dwpd(total_writes_gib: f64, pool_capacity_gib: f64, duration_seconds: f64) -> f64 {
    if pool_capacity_gib > 0.0 && duration_seconds > 0.0 {
        (total_writes_gib / pool_capacity_gib) / duration_seconds * 86400.0
    } else {
        0.0
    }
}

fn thread_sweep(physical_cores: u32) -> Vec<u32> {
    vec![
        1,
        (physical_cores / 4).max(1),
        (physical_cores / 2).max(1),
        physical_cores.max(1),
    ]
}

/// Run the full sweep against `pool` and return its `PoolResult`. `cancel`
/// is checked between thread counts and iterations; a cancel mid-sweep still
/// runs collector teardown so partial telemetry is preserved (§4.7 step 6).
pub async fn run_pool_sweep(
    pool: &PoolInfo,
    config: &RunConfig,
    physical_cores: u32,
    cancel: watch::Receiver<bool>,
) -> Result<PoolResult> {
    dataset::pre_run_safety_check(&pool.name, physical_cores).await?;
    let dataset_name = dataset::ensure_dataset(&pool.name, config.pool_block_size.0).await?;
    dataset::validate_space(&pool.name, physical_cores).await?;
    let mountpoint = dataset::mountpoint(&dataset_name).await?;
    let mountpoint = Path::new(&mountpoint);

    let mut iostat_collector = if config.collect_zpool_iostat {
        Some(
            IostatCollector::start(
                &pool.name,
                config.zpool_iostat_interval_s,
                config.zpool_iostat_warmup,
                cancel.clone(),
            )
            .await?,
        )
    } else {
        None
    };

    let mut arc_collector = if config.collect_arcstat {
        Some(
            ArcCollector::start(
                &pool.name,
                config.arcstat_interval_s,
                config.arcstat_warmup,
                cancel.clone(),
            )
            .await?,
        )
    } else {
        None
    };

    let iostat_label = iostat_collector.as_ref().map(|c| c.segment_label_handle());
    let arc_label = arc_collector.as_ref().map(|c| c.segment_label_handle());
    let (segment_tx, segment_rx) = crossbeam_channel::unbounded();
    let forwarder = std::thread::spawn(move || {
        for segment in segment_rx.iter() {
            let label = segment.label();
            if let Some(cell) = &iostat_label {
                *cell.write().unwrap() = label.clone();
            }
            if let Some(cell) = &arc_label {
                *cell.write().unwrap() = label;
            }
        }
    });

    let sweep_start = Instant::now();
    let mut thread_results = Vec::new();
    let mut total_bytes_written: u64 = 0;
    let mut sweep_error = None;

    'sweep: for threads in thread_sweep(physical_cores) {
        let mut result = ThreadConfigResult {
            threads,
            iterations: config.zfs_iterations,
            ..Default::default()
        };

        for iteration in 1..=config.zfs_iterations {
            if *cancel.borrow() {
                break 'sweep;
            }

            match workload::run_iteration(
                mountpoint,
                threads,
                config.pool_block_size.0,
                iteration,
                &segment_tx,
                &cancel,
            )
            .await
            {
                Ok(iteration_result) => {
                    result.write_speeds.push(iteration_result.write_speed_mbps);
                    result.read_speeds.push(iteration_result.read_speed_mbps);
                    result.bytes_written += iteration_result.bytes_written;
                    total_bytes_written += iteration_result.bytes_written;
                }
                Err(e) => {
                    sweep_error = Some(e);
                    break 'sweep;
                }
            }
        }

        thread_results.push(result);
    }

    drop(segment_tx);
    let _ = forwarder.join();

    let duration_seconds = sweep_start.elapsed().as_secs_f64();

    let zpool_iostat_telemetry = match iostat_collector.take() {
        Some(collector) => collector.stop(config.zpool_iostat_cooldown).await?,
        None => Default::default(),
    };
    let arcstat_telemetry = match arc_collector.take() {
        Some(collector) => collector.stop(config.arcstat_cooldown).await?,
        None => Default::default(),
    };

    if config.cleanup {
        let _ = dataset::delete_dataset_robust(&dataset_name, config.retry_cleanup).await;
    }

    if let Some(e) = sweep_error {
        log::warn!(target: "parsed", "pool '{}' sweep ended early: {e}", pool.name);
    }

    let total_writes_gib = total_bytes_written as f64 / BYTES_PER_GIB;
    let pool_capacity_gib = pool.capacity_bytes as f64 / BYTES_PER_GIB;
    let dwpd = compute_dwpd(total_writes_gib, pool_capacity_gib, duration_seconds);

    Ok(PoolResult {
        info: pool.clone(),
        thread_results,
        total_writes_gib,
        dwpd,
        duration_seconds,
        zpool_iostat_telemetry,
        arcstat_telemetry,
        skipped: None,
    })
}

/// Drive a full invocation: snapshot system/pool state, sweep every selected
/// pool in order, and assemble the whole-run record (§3, data-flow in §2:
/// "CLI/C8 → C7, one pool at a time"). The disk phase is intentionally
/// absent — `RunConfig.disk_modes`/`disk_iterations` have a capability-stub
/// home in `BenchmarkRecord.disks` but no disk-mode algorithm is elaborated
/// beyond that stub (§1 Non-goals).
pub async fn run_benchmark(config: &RunConfig, cancel: watch::Receiver<bool>) -> Result<BenchmarkRecord> {
    let start_timestamp = Utc::now();
    let system = platform::query_system_info().await?;
    let all_pools = platform::query_pools().await?;

    let by_name: HashMap<&str, &PoolInfo> = all_pools.iter().map(|p| (p.name.as_str(), p)).collect();
    let mut pools = Vec::new();

    for pool_name in &config.selected_pools {
        if *cancel.borrow() {
            break;
        }

        let Some(pool) = by_name.get(pool_name.as_str()) else {
            pools.push(skipped_pool_result(
                &PoolInfo {
                    name: pool_name.clone(),
                    path: String::new(),
                    status: "UNKNOWN".to_string(),
                    capacity_bytes: 0,
                    topology: Vec::new(),
                },
                "pool not found",
            ));
            continue;
        };

        if config.zfs_iterations == 0 {
            pools.push(skipped_pool_result(pool, "zfs_iterations is 0"));
            continue;
        }

        log::info!(target: "parsed", "pool '{pool_name}': sweep starting");
        match run_pool_sweep(pool, config, system.physical_cores, cancel.clone()).await {
            Ok(result) => pools.push(result),
            Err(e) => {
                log::error!("pool '{pool_name}' sweep failed: {e}");
                pools.push(skipped_pool_result(pool, e.user_message()));
            }
        }
        log::info!(target: "parsed", "pool '{pool_name}': sweep complete");
    }

    let end_timestamp = Utc::now();
    let duration_minutes = (end_timestamp - start_timestamp).num_milliseconds() as f64 / 60_000.0;

    Ok(BenchmarkRecord {
        schema_version: "1.0".to_string(),
        start_timestamp,
        end_timestamp,
        duration_minutes,
        config: config.clone(),
        system,
        pools,
        disks: Vec::new(),
    })
}

/// A pool skipped before any work started (unknown pool name, pre-run safety
/// check failure the caller chose not to treat as fatal, etc).
pub fn skipped_pool_result(pool: &PoolInfo, reason: impl Into<String>) -> PoolResult {
    PoolResult {
        info: pool.clone(),
        thread_results: Vec::new(),
        total_writes_gib: 0.0,
        dwpd: 0.0,
        duration_seconds: 0.0,
        zpool_iostat_telemetry: Default::default(),
        arcstat_telemetry: Default::default(),
        skipped: Some(reason.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_sweep_covers_quarter_half_and_full_cores() {
        assert_eq!(thread_sweep(8), vec![1, 2, 4, 8]);
        assert_eq!(thread_sweep(1), vec![1, 1, 1, 1]);
        assert_eq!(thread_sweep(3), vec![1, 1, 1, 3]);
    }

    #[test]
    fn skipped_pool_result_carries_no_telemetry() {
        let pool = PoolInfo {
            name: "tank".to_string(),
            path: "/mnt/tank".to_string(),
            status: "ONLINE".to_string(),
            capacity_bytes: 0,
            topology: Vec::new(),
        };
        let result = skipped_pool_result(&pool, "pool offline");
        assert_eq!(result.skipped.as_deref(), Some("pool offline"));
        assert!(result.thread_results.is_empty());
    }
}
