//! Workload driver (C3): runs one thread-count's write then read pass against
//! the benchmark dataset and reports per-thread throughput.
//!
//! Each thread runs its own `dd` subprocess against a private file under the
//! dataset mountpoint; the fan-out itself uses OS threads (not tokio tasks)
//! since the bottleneck is disk I/O, matching the concurrency model's "any
//! work-stealing pool is fine" latitude (§5).

use crate::error::{Result, WorkloadError};
use crate::models::{IterationResult, PoolBlockSize, WorkloadPhase, WorkloadSegment};
use crossbeam_channel::Sender;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use tokio::sync::watch;

const BYTES_PER_THREAD: u64 = 20480 * 1024 * 1024;

/// Fired once per `(thread_count, phase)` transition so telemetry collectors
/// can timestamp phase spans against the active segment.
pub type SegmentSignal = Sender<WorkloadSegment>;

fn thread_file(mountpoint: &Path, thread_index: u32) -> PathBuf {
    mountpoint.join(format!("file_{thread_index}.dat"))
}

fn run_dd(path: &Path, block_size: PoolBlockSize, bytes: u64, is_write: bool) -> Result<()> {
    let count = bytes / block_size.bytes();
    let mut cmd = Command::new("dd");
    if is_write {
        cmd.arg("if=/dev/urandom")
            .arg(format!("of={}", path.display()));
    } else {
        cmd.arg(format!("if={}", path.display()))
            .arg("of=/dev/null");
    }
    cmd.arg(format!("bs={}", block_size.as_str()))
        .arg(format!("count={count}"))
        .arg("conv=fdatasync");

    let output = cmd
        .output()
        .map_err(|e| WorkloadError::SpawnFailed(e.to_string()))?;

    if !output.status.success() {
        return Err(WorkloadError::SpawnFailed(format!(
            "dd exited with {:?}",
            output.status.code()
        ))
        .into());
    }

    Ok(())
}

/// Run one iteration (write then read) at a given thread count. `mountpoint`
/// must already exist; cleanup of the per-thread files happens before return.
pub async fn run_iteration(
    mountpoint: &Path,
    thread_count: u32,
    block_size: PoolBlockSize,
    iteration_index: u32,
    segment_tx: &SegmentSignal,
    cancel: &watch::Receiver<bool>,
) -> Result<IterationResult> {
    if *cancel.borrow() {
        return Err(WorkloadError::Cancelled.into());
    }

    let _ = segment_tx.send(WorkloadSegment {
        thread_count,
        phase: WorkloadPhase::Write,
        iteration_index,
    });
    let write_speed = run_phase(mountpoint, thread_count, block_size, true)?;

    if *cancel.borrow() {
        cleanup(mountpoint, thread_count);
        return Err(WorkloadError::Cancelled.into());
    }

    let _ = segment_tx.send(WorkloadSegment {
        thread_count,
        phase: WorkloadPhase::Read,
        iteration_index,
    });
    let read_speed = run_phase(mountpoint, thread_count, block_size, false)?;

    cleanup(mountpoint, thread_count);

    Ok(IterationResult {
        write_speed_mbps: write_speed,
        read_speed_mbps: read_speed,
        bytes_written: BYTES_PER_THREAD * thread_count as u64,
    })
}

/// One shared start/end pair bounds the whole fan-out; throughput is
/// aggregate bytes moved divided by wall-clock elapsed, not a sum of each
/// `dd`'s self-reported speed (threads that finish unevenly would otherwise
/// inflate the total past the real aggregate rate).
fn run_phase(mountpoint: &Path, thread_count: u32, block_size: PoolBlockSize, is_write: bool) -> Result<f64> {
    let start = Instant::now();

    let handles: Vec<_> = (0..thread_count)
        .map(|i| {
            let path = thread_file(mountpoint, i);
            std::thread::spawn(move || run_dd(&path, block_size, BYTES_PER_THREAD, is_write))
        })
        .collect();

    for handle in handles {
        handle
            .join()
            .map_err(|_| WorkloadError::SpawnFailed("dd thread panicked".to_string()))??;
    }

    let elapsed = start.elapsed().as_secs_f64();
    let bytes_written = BYTES_PER_THREAD * thread_count as u64;
    Ok(bytes_written as f64 / (elapsed * 2f64.powi(20)))
}

fn cleanup(mountpoint: &Path, thread_count: u32) {
    for i in 0..thread_count {
        let _ = std::fs::remove_file(thread_file(mountpoint, i));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_file_naming_is_index_scoped() {
        let path = thread_file(Path::new("/mnt/tank/tn-bench"), 3);
        assert_eq!(path, Path::new("/mnt/tank/tn-bench/file_3.dat"));
    }

    #[test]
    fn thread_file_matches_cleanup_glob_prefix() {
        let path = thread_file(Path::new("/mnt/tank/tn-bench"), 0);
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("file_"));
        assert!(name.ends_with(".dat"));
    }
}
