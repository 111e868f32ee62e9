//! Integration tests over the pure cross-module invariants named in §8:
//! the DWPD formula (S5) and the sweep's segment-label sequence (S2).

use tn_bench::coordinator::compute_dwpd;
use tn_bench::models::{WorkloadPhase, WorkloadSegment};

#[test]
fn dwpd_matches_documented_reference_scenario() {
    // S5: total_writes_gib=100, pool_capacity_gib=1000, duration_seconds=86400.
    let dwpd = compute_dwpd(100.0, 1000.0, 86400.0);
    assert!((dwpd - 0.1).abs() < 1e-9);
}

#[test]
fn dwpd_is_zero_for_unknown_capacity_or_instant_runs() {
    assert_eq!(compute_dwpd(100.0, 0.0, 86400.0), 0.0);
    assert_eq!(compute_dwpd(100.0, 1000.0, 0.0), 0.0);
}

/// S2: for `cores=8, zfs_iterations=2`, the sweep's thread counts are
/// `[1, 2, 4, 8]` and within each thread count the two iterations alternate
/// write/read, producing the exact 16-segment sequence the spec names.
#[test]
fn segment_sequence_matches_sweep_order() {
    let thread_counts = [1u32, 2, 4, 8];
    let mut labels = Vec::new();
    for &threads in &thread_counts {
        for iteration in 1..=2u32 {
            labels.push(
                WorkloadSegment {
                    thread_count: threads,
                    phase: WorkloadPhase::Write,
                    iteration_index: iteration,
                }
                .label(),
            );
            labels.push(
                WorkloadSegment {
                    thread_count: threads,
                    phase: WorkloadPhase::Read,
                    iteration_index: iteration,
                }
                .label(),
            );
        }
    }

    let expected = vec![
        "1T-write", "1T-read", "1T-write", "1T-read", "2T-write", "2T-read", "2T-write",
        "2T-read", "4T-write", "4T-read", "4T-write", "4T-read", "8T-write", "8T-read",
        "8T-write", "8T-read",
    ];
    assert_eq!(labels, expected);
}
