//! Statistical reducer (C6): pure summary statistics over a finite sample
//! population, plus the named rollups built from it (§4.6).

use crate::models::{IostatSample, Phase, PhaseSpan};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const MIN_PHASE_SAMPLES: usize = 3;

/// `{count, mean, median, min, max, p50, p90, p95, p99, std_dev, cv_percent}`.
/// All fields are zero for an empty population (§4.6 "no data").
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Stats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub std_dev: f64,
    pub cv_percent: f64,
}

/// Linear-interpolated percentile on a pre-sorted slice, index `p/100*(n-1)`.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let idx = p / 100.0 * (n - 1) as f64;
    let lower = idx.floor() as usize;
    let upper = (lower + 1).min(n - 1);
    let frac = idx - lower as f64;
    sorted[lower] + frac * (sorted[upper] - sorted[lower])
}

/// Compute summary statistics over `values`. Pure, deterministic, call-stable.
pub fn reduce(values: &[f64]) -> Stats {
    let n = values.len();
    if n == 0 {
        return Stats::default();
    }

    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let mean = values.iter().sum::<f64>() / n as f64;
    let mid = n / 2;
    let median = if n % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };

    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
    let std_dev = variance.sqrt();
    let cv_percent = if mean != 0.0 { std_dev / mean * 100.0 } else { 0.0 };

    Stats {
        count: n,
        mean,
        median,
        min: sorted[0],
        max: sorted[n - 1],
        p50: percentile(&sorted, 50.0),
        p90: percentile(&sorted, 90.0),
        p95: percentile(&sorted, 95.0),
        p99: percentile(&sorted, 99.0),
        std_dev,
        cv_percent,
    }
}

/// Every rollup view named in §4.6, computed over one iostat sample stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IostatRollups {
    pub read_iops_all: Stats,
    pub write_iops_all: Stats,
    pub total_iops_all: Stats,
    pub read_iops_active: Stats,
    pub write_iops_active: Stats,
    pub steady_state_total_iops: Stats,
    pub per_segment_steady_state: HashMap<String, Stats>,
    pub per_phase: HashMap<String, Stats>,
}

/// Build every §4.6 rollup over one pool's iostat samples and phase spans.
pub fn rollup_iostat(samples: &[IostatSample], spans: &[PhaseSpan]) -> IostatRollups {
    let read_ops: Vec<f64> = samples.iter().map(|s| s.operations_read).collect();
    let write_ops: Vec<f64> = samples.iter().map(|s| s.operations_write).collect();
    let total_ops: Vec<f64> = samples
        .iter()
        .map(|s| s.operations_read + s.operations_write)
        .collect();

    let active: Vec<&IostatSample> = samples
        .iter()
        .filter(|s| s.operations_read > 0.0 || s.operations_write > 0.0)
        .collect();
    let active_read: Vec<f64> = active.iter().map(|s| s.operations_read).collect();
    let active_write: Vec<f64> = active.iter().map(|s| s.operations_write).collect();

    let steady: Vec<&IostatSample> = samples
        .iter()
        .filter(|s| s.phase == Some(Phase::SteadyState))
        .collect();
    let steady_total: Vec<f64> = steady
        .iter()
        .map(|s| s.operations_read + s.operations_write)
        .collect();

    let mut per_segment: HashMap<String, Vec<f64>> = HashMap::new();
    for s in &steady {
        per_segment
            .entry(s.segment_label.clone())
            .or_default()
            .push(s.operations_read + s.operations_write);
    }
    let per_segment_steady_state = per_segment
        .into_iter()
        .map(|(label, vals)| (label, reduce(&vals)))
        .collect();

    let mut per_phase_buckets: HashMap<&'static str, Vec<f64>> = HashMap::new();
    for span in spans {
        if span.sample_count < MIN_PHASE_SAMPLES {
            continue;
        }
        let phase_samples = samples
            .get(span.start_index..=span.end_index.min(samples.len().saturating_sub(1)))
            .unwrap_or(&[]);
        let vals = phase_samples
            .iter()
            .map(|s| s.operations_read + s.operations_write);
        per_phase_buckets
            .entry(span.phase.as_str())
            .or_default()
            .extend(vals);
    }
    let per_phase = per_phase_buckets
        .into_iter()
        .map(|(phase, vals)| (phase.to_string(), reduce(&vals)))
        .collect();

    IostatRollups {
        read_iops_all: reduce(&read_ops),
        write_iops_all: reduce(&write_ops),
        total_iops_all: reduce(&total_ops),
        read_iops_active: reduce(&active_read),
        write_iops_active: reduce(&active_write),
        steady_state_total_iops: reduce(&steady_total),
        per_segment_steady_state,
        per_phase,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn constant_sequence_has_zero_spread() {
        for n in 1..5 {
            let values = vec![7.0; n];
            let stats = reduce(&values);
            assert_eq!(stats.mean, 7.0);
            assert_eq!(stats.std_dev, 0.0);
            assert_eq!(stats.cv_percent, 0.0);
            assert_eq!(stats.p99, 7.0);
        }
    }

    #[test]
    fn reference_five_value_sequence_matches_documented_percentiles() {
        let stats = reduce(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(stats.count, 5);
        assert_eq!(stats.mean, 3.0);
        assert_eq!(stats.median, 3.0);
        assert!((stats.std_dev - 1.41421356).abs() < 1e-6);
        assert!((stats.cv_percent - 47.14).abs() < 0.01);
        assert_eq!(stats.p50, 3.0);
        assert!((stats.p90 - 4.6).abs() < 1e-9);
        assert!((stats.p95 - 4.8).abs() < 1e-9);
        assert!((stats.p99 - 4.96).abs() < 1e-9);
    }

    #[test]
    fn empty_input_is_all_zero() {
        assert_eq!(reduce(&[]), Stats::default());
    }

    proptest! {
        #[test]
        fn constant_sequence_always_has_zero_cv(c in -1000.0f64..1000.0, n in 1usize..50) {
            if c != 0.0 {
                let values = vec![c; n];
                let stats = reduce(&values);
                prop_assert!((stats.std_dev).abs() < 1e-9);
                prop_assert!((stats.cv_percent).abs() < 1e-9);
            }
        }

        #[test]
        fn mean_is_always_between_min_and_max(values in prop::collection::vec(-1e6f64..1e6, 1..100)) {
            let stats = reduce(&values);
            prop_assert!(stats.mean >= stats.min - 1e-6);
            prop_assert!(stats.mean <= stats.max + 1e-6);
        }
    }
}
