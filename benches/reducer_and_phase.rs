//! Micro-benchmark for the hot per-sample path: phase classification and
//! statistical reduction over a synthetic multi-thousand-sample IOPS stream.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tn_bench::phase_detector::{run_posthoc, PhaseDetectorParams};
use tn_bench::reducer::reduce;

fn synthetic_iops_series(n: usize) -> Vec<(f64, f64)> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            let iops = match i {
                _ if i < n / 10 => 50.0,
                _ if i > n * 9 / 10 => 80.0,
                _ => 6000.0 + (t * 0.37).sin() * 800.0,
            };
            (iops, t)
        })
        .collect()
}

fn bench_phase_detector(c: &mut Criterion) {
    let series = synthetic_iops_series(5_000);
    c.bench_function("phase_detector_posthoc_5k", |b| {
        b.iter(|| run_posthoc(black_box(&series), PhaseDetectorParams::default()))
    });
}

fn bench_reducer(c: &mut Criterion) {
    let values: Vec<f64> = (0..5_000).map(|i| (i as f64 * 1.37).sin() * 1000.0 + 2000.0).collect();
    c.bench_function("reduce_5k_samples", |b| {
        b.iter(|| reduce(black_box(&values)))
    });
}

criterion_group!(benches, bench_phase_detector, bench_reducer);
criterion_main!(benches);
