//! Integration coverage for the §8 named scenarios that span the phase
//! detector, reducer, and suffix parser together as a caller outside the
//! crate would exercise them.

use tn_bench::models::Phase;
use tn_bench::phase_detector::{run_posthoc, PhaseDetectorParams};
use tn_bench::reducer::reduce;
use tn_bench::telemetry::parse::{parse_latency_ms, parse_suffixed_count};

#[test]
fn s3_phase_detector_synthetic_stream_bookends_are_idle() {
    let series: Vec<(f64, f64)> = [
        0.0, 10.0, 5.0, 2000.0, 5000.0, 8000.0, 10000.0, 10500.0, 9800.0, 10200.0, 10100.0,
        9900.0, 10300.0, 10000.0, 5000.0, 2000.0, 500.0, 10.0, 0.0, 0.0,
    ]
    .iter()
    .enumerate()
    .map(|(i, &v)| (v, i as f64))
    .collect();

    let spans = run_posthoc(&series, PhaseDetectorParams::default());

    assert_eq!(spans.first().unwrap().phase, Phase::Idle);
    assert_eq!(spans.last().unwrap().phase, Phase::Idle);
    assert!(spans.iter().any(|s| s.phase == Phase::SteadyState));

    // Property 1: spans partition the sample range with no gaps or overlaps.
    for pair in spans.windows(2) {
        assert_eq!(pair[0].end_index + 1, pair[1].start_index);
    }
    assert_eq!(spans.first().unwrap().start_index, 0);
    assert_eq!(spans.last().unwrap().end_index, series.len() - 1);
}

#[test]
fn s4_reducer_reference_scenario() {
    let stats = reduce(&[1.0, 2.0, 3.0, 4.0, 5.0]);
    assert_eq!(stats.count, 5);
    assert_eq!(stats.mean, 3.0);
    assert_eq!(stats.median, 3.0);
    assert_eq!(stats.min, 1.0);
    assert_eq!(stats.max, 5.0);
    assert!((stats.std_dev - 1.41421356).abs() < 1e-6);
    assert!((stats.cv_percent - 47.14).abs() < 0.01);
    assert_eq!(stats.p50, 3.0);
    assert!((stats.p90 - 4.6).abs() < 1e-9);
    assert!((stats.p95 - 4.8).abs() < 1e-9);
    assert!((stats.p99 - 4.96).abs() < 1e-9);
}

#[test]
fn s6_suffix_parsing_reference_table() {
    let cases = [
        ("0", 0.0),
        ("123", 123.0),
        ("1.77K", 1770.0),
        ("292M", 292_000_000.0),
        ("1.5G", 1_500_000_000.0),
        ("2.5T", 2_500_000_000_000.0),
        ("-", 0.0),
        ("", 0.0),
    ];
    for (input, expected) in cases {
        let actual = parse_suffixed_count(input);
        assert!(
            (actual - expected).abs() < 0.01 * expected.abs().max(1.0),
            "parse_suffixed_count({input:?}) = {actual}, expected {expected}"
        );
    }
}

#[test]
fn latency_sentinel_is_unavailable_not_zero() {
    assert_eq!(parse_latency_ms("-"), None);
    assert_eq!(parse_latency_ms("1.5ms"), Some(1.5));
    assert_eq!(parse_latency_ms("2s"), Some(2000.0));
}
