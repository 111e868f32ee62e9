//! Result model & persistence (C9): the canonical in-memory record, its
//! stable-schema JSON serialisation, and the analytics record C6's rollups
//! feed (§4.9).
//!
//! Three files per invocation: `<out>.json` (the rounded, emit-time-
//! downsampled `BenchmarkRecord`), `<out>_analytics.json` (per-pool
//! rollups), and `<out>_report.md` (a minimal stub — prose generation is a
//! named, unimplemented downstream interface per the redesign notes).

use crate::error::{ConfigError, Result};
use crate::models::BenchmarkRecord;
use crate::reducer::{self, IostatRollups};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Per-pool rollups, keyed by pool name.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct AnalyticsRecord {
    pub pools: HashMap<String, IostatRollups>,
}

/// Build the analytics record from each pool's raw (non-downsampled)
/// telemetry. Called during persistence, not mutating the record it reads.
pub fn build_analytics(record: &BenchmarkRecord) -> AnalyticsRecord {
    let pools = record
        .pools
        .iter()
        .map(|pool| {
            let rollups = reducer::rollup_iostat(
                &pool.zpool_iostat_telemetry.samples,
                &pool.zpool_iostat_telemetry.phase_spans,
            );
            (pool.info.name.clone(), rollups)
        })
        .collect();
    AnalyticsRecord { pools }
}

/// Keep every Nth item (1-indexed position), `factor <= 1` is a no-op. Used
/// only at emit time; the in-memory stream is never mutated (§4.9).
fn downsample<T: Clone>(items: &[T], factor: u32) -> Vec<T> {
    if factor <= 1 {
        return items.to_vec();
    }
    items
        .iter()
        .enumerate()
        .filter(|(i, _)| i % factor as usize == 0)
        .map(|(_, v)| v.clone())
        .collect()
}

/// Round every floating-point number in a JSON value tree to two decimals.
fn round_floats(value: &mut Value) {
    match value {
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if n.as_i64().is_none() && n.as_u64().is_none() {
                    let rounded = (f * 100.0).round() / 100.0;
                    if let Some(replacement) = serde_json::Number::from_f64(rounded) {
                        *n = replacement;
                    }
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(round_floats),
        Value::Object(map) => map.values_mut().for_each(round_floats),
        _ => {}
    }
}

fn downsample_record(mut record: BenchmarkRecord) -> BenchmarkRecord {
    let factor = record.config.downsample_factor;
    for pool in &mut record.pools {
        pool.zpool_iostat_telemetry.samples = downsample(&pool.zpool_iostat_telemetry.samples, factor);
        pool.arcstat_telemetry.samples = downsample(&pool.arcstat_telemetry.samples, factor);
    }
    record
}

fn sibling_path(out: &Path, suffix: &str) -> std::path::PathBuf {
    let stem = out
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("tn_bench_results");
    let parent = out.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{stem}{suffix}"))
}

fn write_report_stub(record: &BenchmarkRecord, path: &Path) -> Result<()> {
    let mut body = String::new();
    body.push_str("# Benchmark Report\n\n");
    body.push_str(&format!(
        "Run from {} to {} ({:.2} minutes).\n\n",
        record.start_timestamp, record.end_timestamp, record.duration_minutes
    ));
    body.push_str("Prose summarisation is not implemented; see the accompanying ");
    body.push_str("`_analytics.json` and raw `.json` files for the full result set.\n\n");
    for pool in &record.pools {
        if let Some(reason) = &pool.skipped {
            body.push_str(&format!("- **{}**: skipped ({reason})\n", pool.info.name));
        } else {
            body.push_str(&format!(
                "- **{}**: dwpd={:.2}, total_writes_gib={:.2}\n",
                pool.info.name, pool.dwpd, pool.total_writes_gib
            ));
        }
    }
    std::fs::write(path, body)?;
    Ok(())
}

/// Write `<out>.json`, `<out>_analytics.json`, and `<out>_report.md`.
pub fn write_results(record: BenchmarkRecord, out_path: &Path) -> Result<()> {
    let analytics = build_analytics(&record);
    let emitted = downsample_record(record);

    let mut result_value = serde_json::to_value(&emitted)?;
    round_floats(&mut result_value);
    let result_json = serde_json::to_string_pretty(&result_value)?;
    std::fs::write(out_path, result_json).map_err(ConfigError::from)?;

    let mut analytics_value = serde_json::to_value(&analytics)?;
    round_floats(&mut analytics_value);
    let analytics_json = serde_json::to_string_pretty(&analytics_value)?;
    std::fs::write(sibling_path(out_path, "_analytics.json"), analytics_json).map_err(ConfigError::from)?;

    write_report_stub(&emitted, &sibling_path(out_path, "_report.md"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downsample_keeps_every_nth_sample() {
        let items: Vec<i32> = (0..10).collect();
        assert_eq!(downsample(&items, 5), vec![0, 5]);
        assert_eq!(downsample(&items, 1), items);
        assert_eq!(downsample(&items, 0), items);
    }

    #[test]
    fn round_floats_leaves_integers_alone() {
        let mut v = serde_json::json!({ "count": 5, "mean": 3.14159 });
        round_floats(&mut v);
        assert_eq!(v["count"], serde_json::json!(5));
        assert_eq!(v["mean"], serde_json::json!(3.14));
    }

    #[test]
    fn sibling_path_replaces_stem_suffix() {
        let out = Path::new("./tn_bench_results.json");
        assert_eq!(
            sibling_path(out, "_analytics.json"),
            Path::new("./tn_bench_results_analytics.json")
        );
    }
}
