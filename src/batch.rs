//! Batch runner (C8): executes an ordered matrix of `RunConfig` overlays
//! against a shared global config, sequentially, with per-run isolated
//! output files and a summary record (§4.8).

use crate::config::apply_overlay;
use crate::coordinator::run_benchmark;
use crate::error::{ConfigError, Result};
use crate::models::{BenchmarkRecord, RunConfig};
use crate::persistence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::watch;

/// One named overlay entry in a batch config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRunSpec {
    pub name: String,
    #[serde(default)]
    pub overlay: Value,
}

/// `{global, runs[], continue_on_error}`, loaded from JSON or YAML (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub global: RunConfig,
    pub runs: Vec<BatchRunSpec>,
    #[serde(default)]
    pub continue_on_error: bool,
}

/// Peak write/read speed (and the thread count each occurred at), DWPD, and
/// duration, extracted from a run's pools for the batch summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolMetrics {
    pub peak_write_mbps: f64,
    pub peak_write_threads: u32,
    pub peak_read_mbps: f64,
    pub peak_read_threads: u32,
    pub dwpd: f64,
    pub duration_seconds: f64,
}

fn extract_metrics(record: &BenchmarkRecord) -> HashMap<String, PoolMetrics> {
    record
        .pools
        .iter()
        .map(|pool| {
            let mut metrics = PoolMetrics {
                dwpd: pool.dwpd,
                duration_seconds: pool.duration_seconds,
                ..Default::default()
            };
            for thread_result in &pool.thread_results {
                let write = thread_result.average_write_speed();
                if write > metrics.peak_write_mbps {
                    metrics.peak_write_mbps = write;
                    metrics.peak_write_threads = thread_result.threads;
                }
                let read = thread_result.average_read_speed();
                if read > metrics.peak_read_mbps {
                    metrics.peak_read_mbps = read;
                    metrics.peak_read_threads = thread_result.threads;
                }
            }
            (pool.info.name.clone(), metrics)
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub index: usize,
    pub name: String,
    pub status: String,
    pub pool_metrics: HashMap<String, PoolMetrics>,
    pub error: Option<String>,
    pub duration_minutes: f64,
    pub output_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub start_timestamp: DateTime<Utc>,
    pub end_timestamp: DateTime<Utc>,
    pub duration_minutes: f64,
    pub runs: Vec<RunSummary>,
    pub successful: u32,
    pub failed: u32,
}

/// Load a batch config, trying the extension first and falling back to the
/// other format before rejecting it (§4.8: "a file with an unrecognised
/// extension is tried as JSON first, then as YAML").
pub fn load_batch_config(path: &Path) -> Result<BatchConfig> {
    let content = std::fs::read_to_string(path).map_err(ConfigError::from)?;
    let recognised = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json") | Some("yaml") | Some("yml")
    );

    if recognised {
        return match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content).map_err(|e| {
                ConfigError::BatchParse {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                }
                .into()
            }),
            _ => serde_yaml::from_str(&content).map_err(|e| {
                ConfigError::BatchParse {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                }
                .into()
            }),
        };
    }

    serde_json::from_str(&content)
        .or_else(|_| serde_yaml::from_str(&content))
        .map_err(|e| {
            ConfigError::BatchParse {
                path: path.display().to_string(),
                reason: format!("not valid JSON or YAML: {e}"),
            }
            .into()
        })
}

fn run_output_path(base: &Path, index: usize, name: &str) -> PathBuf {
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("tn_bench_results");
    let ext = base.extension().and_then(|e| e.to_str()).unwrap_or("json");
    let parent = base.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{stem}_run{index}_{name}.{ext}"))
}

/// Run every entry in `batch` sequentially, writing per-run artifacts beside
/// `base_output` and a `<base>_batch_summary.json` at the end.
pub async fn run_batch(
    batch: &BatchConfig,
    base_output: &Path,
    cancel: watch::Receiver<bool>,
) -> Result<BatchSummary> {
    let start_timestamp = Utc::now();
    let mut runs = Vec::new();
    let mut successful = 0u32;
    let mut failed = 0u32;

    for (index, spec) in batch.runs.iter().enumerate() {
        if *cancel.borrow() {
            break;
        }

        let output_file = run_output_path(base_output, index + 1, &spec.name);
        log::info!(target: "parsed", "batch run {}/{} '{}' starting", index + 1, batch.runs.len(), spec.name);

        let run_config = match apply_overlay(&batch.global, &spec.overlay) {
            Ok(cfg) => RunConfig {
                output_path: output_file.clone(),
                ..cfg
            },
            Err(e) => {
                failed += 1;
                runs.push(RunSummary {
                    index: index + 1,
                    name: spec.name.clone(),
                    status: "failed".to_string(),
                    pool_metrics: HashMap::new(),
                    error: Some(e.to_string()),
                    duration_minutes: 0.0,
                    output_file: output_file.display().to_string(),
                });
                if !batch.continue_on_error {
                    break;
                }
                continue;
            }
        };

        match run_benchmark(&run_config, cancel.clone()).await {
            Ok(record) => {
                let pool_metrics = extract_metrics(&record);
                let duration_minutes = record.duration_minutes;
                if let Err(e) = persistence::write_results(record, &output_file) {
                    log::error!("batch run {} '{}': failed to persist results: {e}", index + 1, spec.name);
                }
                successful += 1;
                runs.push(RunSummary {
                    index: index + 1,
                    name: spec.name.clone(),
                    status: "success".to_string(),
                    pool_metrics,
                    error: None,
                    duration_minutes,
                    output_file: output_file.display().to_string(),
                });
            }
            Err(e) => {
                failed += 1;
                log::error!("batch run {} '{}' failed: {e}", index + 1, spec.name);
                runs.push(RunSummary {
                    index: index + 1,
                    name: spec.name.clone(),
                    status: "failed".to_string(),
                    pool_metrics: HashMap::new(),
                    error: Some(e.user_message()),
                    duration_minutes: 0.0,
                    output_file: output_file.display().to_string(),
                });
                if !batch.continue_on_error {
                    break;
                }
            }
        }

        log::info!(target: "parsed", "batch run {}/{} '{}' complete", index + 1, batch.runs.len(), spec.name);
    }

    let end_timestamp = Utc::now();
    let duration_minutes = (end_timestamp - start_timestamp).num_milliseconds() as f64 / 60_000.0;

    let summary = BatchSummary {
        start_timestamp,
        end_timestamp,
        duration_minutes,
        runs,
        successful,
        failed,
    };

    let summary_path = {
        let stem = base_output.file_stem().and_then(|s| s.to_str()).unwrap_or("tn_bench_results");
        let parent = base_output.parent().unwrap_or_else(|| Path::new("."));
        parent.join(format!("{stem}_batch_summary.json"))
    };
    let summary_json = serde_json::to_string_pretty(&summary)?;
    std::fs::write(summary_path, summary_json).map_err(ConfigError::from)?;

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_output_path_is_index_and_name_scoped() {
        let path = run_output_path(Path::new("./out.json"), 2, "fast");
        assert_eq!(path, Path::new("./out_run2_fast.json"));
    }

    #[test]
    fn load_batch_config_rejects_garbage() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "not json or yaml: [[[").unwrap();
        let renamed = temp.path().with_extension("cfg");
        std::fs::copy(temp.path(), &renamed).unwrap();
        assert!(load_batch_config(&renamed).is_err());
        let _ = std::fs::remove_file(&renamed);
    }
}
