//! Pool iostat collector: ingests `zpool iostat -H -y -l <pool> <interval>`
//! and runs the phase detector over the resulting IOPS stream (§4.4/§4.5).

use super::{new_segment_label, parse, terminate_child, SegmentLabel};
use crate::error::Result;
use crate::models::{IostatSample, IostatTelemetry};
use crate::phase_detector::{PhaseDetector, PhaseDetectorParams};
use crate::platform;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::process::Child;
use tokio::sync::watch;
use tokio::task::JoinHandle;

struct IngestResult {
    samples: Vec<IostatSample>,
    phase_spans: Vec<crate::models::PhaseSpan>,
}

pub struct IostatCollector {
    child: Child,
    sample_count: Arc<AtomicUsize>,
    segment_label: SegmentLabel,
    ingest_handle: Option<JoinHandle<IngestResult>>,
    start_time: f64,
    warmup_iterations: u32,
}

fn now_epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn parse_line(line: &str) -> Option<IostatSample> {
    if parse::looks_like_header(line, &["capacity", "operations"]) {
        return None;
    }
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 7 {
        return None;
    }

    let timestamp = now_epoch_secs();
    let timestamp_iso = Utc::now().to_rfc3339();
    let operations_read = parse::parse_suffixed_count(parts[3]);
    let operations_write = parse::parse_suffixed_count(parts[4]);
    let sentinel = || "-".to_string();

    let (
        total_wait_read,
        total_wait_write,
        disk_wait_read,
        disk_wait_write,
        syncq_wait_read,
        syncq_wait_write,
        asyncq_wait_read,
        asyncq_wait_write,
        scrub_wait,
        trim_wait,
    ) = if parts.len() >= 15 {
        (
            parts[7].to_string(),
            parts[8].to_string(),
            parts[9].to_string(),
            parts[10].to_string(),
            parts[11].to_string(),
            parts[12].to_string(),
            parts[13].to_string(),
            parts[14].to_string(),
            parts.get(15).map(|s| s.to_string()).unwrap_or_else(sentinel),
            parts.get(16).map(|s| s.to_string()).unwrap_or_else(sentinel),
        )
    } else {
        (
            sentinel(),
            sentinel(),
            sentinel(),
            sentinel(),
            sentinel(),
            sentinel(),
            sentinel(),
            sentinel(),
            sentinel(),
            sentinel(),
        )
    };

    Some(IostatSample {
        timestamp,
        timestamp_iso,
        pool_name: parts[0].to_string(),
        capacity_used: parts[1].to_string(),
        capacity_avail: parts[2].to_string(),
        operations_read,
        operations_write,
        bandwidth_read: parts[5].to_string(),
        bandwidth_write: parts[6].to_string(),
        total_wait_read,
        total_wait_write,
        disk_wait_read,
        disk_wait_write,
        syncq_wait_read,
        syncq_wait_write,
        asyncq_wait_read,
        asyncq_wait_write,
        scrub_wait,
        trim_wait,
        phase: None,
        segment_label: String::new(),
    })
}

async fn ingest_loop(
    mut lines: tokio::io::Lines<tokio::io::BufReader<tokio::process::ChildStdout>>,
    segment_label: SegmentLabel,
    sample_count: Arc<AtomicUsize>,
    mut cancel: watch::Receiver<bool>,
) -> IngestResult {
    let mut samples = Vec::new();
    let mut detector = PhaseDetector::new(PhaseDetectorParams::default());

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(raw)) => {
                        if let Some(mut sample) = parse_line(&raw) {
                            let total_iops = sample.operations_read + sample.operations_write;
                            let label = segment_label.read().unwrap().clone();
                            detector.set_segment_label(label.clone());
                            let phase = detector.push(total_iops, sample.timestamp);
                            sample.phase = Some(phase);
                            sample.segment_label = label;
                            samples.push(sample);
                            sample_count.fetch_add(1, Ordering::SeqCst);
                        }
                        // malformed lines are logged and dropped per §7, not fatal.
                    }
                    Ok(None) => break,
                    Err(e) => {
                        log::warn!(target: "parsed", "zpool iostat read error: {e}");
                        break;
                    }
                }
            }
            _ = cancel.changed() => {
                if *cancel.borrow() {
                    break;
                }
            }
        }
    }

    let phase_spans = detector.finalize();
    IngestResult { samples, phase_spans }
}

impl IostatCollector {
    /// Spawn `zpool iostat` and block until `warmup_iterations` samples have
    /// been ingested (or cancellation is signalled).
    pub async fn start(
        pool: &str,
        interval_s: u32,
        warmup_iterations: u32,
        cancel: watch::Receiver<bool>,
    ) -> Result<Self> {
        let interval_str = interval_s.to_string();
        let args = ["iostat", "-H", "-y", "-l", pool, &interval_str];
        let mut child = platform::spawn("zpool", &args)?;
        let lines = platform::stdout_lines(&mut child)?;

        let sample_count = Arc::new(AtomicUsize::new(0));
        let segment_label = new_segment_label();

        let handle = tokio::spawn(ingest_loop(
            lines,
            segment_label.clone(),
            sample_count.clone(),
            cancel.clone(),
        ));

        let start_time = now_epoch_secs();
        log::info!(target: "parsed", "zpool iostat collector started for pool '{pool}'");

        let mut poll_cancel = cancel;
        while sample_count.load(Ordering::SeqCst) < warmup_iterations as usize {
            if *poll_cancel.borrow() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        Ok(IostatCollector {
            child,
            sample_count,
            segment_label,
            ingest_handle: Some(handle),
            start_time,
            warmup_iterations,
        })
    }

    /// Update the label subsequent samples are tagged with. Visible to the
    /// ingest loop on its next line read, never retroactive (§4.4).
    pub fn signal_segment_change(&self, label: &str) {
        *self.segment_label.write().unwrap() = label.to_string();
        log::info!(target: "parsed", "zpool iostat collector: segment -> {label}");
    }

    /// Clone of the segment-label cell, for callers that fan out segment
    /// changes from a single forwarding point instead of calling
    /// `signal_segment_change` directly on each collector.
    pub fn segment_label_handle(&self) -> SegmentLabel {
        self.segment_label.clone()
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count.load(Ordering::SeqCst)
    }

    /// Wait for `cooldown_iterations` more samples, terminate the child, and
    /// return the full telemetry stream.
    pub async fn stop(mut self, cooldown_iterations: u32) -> Result<IostatTelemetry> {
        let target = self.sample_count.load(Ordering::SeqCst) + cooldown_iterations as usize;
        while self.sample_count.load(Ordering::SeqCst) < target {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        terminate_child(&mut self.child, "zpool iostat").await?;

        let ingest = match self.ingest_handle.take() {
            Some(handle) => tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .ok()
                .and_then(|r| r.ok())
                .unwrap_or(IngestResult {
                    samples: Vec::new(),
                    phase_spans: Vec::new(),
                }),
            None => IngestResult {
                samples: Vec::new(),
                phase_spans: Vec::new(),
            },
        };

        let end_time = now_epoch_secs();
        log::info!(
            target: "parsed",
            "zpool iostat collection complete: {} samples",
            ingest.samples.len()
        );

        Ok(IostatTelemetry {
            start_time: self.start_time,
            end_time,
            warmup_iterations: self.warmup_iterations,
            cooldown_iterations,
            samples: ingest.samples,
            phase_spans: ingest.phase_spans,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_extended_stat_line() {
        let line = "tank 1.2T 500G 1.77K 292M 50M 60M 1.5ms 2ms - - - - - - - -";
        let sample = parse_line(line).unwrap();
        assert_eq!(sample.pool_name, "tank");
        assert_eq!(sample.operations_read, 1770.0);
        assert_eq!(sample.operations_write, 292_000_000.0);
        assert_eq!(sample.total_wait_read, "1.5ms");
    }

    #[test]
    fn basic_layout_fills_latency_sentinels() {
        let line = "tank 1.2T 500G 100 200 10M 20M";
        let sample = parse_line(line).unwrap();
        assert_eq!(sample.total_wait_read, "-");
        assert_eq!(sample.scrub_wait, "-");
    }

    #[test]
    fn header_lines_are_dropped() {
        let line = "capacity operations bandwidth";
        assert!(parse_line(line).is_none());
    }
}
