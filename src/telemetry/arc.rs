//! ARC statistics collector: ingests `arcstat -p -f <fields> <interval>`.
//! The field list is built dynamically — L2ARC columns are included only when
//! `platform::detect_l2arc` confirms an L2ARC device is attached, since
//! requesting them on a system without one crashes the external tool (§4.4).

use super::{new_segment_label, parse, terminate_child, SegmentLabel};
use crate::error::Result;
use crate::models::{ArcSample, ArcTelemetry};
use crate::platform;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::process::Child;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const CORE_FIELDS: [&str; 10] = [
    "hit%", "miss%", "arcsz", "read", "hits", "miss", "dh%", "dm%", "ph%", "pm%",
];
const MFU_MRU_FIELDS: [&str; 4] = ["mfusz%", "mrusz%", "mfu", "mru"];
const L2_FIELDS: [&str; 3] = ["l2hit%", "l2size", "l2bytes"];
const ZFETCH_FIELDS: [&str; 4] = ["zhits", "zmisses", "zissued", "zahead"];

fn field_list(has_l2: bool) -> String {
    let mut fields: Vec<&str> = Vec::with_capacity(21);
    fields.extend_from_slice(&CORE_FIELDS);
    fields.extend_from_slice(&MFU_MRU_FIELDS);
    if has_l2 {
        fields.extend_from_slice(&L2_FIELDS);
    }
    fields.extend_from_slice(&ZFETCH_FIELDS);
    fields.join(",")
}

fn now_epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn parse_line(line: &str, has_l2: bool) -> Option<ArcSample> {
    if parse::looks_like_header(line, &["hit%", "miss%", "arcsz"]) {
        return None;
    }
    let expected = 14 + if has_l2 { 3 } else { 0 } + 4;
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < expected {
        return None;
    }

    let vals: Option<Vec<f64>> = parts[..expected].iter().map(|p| p.parse::<f64>().ok()).collect();
    let vals = vals?;

    let (l2_hit_pct, l2_size_gib, l2_bytes_mbps, zfetch_start) = if has_l2 {
        (
            vals[14],
            vals[15] / 1024f64.powi(3),
            vals[16] / 1024f64.powi(2),
            17,
        )
    } else {
        (0.0, 0.0, 0.0, 14)
    };

    Some(ArcSample {
        timestamp: now_epoch_secs(),
        hit_pct: vals[0],
        miss_pct: vals[1],
        arc_size_gib: vals[2] / 1024f64.powi(3),
        reads_per_sec: vals[3],
        hits_per_sec: vals[4],
        misses_per_sec: vals[5],
        demand_hit_pct: vals[6],
        demand_miss_pct: vals[7],
        prefetch_hit_pct: vals[8],
        prefetch_miss_pct: vals[9],
        mfu_size_pct: vals[10],
        mru_size_pct: vals[11],
        mfu_hits_per_sec: vals[12],
        mru_hits_per_sec: vals[13],
        l2_hit_pct,
        l2_size_gib,
        l2_bytes_mbps,
        zfetch_hits_per_sec: vals[zfetch_start],
        zfetch_misses_per_sec: vals[zfetch_start + 1],
        zfetch_issued_per_sec: vals[zfetch_start + 2],
        zfetch_ahead_per_sec: vals[zfetch_start + 3],
        segment_label: String::new(),
    })
}

async fn ingest_loop(
    mut lines: tokio::io::Lines<tokio::io::BufReader<tokio::process::ChildStdout>>,
    segment_label: SegmentLabel,
    sample_count: Arc<AtomicUsize>,
    has_l2: bool,
    mut cancel: watch::Receiver<bool>,
) -> Vec<ArcSample> {
    let mut samples = Vec::new();
    let mut header_skipped = false;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(raw)) => {
                        let raw = raw.trim();
                        if raw.is_empty() {
                            continue;
                        }
                        if !header_skipped && parse::looks_like_header(raw, &["hit%", "miss%", "arcsz"]) {
                            header_skipped = true;
                            continue;
                        }
                        header_skipped = true;

                        if let Some(mut sample) = parse_line(raw, has_l2) {
                            sample.segment_label = segment_label.read().unwrap().clone();
                            samples.push(sample);
                            sample_count.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        log::warn!(target: "parsed", "arcstat read error: {e}");
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

    samples
}

pub struct ArcCollector {
    child: Child,
    sample_count: Arc<AtomicUsize>,
    segment_label: SegmentLabel,
    ingest_handle: Option<JoinHandle<Vec<ArcSample>>>,
    start_time: f64,
    warmup_iterations: u32,
    has_l2arc: bool,
}

impl ArcCollector {
    pub async fn start(
        pool: &str,
        interval_s: u32,
        warmup_iterations: u32,
        cancel: watch::Receiver<bool>,
    ) -> Result<Self> {
        let has_l2arc = platform::detect_l2arc(pool).await.unwrap_or(false);
        let fields = field_list(has_l2arc);
        let interval_str = interval_s.to_string();
        let args = ["-p", "-f", &fields, &interval_str];
        let mut child = platform::spawn("arcstat", &args)?;
        let lines = platform::stdout_lines(&mut child)?;

        let sample_count = Arc::new(AtomicUsize::new(0));
        let segment_label = new_segment_label();

        let handle = tokio::spawn(ingest_loop(
            lines,
            segment_label.clone(),
            sample_count.clone(),
            has_l2arc,
            cancel.clone(),
        ));

        let start_time = now_epoch_secs();
        log::info!(target: "parsed", "arcstat collector started (l2arc: {has_l2arc})");

        let mut poll_cancel = cancel;
        while sample_count.load(Ordering::SeqCst) < warmup_iterations as usize {
            if *poll_cancel.borrow() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        Ok(ArcCollector {
            child,
            sample_count,
            segment_label,
            ingest_handle: Some(handle),
            start_time,
            warmup_iterations,
            has_l2arc,
        })
    }

    pub fn signal_segment_change(&self, label: &str) {
        *self.segment_label.write().unwrap() = label.to_string();
        log::info!(target: "parsed", "arcstat collector: segment -> {label}");
    }

    pub fn segment_label_handle(&self) -> SegmentLabel {
        self.segment_label.clone()
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count.load(Ordering::SeqCst)
    }

    pub async fn stop(mut self, cooldown_iterations: u32) -> Result<ArcTelemetry> {
        let target = self.sample_count.load(Ordering::SeqCst) + cooldown_iterations as usize;
        while self.sample_count.load(Ordering::SeqCst) < target {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        terminate_child(&mut self.child, "arcstat").await?;

        let samples = match self.ingest_handle.take() {
            Some(handle) => tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .ok()
                .and_then(|r| r.ok())
                .unwrap_or_default(),
            None => Vec::new(),
        };

        let end_time = now_epoch_secs();
        log::info!(target: "parsed", "arcstat collection complete: {} samples", samples.len());

        Ok(ArcTelemetry {
            start_time: self.start_time,
            end_time,
            warmup_iterations: self.warmup_iterations,
            cooldown_iterations,
            has_l2arc: self.has_l2arc,
            samples,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_list_omits_l2_fields_when_absent() {
        let without = field_list(false);
        assert!(!without.contains("l2hit%"));
        assert_eq!(without.split(',').count(), 18);

        let with = field_list(true);
        assert!(with.contains("l2size"));
        assert_eq!(with.split(',').count(), 21);
    }

    #[test]
    fn parses_line_without_l2_fields() {
        let line = "50 50 1073741824 100 50 50 10 10 10 10 20 20 5 5 1 2 3 4";
        let sample = parse_line(line, false).unwrap();
        assert_eq!(sample.arc_size_gib, 1.0);
        assert_eq!(sample.zfetch_hits_per_sec, 1.0);
    }

    #[test]
    fn parses_line_with_l2_fields() {
        let line = "50 50 1073741824 100 50 50 10 10 10 10 20 20 5 5 90 1073741824 1048576 1 2 3 4";
        let sample = parse_line(line, true).unwrap();
        assert_eq!(sample.l2_hit_pct, 90.0);
        assert_eq!(sample.l2_size_gib, 1.0);
        assert_eq!(sample.zfetch_ahead_per_sec, 4.0);
    }
}
