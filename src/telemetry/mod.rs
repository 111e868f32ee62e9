//! Telemetry collectors (C4): two long-running line-stream parsers — one for
//! `zpool iostat`, one for `arcstat` — each on its own background ingest task
//! with warm-up/cool-down sample-count gating (§4.4).
//!
//! Segment labelling is a single-writer/single-reader cell (§5): the
//! coordinator writes through `signal_segment_change`, the ingest task reads
//! it when tagging the next sample. No other synchronisation is needed.

pub mod arc;
pub mod iostat;
pub mod parse;

use crate::error::{Result, TelemetryError};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::process::Child;

/// Shared segment-label cell: one writer (coordinator), one reader (ingest task).
pub type SegmentLabel = Arc<RwLock<String>>;

pub fn new_segment_label() -> SegmentLabel {
    Arc::new(RwLock::new(String::new()))
}

/// Graceful-then-forced child termination: SIGTERM, a 2s grace window, then
/// SIGKILL (§4.4 "graceful TERM, fallback KILL after ~2s").
pub async fn terminate_child(child: &mut Child, binary: &str) -> Result<()> {
    if let Some(pid) = child.id() {
        // SAFETY: pid is a process id obtained from the live Child handle.
        unsafe {
            libc::kill(pid as i32, libc::SIGTERM);
        }
    }

    match tokio::time::timeout(Duration::from_secs(2), child.wait()).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(TelemetryError::SpawnFailed {
            binary: binary.to_string(),
            reason: e.to_string(),
        }
        .into()),
        Err(_elapsed) => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            Ok(())
        }
    }
}
