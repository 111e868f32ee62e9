//! Decoupled logging pipeline for benchmark runs.
//!
//! A single background OS thread drains an unbounded `crossbeam_channel` of log
//! lines and persists them to disk, independent of whatever async runtime is
//! driving the rest of the harness. This guarantees log lines survive even if
//! the run is cancelled mid-flight.
//!
//! Two files are kept per run: `logs/full/<ts>.log` (every line) and
//! `logs/parsed/<ts>.log` (only the high-level, user-facing lines logged with
//! `target: "parsed"`, e.g. "pool tank: 4T sweep complete").

use chrono::Local;
use crossbeam_channel::{unbounded, Sender};
use log::{Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

enum LogMessage {
    Line(LogLine),
    Flush(std::sync::mpsc::Sender<()>),
}

/// A single log line with metadata.
#[derive(Clone, Debug)]
pub struct LogLine {
    pub message: String,
    pub log_type: String,
    pub timestamp: String,
}

impl LogLine {
    pub fn new(message: String) -> Self {
        LogLine {
            message,
            log_type: "full".to_string(),
            timestamp: Local::now().format("%H:%M:%S%.3f").to_string(),
        }
    }

    pub fn parsed(message: String) -> Self {
        LogLine {
            message,
            log_type: "parsed".to_string(),
            timestamp: Local::now().format("%H:%M:%S%.3f").to_string(),
        }
    }
}

/// Returns `./logs` relative to the current working directory.
pub fn default_logs_path() -> std::io::Result<PathBuf> {
    Ok(std::env::current_dir()?.join("logs"))
}

/// Background-thread logger, registered as the global `log::Log` implementation.
pub struct LogCollector {
    tx: Sender<LogMessage>,
}

impl LogCollector {
    /// Create the collector and spawn its background writer thread.
    pub fn new(log_dir: PathBuf) -> std::io::Result<Self> {
        let full_dir = log_dir.join("full");
        let parsed_dir = log_dir.join("parsed");
        std::fs::create_dir_all(&full_dir)?;
        std::fs::create_dir_all(&parsed_dir)?;

        let (tx, rx) = unbounded::<LogMessage>();
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let full_path = full_dir.join(format!("{timestamp}.log"));
        let parsed_path = parsed_dir.join(format!("{timestamp}.log"));

        std::thread::spawn(move || {
            let mut full_file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&full_path)
                .ok();
            let mut parsed_file: Option<File> = None;

            while let Ok(msg) = rx.recv() {
                match msg {
                    LogMessage::Line(line) => {
                        let formatted = format!("[{}] {}\n", line.timestamp, line.message);
                        if let Some(f) = full_file.as_mut() {
                            let _ = f.write_all(formatted.as_bytes());
                            let _ = f.flush();
                        }
                        if line.log_type == "parsed" {
                            if parsed_file.is_none() {
                                parsed_file = OpenOptions::new()
                                    .create(true)
                                    .append(true)
                                    .open(&parsed_path)
                                    .ok();
                            }
                            if let Some(f) = parsed_file.as_mut() {
                                let _ = f.write_all(formatted.as_bytes());
                                let _ = f.flush();
                            }
                        }
                    }
                    LogMessage::Flush(reply) => {
                        if let Some(f) = full_file.as_mut() {
                            let _ = f.flush();
                        }
                        if let Some(f) = parsed_file.as_mut() {
                            let _ = f.flush();
                        }
                        let _ = reply.send(());
                    }
                }
            }
        });

        Ok(LogCollector { tx })
    }

    pub fn log_str(&self, message: impl Into<String>) {
        let _ = self.tx.send(LogMessage::Line(LogLine::new(message.into())));
    }

    pub fn log_parsed(&self, message: impl Into<String>) {
        let _ = self
            .tx
            .send(LogMessage::Line(LogLine::parsed(message.into())));
    }

    /// Block until every log line sent before this call is durably on disk.
    pub fn wait_for_empty(&self) -> std::io::Result<()> {
        let (reply_tx, reply_rx) = std::sync::mpsc::channel();
        self.tx
            .send(LogMessage::Flush(reply_tx))
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        reply_rx
            .recv()
            .map_err(|e| std::io::Error::other(e.to_string()))
    }
}

impl Clone for LogCollector {
    fn clone(&self) -> Self {
        LogCollector {
            tx: self.tx.clone(),
        }
    }
}

impl Log for LogCollector {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = format!("[{}] {}", record.level(), record.args());
        if record.target() == "parsed" {
            self.log_parsed(message);
        } else {
            self.log_str(message);
        }
    }

    fn flush(&self) {}
}

/// Log a terse, user-facing line at a phase boundary (dataset created,
/// collector started, sweep done, pool skipped, ...). Mirrors `log::info!`
/// but tags the record with `target: "parsed"`.
#[macro_export]
macro_rules! log_parsed {
    ($($arg:tt)*) => {
        log::info!(target: "parsed", $($arg)*);
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_log_directories() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let collector = LogCollector::new(log_dir.clone()).unwrap();
        collector.log_str("hello");
        collector.wait_for_empty().unwrap();
        assert!(log_dir.join("full").exists());
        assert!(log_dir.join("parsed").exists());
    }

    #[test]
    fn parsed_lines_land_in_parsed_log() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let collector = LogCollector::new(log_dir.clone()).unwrap();
        collector.log_parsed("pool tank: sweep complete");
        collector.wait_for_empty().unwrap();

        let parsed_dir = log_dir.join("parsed");
        let mut found_content = String::new();
        for entry in std::fs::read_dir(&parsed_dir).unwrap() {
            found_content.push_str(&std::fs::read_to_string(entry.unwrap().path()).unwrap());
        }
        assert!(found_content.contains("sweep complete"));
    }
}
