//! Scalar writer for visualizing training curves
//!
//! When enabled, every scalar is appended as one JSON line to
//! `scalars.jsonl` in the run's log directory. When disabled, all calls are
//! no-ops, so the trainer never has to branch on the toggle.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::utils::io::ensure_dir_exists;

/// File name of the scalar event log
pub const SCALARS_FILE: &str = "scalars.jsonl";

#[derive(Serialize)]
struct ScalarEvent<'a> {
    step: usize,
    tag: &'a str,
    value: f64,
    wall_time: f64,
}

/// Append-only scalar event writer
pub struct ScalarWriter {
    log_dir: PathBuf,
    out: Option<BufWriter<File>>,
    step: usize,
    written: usize,
}

impl ScalarWriter {
    /// Create a writer over `log_dir`; a disabled writer touches nothing on disk
    pub fn new<P: Into<PathBuf>>(log_dir: P, enabled: bool) -> Result<Self> {
        let log_dir = log_dir.into();

        let out = if enabled {
            ensure_dir_exists(&log_dir)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_dir.join(SCALARS_FILE))?;
            info!("Writing scalar logs to {}", log_dir.display());
            Some(BufWriter::new(file))
        } else {
            None
        };

        Ok(Self {
            log_dir,
            out,
            step: 0,
            written: 0,
        })
    }

    /// Select the step subsequent scalars are recorded at
    pub fn set_step(&mut self, step: usize) {
        self.step = step;
    }

    /// Record one scalar at the current step
    pub fn add_scalar(&mut self, tag: &str, value: f64) -> Result<()> {
        let Some(out) = self.out.as_mut() else {
            return Ok(());
        };

        let event = ScalarEvent {
            step: self.step,
            tag,
            value,
            wall_time: Utc::now().timestamp_millis() as f64 / 1000.0,
        };
        serde_json::to_writer(&mut *out, &event)?;
        out.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Push buffered events to disk
    pub fn flush(&mut self) -> Result<()> {
        if let Some(out) = self.out.as_mut() {
            out.flush()?;
        }
        Ok(())
    }

    /// Whether scalars are being recorded
    pub fn is_enabled(&self) -> bool {
        self.out.is_some()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.written == 0
    }

    /// Directory holding the event log
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

impl Drop for ScalarWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_disabled_writer_is_noop() {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("logs");
        let mut writer = ScalarWriter::new(&log_dir, false).unwrap();

        writer.add_scalar("lr", 0.1).unwrap();
        writer.flush().unwrap();

        assert!(!writer.is_enabled());
        assert!(writer.is_empty());
        assert!(!log_dir.exists());
    }

    #[test]
    fn test_enabled_writer_appends_lines() {
        let dir = TempDir::new().unwrap();
        let mut writer = ScalarWriter::new(dir.path(), true).unwrap();

        writer.set_step(1);
        writer.add_scalar("lr", 0.1).unwrap();
        writer.set_step(2);
        writer.add_scalar("loss", 0.5).unwrap();
        writer.flush().unwrap();

        let content = std::fs::read_to_string(dir.path().join(SCALARS_FILE)).unwrap();
        let events: Vec<serde_json::Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert!(!writer.is_empty());
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["tag"], "lr");
        assert_eq!(events[0]["step"], 1);
        assert_eq!(events[1]["value"], 0.5);
    }
}
