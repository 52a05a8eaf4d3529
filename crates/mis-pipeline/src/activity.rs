//! Operator activity log
//!
//! Every stage writes a plain-text audit trail of what it did. The log is
//! passed into each stage explicitly: it is opened when a run starts, writes
//! a start banner, and writes a finish banner when closed. A log dropped
//! without being closed records that the run was interrupted.
//!
//! Lines look like `2025-07-01 10:42:13 - Merged U86253CB.dat`. Each message
//! is also emitted through `tracing` at the matching level.

use crate::error::Result;
use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

/// Destination for audit lines
pub trait ActivitySink: Send {
    /// Append one complete line (without terminator)
    fn write_line(&mut self, line: &str) -> std::io::Result<()>;

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }

    /// Name used when reporting a failed write
    fn describe(&self) -> String;
}

/// Appends lines to a file, writing each line through immediately
pub struct FileSink {
    path: PathBuf,
    file: File,
}

impl FileSink {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ActivitySink for FileSink {
    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.file.write_all(format!("{}\n", line).as_bytes())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.sync_data()
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Collects lines in memory
#[derive(Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines written so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Whether any line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl ActivitySink for MemorySink {
    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.lines
            .lock()
            .map_err(|e| std::io::Error::other(e.to_string()))?
            .push(line.to_string());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed,
    Cancelled,
}

#[derive(Clone, Copy)]
enum Level {
    Info,
    Warn,
    Error,
}

/// Audit log for one stage run
pub struct ActivityLog {
    stage: String,
    sinks: Vec<Box<dyn ActivitySink>>,
    closed: bool,
}

impl ActivityLog {
    /// Start a run and write its banner
    pub fn open(stage: impl Into<String>, sinks: Vec<Box<dyn ActivitySink>>) -> Self {
        let mut log = Self {
            stage: stage.into(),
            sinks,
            closed: false,
        };
        let banner = format!("===== {} started =====", log.stage);
        log.record(Level::Info, &banner);
        log
    }

    /// Log writing to the instance log and the session history log
    pub fn for_files(stage: impl Into<String>, master_log: &Path, session_log: &Path) -> Result<Self> {
        let sinks: Vec<Box<dyn ActivitySink>> = vec![
            Box::new(FileSink::open(master_log)?),
            Box::new(FileSink::open(session_log)?),
        ];
        Ok(Self::open(stage, sinks))
    }

    /// Log backed by a single memory sink
    pub fn in_memory(stage: impl Into<String>) -> (Self, MemorySink) {
        let sink = MemorySink::new();
        (Self::open(stage, vec![Box::new(sink.clone())]), sink)
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn info(&mut self, message: impl AsRef<str>) {
        self.record(Level::Info, message.as_ref());
    }

    pub fn warn(&mut self, message: impl AsRef<str>) {
        self.record(Level::Warn, message.as_ref());
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        self.record(Level::Error, message.as_ref());
    }

    /// Write the finish banner and flush every sink
    pub fn close(mut self, outcome: RunOutcome) {
        self.finish(outcome);
    }

    fn finish(&mut self, outcome: RunOutcome) {
        let banner = match outcome {
            RunOutcome::Completed => format!("===== {} finished =====", self.stage),
            RunOutcome::Failed => format!("===== {} finished with error =====", self.stage),
            RunOutcome::Cancelled => format!("===== {} cancelled by operator =====", self.stage),
        };
        self.record(Level::Info, &banner);
        for sink in &mut self.sinks {
            if let Err(e) = sink.flush() {
                error!(sink = %sink.describe(), error = %e, "Failed to flush activity log");
            }
        }
        self.closed = true;
    }

    fn record(&mut self, level: Level, message: &str) {
        match level {
            Level::Info => info!(stage = %self.stage, "{}", message),
            Level::Warn => warn!(stage = %self.stage, "{}", message),
            Level::Error => error!(stage = %self.stage, "{}", message),
        }

        let line = format!("{} - {}", Local::now().format("%Y-%m-%d %H:%M:%S"), message);
        for sink in &mut self.sinks {
            if let Err(e) = sink.write_line(&line) {
                error!(sink = %sink.describe(), error = %e, "Failed to write activity log");
            }
        }
    }
}

impl Drop for ActivityLog {
    fn drop(&mut self) {
        if !self.closed {
            let banner = format!("===== {} finished with interruption =====", self.stage);
            self.record(Level::Warn, &banner);
            self.closed = true;
        }
    }
}
