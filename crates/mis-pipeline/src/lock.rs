//! Single-writer lock for an instance directory

use crate::error::{PipelineError, Result};
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Lock file name placed in the instance root
pub const LOCK_FILE: &str = ".mis-run.lock";

/// Held for the duration of a stage run; the lock file is removed on drop
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Claim `dir` for `stage`
    ///
    /// Fails with [`PipelineError::RunLocked`] while another run holds it.
    pub fn acquire(dir: &Path, stage: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(LOCK_FILE);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(
                    file,
                    "pid={} stage={} started={}",
                    std::process::id(),
                    stage,
                    Local::now().format("%Y-%m-%d %H:%M:%S")
                )?;
                debug!(path = %path.display(), stage, "Acquired run lock");
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let holder = std::fs::read_to_string(&path)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_else(|_| "unknown holder".to_string());
                Err(PipelineError::RunLocked { path, holder })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "Failed to remove run lock");
        }
    }
}
