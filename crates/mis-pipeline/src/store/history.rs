//! Whole-cycle history snapshots
//!
//! Each staging cycle gets a two-digit folder under the history root. Files
//! are copied into the current location and the snapshot as a pair: both
//! copies are written to temporary names first and only renamed into place
//! once both exist.

use crate::error::{PipelineError, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Name of the session log archived with each snapshot
pub const SESSION_LOG: &str = "history.log";

/// One snapshot folder
#[derive(Debug, Clone, Serialize)]
pub struct HistoryVersion {
    pub name: String,
    pub path: PathBuf,
    pub modified: Option<DateTime<Local>>,
}

/// Result of staging a cycle
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub version: String,
    pub files: Vec<String>,
    pub log_archived: bool,
}

/// Two-digit versioned history of staged cycles
#[derive(Debug, Clone)]
pub struct HistoryStore {
    root: PathBuf,
    session_log: PathBuf,
}

fn version_number(name: &str) -> Option<u32> {
    if name.len() >= 2 && name.bytes().all(|b| b.is_ascii_digit()) {
        name.parse().ok()
    } else {
        None
    }
}

fn partial_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!(".{}.partial", name))
}

impl HistoryStore {
    pub fn new(root: impl Into<PathBuf>, session_log: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            session_log: session_log.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Snapshot folders, oldest first
    pub fn list(&self) -> Result<Vec<HistoryVersion>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut versions = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(number) = version_number(&name) {
                let modified = entry.metadata()?.modified().ok().map(DateTime::<Local>::from);
                versions.push((
                    number,
                    HistoryVersion {
                        name,
                        path: entry.path(),
                        modified,
                    },
                ));
            }
        }

        versions.sort_by_key(|(number, _)| *number);
        Ok(versions.into_iter().map(|(_, v)| v).collect())
    }

    /// Next snapshot folder name (`"01"` for an empty history)
    pub fn next_version(&self) -> Result<String> {
        let highest = self
            .list()?
            .iter()
            .filter_map(|v| version_number(&v.name))
            .max()
            .unwrap_or(0);
        Ok(format!("{:02}", highest + 1))
    }

    /// Stage every `*.{extension}` file of `source_dir` into `current_dir`
    /// and a new snapshot, then archive and reset the session log
    pub fn snapshot(&self, source_dir: &Path, current_dir: &Path, extension: &str) -> Result<Snapshot> {
        if !source_dir.is_dir() {
            return Err(PipelineError::MissingDirectory(source_dir.to_path_buf()));
        }

        let mut sources: Vec<PathBuf> = std::fs::read_dir(source_dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(extension))
            })
            .collect();
        sources.sort();

        let version = self.next_version()?;
        let version_dir = self.root.join(&version);
        std::fs::create_dir_all(&version_dir)?;
        std::fs::create_dir_all(current_dir)?;

        let mut files = Vec::with_capacity(sources.len());
        for source in &sources {
            let Some(name) = source.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            copy_pair(source, name, current_dir, &version_dir)?;
            files.push(name.to_string());
        }

        let log_archived = if self.session_log.is_file() {
            std::fs::copy(&self.session_log, version_dir.join(SESSION_LOG))?;
            std::fs::File::create(&self.session_log)?;
            true
        } else {
            false
        };

        info!(version = %version, files = files.len(), "Staged history snapshot");
        Ok(Snapshot {
            version,
            files,
            log_archived,
        })
    }

    /// Copy a snapshot's files into `dest`, leaving its session log behind
    pub fn restore(&self, version: &str, dest: &Path) -> Result<Vec<String>> {
        let dir = self.root.join(version);
        if version_number(version).is_none() || !dir.is_dir() {
            return Err(PipelineError::MissingDirectory(dir));
        }
        std::fs::create_dir_all(dest)?;

        let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        entries.sort();

        let mut restored = Vec::new();
        for path in entries {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name == SESSION_LOG {
                continue;
            }
            std::fs::copy(&path, dest.join(name))?;
            restored.push(name.to_string());
        }

        info!(version, files = restored.len(), dest = %dest.display(), "Restored history snapshot");
        Ok(restored)
    }

    /// Restore the newest snapshot, if any, into `dest`
    pub fn restore_latest(&self, dest: &Path) -> Result<Option<(String, Vec<String>)>> {
        match self.list()?.pop() {
            Some(latest) => {
                let files = self.restore(&latest.name, dest)?;
                Ok(Some((latest.name, files)))
            }
            None => {
                warn!(root = %self.root.display(), "No history snapshots found");
                Ok(None)
            }
        }
    }
}

/// Copy `source` into both directories, renaming into place only after both
/// copies succeeded
fn copy_pair(source: &Path, name: &str, current_dir: &Path, version_dir: &Path) -> Result<()> {
    let staged = [
        (partial_path(current_dir, name), current_dir.join(name)),
        (partial_path(version_dir, name), version_dir.join(name)),
    ];

    for (partial, _) in &staged {
        if let Err(e) = std::fs::copy(source, partial) {
            for (partial, _) in &staged {
                let _ = std::fs::remove_file(partial);
            }
            return Err(e.into());
        }
    }
    for (partial, target) in &staged {
        std::fs::rename(partial, target)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: HistoryStore,
        final_dir: PathBuf,
        input_dir: PathBuf,
        log: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let final_dir = dir.path().join("final_dat");
        std::fs::create_dir_all(&final_dir).unwrap();
        std::fs::write(final_dir.join("U86253CB.dat"), "CB861253\n").unwrap();
        std::fs::write(final_dir.join("U86253TX.dat"), "TX860253\n").unwrap();
        std::fs::write(final_dir.join("notes.txt"), "skip").unwrap();
        let log = dir.path().join(SESSION_LOG);
        std::fs::write(&log, "2025-07-01 10:00:00 - merged\n").unwrap();

        Fixture {
            store: HistoryStore::new(dir.path().join("history_dat"), &log),
            input_dir: dir.path().join("input_dat"),
            final_dir,
            log,
            _dir: dir,
        }
    }

    #[test]
    fn test_next_version_on_empty_history() {
        let fx = fixture();
        assert_eq!(fx.store.next_version().unwrap(), "01");
        assert!(fx.store.list().unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_copies_pairwise_and_resets_log() {
        let fx = fixture();
        let snapshot = fx.store.snapshot(&fx.final_dir, &fx.input_dir, "dat").unwrap();

        assert_eq!(snapshot.version, "01");
        assert_eq!(snapshot.files, vec!["U86253CB.dat", "U86253TX.dat"]);
        assert!(snapshot.log_archived);

        let version_dir = fx.store.root().join("01");
        for name in &snapshot.files {
            let current = std::fs::read(fx.input_dir.join(name)).unwrap();
            let archived = std::fs::read(version_dir.join(name)).unwrap();
            assert_eq!(current, archived);
        }
        assert!(!fx.input_dir.join("notes.txt").exists());
        assert!(!fx.input_dir.join(".U86253CB.dat.partial").exists());
        assert_eq!(
            std::fs::read_to_string(version_dir.join(SESSION_LOG)).unwrap(),
            "2025-07-01 10:00:00 - merged\n"
        );
        assert_eq!(std::fs::read_to_string(&fx.log).unwrap(), "");

        assert_eq!(fx.store.next_version().unwrap(), "02");
    }

    #[test]
    fn test_snapshot_requires_source() {
        let fx = fixture();
        let missing = fx.final_dir.join("nope");
        let err = fx.store.snapshot(&missing, &fx.input_dir, "dat").unwrap_err();
        assert!(matches!(err, PipelineError::MissingDirectory(_)));
    }

    #[test]
    fn test_restore_skips_session_log() {
        let fx = fixture();
        fx.store.snapshot(&fx.final_dir, &fx.input_dir, "dat").unwrap();
        std::fs::write(fx.final_dir.join("U86253SB.dat"), "SB861253\n").unwrap();
        fx.store.snapshot(&fx.final_dir, &fx.input_dir, "dat").unwrap();

        let pending = fx.final_dir.parent().unwrap().join("dat_loader").join("pending");
        let (version, files) = fx.store.restore_latest(&pending).unwrap().unwrap();
        assert_eq!(version, "02");
        assert_eq!(files.len(), 3);
        assert!(!pending.join(SESSION_LOG).exists());

        let restored = fx.store.restore("01", &pending).unwrap();
        assert_eq!(restored.len(), 2);
        assert!(matches!(
            fx.store.restore("07", &pending),
            Err(PipelineError::MissingDirectory(_))
        ));
    }
}
