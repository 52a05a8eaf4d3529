//! Loader checkpoint file
//!
//! A single line `"<file>,<line index>"` naming the last line of the most
//! recently committed batch. It exists only while a file is being loaded.

use crate::error::Result;
use crate::files::write_atomic;
use std::path::{Path, PathBuf};

/// Checkpoint file of the record loader
pub const RECORD_CHECKPOINT: &str = "loader_checkpoint.txt";

/// Checkpoint file of the error report loader
pub const REPORT_CHECKPOINT: &str = "error_loader_checkpoint.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub file: String,
    /// 0-based index of the last committed line
    pub line: usize,
}

impl Checkpoint {
    pub fn new(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let (file, line) = text.trim().rsplit_once(',')?;
        Some(Self::new(file, line.trim().parse().ok()?))
    }

    pub fn to_line(&self) -> String {
        format!("{},{}\n", self.file, self.line)
    }
}

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checkpoint left by the last run, if any
    ///
    /// An unreadable checkpoint line counts as no checkpoint.
    pub fn read(&self) -> Result<Option<Checkpoint>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(Checkpoint::parse(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write(&self, checkpoint: &Checkpoint) -> Result<()> {
        write_atomic(&self.path, checkpoint.to_line().as_bytes())?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(Checkpoint::parse("U86253CB.dat,999\n"), Some(Checkpoint::new("U86253CB.dat", 999)));
        assert_eq!(Checkpoint::parse("a,b.dat,4"), Some(Checkpoint::new("a,b.dat", 4)));
        assert_eq!(Checkpoint::parse("U86253CB.dat"), None);
        assert_eq!(Checkpoint::parse("U86253CB.dat,x"), None);
    }

    #[test]
    fn test_store_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("log").join(RECORD_CHECKPOINT));
        assert_eq!(store.read().unwrap(), None);

        store.write(&Checkpoint::new("U86253SB.dat", 999)).unwrap();
        store.write(&Checkpoint::new("U86253SB.dat", 1999)).unwrap();
        assert_eq!(
            std::fs::read_to_string(store.path()).unwrap(),
            "U86253SB.dat,1999\n"
        );
        assert_eq!(store.read().unwrap().map(|c| c.line), Some(1999));

        store.clear().unwrap();
        store.clear().unwrap();
        assert_eq!(store.read().unwrap(), None);
    }
}
