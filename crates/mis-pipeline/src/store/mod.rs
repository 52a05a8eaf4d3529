//! Versioned artifact storage
//!
//! Extract versions live as flat files named `TYPE_CAMPUS_TERM_NN.txt`, either
//! directly under the store root ([`Scope::Global`]) or in one folder per
//! campus ([`Scope::Campus`]). Versions are assigned as `max + 1` and are never
//! rewritten once committed. Content is written to a hidden `.partial` file
//! first and only linked under its version name once fully on disk.

mod history;

pub use history::{HistoryStore, HistoryVersion, Snapshot};

use crate::error::{PipelineError, Result};
use crate::key::{ArtifactKey, VersionedName};
use mis_common::checksum;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory scope a key's versions are stored under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// All keys share the store root
    Global,
    /// One sub-folder per campus code
    Campus,
}

/// One stored version of an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionedFile {
    pub name: VersionedName,
    pub path: PathBuf,
}

impl VersionedFile {
    pub fn key(&self) -> &ArtifactKey {
        &self.name.key
    }

    pub fn version(&self) -> u32 {
        self.name.version
    }
}

/// Flat-file store of immutable extract versions
#[derive(Debug, Clone)]
pub struct VersionedStore {
    root: PathBuf,
}

impl VersionedStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the versions of `key`
    pub fn scope_dir(&self, key: &ArtifactKey, scope: Scope) -> PathBuf {
        match scope {
            Scope::Global => self.root.clone(),
            Scope::Campus => self.root.join(&key.campus),
        }
    }

    /// Deterministic path of a version
    pub fn path_for(&self, key: &ArtifactKey, version: u32, scope: Scope) -> PathBuf {
        let name = VersionedName::new(key.clone(), version);
        self.scope_dir(key, scope).join(name.file_name())
    }

    /// Every stored version of `key`, lowest first
    pub fn versions(&self, key: &ArtifactKey, scope: Scope) -> Result<Vec<VersionedFile>> {
        let dir = self.scope_dir(key, scope);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            // Unrelated files in the scope folder are not versions of this key
            if let Ok(name) = VersionedName::parse(file_name) {
                if name.key == *key {
                    found.push(VersionedFile {
                        name,
                        path: entry.path(),
                    });
                }
            }
        }

        found.sort_by_key(|f| (f.name.version, f.name.revised));
        Ok(found)
    }

    /// Next free version for `key`, starting at 1
    pub fn next_version(&self, key: &ArtifactKey, scope: Scope) -> Result<u32> {
        let versions = self.versions(key, scope)?;
        Ok(versions.iter().map(|f| f.name.version).max().map_or(1, |v| v + 1))
    }

    /// Highest stored version of `key`, a revised copy winning its tie
    pub fn latest_of(&self, key: &ArtifactKey, scope: Scope) -> Result<Option<VersionedFile>> {
        Ok(self.versions(key, scope)?.pop())
    }

    /// Write `content` as `version` of `key`
    ///
    /// Recommitting identical content is a no-op. Different content at an
    /// existing version fails with [`PipelineError::VersionConflict`].
    pub fn commit(
        &self,
        key: &ArtifactKey,
        version: u32,
        scope: Scope,
        content: &[u8],
    ) -> Result<VersionedFile> {
        let dir = self.scope_dir(key, scope);
        std::fs::create_dir_all(&dir)?;

        let path = self.path_for(key, version, scope);
        let stored = VersionedFile {
            name: VersionedName::new(key.clone(), version),
            path: path.clone(),
        };

        let partial = dir.join(format!(".{}.partial", stored.name.file_name()));
        if let Err(e) = write_synced(&partial, content) {
            let _ = std::fs::remove_file(&partial);
            return Err(e.into());
        }
        let claimed = std::fs::hard_link(&partial, &path);
        std::fs::remove_file(&partial)?;

        match claimed {
            Ok(()) => {
                info!(path = %path.display(), version, bytes = content.len(), "Committed version");
                Ok(stored)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if checksum::file_sha256(&path)? == checksum::bytes_sha256(content) {
                    debug!(path = %path.display(), "Version already committed with same content");
                    Ok(stored)
                } else {
                    Err(PipelineError::VersionConflict(path))
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Commit `content` under the next free version
    pub fn commit_next(&self, key: &ArtifactKey, scope: Scope, content: &[u8]) -> Result<VersionedFile> {
        let version = self.next_version(key, scope)?;
        self.commit(key, version, scope, content)
    }
}

fn write_synced(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content)?;
    file.sync_all()
}
