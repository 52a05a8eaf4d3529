//! Latest-version selection over a candidate pool

use crate::activity::ActivityLog;
use crate::error::PipelineError;
use crate::key::ArtifactKey;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A file competing to represent its key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub key: ArtifactKey,
    pub version: u32,
    /// Revised copies win a tie at the same version
    pub revised: bool,
    pub path: PathBuf,
}

impl Candidate {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Key whose top version is claimed by more than one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ambiguity {
    pub key: ArtifactKey,
    pub version: u32,
    pub files: Vec<PathBuf>,
}

impl Ambiguity {
    pub fn to_error(&self) -> PipelineError {
        PipelineError::AmbiguousVersion {
            key: self.key.clone(),
            version: self.version,
            files: self.files.clone(),
        }
    }
}

/// Outcome of a selection: one winner per key plus everything it displaced
///
/// Keys listed in `ambiguous` have no winner and are left out of the run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Selection {
    pub selected: Vec<Candidate>,
    pub superseded: Vec<Candidate>,
    pub ambiguous: Vec<Ambiguity>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Winner that displaced a superseded candidate
    pub fn winner_of(&self, key: &ArtifactKey) -> Option<&Candidate> {
        self.selected.iter().find(|c| &c.key == key)
    }

    /// Write superseded files and skipped keys to the activity log
    pub fn report(&self, log: &mut ActivityLog) {
        for old in &self.superseded {
            if let Some(winner) = self.winner_of(&old.key) {
                log.info(format!("Superseded: {} by {}", old.file_name(), winner.file_name()));
            }
        }
        for conflict in &self.ambiguous {
            log.warn(format!("Skipping {}: {}", conflict.key, conflict.to_error()));
        }
    }

    /// Winners grouped by record type, then campus
    pub fn by_type(&self) -> BTreeMap<String, BTreeMap<String, &Candidate>> {
        let mut grouped: BTreeMap<String, BTreeMap<String, &Candidate>> = BTreeMap::new();
        for candidate in &self.selected {
            grouped
                .entry(candidate.key.record_type.clone())
                .or_default()
                .insert(candidate.key.campus.clone(), candidate);
        }
        grouped
    }
}

/// Keep the highest version of every key
///
/// A revised copy beats a plain copy at the same version. Any other tie at
/// the top version is recorded in [`Selection::ambiguous`] and the key gets
/// no winner; other keys are unaffected.
pub fn select_latest(candidates: Vec<Candidate>) -> Selection {
    let mut pools: BTreeMap<ArtifactKey, Vec<Candidate>> = BTreeMap::new();
    for candidate in candidates {
        pools.entry(candidate.key.clone()).or_default().push(candidate);
    }

    let mut selection = Selection::default();
    for (key, mut pool) in pools {
        pool.sort_by(|a, b| {
            (b.version, b.revised)
                .cmp(&(a.version, a.revised))
                .then_with(|| a.path.cmp(&b.path))
        });

        let mut pool = pool.into_iter();
        let Some(winner) = pool.next() else {
            continue;
        };
        let rest: Vec<Candidate> = pool.collect();

        let tied: Vec<PathBuf> = rest
            .iter()
            .filter(|c| c.version == winner.version && c.revised == winner.revised)
            .map(|c| c.path.clone())
            .collect();
        if !tied.is_empty() {
            let mut files = vec![winner.path.clone()];
            files.extend(tied);
            selection.ambiguous.push(Ambiguity {
                key,
                version: winner.version,
                files,
            });
            continue;
        }

        selection.selected.push(winner);
        selection.superseded.extend(rest);
    }

    selection
}
