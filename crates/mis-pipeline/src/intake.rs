//! Intake of producer downloads into the versioned extract store
//!
//! Producer files land in `manual_download/` as `<producer>_NN.dat`. Their
//! number is the version, their first record the key. After selection each
//! winner is committed under `shared_export/<campus>/` with the next free
//! version; members of a compound group are first concatenated into one
//! artifact filed under the group leader.

use crate::activity::ActivityLog;
use crate::context::PipelineContext;
use crate::error::{PipelineError, Result};
use crate::key::{check_campus, read_header_key, ArtifactKey};
use crate::selector::{select_latest, Candidate, Selection};
use crate::store::{Scope, VersionedStore};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Export job that wrote an intake file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Producer {
    /// General export, any record type
    Gvprmis,
    /// Course section extract, `SY` records only
    Svrcasy,
    /// Program award extract, `PP` records only
    Svrppca,
}

impl Producer {
    pub fn prefix(&self) -> &'static str {
        match self {
            Producer::Gvprmis => "gvprmis",
            Producer::Svrcasy => "svrcasy",
            Producer::Svrppca => "svrppca",
        }
    }

    pub fn accepts(&self, record_type: &str) -> bool {
        match self {
            Producer::Gvprmis => true,
            Producer::Svrcasy => record_type == "SY",
            Producer::Svrppca => record_type == "PP",
        }
    }

    /// Producer and number of an intake file name (`gvprmis_07.dat`)
    pub fn parse_file_name(name: &str) -> Result<Option<(Producer, u32)>> {
        let pattern = Regex::new(r"^(gvprmis|svrcasy|svrppca)_(\d+)\.dat$")?;
        let Some(caps) = pattern.captures(name) else {
            return Ok(None);
        };
        let producer = match &caps[1] {
            "gvprmis" => Producer::Gvprmis,
            "svrcasy" => Producer::Svrcasy,
            _ => Producer::Svrppca,
        };
        match caps[2].parse::<u32>() {
            Ok(number) => Ok(Some((producer, number))),
            Err(_) => Err(PipelineError::malformed_name(name, "producer number out of range")),
        }
    }
}

/// Intake file left out of the run
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub file: String,
    pub reason: String,
}

/// Outcome of scanning the intake area
#[derive(Debug, Clone, Default, Serialize)]
pub struct IntakeScan {
    pub selection: Selection,
    pub skipped: Vec<SkippedFile>,
}

/// Artifact written to the versioned store
#[derive(Debug, Clone, Serialize)]
pub struct CommittedExtract {
    pub key: ArtifactKey,
    pub version: u32,
    pub path: PathBuf,
    pub sources: Vec<String>,
    pub lines: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IntakeReport {
    pub committed: Vec<CommittedExtract>,
    pub skipped: Vec<SkippedFile>,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn skip(log: &mut ActivityLog, skipped: &mut Vec<SkippedFile>, file: String, reason: String) {
    log.warn(format!("Skipping {}: {}", file, reason));
    skipped.push(SkippedFile { file, reason });
}

/// Find producer files in the intake area and select the latest per key
pub fn scan_intake(ctx: &PipelineContext, log: &mut ActivityLog) -> Result<IntakeScan> {
    let dir = ctx.workspace.manual_download();
    if !dir.is_dir() {
        return Err(PipelineError::MissingDirectory(dir));
    }

    let mut entries: Vec<PathBuf> = std::fs::read_dir(&dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    entries.sort();

    let mut candidates = Vec::new();
    let mut skipped = Vec::new();

    for path in entries {
        let name = file_name(&path);
        let Some((producer, number)) = Producer::parse_file_name(&name)? else {
            debug!(file = %name, "Not a producer file");
            continue;
        };

        let key = match read_header_key(&path) {
            Ok(Some(key)) => key,
            Ok(None) => {
                skip(log, &mut skipped, name, "file is empty".to_string());
                continue;
            }
            Err(e) if e.is_skippable() => {
                skip(log, &mut skipped, name, e.to_string());
                continue;
            }
            Err(e) => return Err(e),
        };

        if !producer.accepts(&key.record_type) {
            skip(
                log,
                &mut skipped,
                name,
                format!("{} files only carry their own record type, found {}", producer.prefix(), key.record_type),
            );
            continue;
        }
        if !ctx.registry.contains(&key.record_type) {
            skip(log, &mut skipped, name, PipelineError::UnknownType(key.record_type.clone()).to_string());
            continue;
        }
        if let Err(e) = check_campus(&key, &ctx.settings.campuses, &name) {
            skip(log, &mut skipped, name, e.to_string());
            continue;
        }

        candidates.push(Candidate {
            key,
            version: number,
            revised: false,
            path,
        });
    }

    let found = candidates.len();
    let selection = select_latest(candidates);
    for conflict in &selection.ambiguous {
        let reason = conflict.to_error().to_string();
        for path in &conflict.files {
            skip(log, &mut skipped, file_name(path), reason.clone());
        }
    }
    log.info(format!(
        "Found {} producer files, selected {} latest versions",
        found,
        selection.selected.len()
    ));
    for candidate in &selection.selected {
        log.info(format!(
            "  {}: {} (version: {})",
            candidate.key,
            candidate.file_name(),
            candidate.version
        ));
    }
    for old in &selection.superseded {
        if let Some(winner) = selection.winner_of(&old.key) {
            log.info(format!("Superseded: {} by {}", old.file_name(), winner.file_name()));
        }
    }

    Ok(IntakeScan { selection, skipped })
}

/// Commit the selected intake files into the versioned store
pub fn commit_intake(ctx: &PipelineContext, scan: &IntakeScan, log: &mut ActivityLog) -> Result<IntakeReport> {
    let store = VersionedStore::new(ctx.workspace.shared_export());

    let mut artifacts: BTreeMap<ArtifactKey, Vec<&Candidate>> = BTreeMap::new();
    for candidate in &scan.selection.selected {
        let leader = ctx.registry.group_leader(&candidate.key.record_type);
        artifacts
            .entry(candidate.key.with_type(leader))
            .or_default()
            .push(candidate);
    }

    let mut report = IntakeReport {
        committed: Vec::new(),
        skipped: scan.skipped.clone(),
    };
    for (key, mut members) in artifacts {
        let order = ctx.registry.group_members(&key.record_type);
        members.sort_by_key(|c| order.iter().position(|t| *t == c.key.record_type));

        let mut content = Vec::new();
        for member in &members {
            let data = std::fs::read(&member.path)?;
            if !content.is_empty() && !content.ends_with(b"\n") {
                content.push(b'\n');
            }
            content.extend_from_slice(&data);
        }

        let stored = store.commit_next(&key, Scope::Campus, &content)?;
        let sources: Vec<String> = members.iter().map(|c| c.file_name()).collect();
        let lines = content.split(|b| *b == b'\n').filter(|l| !l.is_empty()).count();

        if members.len() > 1 {
            log.info(format!(
                "Combined {} -> {}/{} ({} lines)",
                sources.join(", "),
                key.campus,
                stored.name.file_name(),
                lines
            ));
        } else {
            log.info(format!(
                "Processed: {} -> {}/{}",
                sources.join(", "),
                key.campus,
                stored.name.file_name()
            ));
        }

        report.committed.push(CommittedExtract {
            version: stored.version(),
            key,
            path: stored.path,
            sources,
            lines,
        });
    }

    log.info(format!(
        "Intake summary: {} committed, {} skipped",
        report.committed.len(),
        report.skipped.len()
    ));
    Ok(report)
}

/// Scan and commit in one step
pub fn process_intake(ctx: &PipelineContext, log: &mut ActivityLog) -> Result<IntakeReport> {
    let scan = scan_intake(ctx, log)?;
    commit_intake(ctx, &scan, log)
}
