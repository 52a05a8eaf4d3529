//! Master file merge and assembly
//!
//! [`merge`] patches one key's records into a sorted master: existing lines of
//! the key's group are removed, and the new records are inserted in front of
//! the first record line that sorts after the group prefix. Untouched lines
//! keep their exact bytes, so merging a key's current content back in is a
//! no-op. A trailing `TX` line stays last, blank lines after it included.
//!
//! [`assemble`] is the full-rebuild counterpart: it concatenates the latest
//! extract of every campus into fresh masters.

use crate::activity::ActivityLog;
use crate::context::PipelineContext;
use crate::error::{PipelineError, Result};
use crate::files::{has_record_prefix, is_blank, split_lines, trim_line_end, write_atomic};
use crate::key::ArtifactKey;
use crate::layout::LayoutRegistry;
use crate::selector::{Candidate, Selection};
use crate::trailer::{generate_trailer, TrailerReport, TRAILER_TYPE};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Lines of a master after one merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub lines: Vec<Vec<u8>>,
    pub removed: usize,
    pub inserted: usize,
}

/// Replacement of one campus group inside a master
#[derive(Debug, Clone, Serialize)]
pub struct GroupMerge {
    pub campus: String,
    pub source: String,
    pub removed: usize,
    pub inserted: usize,
}

/// One master written by the merge stage
#[derive(Debug, Clone, Serialize)]
pub struct FileMerge {
    pub file: String,
    pub groups: Vec<GroupMerge>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub term: String,
    pub files: Vec<FileMerge>,
    pub copied: Vec<String>,
    pub trailer: TrailerReport,
}

/// Narrows the merge stage to some campuses or types; empty means all
#[derive(Debug, Clone, Default)]
pub struct TermFilter {
    pub campuses: Vec<String>,
    pub types: Vec<String>,
}

impl TermFilter {
    pub fn accepts(&self, candidate: &Candidate) -> bool {
        (self.campuses.is_empty() || self.campuses.contains(&candidate.key.campus))
            && (self.types.is_empty() || self.types.contains(&candidate.key.record_type))
    }
}

/// Prefixes replaced together when `key` is merged, group leader first
pub fn group_prefixes(registry: &LayoutRegistry, key: &ArtifactKey) -> Vec<String> {
    registry
        .group_members(&key.record_type)
        .into_iter()
        .map(|member| key.with_type(member).prefix())
        .collect()
}

/// Prepare extract content for insertion: one `\n` per line, blanks dropped
pub fn normalize_records(content: &[u8]) -> Vec<Vec<u8>> {
    split_lines(content)
        .iter()
        .map(|line| trim_line_end(line))
        .filter(|line| !is_blank(line))
        .map(|line| {
            let mut record = line.to_vec();
            record.push(b'\n');
            record
        })
        .collect()
}

/// First record line sorting after `prefix`, or the end of `lines`
pub fn find_insert_index(lines: &[Vec<u8>], prefix: &[u8]) -> usize {
    lines
        .iter()
        .position(|line| has_record_prefix(line) && line.as_slice() > prefix)
        .unwrap_or(lines.len())
}

fn is_trailer(line: &[u8]) -> bool {
    line.starts_with(TRAILER_TYPE.as_bytes())
}

/// Replace the lines of one group with `records`
pub fn merge(master: Vec<Vec<u8>>, prefixes: &[String], records: Vec<Vec<u8>>) -> MergeOutcome {
    let before = master.len();
    let mut lines: Vec<Vec<u8>> = master
        .into_iter()
        .filter(|line| !prefixes.iter().any(|p| line.starts_with(p.as_bytes())))
        .collect();
    let removed = before - lines.len();

    // The trailer and any blank lines after it stay at the end
    let tail = match lines.iter().rposition(|l| !is_blank(l)) {
        Some(last) if is_trailer(&lines[last]) => lines.split_off(last),
        _ => Vec::new(),
    };

    let leader = prefixes.first().map(String::as_bytes).unwrap_or_default();
    let index = find_insert_index(&lines, leader);
    if index == lines.len() && !records.is_empty() {
        if let Some(last) = lines.last_mut() {
            if !last.ends_with(b"\n") {
                last.push(b'\n');
            }
        }
    }

    let inserted = records.len();
    lines.splice(index..index, records);

    lines.extend(tail);

    MergeOutcome {
        lines,
        removed,
        inserted,
    }
}

/// Merge each `(key, source)` pair into `base` and write the result to `output`
pub fn merge_file(
    registry: &LayoutRegistry,
    base: &Path,
    output: &Path,
    groups: &[(&ArtifactKey, &Path)],
) -> Result<Vec<GroupMerge>> {
    if !base.is_file() {
        return Err(PipelineError::MissingBaseFile(base.to_path_buf()));
    }

    let mut lines = split_lines(&std::fs::read(base)?);
    let mut merged = Vec::with_capacity(groups.len());
    for (key, source) in groups {
        let records = normalize_records(&std::fs::read(source)?);
        let outcome = merge(lines, &group_prefixes(registry, key), records);
        debug!(key = %key, removed = outcome.removed, inserted = outcome.inserted, "Merged group");
        lines = outcome.lines;
        merged.push(GroupMerge {
            campus: key.campus.clone(),
            source: source
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            removed: outcome.removed,
            inserted: outcome.inserted,
        });
    }

    write_atomic(output, &lines.concat())?;
    Ok(merged)
}

/// Copy masters of `term` that the merge did not write
pub fn copy_missing(
    ctx: &PipelineContext,
    input_dir: &Path,
    output_dir: &Path,
    term: &str,
    updated: &BTreeSet<String>,
    log: &mut ActivityLog,
) -> Result<Vec<String>> {
    std::fs::create_dir_all(output_dir)?;

    let mut copied = Vec::new();
    for (name, path) in ctx.naming.masters(input_dir, Some(term))? {
        let file_name = ctx.naming.file_name(&name.term, &name.record_type);
        let target = output_dir.join(&file_name);
        if updated.contains(&file_name) || target.exists() {
            continue;
        }
        std::fs::copy(&path, &target)?;
        log.info(format!("Copied unchanged file to output: {}", file_name));
        copied.push(file_name);
    }
    Ok(copied)
}

/// Merge the selected extracts of `term` into its masters
///
/// Base masters are read from `input_dat/` and results written to
/// `final_dat/`, followed by the copy-missing pass and a fresh trailer.
pub fn merge_term(
    ctx: &PipelineContext,
    term: &str,
    selection: &Selection,
    filter: &TermFilter,
    log: &mut ActivityLog,
) -> Result<MergeReport> {
    let input_dir = ctx.workspace.input_dat();
    let output_dir = ctx.workspace.final_dat();
    if !input_dir.is_dir() {
        return Err(PipelineError::MissingDirectory(input_dir));
    }
    std::fs::create_dir_all(&output_dir)?;

    let mut by_type: BTreeMap<&str, Vec<&Candidate>> = BTreeMap::new();
    for candidate in selection.selected.iter().filter(|c| c.key.term == term) {
        if filter.accepts(candidate) {
            by_type.entry(candidate.key.record_type.as_str()).or_default().push(candidate);
        }
    }

    let mut files = Vec::new();
    let mut updated = BTreeSet::new();
    for (record_type, mut candidates) in by_type {
        candidates.sort_by(|a, b| a.key.campus.cmp(&b.key.campus));
        let file_name = ctx.naming.file_name(term, record_type);
        log.info(format!("Processing {}", file_name));

        let groups: Vec<(&ArtifactKey, &Path)> =
            candidates.iter().map(|c| (&c.key, c.path.as_path())).collect();
        let merged = merge_file(
            &ctx.registry,
            &input_dir.join(&file_name),
            &output_dir.join(&file_name),
            &groups,
        )?;

        for group in &merged {
            log.info(format!(
                "  - Updated {} records from {} ({} records)",
                group.campus, group.source, group.inserted
            ));
        }
        updated.insert(file_name.clone());
        files.push(FileMerge {
            file: file_name,
            groups: merged,
        });
    }

    let copied = copy_missing(ctx, &input_dir, &output_dir, term, &updated, log)?;
    let trailer = generate_trailer(ctx, &output_dir, term, log)?;

    Ok(MergeReport {
        term: term.to_string(),
        files,
        copied,
        trailer,
    })
}

/// One master rebuilt by [`assemble`]
#[derive(Debug, Clone, Serialize)]
pub struct AssembledFile {
    pub file: String,
    pub sources: Vec<String>,
    pub overwritten: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssembleReport {
    pub term: String,
    pub files: Vec<AssembledFile>,
    pub trailer: TrailerReport,
}

/// Concatenate raw extract bytes, one CRLF after each non-empty source
pub fn concatenate_sources(sources: &[PathBuf]) -> Result<Vec<u8>> {
    let mut content = Vec::new();
    for source in sources {
        let data = std::fs::read(source)?;
        let data = trim_line_end(&data);
        if !data.is_empty() {
            content.extend_from_slice(data);
            content.extend_from_slice(b"\r\n");
        }
    }
    Ok(content)
}

/// Rebuild the masters of `term` in `final_dat/` from the selected extracts
pub fn assemble(
    ctx: &PipelineContext,
    term: &str,
    selection: &Selection,
    log: &mut ActivityLog,
) -> Result<AssembleReport> {
    let output_dir = ctx.workspace.final_dat();
    std::fs::create_dir_all(&output_dir)?;

    let mut files = Vec::new();
    for (record_type, campuses) in selection.by_type() {
        let campuses: Vec<&Candidate> = campuses
            .into_values()
            .filter(|c| c.key.term == term)
            .collect();
        if campuses.is_empty() {
            continue;
        }

        let file_name = ctx.naming.file_name(term, &record_type);
        let target = output_dir.join(&file_name);
        let overwritten = target.exists();
        let sources: Vec<PathBuf> = campuses.iter().map(|c| c.path.clone()).collect();
        write_atomic(&target, &concatenate_sources(&sources)?)?;

        for candidate in &campuses {
            log.info(format!(
                "  - Copied {} records from {}",
                candidate.key.campus,
                candidate.file_name()
            ));
        }
        log.info(format!(
            "Created {} by raw copy with {} source files{}",
            file_name,
            sources.len(),
            if overwritten { " (existing file overwritten)" } else { "" }
        ));

        files.push(AssembledFile {
            file: file_name,
            sources: campuses.iter().map(|c| c.file_name()).collect(),
            overwritten,
        });
    }

    let trailer = generate_trailer(ctx, &output_dir, term, log)?;
    Ok(AssembleReport {
        term: term.to_string(),
        files,
        trailer,
    })
}
