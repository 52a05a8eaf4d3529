//! Removal of analyst-flagged records from master files

use crate::activity::ActivityLog;
use crate::context::PipelineContext;
use crate::error::{PipelineError, Result};
use crate::exceptions::ExceptionReport;
use crate::files::{split_lines, write_atomic};
use crate::master::{resolve_term, target_terms};
use crate::trailer::{generate_trailer, TrailerReport, TRAILER_TYPE};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Copy `input` to `output` without the given 1-based line numbers
///
/// Returns the number of lines removed. Line numbers past the end of the
/// file are ignored.
pub fn strip_lines(input: &Path, output: &Path, remove: &BTreeSet<usize>) -> Result<usize> {
    if remove.is_empty() {
        std::fs::copy(input, output)?;
        return Ok(0);
    }

    let mut removed = 0;
    let mut kept = Vec::new();
    for (index, line) in split_lines(&std::fs::read(input)?).into_iter().enumerate() {
        if remove.contains(&(index + 1)) {
            removed += 1;
        } else {
            kept.extend_from_slice(&line);
        }
    }
    write_atomic(output, &kept)?;
    Ok(removed)
}

#[derive(Debug, Clone, Serialize)]
pub struct StrippedFile {
    pub record_type: String,
    pub file: String,
    pub requested: usize,
    pub removed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct StripReport {
    pub term: String,
    pub stripped: Vec<StrippedFile>,
    /// Planned types without a master file
    pub missing: Vec<String>,
    pub copied: Vec<String>,
    pub trailer: TrailerReport,
    /// Where the processed report was moved
    pub report: PathBuf,
}

impl StripReport {
    pub fn removed(&self) -> usize {
        self.stripped.iter().map(|s| s.removed).sum()
    }
}

/// Apply the strip plan of `report_path` to the masters of one term
///
/// Masters are read from `input_dat/` and written to `final_dat/`. The term
/// defaults to the most recent one among the input masters.
pub fn strip_term(
    ctx: &PipelineContext,
    report_path: &Path,
    term: Option<&str>,
    log: &mut ActivityLog,
) -> Result<StripReport> {
    let input_dir = ctx.workspace.input_dat();
    let output_dir = ctx.workspace.final_dat();
    let term = resolve_term(term, &target_terms(&input_dir, &ctx.naming)?)?;
    std::fs::create_dir_all(&output_dir)?;

    let report = ExceptionReport::read(report_path)?;
    let plan = report.strip_plan(&ctx.registry);
    log.info(format!(
        "Processing {}: {} of {} rows marked for stripping",
        report_path.display(),
        report.marked(),
        report.len()
    ));

    let masters = ctx.naming.masters(&input_dir, Some(&term))?;
    let mut stripped = Vec::new();
    let mut missing = Vec::new();
    for (record_type, numbers) in &plan {
        let Some((_, input)) = masters.iter().find(|(name, _)| &name.record_type == record_type) else {
            log.warn(format!("No master file found for {} - skipping", record_type));
            missing.push(record_type.clone());
            continue;
        };

        let file = ctx.naming.file_name(&term, record_type);
        let removed = strip_lines(input, &output_dir.join(&file), numbers)?;
        log.info(format!(
            "  {}: removed {} of {} requested records -> {}",
            record_type,
            removed,
            numbers.len(),
            file
        ));
        stripped.push(StrippedFile {
            record_type: record_type.clone(),
            file,
            requested: numbers.len(),
            removed,
        });
    }

    let mut copied = Vec::new();
    for (name, input) in &masters {
        if name.record_type == TRAILER_TYPE || plan.contains_key(&name.record_type) {
            continue;
        }
        let file = ctx.naming.file_name(&name.term, &name.record_type);
        let target = output_dir.join(&file);
        if !target.exists() {
            std::fs::copy(input, &target)?;
            log.info(format!("  Copied {} (no errors to strip)", file));
            copied.push(file);
        }
    }

    let trailer = generate_trailer(ctx, &output_dir, &term, log)?;

    let pending = ctx.workspace.reports_pending();
    std::fs::create_dir_all(&pending)?;
    let file_name = report_path
        .file_name()
        .ok_or_else(|| PipelineError::InvalidReport {
            path: report_path.to_path_buf(),
            reason: "not a file".to_string(),
        })?;
    let moved = pending.join(file_name);
    std::fs::rename(report_path, &moved)?;
    log.info(format!("Moved {} to {}", report_path.display(), moved.display()));

    Ok(StripReport {
        term,
        stripped,
        missing,
        copied,
        trailer,
        report: moved,
    })
}
