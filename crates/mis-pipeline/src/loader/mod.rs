//! Checkpointed loading of master files into the relational sink
//!
//! Each pending master goes through
//! `Pending -> Parsing -> BatchCommitted* -> Completed | Failed`.
//! A batch is committed before the checkpoint moves past it, so the
//! checkpoint never names a line that is not in the sink. The first failure
//! stops the whole run and leaves the file and its checkpoint in place.

pub mod checkpoint;
pub mod report;
pub mod sink;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use report::{ReportLoad, ReportLoader, ReportRun, REPORT_TABLE};
pub use sink::{RecordSink, ReportSink, SqliteSink};

use crate::activity::ActivityLog;
use crate::context::PipelineContext;
use crate::error::{PipelineError, Result};
use crate::files::{is_blank, split_lines, trim_line_end};
use crate::layout::RecordLayout;
use crate::master::MasterName;
use crate::settings::ResumePolicy;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Master types that are never loaded
pub const SKIPPED_TYPES: [&str; 2] = ["TX", "CC"];

/// Sink table of a record type
pub fn table_name(record_type: &str) -> String {
    format!("MIS_{}", record_type)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadState {
    Pending,
    Parsing,
    BatchCommitted,
    Completed,
    Failed,
}

/// Result of loading one master file
#[derive(Debug, Clone, Serialize)]
pub struct FileLoad {
    pub file: String,
    pub table: String,
    pub term: String,
    pub state: LoadState,
    pub rows: usize,
    pub batches: usize,
    pub short_lines: usize,
    /// Line index the load continued after, when resumed
    pub resumed_after: Option<usize>,
    pub table_created: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub loaded: Vec<FileLoad>,
    pub skipped: Vec<String>,
}

impl LoadReport {
    pub fn rows(&self) -> usize {
        self.loaded.iter().map(|l| l.rows).sum()
    }
}

/// Record loader over one sink
pub struct Loader<'a, S: RecordSink> {
    ctx: &'a PipelineContext,
    sink: S,
    checkpoints: CheckpointStore,
    policy: ResumePolicy,
    batch_size: usize,
}

impl<'a, S: RecordSink> Loader<'a, S> {
    pub fn new(ctx: &'a PipelineContext, sink: S) -> Self {
        Self {
            checkpoints: CheckpointStore::new(ctx.workspace.loader_log().join(checkpoint::RECORD_CHECKPOINT)),
            policy: ctx.settings.resume,
            batch_size: ctx.settings.batch_size.max(1),
            ctx,
            sink,
        }
    }

    pub fn with_policy(mut self, policy: ResumePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// Master files waiting in `dat_loader/pending/`
    pub fn pending_files(&self) -> Result<Vec<(MasterName, PathBuf)>> {
        self.ctx.naming.masters(&self.ctx.workspace.loader_pending(), None)
    }

    /// Load every pending master, stopping at the first failure
    pub fn run(&mut self, log: &mut ActivityLog) -> Result<LoadReport> {
        let ctx = self.ctx;
        let completed = ctx.workspace.loader_completed();
        let pending = self.pending_files()?;
        std::fs::create_dir_all(&completed)?;

        let checkpoint = self.checkpoints.read()?;
        if let Some(cp) = &checkpoint {
            match self.policy {
                ResumePolicy::Resume => log.info(format!(
                    "Resuming {} after line {} from an interrupted run",
                    cp.file, cp.line
                )),
                ResumePolicy::Restart => log.warn(format!(
                    "Found checkpoint for {} at line {} from an interrupted run; reloading from the start",
                    cp.file, cp.line
                )),
            }
        }

        let mut report = LoadReport::default();
        for (name, path) in pending {
            let file = file_name(&path);
            if SKIPPED_TYPES.contains(&name.record_type.as_str()) {
                log.info(format!("Skipping {}: file type {} is ignored.", file, name.record_type));
                report.skipped.push(file);
                continue;
            }
            let layout = match ctx.registry.layout(&name.record_type) {
                Ok(layout) => layout,
                Err(_) => {
                    log.warn(format!("Skipping {}: no layout found.", file));
                    report.skipped.push(file);
                    continue;
                }
            };

            let resume_after = match (&checkpoint, self.policy) {
                (Some(cp), ResumePolicy::Resume) if cp.file == file => Some(cp.line),
                _ => None,
            };
            log.info(format!(
                "Loading {} (starting at line {})...",
                file,
                resume_after.map_or(0, |line| line + 1)
            ));

            let outcome = self
                .load_file(&path, &name, layout, resume_after, log)
                .and_then(|load| {
                    std::fs::rename(&path, completed.join(&file))?;
                    self.checkpoints.clear()?;
                    Ok(load)
                });
            match outcome {
                Ok(load) => {
                    log.info(format!(
                        "Loaded {} rows into {} and moved {} to completed folder.",
                        load.rows, load.table, file
                    ));
                    report.loaded.push(load);
                }
                Err(e) => {
                    log.error(format!("Error loading {}: {}", file, e));
                    return Err(PipelineError::LoadAborted {
                        file,
                        source: Box::new(e),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Load one master into its table
    ///
    /// Without `resume_after` the term's rows are deleted first. With it,
    /// lines up to and including that index are taken as already loaded.
    pub fn load_file(
        &mut self,
        path: &Path,
        name: &MasterName,
        layout: &RecordLayout,
        resume_after: Option<usize>,
        log: &mut ActivityLog,
    ) -> Result<FileLoad> {
        let file = file_name(path);
        let mut load = FileLoad {
            file: file.clone(),
            table: table_name(&name.record_type),
            term: name.term.clone(),
            state: LoadState::Pending,
            rows: 0,
            batches: 0,
            short_lines: 0,
            resumed_after: resume_after,
            table_created: false,
        };

        load.table_created = self.sink.ensure_table(&load.table, layout)?;
        if load.table_created {
            log.info(format!("Created table {}", load.table));
        }
        if resume_after.is_none() {
            let deleted = self.sink.delete_term(&load.table, &load.term)?;
            log.info(format!(
                "Deleted {} existing records for term {} in {}",
                deleted, load.term, load.table
            ));
        }

        load.state = LoadState::Parsing;
        let expected = layout.total_length();
        let mut rows = Vec::with_capacity(self.batch_size);
        let lines = split_lines(&std::fs::read(path)?);
        let last_index = lines.len().saturating_sub(1);

        for (index, line) in lines.iter().enumerate() {
            if resume_after.is_some_and(|after| index <= after) {
                continue;
            }
            let record = trim_line_end(line);
            if !is_blank(record) {
                if record.len() < expected {
                    if load.short_lines == 0 {
                        log.warn(format!(
                            "{} appears to use an older format: line length {} (expected {}). \
                             All missing fields will be set to blank for this file.",
                            file,
                            record.len(),
                            expected
                        ));
                    }
                    load.short_lines += 1;
                }
                rows.push(layout.parse(record));
            }

            if rows.len() >= self.batch_size || (index == last_index && !rows.is_empty()) {
                self.sink.insert_batch(&load.table, layout, &rows)?;
                self.checkpoints.write(&Checkpoint::new(&file, index))?;
                load.rows += rows.len();
                load.batches += 1;
                load.state = LoadState::BatchCommitted;
                rows.clear();
            }
        }

        load.state = LoadState::Completed;
        Ok(load)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::settings::PipelineSettings;

    fn setup(batch_size: usize) -> (tempfile::TempDir, PipelineContext) {
        let dir = tempfile::tempdir().unwrap();
        let settings = PipelineSettings {
            batch_size,
            ..Default::default()
        };
        let ctx = PipelineContext::new(dir.path(), settings).unwrap();
        ctx.workspace.ensure_layout().unwrap();
        (dir, ctx)
    }

    fn pp_lines(n: usize) -> String {
        (0..n).map(|i| format!("PP861253{:032}\n", i)).collect()
    }

    #[test]
    fn test_run_loads_and_moves_files() {
        let (_dir, ctx) = setup(3);
        let pending = ctx.workspace.loader_pending();
        std::fs::write(pending.join("U86253PP.dat"), pp_lines(7)).unwrap();
        std::fs::write(pending.join("U86253TX.dat"), "TX860253...\n").unwrap();
        std::fs::write(pending.join("U86253ZZ.dat"), "ZZ861253\n").unwrap();

        let (mut log, sink) = ActivityLog::in_memory("load");
        let mut loader = Loader::new(&ctx, SqliteSink::in_memory().unwrap());
        let report = loader.run(&mut log).unwrap();

        assert_eq!(report.loaded.len(), 1);
        assert_eq!(report.loaded[0].rows, 7);
        assert_eq!(report.loaded[0].batches, 3);
        assert_eq!(report.loaded[0].state, LoadState::Completed);
        assert_eq!(report.skipped, vec!["U86253TX.dat", "U86253ZZ.dat"]);
        assert!(sink.contains("no layout found"));

        assert_eq!(loader.sink().count_rows("MIS_PP").unwrap(), 7);
        assert!(ctx.workspace.loader_completed().join("U86253PP.dat").exists());
        assert!(!pending.join("U86253PP.dat").exists());
        assert_eq!(loader.checkpoints().read().unwrap(), None);
    }

    #[test]
    fn test_reload_replaces_term() {
        let (_dir, ctx) = setup(1000);
        let pending = ctx.workspace.loader_pending();
        let mut loader = Loader::new(&ctx, SqliteSink::in_memory().unwrap());
        let (mut log, _) = ActivityLog::in_memory("load");

        std::fs::write(pending.join("U86253PP.dat"), pp_lines(5)).unwrap();
        loader.run(&mut log).unwrap();
        std::fs::write(pending.join("U86253PP.dat"), pp_lines(2)).unwrap();
        loader.run(&mut log).unwrap();

        assert_eq!(loader.sink().count_rows("MIS_PP").unwrap(), 2);
    }

    #[test]
    fn test_short_lines_warn_once_and_blank_fill() {
        let (_dir, ctx) = setup(1000);
        std::fs::write(
            ctx.workspace.loader_pending().join("U86253PP.dat"),
            "PP861253\nPP862253AB\n\nPP863253\n",
        )
        .unwrap();

        let (mut log, sink) = ActivityLog::in_memory("load");
        let mut loader = Loader::new(&ctx, SqliteSink::in_memory().unwrap());
        let report = loader.run(&mut log).unwrap();

        assert_eq!(report.loaded[0].rows, 3);
        assert_eq!(report.loaded[0].short_lines, 3);
        let warnings = sink.lines().iter().filter(|l| l.contains("older format")).count();
        assert_eq!(warnings, 1);
    }
}
