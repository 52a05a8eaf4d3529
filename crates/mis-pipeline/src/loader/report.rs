//! Loading of exception reports into the fixed report table
//!
//! Column set: `REPORT_NO`, then every CSV header upper-cased with spaces
//! turned into underscores, then `ACTIVITY_DATE`. Reloading a report first
//! deletes its rows for each `(Term Id, College Id)` pair it contains.

use super::checkpoint::{Checkpoint, CheckpointStore, REPORT_CHECKPOINT};
use super::sink::ReportSink;
use crate::activity::ActivityLog;
use crate::context::PipelineContext;
use crate::error::{PipelineError, Result};
use crate::exceptions::list_reports;
use crate::settings::ResumePolicy;
use chrono::Local;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;

/// Sink table holding every loaded report
pub const REPORT_TABLE: &str = "MIS_ERROR_REPORTS";

const TERM_ID: &str = "Term Id";
const COLLEGE_ID: &str = "College Id";

/// Sink column name of a CSV header
pub fn column_name(header: &str) -> String {
    header.trim().replace(' ', "_").to_uppercase()
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportLoad {
    pub file: String,
    pub report_no: u32,
    pub rows: usize,
    pub pairs: usize,
    pub added_columns: Vec<String>,
    pub activity_date: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportRun {
    pub loaded: Vec<ReportLoad>,
}

/// Report loader over one sink
pub struct ReportLoader<'a, S: ReportSink> {
    ctx: &'a PipelineContext,
    sink: S,
    checkpoints: CheckpointStore,
    policy: ResumePolicy,
    batch_size: usize,
}

impl<'a, S: ReportSink> ReportLoader<'a, S> {
    pub fn new(ctx: &'a PipelineContext, sink: S) -> Self {
        Self {
            checkpoints: CheckpointStore::new(ctx.workspace.reports_log().join(REPORT_CHECKPOINT)),
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

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// Load every pending report, stopping at the first failure
    pub fn run(&mut self, log: &mut ActivityLog) -> Result<ReportRun> {
        let pending = list_reports(&self.ctx.workspace.reports_pending())?;
        let completed = self.ctx.workspace.reports_completed();
        std::fs::create_dir_all(&completed)?;

        if pending.is_empty() {
            log.info("No error_*.csv files found in pending folder");
        }

        let checkpoint = self.checkpoints.read()?;
        let mut run = ReportRun::default();
        for (report_no, path) in pending {
            let file = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let resume_after = match (&checkpoint, self.policy) {
                (Some(cp), ResumePolicy::Resume) if cp.file == file => Some(cp.line),
                _ => None,
            };
            log.info(format!("Processing {}...", file));

            let outcome = self
                .load_report(&path, report_no, resume_after, log)
                .and_then(|load| {
                    std::fs::rename(&path, completed.join(&file))?;
                    self.checkpoints.clear()?;
                    Ok(load)
                });
            match outcome {
                Ok(load) => {
                    log.info(format!(
                        "Loaded {} into {} with activity date {} and moved it to completed folder.",
                        file, REPORT_TABLE, load.activity_date
                    ));
                    run.loaded.push(load);
                }
                Err(e) => {
                    log.error(format!("Error processing {}: {}", file, e));
                    return Err(PipelineError::LoadAborted {
                        file,
                        source: Box::new(e),
                    });
                }
            }
        }
        Ok(run)
    }

    /// Load one report file
    ///
    /// `resume_after` is a 0-based data row index; rows up to and including it
    /// are taken as already loaded and no rows are deleted.
    pub fn load_report(
        &mut self,
        path: &Path,
        report_no: u32,
        resume_after: Option<usize>,
        log: &mut ActivityLog,
    ) -> Result<ReportLoad> {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let activity_date = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let report_key = report_no.to_string();

        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let position = |name: &str| {
            headers.iter().position(|h| h == name).ok_or_else(|| PipelineError::InvalidReport {
                path: path.to_path_buf(),
                reason: format!("missing column '{}'", name),
            })
        };
        let term_index = position(TERM_ID)?;
        let college_index = position(COLLEGE_ID)?;

        let mut columns = vec!["REPORT_NO".to_string()];
        columns.extend(headers.iter().map(|h| column_name(h)));
        columns.push("ACTIVITY_DATE".to_string());

        let mut records = Vec::new();
        for record in reader.records() {
            let mut fields: Vec<String> = record?.iter().map(str::to_string).collect();
            fields.resize(headers.len(), String::new());
            records.push(fields);
        }

        let added = self.sink.ensure_report_table(REPORT_TABLE, &columns)?;
        for column in &added {
            log.info(format!("Added column {} to existing table {}", column, REPORT_TABLE));
        }

        let pairs: BTreeSet<(String, String)> = records
            .iter()
            .map(|r| (r[term_index].trim().to_string(), r[college_index].trim().to_string()))
            .collect();
        if resume_after.is_none() {
            for (term, college) in &pairs {
                let deleted = self
                    .sink
                    .delete_report_rows(REPORT_TABLE, &report_key, term, college)?;
                log.info(format!(
                    "Deleted {} existing records for REPORT_NO={}, TERM_ID={}, COLLEGE_ID={}",
                    deleted, report_no, term, college
                ));
            }
        }

        let mut load = ReportLoad {
            file: file.clone(),
            report_no,
            rows: 0,
            pairs: pairs.len(),
            added_columns: added,
            activity_date: activity_date.clone(),
        };

        let mut batch = Vec::with_capacity(self.batch_size);
        let last_index = records.len().saturating_sub(1);
        for (index, fields) in records.into_iter().enumerate() {
            if resume_after.is_some_and(|after| index <= after) {
                continue;
            }
            let mut row = Vec::with_capacity(columns.len());
            row.push(report_key.clone());
            row.extend(fields);
            row.push(activity_date.clone());
            batch.push(row);

            if batch.len() >= self.batch_size || index == last_index {
                self.sink.insert_report_rows(REPORT_TABLE, &columns, &batch)?;
                self.checkpoints.write(&Checkpoint::new(&file, index))?;
                load.rows += batch.len();
                batch.clear();
            }
        }

        Ok(load)
    }
}
