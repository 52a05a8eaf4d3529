//! Instance loading and the lock/log lifecycle shared by every stage command

use crate::config::Settings;
use crate::error::Result;
use crate::Cli;
use mis_pipeline::{ActivityLog, PipelineContext, RunLock, RunOutcome};
use std::path::PathBuf;
use tracing::debug;

/// One instance directory with its effective settings
pub struct Instance {
    pub root: PathBuf,
    pub settings: Settings,
    pub ctx: PipelineContext,
}

impl Instance {
    /// Resolve the instance root and load its settings
    pub fn open(cli: &Cli) -> Result<Self> {
        let root = cli.instance_root()?;
        let settings = Settings::load(&root)?;
        let ctx = PipelineContext::new(root.clone(), settings.pipeline.clone())?;
        debug!(root = %root.display(), "Opened instance");
        Ok(Self { root, settings, ctx })
    }

    /// Lock the instance and open the activity log for `stage`
    pub fn start(&self, stage: &str) -> Result<StageRun> {
        let lock = RunLock::acquire(&self.root, stage)?;
        self.ctx.workspace.ensure_layout()?;
        let log = ActivityLog::for_files(
            stage,
            &self.ctx.workspace.master_log(),
            &self.ctx.workspace.session_log(),
        )?;
        Ok(StageRun { log, _lock: lock })
    }
}

/// A running stage: the activity log, with the instance lock held until
/// the run ends
pub struct StageRun {
    log: ActivityLog,
    _lock: RunLock,
}

impl StageRun {
    pub fn log(&mut self) -> &mut ActivityLog {
        &mut self.log
    }

    /// Close the log with the outcome of `result` and release the lock
    pub fn finish<T>(mut self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.log.close(RunOutcome::Completed),
            Err(e) => {
                self.log.error(format!("Error: {}", e));
                self.log.close(RunOutcome::Failed);
            }
        }
        result
    }

    /// Close the log for a run the operator declined
    pub fn cancel(self) {
        self.log.close(RunOutcome::Cancelled);
    }
}

/// Ask the operator to confirm, unless `--yes` was given
pub fn confirm(yes: bool, message: &str) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    Ok(inquire::Confirm::new(message).with_default(false).prompt()?)
}
