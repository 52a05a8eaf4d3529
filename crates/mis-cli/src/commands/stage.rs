//! `mis stage` command implementation
//!
//! Copies `final_dat/` into `input_dat/` and a new history snapshot.

use crate::error::{CliError, Result};
use crate::output;
use crate::session::{confirm, Instance};
use crate::Cli;
use mis_pipeline::HistoryStore;

/// Stage the current cycle
pub fn run(cli: &Cli) -> Result<()> {
    let instance = Instance::open(cli)?;
    let ws = &instance.ctx.workspace;
    let history = HistoryStore::new(ws.history_dat(), ws.session_log());
    let mut run = instance.start("stage")?;

    let version = match history.next_version() {
        Ok(version) => version,
        Err(e) => return run.finish(Err(e.into())),
    };
    if !confirm(
        cli.yes,
        &format!("Replace input_dat/ masters and create history snapshot {}?", version),
    )? {
        run.cancel();
        println!("Staging cancelled.");
        return Ok(());
    }

    let result = history
        .snapshot(
            &ws.final_dat(),
            &ws.input_dat(),
            &instance.settings.pipeline.master_extension,
        )
        .map_err(CliError::from);
    if let Ok(snapshot) = &result {
        run.log().info(format!(
            "Staged {} file(s) into input_dat and history {}",
            snapshot.files.len(),
            snapshot.version
        ));
    }
    let snapshot = run.finish(result)?;

    if cli.json {
        return output::print_json(&snapshot);
    }

    for file in &snapshot.files {
        println!("  {}", file);
    }
    output::success(format!(
        "Staged {} file(s) as history {}",
        snapshot.files.len(),
        snapshot.version
    ));
    if snapshot.log_archived {
        println!("  Session log archived with the snapshot");
    }
    Ok(())
}
