//! `mis history` command implementation
//!
//! Lists and restores staged cycles.

use crate::error::{CliError, Result};
use crate::output;
use crate::session::{confirm, Instance};
use crate::Cli;
use mis_pipeline::HistoryStore;

fn store(instance: &Instance) -> HistoryStore {
    let ws = &instance.ctx.workspace;
    HistoryStore::new(ws.history_dat(), ws.session_log())
}

/// List snapshots, oldest first
pub fn list(cli: &Cli) -> Result<()> {
    let instance = Instance::open(cli)?;
    let versions = store(&instance).list()?;

    if cli.json {
        return output::print_json(&versions);
    }

    if versions.is_empty() {
        println!("No history snapshots yet. Run 'mis stage' to create one.");
        return Ok(());
    }

    let mut table = output::table(&["Version", "Created"]);
    for version in &versions {
        let created = version
            .modified
            .map(|m| m.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![version.name.clone(), created]);
    }
    println!("{}", table);
    Ok(())
}

/// Copy snapshot `version` into `input_dat/`
pub fn restore(cli: &Cli, version: &str) -> Result<()> {
    let instance = Instance::open(cli)?;
    let history = store(&instance);
    let mut run = instance.start("history-restore")?;

    if !confirm(
        cli.yes,
        &format!("Overwrite input_dat/ with history snapshot {}?", version),
    )? {
        run.cancel();
        println!("Restore cancelled.");
        return Ok(());
    }

    let result = history
        .restore(version, &instance.ctx.workspace.input_dat())
        .map_err(CliError::from);
    if let Ok(files) = &result {
        run.log().info(format!(
            "Restored {} file(s) from history {} into input_dat",
            files.len(),
            version
        ));
    }
    let files = run.finish(result)?;

    if cli.json {
        return output::print_json(&files);
    }
    output::success(format!(
        "Restored {} file(s) from history {}: {}",
        files.len(),
        version,
        output::join_or_dash(&files)
    ));
    Ok(())
}

/// Copy the newest snapshot into the loader's pending folder
pub fn load_latest(cli: &Cli) -> Result<()> {
    let instance = Instance::open(cli)?;
    let history = store(&instance);
    let mut run = instance.start("history-load-latest")?;

    let result = history
        .restore_latest(&instance.ctx.workspace.loader_pending())
        .map_err(CliError::from);
    match &result {
        Ok(Some((version, files))) => run.log().info(format!(
            "Copied {} file(s) from history {} to the loader pending folder",
            files.len(),
            version
        )),
        Ok(None) => run.log().warn("No history snapshots to load"),
        Err(_) => {}
    }
    let restored = run.finish(result)?;

    if cli.json {
        return output::print_json(&restored);
    }
    match restored {
        Some((version, files)) => output::success(format!(
            "Queued {} file(s) from history {} for loading",
            files.len(),
            version
        )),
        None => output::warning("No history snapshots yet. Run 'mis stage' first."),
    }
    Ok(())
}
