//! `mis clean` command implementation
//!
//! Empties one working area of the instance.

use crate::error::{CliError, Result};
use crate::output;
use crate::session::{confirm, Instance};
use crate::{Cli, CleanArea};
use mis_pipeline::Workspace;

/// Empty `area`, keeping its sub-folders
pub fn run(cli: &Cli, area: CleanArea) -> Result<()> {
    let instance = Instance::open(cli)?;
    let dir = instance.ctx.workspace.area(area.into());
    let mut run = instance.start("clean")?;

    if !confirm(cli.yes, &format!("Delete everything in {}?", dir.display()))? {
        run.cancel();
        println!("Clean cancelled.");
        return Ok(());
    }

    let result = Workspace::clean_dir(&dir).map_err(CliError::from);
    if let Ok(report) = &result {
        run.log().info(format!("Removed {} item(s) from {}", report.removed, dir.display()));
        for (path, reason) in &report.failures {
            run.log().warn(format!("Could not remove {}: {}", path.display(), reason));
        }
    }
    let report = run.finish(result)?;

    if cli.json {
        return output::print_json(&report);
    }
    output::success(format!("Removed {} item(s) from {}", report.removed, dir.display()));
    for (path, reason) in &report.failures {
        output::warning(format!("Could not remove {}: {}", path.display(), reason));
    }
    Ok(())
}
