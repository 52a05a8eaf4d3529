//! `mis intake` command implementation
//!
//! Commits producer downloads as versioned extracts.

use crate::error::{CliError, Result};
use crate::output;
use crate::session::{confirm, Instance};
use crate::Cli;
use mis_pipeline::intake::{commit_intake, scan_intake};

/// Run the intake stage
pub fn run(cli: &Cli) -> Result<()> {
    let instance = Instance::open(cli)?;
    let ctx = &instance.ctx;
    let mut run = instance.start("intake")?;

    let scan = match scan_intake(ctx, run.log()) {
        Ok(scan) => scan,
        Err(e) => return run.finish(Err(e.into())),
    };

    if !cli.json {
        output::selection(&scan.selection);
    }
    if !scan.selection.is_empty()
        && !confirm(
            cli.yes,
            &format!("Commit {} producer file(s) to shared_export/?", scan.selection.selected.len()),
        )?
    {
        run.cancel();
        println!("Intake cancelled.");
        return Ok(());
    }

    let result = commit_intake(ctx, &scan, run.log()).map_err(CliError::from);
    let report = run.finish(result)?;

    if cli.json {
        return output::print_json(&report);
    }

    if report.committed.is_empty() {
        output::warning("No producer files committed");
    } else {
        let mut table = output::table(&["Key", "Version", "Lines", "Sources"]);
        for extract in &report.committed {
            table.add_row(vec![
                extract.key.to_string(),
                format!("{:02}", extract.version),
                extract.lines.to_string(),
                extract.sources.join(", "),
            ]);
        }
        println!("{}", table);
        output::success(format!("Committed {} extract(s)", report.committed.len()));
    }

    for skipped in &report.skipped {
        output::warning(format!("Skipped {}: {}", skipped.file, skipped.reason));
    }
    Ok(())
}
