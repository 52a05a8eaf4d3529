//! `mis normalize` command implementation

use crate::error::{CliError, Result};
use crate::output;
use crate::session::Instance;
use crate::Cli;
use mis_pipeline::normalize::normalize_extracts;

/// Apply the configured record-length rules to the stored extracts
pub fn run(cli: &Cli) -> Result<()> {
    let instance = Instance::open(cli)?;
    let mut run = instance.start("normalize")?;
    let result = normalize_extracts(&instance.ctx, run.log()).map_err(CliError::from);
    let fixed = run.finish(result)?;

    if cli.json {
        return output::print_json(&fixed);
    }

    if fixed.is_empty() {
        output::success("All extracts already have their exact record length");
        return Ok(());
    }

    let mut table = output::table(&["Source", "New version", "Padded", "Truncated"]);
    for extract in &fixed {
        table.add_row(vec![
            file_name(&extract.source),
            file_name(&extract.committed),
            extract.report.padded.to_string(),
            extract.report.truncated.to_string(),
        ]);
    }
    println!("{}", table);
    output::success(format!("Wrote {} length-fixed version(s)", fixed.len()));
    Ok(())
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
