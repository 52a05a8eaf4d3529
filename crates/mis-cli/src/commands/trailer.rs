//! `mis trailer` command implementation

use crate::error::{CliError, Result};
use crate::output;
use crate::session::Instance;
use crate::Cli;
use mis_pipeline::master::{resolve_term, target_terms};
use mis_pipeline::trailer::generate_trailer;
use std::path::Path;

/// Rewrite the trailer of `term` in `dir` (default `final_dat/`)
pub fn run(cli: &Cli, term: Option<&str>, dir: Option<&Path>) -> Result<()> {
    let instance = Instance::open(cli)?;
    let ctx = &instance.ctx;
    let dir = dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| ctx.workspace.final_dat());
    let mut run = instance.start("trailer")?;

    let result = target_terms(&dir, &ctx.naming)
        .and_then(|terms| resolve_term(term, &terms))
        .and_then(|term| generate_trailer(ctx, &dir, &term, run.log()))
        .map_err(CliError::from);
    let report = run.finish(result)?;

    if cli.json {
        return output::print_json(&report);
    }

    let mut table = output::table(&["Type", "Records"]);
    for (record_type, count) in &report.counts {
        table.add_row(vec![record_type.clone(), count.to_string()]);
    }
    println!("{}", table);
    output::success(format!(
        "Wrote {} with {} entries",
        report.path.display(),
        report.entries()
    ));
    Ok(())
}
