//! `mis assemble` command implementation
//!
//! Rebuilds a term's masters in `final_dat/` from the latest extracts.

use crate::error::{CliError, Result};
use crate::output;
use crate::session::{confirm, Instance};
use crate::Cli;
use mis_pipeline::master::{available_terms, latest_extracts, resolve_term};
use mis_pipeline::merge::assemble;
use mis_pipeline::{ActivityLog, PipelineContext, Selection};

fn select(ctx: &PipelineContext, term: Option<&str>, log: &mut ActivityLog) -> Result<(String, Selection)> {
    let root = ctx.workspace.shared_export();
    let term = resolve_term(term, &available_terms(&root)?)?;
    let selection = latest_extracts(&root, &term, &ctx.registry, log)?;
    Ok((term, selection))
}

/// Assemble the masters of `term`, or of the most recent term
pub fn run(cli: &Cli, term: Option<&str>) -> Result<()> {
    let instance = Instance::open(cli)?;
    let ctx = &instance.ctx;
    let mut run = instance.start("assemble")?;

    let (term, selection) = match select(ctx, term, run.log()) {
        Ok(found) => found,
        Err(e) => return run.finish(Err(e)),
    };

    if selection.is_empty() {
        run.log().warn(format!("No extracts found for term {}", term));
        run.finish(Ok(()))?;
        output::warning(format!("No extracts found for term {}", term));
        return Ok(());
    }

    let types = selection.by_type().len();
    if !cli.json {
        output::selection(&selection);
    }
    if !confirm(
        cli.yes,
        &format!("Rebuild {} master(s) for term {} in final_dat/?", types, term),
    )? {
        run.cancel();
        println!("Assembly cancelled.");
        return Ok(());
    }

    let result = assemble(ctx, &term, &selection, run.log()).map_err(CliError::from);
    let report = run.finish(result)?;

    if cli.json {
        return output::print_json(&report);
    }

    let mut table = output::table(&["Master", "Sources", "Overwritten"]);
    for file in &report.files {
        table.add_row(vec![
            file.file.clone(),
            file.sources.join(", "),
            if file.overwritten { "yes" } else { "no" }.to_string(),
        ]);
    }
    println!("{}", table);
    output::success(format!(
        "Assembled {} master(s) for term {}; trailer has {} entries",
        report.files.len(),
        report.term,
        report.trailer.entries()
    ));
    Ok(())
}
