//! `mis merge` command implementation
//!
//! Replaces campus record groups inside a term's masters with the latest
//! extracts, then rewrites the trailer.

use crate::error::{CliError, Result};
use crate::output;
use crate::session::{confirm, Instance};
use crate::Cli;
use mis_pipeline::master::{available_terms, common_terms, latest_extracts, resolve_term, target_terms};
use mis_pipeline::merge::{merge_term, TermFilter};
use mis_pipeline::{ActivityLog, PipelineContext, Selection};

/// Term found among both the extracts and the base masters
fn select(ctx: &PipelineContext, term: Option<&str>, log: &mut ActivityLog) -> Result<(String, Selection)> {
    let root = ctx.workspace.shared_export();
    let terms = common_terms(
        &available_terms(&root)?,
        &target_terms(&ctx.workspace.input_dat(), &ctx.naming)?,
    );
    let term = resolve_term(term, &terms)?;
    let selection = latest_extracts(&root, &term, &ctx.registry, log)?;
    Ok((term, selection))
}

/// Merge the latest extracts of `term` into its masters
pub fn run(cli: &Cli, term: Option<&str>, campuses: &[String], types: &[String]) -> Result<()> {
    let instance = Instance::open(cli)?;
    let ctx = &instance.ctx;
    let filter = TermFilter {
        campuses: campuses.to_vec(),
        types: types.iter().map(|t| t.to_uppercase()).collect(),
    };
    let mut run = instance.start("merge")?;

    let (term, selection) = match select(ctx, term, run.log()) {
        Ok(found) => found,
        Err(e) => return run.finish(Err(e)),
    };

    let planned = selection.selected.iter().filter(|c| filter.accepts(c)).count();
    if !cli.json {
        output::selection(&selection);
    }
    if !confirm(
        cli.yes,
        &format!("Merge {} extract(s) into the term {} masters?", planned, term),
    )? {
        run.cancel();
        println!("Merge cancelled.");
        return Ok(());
    }

    let result = merge_term(ctx, &term, &selection, &filter, run.log()).map_err(CliError::from);
    let report = run.finish(result)?;

    if cli.json {
        return output::print_json(&report);
    }

    let mut table = output::table(&["Master", "Campus", "Source", "Removed", "Inserted"]);
    for file in &report.files {
        for group in &file.groups {
            table.add_row(vec![
                file.file.clone(),
                group.campus.clone(),
                group.source.clone(),
                group.removed.to_string(),
                group.inserted.to_string(),
            ]);
        }
    }
    println!("{}", table);
    if !report.copied.is_empty() {
        println!("Copied unchanged: {}", output::join_or_dash(&report.copied));
    }
    output::success(format!(
        "Merged {} master(s) for term {}; trailer has {} entries",
        report.files.len(),
        report.term,
        report.trailer.entries()
    ));
    Ok(())
}
