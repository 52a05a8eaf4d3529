//! `mis strip` command implementation
//!
//! Removes analyst-flagged records listed in an error report.

use crate::error::{CliError, Result};
use crate::output;
use crate::session::{confirm, Instance};
use crate::Cli;
use mis_pipeline::exceptions::{latest_report, ExceptionReport};
use mis_pipeline::stripper::strip_term;
use std::path::{Path, PathBuf};

fn find_report(instance: &Instance, report: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = report {
        return Ok(path.to_path_buf());
    }
    let completed = instance.ctx.workspace.reports_completed();
    latest_report(&completed)?.ok_or_else(|| {
        CliError::not_found(format!(
            "no error_NN.csv report in '{}'. Pass --report to choose one.",
            completed.display()
        ))
    })
}

/// Strip the records marked in an error report
pub fn run(
    cli: &Cli,
    report: Option<&Path>,
    term: Option<&str>,
    error_types: &[String],
    file_types: &[String],
) -> Result<()> {
    let instance = Instance::open(cli)?;
    let report_path = find_report(&instance, report)?;
    let mut exceptions = ExceptionReport::read(&report_path)?;

    let mut run = instance.start("strip")?;
    if !error_types.is_empty() {
        let marked = exceptions.mark_for_strip(error_types, file_types);
        run.log().info(format!(
            "Marked {} row(s) of {} for stripping",
            marked,
            report_path.display()
        ));
        if let Err(e) = exceptions.write() {
            return run.finish(Err(e.into()));
        }
    }

    if !confirm(
        cli.yes,
        &format!(
            "Strip {} marked record(s) listed in {}?",
            exceptions.marked(),
            report_path.display()
        ),
    )? {
        run.cancel();
        println!("Strip cancelled.");
        return Ok(());
    }

    let result = strip_term(&instance.ctx, &report_path, term, run.log()).map_err(CliError::from);
    let report = run.finish(result)?;

    if cli.json {
        return output::print_json(&report);
    }

    let mut table = output::table(&["Type", "Master", "Requested", "Removed"]);
    for file in &report.stripped {
        table.add_row(vec![
            file.record_type.clone(),
            file.file.clone(),
            file.requested.to_string(),
            file.removed.to_string(),
        ]);
    }
    println!("{}", table);
    for missing in &report.missing {
        output::warning(format!("No master for type {}", missing));
    }
    output::success(format!(
        "Removed {} record(s) from term {}; report moved to {}",
        report.removed(),
        report.term,
        report.report.display()
    ));
    Ok(())
}
