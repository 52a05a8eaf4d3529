//! `mis load` and `mis load-reports` command implementations

use crate::error::{CliError, Result};
use crate::output;
use crate::session::Instance;
use crate::Cli;
use mis_pipeline::loader::{Loader, ReportLoader, SqliteSink};
use mis_pipeline::ResumePolicy;

fn policy(instance: &Instance, resume: bool) -> ResumePolicy {
    if resume {
        ResumePolicy::Resume
    } else {
        instance.settings.pipeline.resume
    }
}

/// Load pending masters into the sink
pub fn records(cli: &Cli, resume: bool) -> Result<()> {
    let instance = Instance::open(cli)?;
    let database = instance.settings.database_path(&instance.root);
    let mut run = instance.start("load")?;

    let result = SqliteSink::open(&database)
        .and_then(|sink| {
            Loader::new(&instance.ctx, sink)
                .with_policy(policy(&instance, resume))
                .run(run.log())
        })
        .map_err(CliError::from);
    let report = run.finish(result)?;

    if cli.json {
        return output::print_json(&report);
    }

    let mut table = output::table(&["File", "Table", "Term", "Rows", "Batches", "Resumed after"]);
    for load in &report.loaded {
        table.add_row(vec![
            load.file.clone(),
            load.table.clone(),
            load.term.clone(),
            load.rows.to_string(),
            load.batches.to_string(),
            load.resumed_after
                .map(|line| line.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    println!("{}", table);
    if !report.skipped.is_empty() {
        println!("Not loaded: {}", output::join_or_dash(&report.skipped));
    }
    output::success(format!(
        "Loaded {} row(s) from {} file(s) into {}",
        report.rows(),
        report.loaded.len(),
        database.display()
    ));
    Ok(())
}

/// Load pending error reports into the sink
pub fn reports(cli: &Cli, resume: bool) -> Result<()> {
    let instance = Instance::open(cli)?;
    let database = instance.settings.database_path(&instance.root);
    let mut run = instance.start("load-reports")?;

    let result = SqliteSink::open(&database)
        .and_then(|sink| {
            ReportLoader::new(&instance.ctx, sink)
                .with_policy(policy(&instance, resume))
                .run(run.log())
        })
        .map_err(CliError::from);
    let report = run.finish(result)?;

    if cli.json {
        return output::print_json(&report);
    }

    let mut table = output::table(&["Report", "Number", "Rows", "Terms/Colleges", "Activity date"]);
    for load in &report.loaded {
        table.add_row(vec![
            load.file.clone(),
            load.report_no.to_string(),
            load.rows.to_string(),
            load.pairs.to_string(),
            load.activity_date.clone(),
        ]);
    }
    println!("{}", table);
    output::success(format!("Loaded {} report(s)", report.loaded.len()));
    Ok(())
}
