//! `mis config` command implementation

use crate::config::{Settings, CONFIG_FILE};
use crate::error::Result;
use crate::output;
use crate::Cli;

/// Show the effective configuration of the instance
pub fn show(cli: &Cli) -> Result<()> {
    let root = cli.instance_root()?;
    let settings = Settings::load(&root)?;

    if cli.json {
        return output::print_json(&settings);
    }

    let pipeline = &settings.pipeline;
    let lengths: Vec<String> = pipeline
        .record_lengths
        .iter()
        .map(|(code, length)| format!("{}={}", code, length))
        .collect();

    output::title("MIS Configuration:");
    println!();
    let mut table = output::table(&["Setting", "Value"]);
    table.add_row(vec!["instance".to_string(), root.display().to_string()]);
    table.add_row(vec!["district".to_string(), pipeline.district.clone()]);
    table.add_row(vec!["master_prefix".to_string(), pipeline.master_prefix.clone()]);
    table.add_row(vec!["master_extension".to_string(), pipeline.master_extension.clone()]);
    table.add_row(vec!["campuses".to_string(), pipeline.campuses.join(", ")]);
    table.add_row(vec!["record_lengths".to_string(), output::join_or_dash(&lengths)]);
    table.add_row(vec!["batch_size".to_string(), pipeline.batch_size.to_string()]);
    table.add_row(vec!["resume".to_string(), format!("{:?}", pipeline.resume).to_lowercase()]);
    table.add_row(vec![
        "sink.database".to_string(),
        settings.database_path(&root).display().to_string(),
    ]);
    println!("{}", table);
    println!();
    output::title("Sources:");
    println!("  {}  - settings file under the instance root", CONFIG_FILE);
    println!("  MIS__PIPELINE__<KEY>, MIS__SINK__<KEY>  - environment overrides");
    Ok(())
}
