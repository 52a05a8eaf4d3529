//! Build automation tasks for MIS
//!
//! Currently generates the operator command reference from the CLI
//! definitions.

use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for MIS", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the CLI reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating CLI documentation...");

    let markdown = clap_markdown::help_markdown::<mis_cli::Cli>();

    let content = format!(
        r#"# MIS CLI Reference

Generated from the CLI source code on {}.

## Overview

`mis` stages fixed-width MIS submission files for one reporting instance.
Every stage command locks the instance directory while it runs and appends
its progress to `mis-cli.log` and `history.log` in the instance root.

## A Typical Cycle

```bash
export MIS_INSTANCE_PATH=/srv/mis/2025

# Commit producer downloads dropped into manual_download/
mis intake

# Pad or truncate extracts with a record-length rule
mis normalize

# Rebuild the term's masters, or patch campuses into the staged ones
mis assemble --term 253
mis merge --term 253 --campus 861

# Stage final_dat/ into input_dat/ and history_dat/NN/
mis stage

# Queue the newest snapshot and load it
mis history load-latest
mis load
```

## Commands

{}

## Configuration

Settings come from `config/mis.toml` under the instance root, overridden by
`MIS__*` environment variables:

```toml
[pipeline]
district = "860"
master_prefix = "U86"
campuses = ["860", "861", "862", "863"]
contact_block = "OPERATOR        RESEARCH  5555550100"
batch_size = 1000
resume = "restart"

[pipeline.record_lengths]
CB = 220

[sink]
database = "dat_loader/mis.sqlite"
```

## Environment Variables

- `MIS_INSTANCE_PATH` - Instance directory (same as `--instance`)
- `MIS__PIPELINE__<KEY>` / `MIS__SINK__<KEY>` - Setting overrides
- `LOG_LEVEL`, `LOG_OUTPUT`, `LOG_FORMAT`, `LOG_DIR` - Diagnostic logging

---

*To update, run `cargo run -p xtask -- generate-cli-docs`.*
"#,
        chrono::Local::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)?;

    let file_path = output_path.join("cli-reference.md");
    fs::write(&file_path, content)?;

    println!("✅ Generated CLI documentation at: {}", file_path.display());
    Ok(())
}
