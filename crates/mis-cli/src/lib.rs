//! MIS CLI Library
//!
//! Operator front-end for staging MIS submission files.
//!
//! # Overview
//!
//! Each subcommand runs one pipeline stage against an instance directory:
//!
//! - **Intake**: Commit producer downloads as versioned extracts (`mis intake`)
//! - **Length rules**: Pad or truncate fixed-length extracts (`mis normalize`)
//! - **Masters**: Rebuild (`mis assemble`) or patch (`mis merge`) term masters
//! - **Corrections**: Remove flagged records (`mis strip`)
//! - **Trailer**: Rewrite the term's record counts (`mis trailer`)
//! - **History**: Stage a cycle and restore snapshots (`mis stage`, `mis history`)
//! - **Loading**: Push masters and error reports into the sink (`mis load`, `mis load-reports`)
//! - **Housekeeping**: Empty working areas, inspect settings (`mis clean`, `mis config`)

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod commands;
pub mod config;
pub mod error;
pub mod output;
pub mod session;

pub use crate::config::Settings;
pub use crate::error::{CliError, Result};

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// MIS - submission file staging pipeline
#[derive(Parser, Debug)]
#[command(name = "mis")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Instance directory (defaults to the current directory)
    #[arg(long, env = "MIS_INSTANCE_PATH", global = true)]
    pub instance: Option<PathBuf>,

    /// Answer yes to every confirmation prompt
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print stage reports as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Print the command reference as Markdown
    #[arg(long, hide = true)]
    pub markdown_help: bool,
}

impl Cli {
    /// Instance root the command works on
    pub fn instance_root(&self) -> Result<PathBuf> {
        match &self.instance {
            Some(path) => Ok(path.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Commit producer files from manual_download/ as versioned extracts
    Intake,

    /// Fit extracts with a length rule to their exact record length
    Normalize,

    /// Rebuild a term's masters in final_dat/ from the latest extracts
    Assemble {
        /// Term code (defaults to the most recent term)
        #[arg(short, long)]
        term: Option<String>,
    },

    /// Replace campus records inside a term's masters with the latest extracts
    Merge {
        /// Term code (defaults to the most recent term found in both
        /// extracts and masters)
        #[arg(short, long)]
        term: Option<String>,

        /// Only merge these campuses
        #[arg(short, long, value_delimiter = ',')]
        campus: Vec<String>,

        /// Only merge these record types
        #[arg(short = 'T', long = "type", value_delimiter = ',')]
        record_type: Vec<String>,
    },

    /// Remove flagged records listed in an error report
    Strip {
        /// Error report (defaults to the newest error_NN.csv in the
        /// report loader's completed folder)
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Term code (defaults to the most recent term among the masters)
        #[arg(short, long)]
        term: Option<String>,

        /// Mark rows with these error types before stripping
        #[arg(short, long, value_delimiter = ',')]
        error_type: Vec<String>,

        /// Restrict marking to these file types
        #[arg(short, long, value_delimiter = ',')]
        file_type: Vec<String>,
    },

    /// Rewrite the trailer file of a term
    Trailer {
        /// Term code (defaults to the most recent term in the directory)
        #[arg(short, long)]
        term: Option<String>,

        /// Master directory (defaults to final_dat/)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Stage final_dat/ into input_dat/ and a new history snapshot
    Stage,

    /// Browse and restore history snapshots
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Load pending masters into the sink
    Load {
        /// Continue an interrupted file after its checkpoint
        #[arg(long)]
        resume: bool,
    },

    /// Load pending error reports into the sink
    LoadReports {
        /// Continue an interrupted report after its checkpoint
        #[arg(long)]
        resume: bool,
    },

    /// Empty a working area of the instance
    Clean {
        /// Area to empty
        #[arg(value_enum)]
        area: CleanArea,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// History subcommands
#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    /// List snapshots
    List,

    /// Copy a snapshot into input_dat/
    Restore {
        /// Snapshot version (e.g. 03)
        version: String,
    },

    /// Copy the newest snapshot into the loader's pending folder
    LoadLatest,
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
}

/// Working areas that `mis clean` may empty
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CleanArea {
    ManualDownload,
    SharedExport,
    InputDat,
    FinalDat,
    LoaderPending,
    ReportsPending,
}

impl From<CleanArea> for mis_pipeline::Area {
    fn from(area: CleanArea) -> Self {
        match area {
            CleanArea::ManualDownload => mis_pipeline::Area::ManualDownload,
            CleanArea::SharedExport => mis_pipeline::Area::SharedExport,
            CleanArea::InputDat => mis_pipeline::Area::InputDat,
            CleanArea::FinalDat => mis_pipeline::Area::FinalDat,
            CleanArea::LoaderPending => mis_pipeline::Area::LoaderPending,
            CleanArea::ReportsPending => mis_pipeline::Area::ReportsPending,
        }
    }
}
