//! MIS CLI - Main entry point

use clap::Parser;
use mis_cli::commands;
use mis_cli::{Cli, Commands, ConfigCommand, HistoryCommand};
use mis_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use std::process;
use tracing::error;

fn main() {
    // Instance path and MIS__* overrides may come from a .env file
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();

    // Handle markdown help generation
    if cli.markdown_help {
        println!("{}", clap_markdown::help_markdown::<Cli>());
        return;
    }

    // Ensure a command is provided
    if cli.command.is_none() {
        eprintln!("Error: A subcommand is required");
        eprintln!();
        eprintln!("For more information, try '--help'.");
        process::exit(2);
    }

    // Stage progress goes to the activity log; the console only shows
    // diagnostics unless --verbose is given
    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
        .output(LogOutput::Console)
        .log_file_prefix("mis-cli".to_string())
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    // Keep the guard alive so file output is flushed on exit
    let _guard = init_logging(&log_config);

    if let Err(e) = execute_command(&cli) {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Execute the CLI command
fn execute_command(cli: &Cli) -> mis_cli::Result<()> {
    let Some(ref command) = cli.command else {
        return Ok(());
    };

    match command {
        Commands::Intake => commands::intake::run(cli),

        Commands::Normalize => commands::normalize::run(cli),

        Commands::Assemble { term } => commands::assemble::run(cli, term.as_deref()),

        Commands::Merge {
            term,
            campus,
            record_type,
        } => commands::merge::run(cli, term.as_deref(), campus, record_type),

        Commands::Strip {
            report,
            term,
            error_type,
            file_type,
        } => commands::strip::run(cli, report.as_deref(), term.as_deref(), error_type, file_type),

        Commands::Trailer { term, dir } => {
            commands::trailer::run(cli, term.as_deref(), dir.as_deref())
        }

        Commands::Stage => commands::stage::run(cli),

        Commands::History { command } => match command {
            HistoryCommand::List => commands::history::list(cli),
            HistoryCommand::Restore { version } => commands::history::restore(cli, version),
            HistoryCommand::LoadLatest => commands::history::load_latest(cli),
        },

        Commands::Load { resume } => commands::load::records(cli, *resume),

        Commands::LoadReports { resume } => commands::load::reports(cli, *resume),

        Commands::Clean { area } => commands::clean::run(cli, *area),

        Commands::Config { command } => match command {
            ConfigCommand::Show => commands::config::show(cli),
        },
    }
}
