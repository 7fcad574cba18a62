pub mod commands;

use clap::{Parser, Subcommand};
use raidbook_core::export::ExportKind;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "raidbook",
    about = "Raidbook operator CLI",
    long_about = "Operate the raidbook store: migrations, config inspection, raid exports and item lookups.",
    after_help = "Examples:\n  raidbook migrate\n  raidbook export --channel C024BE91L --roster\n  raidbook items \"eye of\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Print the import string of a finalized raid")]
    Export {
        #[arg(long, help = "Slack channel id the raid belongs to")]
        channel: String,
        #[arg(long, help = "Emit roster records only, without the raid header")]
        roster: bool,
    },
    #[command(about = "Search the item catalog by name")]
    Items {
        #[arg(help = "Case-insensitive name fragment")]
        query: String,
        #[arg(long, default_value_t = 10, help = "Maximum number of matches")]
        limit: usize,
    },
    #[command(about = "List channels that currently hold a raid")]
    Raids,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Export { channel, roster } => {
            let kind = if roster { ExportKind::Roster } else { ExportKind::Full };
            commands::export::run(&channel, kind)
        }
        Command::Items { query, limit } => commands::items::run(&query, limit),
        Command::Raids => commands::raids::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
