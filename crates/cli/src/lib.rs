pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "statusquo",
    about = "StatusQuo operator CLI",
    long_about = "Operate StatusQuo readiness, migrations, config inspection, and the daily broadcast.",
    after_help = "Examples:\n  statusquo doctor --json\n  statusquo config\n  statusquo broadcast"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run startup preflight checks and return structured status output")]
    Start,
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, Slack credential readiness, and DB connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Run one status broadcast across every installation and report the tally")]
    Broadcast,
    #[command(about = "Finish approvals and denials that were claimed but never completed")]
    Reconcile,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Start => commands::start::run(),
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Broadcast => commands::broadcast::run(),
        Command::Reconcile => commands::reconcile::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
