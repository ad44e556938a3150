//! quotapane - CLI entry point.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use clap::Parser;
use std::process::ExitCode;

use quotapane::cli::{Cli, Commands, args::RunArgs};
use quotapane::core::logging;
use quotapane::credentials::CredentialStore;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = cli
        .log_level
        .as_deref()
        .and_then(logging::LogLevel::from_arg)
        .or_else(|| logging::parse_log_level_from_env().map(logging::LogLevel::from_tracing_level))
        .unwrap_or_default();
    let log_format = if cli.json_logs {
        logging::LogFormat::Json
    } else {
        logging::parse_log_format_from_env().unwrap_or_default()
    };
    let log_file = logging::parse_log_file_from_env();
    logging::init(log_level, log_format, log_file, cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("quotapane: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> quotapane::Result<()> {
    // The override file is a constructor parameter, never ambient state:
    // when given, the normal resolution chain is not consulted at all.
    let store = cli
        .credentials_file
        .as_ref()
        .map_or_else(CredentialStore::new, CredentialStore::with_override);

    match cli.command {
        // Default to the monitor loop
        None => quotapane::cli::run::execute(&RunArgs { interval: 60 }, store).await,

        Some(Commands::Run(args)) => quotapane::cli::run::execute(&args, store).await,

        Some(Commands::Status(args)) => quotapane::cli::status::execute(&args, store).await,

        Some(Commands::Open(args)) => quotapane::cli::place::execute_open(&args),

        Some(Commands::Move(args)) => quotapane::cli::place::execute_move(&args),
    }
}
