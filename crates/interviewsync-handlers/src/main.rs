//! interviewsync CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use interviewsync_core::{TracingConfig, TracingOutputFormat, init_tracing};
use interviewsync_handlers::cli::{Cli, Command};
use interviewsync_handlers::commands;
use interviewsync_handlers::config::AppConfig;
use interviewsync_handlers::error::{HandlerError, HandlerResult};
use interviewsync_handlers::state::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut tracing_config = TracingConfig::cli(cli.debug);
    if cli.json_logs {
        tracing_config = tracing_config.with_format(TracingOutputFormat::Json);
    }
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> HandlerResult<()> {
    let config = AppConfig::load(cli.config.as_deref()).map_err(HandlerError::Config)?;
    let state = AppState::from_aws(&config).await?;

    match cli.command {
        Command::Invoke { route, event } => {
            commands::invoke::run(&state, route, event.as_deref()).await
        }
        Command::Bootstrap { no_browser, force } => {
            commands::bootstrap::run(&state, no_browser, force).await
        }
    }
}
