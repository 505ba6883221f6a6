//! keyguard - rate-limit burst protection for Azure Cognitive Services keys.

mod cli;
mod commands;
mod config;

use clap::Parser;
use keyguard_core::ConfigError;
use keyguard_log::LogConfig;
use std::process::ExitCode;

use crate::cli::{Cli, Command};

/// Exit status for configuration problems
const EXIT_CONFIG: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut log_config = LogConfig::auto();
    if let Some(format) = cli.log_format {
        log_config.format = format.into();
        log_config.ansi = !matches!(log_config.format, keyguard_log::Format::Json);
    }
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    let _guard = match keyguard_log::init(&log_config) {
        Ok(guard) => Some(guard),
        Err(error) => {
            eprintln!("warning: logging disabled: {error}");
            None
        }
    };

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            if error.downcast_ref::<ConfigError>().is_some() {
                ExitCode::from(EXIT_CONFIG)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn execute(cli: Cli) -> anyhow::Result<()> {
    let mut app_config = config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run {
            window,
            no_drain,
            overrides,
        } => {
            overrides.apply(&mut app_config);
            commands::run(&app_config, window, no_drain).await
        }
        Command::Check {
            no_drain,
            overrides,
        } => {
            overrides.apply(&mut app_config);
            commands::check(&app_config, no_drain).await
        }
        Command::TestConnection => commands::test_connection(&app_config).await,
        Command::Config => commands::show_config(&app_config),
    }
}
