//! Command-line arguments

use clap::{Args, Parser, Subcommand, ValueEnum};
use humantime_serde::re::humantime;
use keyguard_core::config::AppConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Rate-limit burst protection for Azure Cognitive Services keys
#[derive(Debug, Parser)]
#[command(name = "keyguard", version, about, propagate_version = true)]
pub struct Cli {
    /// Configuration file (defaults to ./keyguard.toml when present)
    #[arg(short, long, global = true, env = "KEYGUARD_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log output format (overrides KEYGUARD_LOG_FORMAT)
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Monitor for a bounded window, then print final statistics
    Run {
        /// How long to monitor (e.g. "55m", "2h")
        #[arg(long, value_parser = parse_duration)]
        window: Option<Duration>,

        /// Exit without waiting for scheduled reinstatements
        #[arg(long)]
        no_drain: bool,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Run a single protection cycle and print its report
    Check {
        /// Exit without waiting for scheduled reinstatements
        #[arg(long)]
        no_drain: bool,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// Verify the service principal can obtain a management token
    TestConnection,

    /// Print the validated effective configuration (secrets redacted)
    Config,
}

/// Monitoring tunables that take precedence over file and environment
#[derive(Debug, Default, Args)]
pub struct Overrides {
    /// Seconds between cycles (e.g. "5s")
    #[arg(long, value_parser = parse_duration)]
    pub interval: Option<Duration>,

    /// Rate-limit errors per minute that trigger protection
    #[arg(long)]
    pub threshold: Option<u64>,

    /// How long a rotated key stays disabled (e.g. "1m")
    #[arg(long, value_parser = parse_duration)]
    pub disable_duration: Option<Duration>,
}

impl Overrides {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(interval) = self.interval {
            config.monitoring.check_interval = interval;
        }
        if let Some(threshold) = self.threshold {
            config.monitoring.threshold_per_window = threshold;
        }
        if let Some(duration) = self.disable_duration {
            config.monitoring.disable_duration = duration;
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl From<LogFormat> for keyguard_log::Format {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
            LogFormat::Json => Self::Json,
        }
    }
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    humantime::parse_duration(value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "keyguard",
            "run",
            "--window",
            "2m",
            "--threshold",
            "3",
            "--no-drain",
        ])
        .unwrap();
        let Command::Run {
            window,
            no_drain,
            overrides,
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(window, Some(Duration::from_secs(120)));
        assert!(no_drain);

        let mut config = AppConfig::default();
        overrides.apply(&mut config);
        assert_eq!(config.monitoring.threshold_per_window, 3);
    }
}
