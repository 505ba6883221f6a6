//! # Keyguard Log
//!
//! Logging setup for keyguard binaries: a `tracing-subscriber` registry with
//! an `EnvFilter` and one fmt layer (compact, pretty or JSON) on stderr.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! let _guard = keyguard_log::init(&keyguard_log::LogConfig::from_env())?;
//! tracing::info!(port = 8080, "Server starting");
//! # Ok::<(), keyguard_log::LogError>(())
//! ```
#![forbid(unsafe_code)]

mod builder;
mod config;
mod error;

pub use builder::{LoggerBuilder, LoggerGuard};
pub use config::{Format, LOG_ENV, LOG_FORMAT_ENV, LogConfig};
pub use error::{LogError, LogResult};

/// Install the global subscriber described by `config`
pub fn init(config: &LogConfig) -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(config.clone()).build()
}
