//! Layered configuration loading
//!
//! Defaults, then the TOML file, then `KEYGUARD_` environment variables
//! (`__` separates nested keys, e.g. `KEYGUARD_AZURE__CLIENT_SECRET`).
//! Command-line overrides are applied by the caller.

use anyhow::{Context, bail};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use keyguard_core::config::AppConfig;
use std::path::{Path, PathBuf};

/// File read when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "keyguard.toml";

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "KEYGUARD_";

// Consumed by clap and the logger, not by the configuration tree.
const RESERVED_ENV: [&str; 3] = ["CONFIG", "LOG", "LOG_FORMAT"];

/// Build the figment for `path`
pub fn figment(path: Option<&Path>) -> anyhow::Result<Figment> {
    let file = match path {
        Some(path) => {
            if !path.is_file() {
                bail!("configuration file {} does not exist", path.display());
            }
            path.to_path_buf()
        }
        None => PathBuf::from(DEFAULT_CONFIG_FILE),
    };

    Ok(Figment::new().merge(Toml::file(file)).merge(
        Env::prefixed(ENV_PREFIX)
            .ignore(&RESERVED_ENV)
            .split("__"),
    ))
}

/// Load the effective configuration; not yet validated
pub fn load(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let figment = figment(path)?;
    let config: AppConfig = figment
        .extract()
        .context("failed to read configuration")?;
    tracing::debug!(
        services = config.services.len(),
        webhook = config.alerts.webhook_enabled,
        "Configuration loaded"
    );
    Ok(config)
}
