//! # Keyguard Notify
//!
//! Delivery channels implementing [`keyguard_credential::Notifier`].
//!
//! - [`WebhookNotifier`]: JSON POST to a configured URL
//! - [`EmailNotifier`]: plain-text mail over SMTP
//! - [`LogNotifier`]: structured `tracing` records
//! - [`FanoutNotifier`]: every channel, first failure reported
//!
//! [`from_config`] assembles the channels enabled in [`AlertConfig`].
#![forbid(unsafe_code)]

pub mod email;
pub mod fanout;
pub mod log;
pub mod webhook;

use keyguard_core::ConfigError;
use keyguard_core::config::AlertConfig;
use std::sync::Arc;

pub use email::{EmailContent, EmailNotifier, SUBJECT_PREFIX};
pub use fanout::FanoutNotifier;
pub use log::LogNotifier;
pub use webhook::{ALERT_TYPE, WebhookNotifier, WebhookPayload};

/// Channels enabled by `config`
///
/// An enabled webhook without a URL is rejected here as well as by
/// [`AppConfig::validate`](keyguard_core::config::AppConfig::validate).
/// Email is enabled by default but only delivers once recipients are set.
pub fn from_config(config: &AlertConfig) -> Result<FanoutNotifier, ConfigError> {
    let mut fanout = FanoutNotifier::new();
    if config.log_events {
        fanout.push(Arc::new(LogNotifier::new()));
    }
    if config.webhook_enabled {
        let url = config
            .webhook_url
            .as_ref()
            .filter(|url| !url.expose_secret(|u| u.trim().is_empty()))
            .ok_or_else(|| ConfigError::MissingRequired {
                field: "alerts.webhook_url".into(),
            })?;
        let webhook = url.expose_secret(|url| WebhookNotifier::new(url, config.webhook_timeout))?;
        fanout.push(Arc::new(webhook));
    }
    if config.email_active() {
        config.smtp.validate()?;
        fanout.push(Arc::new(EmailNotifier::new(
            &config.smtp,
            &config.email_recipients,
        )?));
    } else if config.email_enabled {
        tracing::warn!("Email alerts enabled but no recipients configured, skipping email");
    }
    tracing::debug!(channels = fanout.len(), "Notification channels configured");
    Ok(fanout)
}
