//! Application configuration
//!
//! [`AppConfig`] is plain serde data with human-readable durations
//! (`"5s"`, `"2m"`). Loading and layering live in the host binary; this module
//! only defines the shape, the defaults and [`AppConfig::validate`].
//!
//! ```toml
//! [monitoring]
//! check_interval = "5s"
//! threshold_per_window = 10
//! disable_duration = "1m"
//!
//! [[services]]
//! name = "openai-east"
//! resource_group = "rg-ai"
//!
//! [azure]
//! tenant_id = "..."
//! client_id = "..."
//! client_secret = "..."
//! default_subscription = "..."
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;
use crate::id::{ResourceDescriptor, SlotName};
use crate::secret::SecretString;

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Polling and protection tunables
    pub monitoring: MonitoringConfig,
    /// Resources to monitor
    pub services: Vec<ServiceConfig>,
    /// Azure credentials and endpoints
    pub azure: AzureConfig,
    /// Notification delivery
    pub alerts: AlertConfig,
}

/// Polling and protection tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Time between cycle starts
    #[serde(with = "humantime_serde")]
    pub check_interval: Duration,
    /// Rate-limit errors per window that count as a burst (met or exceeded)
    pub threshold_per_window: u64,
    /// How long a disabled credential stays disabled
    #[serde(with = "humantime_serde")]
    pub disable_duration: Duration,
    /// Length of one bounded monitoring run
    #[serde(with = "humantime_serde")]
    pub run_window: Duration,
    /// Minimum gap between two disables of the same credential
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,
    /// How long a credential listing stays cached
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,
    /// History entries kept per credential
    pub history_retention: usize,
    /// Slot names recognised in provider listings, in preference order
    pub known_slots: Vec<SlotName>,
    /// Retry policy for reinstatement calls
    pub reinstatement_retry: ReinstatementRetry,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(5),
            threshold_per_window: 10,
            disable_duration: Duration::from_secs(60),
            run_window: Duration::from_secs(55 * 60),
            cooldown: Duration::from_secs(2 * 60),
            cache_ttl: Duration::from_secs(5 * 60),
            history_retention: 10,
            known_slots: vec![SlotName::new("key1"), SlotName::new("key2")],
            reinstatement_retry: ReinstatementRetry::default(),
        }
    }
}

/// Retry policy for the reinstatement regenerate call
///
/// The default makes a single attempt. Raising `max_attempts` enables
/// exponential backoff between attempts, capped at `max_backoff`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReinstatementRetry {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    /// Growth factor between consecutive delays
    pub backoff_multiplier: f64,
    /// Upper bound on a single delay
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
}

impl Default for ReinstatementRetry {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl ReinstatementRetry {
    /// Delay after the failed attempt number `attempt` (zero based)
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff.as_secs_f64();
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = base * self.backoff_multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_backoff.as_secs_f64() {
            return self.max_backoff;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid(
                "monitoring.reinstatement_retry.max_attempts",
                "must be at least 1",
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "monitoring.reinstatement_retry.backoff_multiplier",
                "must be a finite number >= 1.0",
            ));
        }
        Ok(())
    }
}

/// One monitored service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Resource name
    pub name: String,
    /// Resource group
    pub resource_group: String,
    /// Subscription, falls back to `azure.default_subscription`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    /// Region, informational
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Azure credentials and endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Subscription used by services that do not name one
    pub default_subscription: Option<String>,
    pub login_endpoint: String,
    pub management_endpoint: String,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: SecretString::new(""),
            default_subscription: None,
            login_endpoint: "https://login.microsoftonline.com".to_string(),
            management_endpoint: "https://management.azure.com".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl AzureConfig {
    /// Check the service principal fields are filled in
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tenant_id.trim().is_empty() {
            return Err(ConfigError::missing("azure.tenant_id"));
        }
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::missing("azure.client_id"));
        }
        if self.client_secret.is_empty() {
            return Err(ConfigError::missing("azure.client_secret"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::invalid(
                "azure.request_timeout",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Notification delivery settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub webhook_enabled: bool,
    /// Often carries an access token in its path or query
    pub webhook_url: Option<SecretString>,
    #[serde(with = "humantime_serde")]
    pub webhook_timeout: Duration,
    /// Send email when recipients are configured
    pub email_enabled: bool,
    pub email_recipients: Vec<String>,
    pub smtp: SmtpConfig,
    /// Also write every event as a log record
    pub log_events: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            webhook_enabled: false,
            webhook_url: None,
            webhook_timeout: Duration::from_secs(30),
            email_enabled: true,
            email_recipients: Vec::new(),
            smtp: SmtpConfig::default(),
            log_events: true,
        }
    }
}

impl AlertConfig {
    /// Whether the email channel will actually deliver
    pub fn email_active(&self) -> bool {
        self.email_enabled && !self.email_recipients.is_empty()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.webhook_enabled
            && self
                .webhook_url
                .as_ref()
                .is_none_or(|url| url.expose_secret(|u| u.trim().is_empty()))
        {
            return Err(ConfigError::missing("alerts.webhook_url"));
        }
        if !self.email_active() {
            return Ok(());
        }
        for (idx, recipient) in self.email_recipients.iter().enumerate() {
            if !recipient.contains('@') {
                return Err(ConfigError::invalid(
                    format!("alerts.email_recipients[{idx}]"),
                    "not an email address",
                ));
            }
        }
        self.smtp.validate()
    }
}

/// Outgoing mail server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Leave empty for servers without authentication
    pub username: String,
    pub password: SecretString,
    /// Sender address; defaults to `username`
    pub from: Option<String>,
    /// Upgrade the connection with STARTTLS
    pub starttls: bool,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            username: String::new(),
            password: SecretString::new(""),
            from: None,
            starttls: true,
            timeout: Duration::from_secs(30),
        }
    }
}

impl SmtpConfig {
    /// Sender address, falling back to the login name
    pub fn sender(&self) -> &str {
        self.from
            .as_deref()
            .filter(|from| !from.trim().is_empty())
            .unwrap_or(&self.username)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::missing("alerts.smtp.host"));
        }
        if self.port == 0 {
            return Err(ConfigError::invalid("alerts.smtp.port", "must not be 0"));
        }
        if self.sender().trim().is_empty() {
            return Err(ConfigError::missing("alerts.smtp.from"));
        }
        if !self.username.is_empty() && self.password.is_empty() {
            return Err(ConfigError::missing("alerts.smtp.password"));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::invalid(
                "alerts.smtp.timeout",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Validate everything a monitoring run needs
    ///
    /// The first problem found is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_monitoring()?;
        if self.services.is_empty() {
            return Err(ConfigError::NoResources);
        }
        for (idx, service) in self.services.iter().enumerate() {
            if service.name.trim().is_empty() {
                return Err(ConfigError::missing(format!("services[{idx}].name")));
            }
            if service.resource_group.trim().is_empty() {
                return Err(ConfigError::missing(format!(
                    "services[{idx}].resource_group"
                )));
            }
            if service.subscription_id.is_none() && self.azure.default_subscription.is_none() {
                return Err(ConfigError::missing(format!(
                    "services[{idx}].subscription_id"
                )));
            }
        }
        self.alerts.validate()?;
        self.azure.validate()
    }

    fn validate_monitoring(&self) -> Result<(), ConfigError> {
        let m = &self.monitoring;
        let non_zero = [
            ("monitoring.check_interval", m.check_interval),
            ("monitoring.disable_duration", m.disable_duration),
            ("monitoring.run_window", m.run_window),
        ];
        for (field, value) in non_zero {
            if value.is_zero() {
                return Err(ConfigError::invalid(field, "must be greater than zero"));
            }
        }
        if m.threshold_per_window == 0 {
            return Err(ConfigError::invalid(
                "monitoring.threshold_per_window",
                "must be at least 1",
            ));
        }
        if m.history_retention == 0 {
            return Err(ConfigError::invalid(
                "monitoring.history_retention",
                "must be at least 1",
            ));
        }
        if m.known_slots.is_empty() {
            return Err(ConfigError::missing("monitoring.known_slots"));
        }
        m.reinstatement_retry.validate()
    }

    /// Resolve the configured services into resource descriptors
    ///
    /// Services without a subscription use `azure.default_subscription`;
    /// services with neither are skipped (`validate` rejects them).
    pub fn resources(&self) -> Vec<ResourceDescriptor> {
        self.services
            .iter()
            .filter_map(|service| {
                let subscription = service
                    .subscription_id
                    .clone()
                    .or_else(|| self.azure.default_subscription.clone())?;
                let descriptor = ResourceDescriptor::new(
                    subscription,
                    service.resource_group.clone(),
                    service.name.clone(),
                );
                Some(match &service.location {
                    Some(location) => descriptor.with_location(location.clone()),
                    None => descriptor,
                })
            })
            .collect()
    }
}
