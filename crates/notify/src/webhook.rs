//! JSON webhook delivery

use async_trait::async_trait;
use chrono::SecondsFormat;
use keyguard_core::{ConfigError, ProtectionEvent};
use keyguard_credential::{Notifier, NotifyError, NotifyResult};
use serde::Serialize;
use std::time::Duration;
use url::Url;

const CHANNEL: &str = "webhook";

/// Value of `alert_type` in every payload
pub const ALERT_TYPE: &str = "keyguard_protection";

/// Longest response body kept in a rejection error
const MAX_BODY_LENGTH: usize = 500;

/// Body POSTed for every event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookPayload {
    pub alert_type: &'static str,
    /// RFC 3339 time of the event
    pub timestamp: String,
    /// Event kind, e.g. `key_auto_disabled`
    pub event: &'static str,
    pub severity: String,
    /// Resource name; empty for multi-resource events
    pub service: String,
    pub resource_group: String,
    pub summary: String,
    /// The full event
    pub details: serde_json::Value,
}

impl WebhookPayload {
    pub fn from_event(event: &ProtectionEvent) -> NotifyResult<Self> {
        let details = serde_json::to_value(event).map_err(|e| NotifyError::Encode {
            channel: CHANNEL.into(),
            reason: e.to_string(),
        })?;
        let (service, resource_group) = event
            .resource()
            .map(|r| (r.name.clone(), r.resource_group.clone()))
            .unwrap_or_default();

        Ok(Self {
            alert_type: ALERT_TYPE,
            timestamp: event.timestamp().to_rfc3339_opts(SecondsFormat::Secs, true),
            event: event.kind().as_str(),
            severity: event.severity().to_string(),
            service,
            resource_group,
            summary: event.description(),
            details,
        })
    }
}

/// POSTs each event as JSON to a fixed URL
///
/// Any non-2xx answer is a [`NotifyError::Rejected`].
#[derive(Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: Url,
}

// The path and query of a webhook URL usually embed its token.
impl std::fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookNotifier")
            .field("host", &self.url.host_str())
            .finish_non_exhaustive()
    }
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let url = Url::parse(url).map_err(|e| ConfigError::InvalidValue {
            field: "alerts.webhook_url".into(),
            reason: e.to_string(),
        })?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("keyguard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "alerts".into(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { http, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn emit(&self, event: &ProtectionEvent) -> NotifyResult {
        let payload = WebhookPayload::from_event(event)?;

        let response = self
            .http
            .post(self.url.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Transport {
                channel: CHANNEL.into(),
                reason: e.without_url().to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_BODY_LENGTH {
                let mut end = MAX_BODY_LENGTH;
                while !body.is_char_boundary(end) {
                    end -= 1;
                }
                body.truncate(end);
            }
            return Err(NotifyError::Rejected {
                channel: CHANNEL.into(),
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(
            event = payload.event,
            host = self.url.host_str().unwrap_or_default(),
            "Webhook alert delivered"
        );
        Ok(())
    }
}
