//! Email delivery over SMTP

use async_trait::async_trait;
use chrono::SecondsFormat;
use keyguard_core::config::SmtpConfig;
use keyguard_core::{ConfigError, ProtectionEvent};
use keyguard_credential::{Notifier, NotifyError, NotifyResult};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::fmt::Write as _;

const CHANNEL: &str = "email";

/// Prefix of every subject line
pub const SUBJECT_PREFIX: &str = "[keyguard]";

/// Subject and plain-text body rendered for an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub body: String,
}

impl EmailContent {
    pub fn from_event(event: &ProtectionEvent) -> NotifyResult<Self> {
        let subject = match event {
            ProtectionEvent::KeyAutoDisabled { resource, slot, .. } => {
                format!("{SUBJECT_PREFIX} Key {slot} of {resource} disabled")
            }
            ProtectionEvent::KeyAutoReenabled { resource, slot, .. } => {
                format!("{SUBJECT_PREFIX} Key {slot} of {resource} reenabled")
            }
            ProtectionEvent::CriticalMultiResource {
                services_with_429,
                total_services,
                ..
            } => format!(
                "{SUBJECT_PREFIX} CRITICAL: {services_with_429} of {total_services} services rate limited"
            ),
        };

        let details = serde_json::to_string_pretty(event).map_err(|e| NotifyError::Encode {
            channel: CHANNEL.into(),
            reason: e.to_string(),
        })?;

        let mut body = format!("{}\n\n", event.description());
        // Writing to a String cannot fail.
        let _ = writeln!(body, "event: {}", event.kind());
        let _ = writeln!(body, "severity: {}", event.severity());
        let _ = writeln!(
            body,
            "time: {}",
            event.timestamp().to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        if let Some(resource) = event.resource() {
            let _ = writeln!(body, "resource: {resource}");
        }
        let _ = write!(body, "\n{details}\n");

        Ok(Self { subject, body })
    }
}

fn mailbox(field: String, address: &str) -> Result<Mailbox, ConfigError> {
    address
        .trim()
        .parse()
        .map_err(|e: lettre::address::AddressError| ConfigError::InvalidValue {
            field,
            reason: e.to_string(),
        })
}

/// Sends each event as a plain-text mail to a fixed recipient list
///
/// One connection per event; a connection or SMTP failure is a
/// [`NotifyError::Transport`].
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl std::fmt::Debug for EmailNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailNotifier")
            .field("from", &self.from.to_string())
            .field("recipients", &self.to.len())
            .finish_non_exhaustive()
    }
}

impl EmailNotifier {
    pub fn new(smtp: &SmtpConfig, recipients: &[String]) -> Result<Self, ConfigError> {
        let from = mailbox("alerts.smtp.from".into(), smtp.sender())?;
        let to = recipients
            .iter()
            .enumerate()
            .map(|(idx, address)| mailbox(format!("alerts.email_recipients[{idx}]"), address))
            .collect::<Result<Vec<_>, _>>()?;
        if to.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "alerts.email_recipients".into(),
            });
        }

        let builder = if smtp.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host).map_err(|e| {
                ConfigError::InvalidValue {
                    field: "alerts.smtp.host".into(),
                    reason: e.to_string(),
                }
            })?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&smtp.host)
        };
        let mut builder = builder.port(smtp.port).timeout(Some(smtp.timeout));
        if !smtp.username.is_empty() {
            let password = smtp.password.expose_secret(|p| p.to_owned());
            builder = builder.credentials(Credentials::new(smtp.username.clone(), password));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    pub fn recipients(&self) -> usize {
        self.to.len()
    }

    fn message(&self, content: EmailContent) -> NotifyResult<Message> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(content.subject)
            .header(ContentType::TEXT_PLAIN);
        for to in &self.to {
            builder = builder.to(to.clone());
        }
        builder.body(content.body).map_err(|e| NotifyError::Encode {
            channel: CHANNEL.into(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn emit(&self, event: &ProtectionEvent) -> NotifyResult {
        let message = self.message(EmailContent::from_event(event)?)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport {
                channel: CHANNEL.into(),
                reason: e.to_string(),
            })?;

        tracing::info!(
            event = %event.kind(),
            recipients = self.to.len(),
            "Email alert sent"
        );
        Ok(())
    }
}
