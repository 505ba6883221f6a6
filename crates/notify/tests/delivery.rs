//! Delivery behaviour of the notification channels.

use chrono::{TimeZone, Utc};
use keyguard_core::config::{AlertConfig, SmtpConfig};
use keyguard_core::{CredentialFingerprint, ProtectionEvent, ResourceDescriptor, SlotName};
use keyguard_credential::testing::RecordingNotifier;
use keyguard_credential::{Notifier, NotifyError};
use keyguard_notify::{
    EmailContent, EmailNotifier, FanoutNotifier, LogNotifier, WebhookNotifier, WebhookPayload,
    from_config,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn disabled_event() -> ProtectionEvent {
    let resource = ResourceDescriptor::new("sub-1", "rg-ai", "openai-east");
    let slot = SlotName::new("key1");
    let at = Utc.with_ymd_and_hms(2025, 4, 1, 9, 0, 0).unwrap();
    ProtectionEvent::KeyAutoDisabled {
        fingerprint: CredentialFingerprint::derive(&resource, &slot),
        resource,
        slot,
        reason: "429 rate limit exceeded: 15 errors in 1 minute".into(),
        disable_count: 1,
        disabled_at: at,
        reenable_at: at + chrono::Duration::minutes(1),
    }
}

fn critical_event() -> ProtectionEvent {
    ProtectionEvent::CriticalMultiResource {
        affected: vec!["rg-ai/openai-east".into(), "rg-ai/openai-west".into()],
        services_with_429: 2,
        total_services: 3,
        threshold: 10,
        detected_at: Utc.with_ymd_and_hms(2025, 4, 1, 9, 0, 0).unwrap(),
    }
}

#[test]
fn payload_carries_resource_fields() {
    let payload = WebhookPayload::from_event(&disabled_event()).unwrap();

    assert_eq!(payload.event, "key_auto_disabled");
    assert_eq!(payload.timestamp, "2025-04-01T09:00:00Z");
    assert_eq!(payload.service, "openai-east");
    assert_eq!(payload.resource_group, "rg-ai");
    assert_eq!(payload.severity, "critical");
    assert_eq!(payload.details["event"], "key_auto_disabled");
    assert_eq!(payload.details["slot"], "key1");
}

#[test]
fn multi_resource_payload_has_no_service() {
    let payload = WebhookPayload::from_event(&critical_event()).unwrap();

    assert_eq!(payload.event, "critical_multi_resource");
    assert_eq!(payload.service, "");
    assert_eq!(payload.details["services_with_429"], 2);
}

#[tokio::test]
async fn webhook_posts_json_with_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hooks/keyguard"))
        .and(header(
            "user-agent",
            concat!("keyguard/", env!("CARGO_PKG_VERSION")),
        ))
        .and(body_partial_json(json!({
            "alert_type": "keyguard_protection",
            "event": "key_auto_disabled",
            "service": "openai-east",
            "resource_group": "rg-ai",
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(
        &format!("{}/hooks/keyguard", server.uri()),
        Duration::from_secs(5),
    )
    .unwrap();

    notifier.emit(&disabled_event()).await.unwrap();
}

#[tokio::test]
async fn webhook_non_success_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let notifier = WebhookNotifier::new(&server.uri(), Duration::from_secs(5)).unwrap();
    let error = notifier.emit(&critical_event()).await.unwrap_err();

    assert_eq!(
        error,
        NotifyError::Rejected {
            channel: "webhook".into(),
            status: 503,
            body: "maintenance".into(),
        }
    );
}

#[test]
fn invalid_webhook_url_is_a_config_error() {
    assert!(WebhookNotifier::new("not a url", Duration::from_secs(5)).is_err());
}

#[tokio::test]
async fn log_notifier_never_fails() {
    let notifier = LogNotifier::new();
    notifier.emit(&disabled_event()).await.unwrap();
    notifier.emit(&critical_event()).await.unwrap();
}

#[tokio::test]
async fn fanout_tries_every_channel_and_reports_first_failure() {
    let failing = Arc::new(RecordingNotifier::new());
    failing.fail_deliveries(true);
    let healthy = Arc::new(RecordingNotifier::new());
    let fanout = FanoutNotifier::new()
        .with(failing.clone())
        .with(Arc::new(LogNotifier::new()))
        .with(healthy.clone());

    let error = fanout.emit(&disabled_event()).await.unwrap_err();

    assert_eq!(error.channel(), "recording");
    assert_eq!(failing.events().len(), 1);
    assert_eq!(healthy.events().len(), 1);
}

#[test]
fn config_selects_channels() {
    let defaults = from_config(&AlertConfig::default()).unwrap();
    assert_eq!(defaults.len(), 1);

    let both = from_config(&AlertConfig {
        webhook_enabled: true,
        webhook_url: Some("https://hooks.example.test/keyguard".into()),
        ..AlertConfig::default()
    })
    .unwrap();
    assert_eq!(both.len(), 2);

    let missing_url = from_config(&AlertConfig {
        webhook_enabled: true,
        webhook_url: None,
        log_events: false,
        ..AlertConfig::default()
    });
    assert!(missing_url.is_err());
}

fn plain_smtp(port: u16) -> SmtpConfig {
    SmtpConfig {
        host: "127.0.0.1".into(),
        port,
        from: Some("keyguard@example.test".into()),
        starttls: false,
        timeout: Duration::from_secs(5),
        ..SmtpConfig::default()
    }
}

/// Accept one SMTP session and return the message data it received
async fn smtp_sink(listener: TcpListener) -> String {
    let (stream, _) = listener.accept().await.unwrap();
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    write.write_all(b"220 sink ESMTP\r\n").await.unwrap();

    let mut data = String::new();
    let mut in_data = false;
    while let Some(line) = lines.next_line().await.unwrap() {
        if in_data {
            if line == "." {
                in_data = false;
                write.write_all(b"250 queued\r\n").await.unwrap();
            } else {
                data.push_str(&line);
                data.push('\n');
            }
            continue;
        }
        let command = line.get(..4).unwrap_or_default().to_ascii_uppercase();
        let reply: &[u8] = match command.as_str() {
            "DATA" => {
                in_data = true;
                b"354 go ahead\r\n"
            }
            "QUIT" => {
                write.write_all(b"221 bye\r\n").await.unwrap();
                break;
            }
            _ => b"250 ok\r\n",
        };
        write.write_all(reply).await.unwrap();
    }
    data
}

#[test]
fn email_content_names_the_key() {
    let content = EmailContent::from_event(&disabled_event()).unwrap();

    assert_eq!(content.subject, "[keyguard] Key key1 of rg-ai/openai-east disabled");
    assert!(content.body.contains("severity: critical"));
    assert!(content.body.contains("resource: rg-ai/openai-east"));
    assert!(content.body.contains("\"disable_count\": 1"));
}

#[test]
fn critical_email_subject_counts_services() {
    let content = EmailContent::from_event(&critical_event()).unwrap();
    assert_eq!(
        content.subject,
        "[keyguard] CRITICAL: 2 of 3 services rate limited"
    );
}

#[tokio::test]
async fn email_is_delivered_over_smtp() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let sink = tokio::spawn(smtp_sink(listener));

    let notifier = EmailNotifier::new(&plain_smtp(port), &["ops@example.test".into()]).unwrap();
    notifier.emit(&disabled_event()).await.unwrap();

    let data = sink.await.unwrap();
    assert!(data.contains("Subject: [keyguard] Key key1 of rg-ai/openai-east disabled"));
    assert!(data.contains("ops@example.test"));
    assert!(data.contains("severity: critical"));
}

#[tokio::test]
async fn unreachable_mail_server_fails_the_fanout() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let email = EmailNotifier::new(&plain_smtp(port), &["ops@example.test".into()]).unwrap();
    let healthy = Arc::new(RecordingNotifier::new());
    let fanout = FanoutNotifier::new()
        .with(Arc::new(email))
        .with(healthy.clone());

    let error = fanout.emit(&critical_event()).await.unwrap_err();

    assert!(matches!(error, NotifyError::Transport { .. }));
    assert_eq!(error.channel(), "email");
    assert_eq!(healthy.events().len(), 1);
}

#[test]
fn email_channel_needs_recipients() {
    let config = AlertConfig {
        log_events: false,
        ..AlertConfig::default()
    };
    assert!(config.email_enabled);
    assert!(from_config(&config).unwrap().is_empty());

    let with_recipients = from_config(&AlertConfig {
        log_events: false,
        email_recipients: vec!["ops@example.test".into()],
        smtp: plain_smtp(2525),
        ..AlertConfig::default()
    })
    .unwrap();
    assert_eq!(with_recipients.len(), 1);

    let no_sender = from_config(&AlertConfig {
        email_recipients: vec!["ops@example.test".into()],
        ..AlertConfig::default()
    });
    assert!(no_sender.is_err());
}
