//! Events as structured log records

use async_trait::async_trait;
use keyguard_core::{ProtectionEvent, Severity};
use keyguard_credential::{Notifier, NotifyResult};

/// Writes every event through `tracing`; never fails
///
/// Critical events are logged at `WARN`, the rest at `INFO`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn emit(&self, event: &ProtectionEvent) -> NotifyResult {
        let resource = event.resource().map(ToString::to_string).unwrap_or_default();
        match event.severity() {
            Severity::Critical => tracing::warn!(
                target: "keyguard::alert",
                event = %event.kind(),
                resource = %resource,
                timestamp = %event.timestamp(),
                "{}",
                event.description()
            ),
            Severity::Info => tracing::info!(
                target: "keyguard::alert",
                event = %event.kind(),
                resource = %resource,
                timestamp = %event.timestamp(),
                "{}",
                event.description()
            ),
        }
        Ok(())
    }
}
