//! Delivery to several channels

use async_trait::async_trait;
use keyguard_core::ProtectionEvent;
use keyguard_credential::{Notifier, NotifyResult};
use std::sync::Arc;

/// Hands each event to every inner notifier in order
///
/// A failing channel does not stop the others; the first failure is
/// returned once all have been tried.
#[derive(Default, Clone)]
pub struct FanoutNotifier {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl std::fmt::Debug for FanoutNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutNotifier")
            .field("channels", &self.notifiers.len())
            .finish()
    }
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel
    pub fn with(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn push(&mut self, notifier: Arc<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn emit(&self, event: &ProtectionEvent) -> NotifyResult {
        let mut first_error = None;
        for notifier in &self.notifiers {
            if let Err(error) = notifier.emit(event).await {
                tracing::debug!(channel = error.channel(), error = %error, "Channel failed");
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
