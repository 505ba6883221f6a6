//! In-memory collaborators for tests
//!
//! Enabled with the `test-util` feature. Nothing here talks to the network.

use async_trait::async_trait;
use keyguard_core::{
    ManualClock, ProtectionEvent, ResourceDescriptor, ResourceKey, SecretString, SlotName,
    UpstreamError,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{NotifyError, NotifyResult};
use crate::source::{CredentialProvider, KeyListing, MetricsSource, Notifier};

#[derive(Default)]
struct ProviderState {
    listings: HashMap<ResourceKey, KeyListing>,
    list_calls: usize,
    regenerate_calls: Vec<(ResourceKey, SlotName)>,
    fail_list: HashSet<ResourceKey>,
    regenerate_failures: usize,
    slow_regeneration: Option<(Arc<ManualClock>, chrono::Duration)>,
    generation: u64,
}

/// Credential provider backed by a map
///
/// Regenerated secrets are `"{slot}-rotated-{n}"` with a global counter.
#[derive(Default)]
pub struct InMemoryProvider {
    state: Mutex<ProviderState>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider listing `key1` and `key2` for every given resource
    pub fn with_standard_slots<'a>(resources: impl IntoIterator<Item = &'a ResourceDescriptor>) -> Self {
        let provider = Self::new();
        for resource in resources {
            provider.set_listing(
                resource,
                [("key1", "secret-one"), ("key2", "secret-two")],
            );
        }
        provider
    }

    /// Replace the listing of `resource`
    pub fn set_listing<'a>(
        &self,
        resource: &ResourceDescriptor,
        slots: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) {
        let listing = slots
            .into_iter()
            .map(|(slot, secret)| (SlotName::new(slot), SecretString::new(secret)))
            .collect();
        self.state.lock().listings.insert(resource.key(), listing);
    }

    /// Make `list` fail for `resource` until cleared
    pub fn fail_listing(&self, resource: &ResourceDescriptor, fail: bool) {
        let mut state = self.state.lock();
        if fail {
            state.fail_list.insert(resource.key());
        } else {
            state.fail_list.remove(&resource.key());
        }
    }

    /// Make the next `count` regenerate calls fail
    pub fn fail_next_regenerations(&self, count: usize) {
        self.state.lock().regenerate_failures = count;
    }

    /// Make the next regenerate call take `by` of wall-clock time on `clock`
    pub fn slow_next_regeneration(&self, clock: Arc<ManualClock>, by: chrono::Duration) {
        self.state.lock().slow_regeneration = Some((clock, by));
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().list_calls
    }

    pub fn regenerate_calls(&self) -> Vec<(ResourceKey, SlotName)> {
        self.state.lock().regenerate_calls.clone()
    }
}

#[async_trait]
impl CredentialProvider for InMemoryProvider {
    async fn list(&self, resource: &ResourceDescriptor) -> Result<KeyListing, UpstreamError> {
        let mut state = self.state.lock();
        state.list_calls += 1;
        let key = resource.key();
        if state.fail_list.contains(&key) {
            return Err(UpstreamError::Status {
                operation: "list_keys".into(),
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(state.listings.get(&key).cloned().unwrap_or_default())
    }

    async fn regenerate(
        &self,
        resource: &ResourceDescriptor,
        slot: &SlotName,
    ) -> Result<SecretString, UpstreamError> {
        let mut state = self.state.lock();
        state.regenerate_calls.push((resource.key(), slot.clone()));
        if let Some((clock, by)) = state.slow_regeneration.take() {
            clock.advance(by);
        }
        if state.regenerate_failures > 0 {
            state.regenerate_failures -= 1;
            return Err(UpstreamError::other("regenerate_key", "injected failure"));
        }
        state.generation += 1;
        let secret = SecretString::new(format!("{slot}-rotated-{}", state.generation));
        if let Some(listing) = state.listings.get_mut(&resource.key()) {
            listing.insert(slot.clone(), secret.clone());
        }
        Ok(secret)
    }
}

enum Reading {
    Count(u64),
    Fail,
    Panic,
}

#[derive(Default)]
struct MetricsState {
    fixed: HashMap<ResourceKey, u64>,
    scripted: HashMap<ResourceKey, VecDeque<Reading>>,
    calls: usize,
}

/// Metrics source with fixed or scripted readings per resource
///
/// Unknown resources report zero. An optional delay makes every call slow,
/// for cadence tests under a paused tokio clock.
#[derive(Default)]
pub struct ScriptedMetrics {
    state: Mutex<MetricsState>,
    delay: Option<Duration>,
}

impl ScriptedMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Report `count` for `resource` on every call without a scripted reading
    pub fn set_count(&self, resource: &ResourceDescriptor, count: u64) {
        self.state.lock().fixed.insert(resource.key(), count);
    }

    /// Queue one reading for the next call on `resource`
    pub fn push_count(&self, resource: &ResourceDescriptor, count: u64) {
        self.push(resource, Reading::Count(count));
    }

    /// Queue one failing call for `resource`
    pub fn push_failure(&self, resource: &ResourceDescriptor) {
        self.push(resource, Reading::Fail);
    }

    /// Queue one panicking call for `resource`
    pub fn push_panic(&self, resource: &ResourceDescriptor) {
        self.push(resource, Reading::Panic);
    }

    pub fn calls(&self) -> usize {
        self.state.lock().calls
    }

    fn push(&self, resource: &ResourceDescriptor, reading: Reading) {
        self.state
            .lock()
            .scripted
            .entry(resource.key())
            .or_default()
            .push_back(reading);
    }
}

#[async_trait]
impl MetricsSource for ScriptedMetrics {
    async fn error_count(&self, resource: &ResourceDescriptor) -> Result<u64, UpstreamError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let reading = {
            let mut state = self.state.lock();
            state.calls += 1;
            let key = resource.key();
            state
                .scripted
                .get_mut(&key)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| Reading::Count(state.fixed.get(&key).copied().unwrap_or(0)))
        };
        match reading {
            Reading::Count(count) => Ok(count),
            Reading::Fail => Err(UpstreamError::Transport {
                operation: "query_metrics".into(),
                reason: "connection reset".into(),
            }),
            Reading::Panic => panic!("scripted metrics panic for {resource}"),
        }
    }
}

/// Notifier that keeps every event it receives
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<ProtectionEvent>>,
    fail: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delivery fail (events are still recorded)
    pub fn fail_deliveries(&self, fail: bool) {
        *self.fail.lock() = fail;
    }

    pub fn events(&self) -> Vec<ProtectionEvent> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn emit(&self, event: &ProtectionEvent) -> NotifyResult {
        self.events.lock().push(event.clone());
        if *self.fail.lock() {
            return Err(NotifyError::Transport {
                channel: "recording".into(),
                reason: "delivery disabled".into(),
            });
        }
        Ok(())
    }
}
