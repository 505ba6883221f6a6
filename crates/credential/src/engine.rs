//! Credential protection engine
//!
//! Owns every piece of credential lifecycle state: the registry cache, the
//! bounded history, the cooldown ledger, pending reinstatements and the
//! counters. All of it sits behind one mutex that is never held across an
//! `.await`; provider and notifier calls happen with the lock released.
//!
//! Reinstatements run as independent tasks on the engine's [`TaskTracker`].
//! They outlive the polling loop and can be listed with
//! [`ProtectionEngine::pending_reinstatements`] or awaited with
//! [`ProtectionEngine::drain`].

use chrono::{DateTime, Utc};
use keyguard_core::config::MonitoringConfig;
use keyguard_core::{
    Clock, Credential, CredentialFingerprint, CredentialState, ProtectionEvent,
    ResourceDescriptor, SlotName, SystemClock, UpstreamError,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;

use crate::cooldown::CooldownLedger;
use crate::history::{CredentialHistory, HistoryEntry};
use crate::outcome::{BurstOutcome, DisableOutcome, ReenableOutcome};
use crate::registry::{CredentialRegistry, RegistryStats, build_credentials, state_from};
use crate::retry::retry_with_backoff;
use crate::selection::select_for_disable;
use crate::source::{CredentialProvider, Notifier};
use crate::summary::{EngineStats, KeyStatusSummary, ProtectionStatus};

/// Reason recorded when a credential comes back after its cooldown
pub const REENABLE_REASON: &str = "automatic_reenable";

/// Reinstatement scheduled but not yet finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingReinstatement {
    pub resource: ResourceDescriptor,
    pub slot: SlotName,
    pub fingerprint: CredentialFingerprint,
    pub reenable_at: DateTime<Utc>,
}

struct EngineState {
    registry: CredentialRegistry,
    history: CredentialHistory,
    ledger: CooldownLedger,
    pending: HashMap<CredentialFingerprint, PendingReinstatement>,
    usage: HashMap<CredentialFingerprint, DateTime<Utc>>,
    tracked: BTreeSet<CredentialFingerprint>,
    disabling: HashSet<CredentialFingerprint>,
    reenabling: HashSet<CredentialFingerprint>,
    stats: EngineStats,
}

impl EngineState {
    fn new(config: &MonitoringConfig) -> Self {
        Self {
            registry: CredentialRegistry::new(config.cache_ttl),
            history: CredentialHistory::new(config.history_retention),
            ledger: CooldownLedger::new(config.cooldown),
            pending: HashMap::new(),
            usage: HashMap::new(),
            tracked: BTreeSet::new(),
            disabling: HashSet::new(),
            reenabling: HashSet::new(),
            stats: EngineStats::default(),
        }
    }

    /// Current state of `fingerprint`, falling back to `fallback` when untracked
    fn current_state(
        &self,
        fingerprint: &CredentialFingerprint,
        fallback: CredentialState,
    ) -> CredentialState {
        let state = self.history.latest(fingerprint).map_or(fallback, state_from);
        if self.reenabling.contains(fingerprint) {
            state.to_pending().unwrap_or(state)
        } else {
            state
        }
    }

    fn current_disable_count(&self, fingerprint: &CredentialFingerprint, fallback: u32) -> u32 {
        self.history
            .latest(fingerprint)
            .map_or(fallback, |e| e.disable_count.max(fallback))
    }
}

struct EngineInner {
    provider: Arc<dyn CredentialProvider>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: MonitoringConfig,
    state: Mutex<EngineState>,
    tracker: TaskTracker,
}

/// Stateful protection engine
///
/// Cheap to clone; clones share state. Create one per process and inject it
/// wherever it is needed.
///
/// # Example
///
/// ```rust,ignore
/// let engine = ProtectionEngine::builder(provider, notifier)
///     .config(app_config.monitoring.clone())
///     .build();
///
/// match engine.handle_burst(&resource, 42).await {
///     BurstOutcome::Attempted { slot, result } => println!("{slot}: {result:?}"),
///     other => println!("{other:?}"),
/// }
/// ```
#[derive(Clone)]
pub struct ProtectionEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for ProtectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtectionEngine")
            .field("config", &self.inner.config)
            .field("clock", &self.inner.clock)
            .field("pending_tasks", &self.inner.tracker.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`ProtectionEngine`]
pub struct EngineBuilder {
    provider: Arc<dyn CredentialProvider>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: MonitoringConfig,
}

impl EngineBuilder {
    /// Protection tunables (defaults otherwise)
    pub fn config(mut self, config: MonitoringConfig) -> Self {
        self.config = config;
        self
    }

    /// Time source (system clock otherwise)
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> ProtectionEngine {
        ProtectionEngine {
            inner: Arc::new(EngineInner {
                state: Mutex::new(EngineState::new(&self.config)),
                provider: self.provider,
                notifier: self.notifier,
                clock: self.clock,
                config: self.config,
                tracker: TaskTracker::new(),
            }),
        }
    }
}

impl ProtectionEngine {
    /// Start building an engine around a provider and a notifier
    pub fn builder(
        provider: Arc<dyn CredentialProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> EngineBuilder {
        EngineBuilder {
            provider,
            notifier,
            clock: Arc::new(SystemClock),
            config: MonitoringConfig::default(),
        }
    }

    /// Engine with the system clock and the given tunables
    pub fn new(
        provider: Arc<dyn CredentialProvider>,
        notifier: Arc<dyn Notifier>,
        config: MonitoringConfig,
    ) -> Self {
        Self::builder(provider, notifier).config(config).build()
    }

    pub fn config(&self) -> &MonitoringConfig {
        &self.inner.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    /// Credentials of `resource`, served from cache while fresh
    ///
    /// On a miss the provider is listed and the result is merged with
    /// history before being cached.
    pub async fn credentials(
        &self,
        resource: &ResourceDescriptor,
    ) -> Result<Vec<Credential>, UpstreamError> {
        let key = resource.key();
        let now = self.inner.clock.now();

        let cached = self.inner.state.lock().registry.fresh(&key, now);
        if let Some(credentials) = cached {
            return Ok(credentials);
        }

        let listing = self.inner.provider.list(resource).await.inspect_err(|error| {
            tracing::warn!(resource = %resource, error = %error, "Failed to list credentials");
        })?;

        let mut state = self.inner.state.lock();
        let mut credentials = build_credentials(
            resource,
            listing,
            &self.inner.config.known_slots,
            &state.history,
            &state.usage,
        );
        for credential in &mut credentials {
            if state.reenabling.contains(&credential.fingerprint) {
                credential.state = credential.state.to_pending().unwrap_or(credential.state);
            }
            state.tracked.insert(credential.fingerprint.clone());
        }
        state.registry.store(key, now, credentials.clone());

        tracing::debug!(
            resource = %resource,
            count = credentials.len(),
            "Credential listing refreshed"
        );
        Ok(credentials)
    }

    /// Record that `slot` of `resource` was used at `at`
    ///
    /// Feeds the oldest-last-used tie break of the selection policy.
    pub fn record_usage(&self, resource: &ResourceDescriptor, slot: &SlotName, at: DateTime<Utc>) {
        let fingerprint = CredentialFingerprint::derive(resource, slot);
        let mut state = self.inner.state.lock();
        state
            .registry
            .modify(&resource.key(), &fingerprint, |c| c.last_used = Some(at));
        state.usage.insert(fingerprint, at);
    }

    /// React to `error_count` rate-limit errors on `resource`
    pub async fn handle_burst(&self, resource: &ResourceDescriptor, error_count: u64) -> BurstOutcome {
        let credentials = match self.credentials(resource).await {
            Ok(credentials) if !credentials.is_empty() => credentials,
            Ok(_) => {
                tracing::warn!(resource = %resource, "No credentials listed, nothing to disable");
                return BurstOutcome::NoCredentials;
            }
            Err(error) => {
                tracing::warn!(
                    resource = %resource,
                    error = %error,
                    "Credential listing unavailable, nothing to disable"
                );
                return BurstOutcome::NoCredentials;
            }
        };

        let Some(target) = select_for_disable(&credentials) else {
            tracing::warn!(
                resource = %resource,
                count = credentials.len(),
                "No active credentials left to disable"
            );
            return BurstOutcome::NoActiveCredentials;
        };

        let reason = format!("429 rate limit exceeded: {error_count} errors in 1 minute");
        let result = self
            .disable(resource, target, reason, self.inner.config.disable_duration)
            .await;
        BurstOutcome::Attempted {
            slot: target.slot.clone(),
            result,
        }
    }

    /// Rotate `credential` out for `duration`
    ///
    /// Refused while the credential is inside its cooldown or not active.
    /// On success the secret is regenerated, history and ledger are written,
    /// a reinstatement is scheduled and a `key_auto_disabled` event emitted.
    pub async fn disable(
        &self,
        resource: &ResourceDescriptor,
        credential: &Credential,
        reason: impl Into<String>,
        duration: Duration,
    ) -> DisableOutcome {
        let reason = reason.into();
        let fingerprint = credential.fingerprint.clone();
        let now = self.inner.clock.now();

        let Some(disabled_state) = CredentialState::disabled(now, duration) else {
            tracing::warn!(
                resource = %resource,
                slot = %credential.slot,
                duration_ms = duration.as_millis() as u64,
                "Refusing to disable with an unusable duration"
            );
            return DisableOutcome::InvalidDuration;
        };

        let disable_count = {
            let mut state = self.inner.state.lock();
            state.stats.disable_attempts += 1;

            if let Some(until) = state.ledger.blocked_until(&fingerprint, now) {
                state.stats.cooldown_refusals += 1;
                tracing::info!(
                    resource = %resource,
                    slot = %credential.slot,
                    fingerprint = %fingerprint,
                    until = %until,
                    "Credential in cooldown, disable refused"
                );
                return DisableOutcome::CoolingDown { until };
            }

            let current = state.current_state(&fingerprint, credential.state);
            if !matches!(current, CredentialState::Active) || state.disabling.contains(&fingerprint)
            {
                tracing::info!(
                    resource = %resource,
                    slot = %credential.slot,
                    status = %current.status(),
                    "Credential not active, disable refused"
                );
                return DisableOutcome::NotActive;
            }

            state.disabling.insert(fingerprint.clone());
            state.tracked.insert(fingerprint.clone());
            state.current_disable_count(&fingerprint, credential.disable_count)
        };

        let regenerated = self
            .inner
            .provider
            .regenerate(resource, &credential.slot)
            .await;

        let secret = match regenerated {
            Ok(secret) => secret,
            Err(error) => {
                self.inner.state.lock().disabling.remove(&fingerprint);
                tracing::error!(
                    resource = %resource,
                    slot = %credential.slot,
                    error = %error,
                    "Failed to regenerate credential, nothing disabled"
                );
                return DisableOutcome::UpstreamFailed { error };
            }
        };

        let mut updated = credential.clone();
        updated.secret = secret;
        updated.state = disabled_state;
        updated.disable_count = disable_count.saturating_add(1);
        updated.last_disable_reason = Some(reason.clone());

        {
            let mut state = self.inner.state.lock();
            state.disabling.remove(&fingerprint);
            state
                .history
                .record(HistoryEntry::snapshot(&updated, reason.clone(), now));
            state.ledger.record(fingerprint.clone(), now);
            state.registry.update(&resource.key(), &updated);
            state.stats.keys_disabled += 1;
        }

        let reenable_at = updated.will_reenable_at().unwrap_or(now);
        tracing::warn!(
            resource = %resource,
            slot = %updated.slot,
            fingerprint = %fingerprint,
            disable_count = updated.disable_count,
            reenable_at = %reenable_at,
            reason = %reason,
            "Credential disabled for protection"
        );

        self.schedule_reinstatement(resource, &updated, reenable_at);

        self.notify(&ProtectionEvent::KeyAutoDisabled {
            resource: resource.clone(),
            slot: updated.slot.clone(),
            fingerprint,
            reason,
            disable_count: updated.disable_count,
            disabled_at: now,
            reenable_at,
        })
        .await;

        DisableOutcome::Disabled {
            credential: updated,
        }
    }

    /// Bring a disabled credential back
    ///
    /// The credential is marked pending while the regenerate call (with the
    /// configured retry policy) is in flight. On failure it returns to
    /// disabled with its bookkeeping untouched.
    pub async fn reenable(
        &self,
        resource: &ResourceDescriptor,
        credential: &Credential,
    ) -> ReenableOutcome {
        let fingerprint = credential.fingerprint.clone();
        let key = resource.key();

        let (disabled_state, disable_count) = {
            let mut state = self.inner.state.lock();
            let current = state.current_state(&fingerprint, credential.state);
            let pending = match current {
                CredentialState::Disabled { .. } => current.to_pending(),
                CredentialState::PendingReenable { .. } => return ReenableOutcome::InProgress,
                CredentialState::Active => None,
            };
            let Some(pending) = pending else {
                return ReenableOutcome::NotDisabled;
            };
            state.reenabling.insert(fingerprint.clone());
            state.registry.modify(&key, &fingerprint, |c| c.state = pending);
            (
                current,
                state.current_disable_count(&fingerprint, credential.disable_count),
            )
        };

        let provider = &self.inner.provider;
        let slot = &credential.slot;
        let result = retry_with_backoff(
            &self.inner.config.reinstatement_retry,
            "reenable_credential",
            || provider.regenerate(resource, slot),
        )
        .await;

        let now = self.inner.clock.now();
        match result {
            Ok(secret) => {
                let mut updated = credential.clone();
                updated.secret = secret;
                updated.state = CredentialState::Active;
                updated.disable_count = disable_count;
                {
                    let mut state = self.inner.state.lock();
                    state.reenabling.remove(&fingerprint);
                    if let Some(reason) = state.history.last_disable_reason(&fingerprint) {
                        updated.last_disable_reason = Some(reason.to_owned());
                    }
                    state
                        .history
                        .record(HistoryEntry::snapshot(&updated, REENABLE_REASON, now));
                    state.registry.update(&key, &updated);
                    state.stats.keys_reenabled += 1;
                }

                tracing::info!(
                    resource = %resource,
                    slot = %updated.slot,
                    fingerprint = %fingerprint,
                    disable_count = updated.disable_count,
                    "Credential reenabled"
                );

                self.notify(&ProtectionEvent::KeyAutoReenabled {
                    resource: resource.clone(),
                    slot: updated.slot.clone(),
                    fingerprint,
                    disable_count: updated.disable_count,
                    reenabled_at: now,
                })
                .await;

                ReenableOutcome::Reenabled {
                    credential: updated,
                }
            }
            Err(error) => {
                {
                    let mut state = self.inner.state.lock();
                    state.reenabling.remove(&fingerprint);
                    state
                        .registry
                        .modify(&key, &fingerprint, |c| c.state = disabled_state);
                    state.stats.reenable_failures += 1;
                }
                tracing::error!(
                    resource = %resource,
                    slot = %credential.slot,
                    fingerprint = %fingerprint,
                    error = %error,
                    "Failed to reenable credential, it stays disabled"
                );
                ReenableOutcome::UpstreamFailed { error }
            }
        }
    }

    fn schedule_reinstatement(
        &self,
        resource: &ResourceDescriptor,
        credential: &Credential,
        reenable_at: DateTime<Utc>,
    ) {
        let delay = (reenable_at - self.inner.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO);

        self.inner.state.lock().pending.insert(
            credential.fingerprint.clone(),
            PendingReinstatement {
                resource: resource.clone(),
                slot: credential.slot.clone(),
                fingerprint: credential.fingerprint.clone(),
                reenable_at,
            },
        );

        tracing::debug!(
            resource = %resource,
            slot = %credential.slot,
            delay_ms = delay.as_millis() as u64,
            "Reinstatement scheduled"
        );

        let engine = self.clone();
        let resource = resource.clone();
        let credential = credential.clone();
        self.inner.tracker.spawn(async move {
            tokio::time::sleep(delay).await;
            let outcome = engine.reenable(&resource, &credential).await;
            tracing::debug!(
                resource = %resource,
                slot = %credential.slot,
                reenabled = outcome.is_reenabled(),
                "Scheduled reinstatement finished"
            );
            let mut state = engine.inner.state.lock();
            if state
                .pending
                .get(&credential.fingerprint)
                .is_some_and(|p| p.reenable_at == reenable_at)
            {
                state.pending.remove(&credential.fingerprint);
            }
        });
    }

    /// Hand `event` to the notifier; failures are logged and counted
    pub async fn notify(&self, event: &ProtectionEvent) {
        if let Err(error) = self.inner.notifier.emit(event).await {
            self.inner.state.lock().stats.notify_failures += 1;
            tracing::warn!(
                event = %event.kind(),
                channel = error.channel(),
                error = %error,
                "Failed to deliver protection event"
            );
        }
    }

    /// Summary of tracked credentials
    pub fn status_summary(&self) -> KeyStatusSummary {
        let now = self.inner.clock.now();
        let hour_ago = now - chrono::Duration::hours(1);
        let state = self.inner.state.lock();

        let currently_disabled_keys = state
            .tracked
            .iter()
            .filter(|fp| {
                !matches!(
                    state.current_state(fp, CredentialState::Active),
                    CredentialState::Active
                )
            })
            .count();
        let recently_disabled_keys = state
            .tracked
            .iter()
            .filter(|fp| state.history.disabled_since(fp, hour_ago))
            .count();

        KeyStatusSummary {
            total_monitored_keys: state.tracked.len(),
            currently_disabled_keys,
            recently_disabled_keys,
            key_disable_cooldown_minutes: state.ledger.cooldown().num_minutes().max(0) as u64,
            protection_status: if currently_disabled_keys == 0 {
                ProtectionStatus::Active
            } else {
                ProtectionStatus::KeysDisabledForProtection
            },
        }
    }

    /// Cumulative counters
    pub fn stats(&self) -> EngineStats {
        self.inner.state.lock().stats
    }

    /// Registry cache counters
    pub fn registry_stats(&self) -> RegistryStats {
        self.inner.state.lock().registry.stats()
    }

    /// Retained history of `fingerprint`, oldest first
    pub fn history(&self, fingerprint: &CredentialFingerprint) -> Vec<HistoryEntry> {
        self.inner.state.lock().history.entries(fingerprint)
    }

    /// Scheduled reinstatements not yet finished, soonest first
    pub fn pending_reinstatements(&self) -> Vec<PendingReinstatement> {
        let mut pending: Vec<_> = self.inner.state.lock().pending.values().cloned().collect();
        pending.sort_by(|a, b| {
            a.reenable_at
                .cmp(&b.reenable_at)
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });
        pending
    }

    /// Wait for every scheduled reinstatement to finish
    pub async fn drain(&self) {
        let tracker = &self.inner.tracker;
        tracker.close();
        tracker.wait().await;
        tracker.reopen();
    }
}
