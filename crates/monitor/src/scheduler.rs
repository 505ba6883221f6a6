//! Polling scheduler
//!
//! Each cycle checks every resource concurrently, hands bursts to the
//! protection engine and aggregates a [`CycleReport`]. [`PollingScheduler::run_for`]
//! repeats cycles at a fixed cadence for a bounded window.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use keyguard_core::{ProtectionEvent, ResourceDescriptor};
use keyguard_credential::{BurstOutcome, MetricsSource, ProtectionEngine};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::event_log::{EventLog, ProtectionAction, ProtectionRecord};
use crate::report::{CycleReport, ResourceCheck};
use crate::stats::{
    AccountSafetyMetrics, MonitoringConfiguration, MonitoringStats, ProtectionAnalysis,
    ProtectionEfficiency, ProtectionHistory, ProtectionStatusReport, RunSummary, SystemStatus,
};

/// Resources over threshold in one cycle that trigger a critical event
pub const CRITICAL_RESOURCE_COUNT: usize = 2;

const DISABLE_RECORD_REASON: &str = "429_rate_limit_exceeded";

#[derive(Debug, Default)]
struct SchedulerState {
    total_checks: u64,
    total_429_detected: u64,
    failed_checks: u64,
    last_check_time: Option<DateTime<Utc>>,
    events: EventLog,
}

// ---------------------------------------------------------------------------
// PollingScheduler
// ---------------------------------------------------------------------------

/// Bounded polling loop over a fixed set of resources
pub struct PollingScheduler {
    engine: ProtectionEngine,
    metrics: Arc<dyn MetricsSource>,
    resources: Vec<ResourceDescriptor>,
    state: Mutex<SchedulerState>,
}

impl std::fmt::Debug for PollingScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingScheduler")
            .field("engine", &self.engine)
            .field("resources", &self.resources)
            .finish_non_exhaustive()
    }
}

impl PollingScheduler {
    pub fn new(
        engine: ProtectionEngine,
        metrics: Arc<dyn MetricsSource>,
        resources: Vec<ResourceDescriptor>,
    ) -> Self {
        Self {
            engine,
            metrics,
            resources,
            state: Mutex::new(SchedulerState::default()),
        }
    }

    pub fn engine(&self) -> &ProtectionEngine {
        &self.engine
    }

    pub fn resources(&self) -> &[ResourceDescriptor] {
        &self.resources
    }

    /// Check every resource once
    ///
    /// Checks run concurrently and in isolation: a failing or panicking
    /// check becomes an error entry and never affects the others. The cycle
    /// completes only when every check has resolved.
    pub async fn run_cycle(&self) -> CycleReport {
        let started_at = self.engine.clock().now();
        let timer = Instant::now();
        let threshold = self.engine.config().threshold_per_window;

        let mut set = JoinSet::new();
        for (index, resource) in self.resources.iter().enumerate() {
            let engine = self.engine.clone();
            let metrics = Arc::clone(&self.metrics);
            let resource = resource.clone();
            set.spawn(async move {
                let check = AssertUnwindSafe(check_resource(
                    &engine,
                    metrics.as_ref(),
                    resource.clone(),
                    threshold,
                ))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(resource = %resource, panic = %message, "Resource check panicked");
                    ResourceCheck::failed(resource, format!("check panicked: {message}"))
                });
                (index, check)
            });
        }

        let mut checks: Vec<(usize, ResourceCheck)> = Vec::with_capacity(self.resources.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(entry) => checks.push(entry),
                Err(error) => tracing::error!(error = %error, "Resource check task failed"),
            }
        }
        // Tasks lost to a join error still show up as failed checks.
        for (index, resource) in self.resources.iter().enumerate() {
            if !checks.iter().any(|(i, _)| *i == index) {
                checks.push((index, ResourceCheck::failed(resource.clone(), "check task aborted")));
            }
        }
        checks.sort_by_key(|(index, _)| *index);

        let mut report = CycleReport::from_checks(
            started_at,
            timer.elapsed(),
            checks.into_iter().map(|(_, check)| check).collect(),
        );

        self.record_cycle(&report);

        if report.over_threshold.len() >= CRITICAL_RESOURCE_COUNT {
            let event = ProtectionEvent::CriticalMultiResource {
                affected: report.over_threshold.clone(),
                services_with_429: report.over_threshold.len(),
                total_services: report.resources_checked,
                threshold,
                detected_at: started_at,
            };
            tracing::error!(
                services_with_429 = report.over_threshold.len(),
                total_services = report.resources_checked,
                "Multiple services exceeded the rate-limit threshold"
            );
            self.state.lock().events.push(ProtectionRecord {
                action: ProtectionAction::CriticalMultiResource,
                service: report.over_threshold.join(", "),
                slot: None,
                error_count: report.checks.iter().filter(|c| c.over_threshold).map(|c| c.error_count).sum(),
                reason: event.description(),
                timestamp: started_at,
            });
            self.engine.notify(&event).await;
            report.critical_alert = true;
        }

        tracing::info!(
            resources = report.resources_checked,
            over_threshold = report.over_threshold.len(),
            disabled = report.credentials_disabled.len(),
            errors = report.errors.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Protection cycle completed"
        );
        report
    }

    fn record_cycle(&self, report: &CycleReport) {
        let mut state = self.state.lock();
        state.total_checks += 1;
        state.total_429_detected += report.over_threshold.len() as u64;
        state.failed_checks += report.errors.len() as u64;
        state.last_check_time = Some(report.started_at);
        for check in &report.checks {
            let Some(credential) = check.outcome.as_ref().and_then(BurstOutcome::disabled) else {
                continue;
            };
            state.events.push(ProtectionRecord {
                action: ProtectionAction::KeyDisabled,
                service: check.resource.to_string(),
                slot: Some(credential.slot.clone()),
                error_count: check.error_count,
                reason: DISABLE_RECORD_REASON.to_string(),
                timestamp: credential.disabled_at().unwrap_or(report.started_at),
            });
        }
    }

    /// Run cycles every `check_interval` until `window` elapses or `cancel` fires
    ///
    /// After each cycle the loop sleeps for what is left of the interval,
    /// never past the end of the window. A cycle that overruns the interval
    /// is logged and the next one starts immediately. Cancellation is observed
    /// between cycles, never inside one.
    pub async fn run_for(&self, window: Duration, cancel: CancellationToken) -> RunSummary {
        let interval = self.engine.config().check_interval;
        let started = Instant::now();
        let deadline = started + window;
        let mut summary = RunSummary {
            cycles: 0,
            overruns: 0,
            elapsed: Duration::ZERO,
            cancelled: false,
        };

        tracing::info!(
            window_secs = window.as_secs(),
            interval_ms = interval.as_millis() as u64,
            resources = self.resources.len(),
            "Starting protected monitoring"
        );

        while Instant::now() < deadline {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let cycle_started = Instant::now();
            self.run_cycle().await;
            summary.cycles += 1;

            let elapsed = cycle_started.elapsed();
            match interval.checked_sub(elapsed).filter(|rest| !rest.is_zero()) {
                Some(rest) => {
                    let rest = rest.min(deadline.saturating_duration_since(Instant::now()));
                    tokio::select! {
                        () = tokio::time::sleep(rest) => {}
                        () = cancel.cancelled() => {
                            summary.cancelled = true;
                            break;
                        }
                    }
                }
                None => {
                    summary.overruns += 1;
                    tracing::warn!(
                        elapsed_ms = elapsed.as_millis() as u64,
                        interval_ms = interval.as_millis() as u64,
                        "Protection cycle exceeded the check interval"
                    );
                }
            }
        }

        summary.elapsed = started.elapsed();
        tracing::info!(
            cycles = summary.cycles,
            overruns = summary.overruns,
            cancelled = summary.cancelled,
            "Protected monitoring finished"
        );
        summary
    }

    /// Cumulative statistics; a pure read
    pub fn monitoring_stats(&self) -> MonitoringStats {
        let now = self.engine.clock().now();
        let config = self.engine.config();
        let engine_stats = self.engine.stats();
        let key_management = self.engine.status_summary();
        let state = self.state.lock();

        MonitoringStats {
            total_checks: state.total_checks,
            total_429_detected: state.total_429_detected,
            total_keys_disabled: engine_stats.keys_disabled,
            total_keys_reenabled: engine_stats.keys_reenabled,
            disable_attempts: engine_stats.disable_attempts,
            failed_checks: state.failed_checks,
            last_check_time: state.last_check_time,
            configured_services: self.resources.len(),
            monitoring_interval: config.check_interval,
            threshold_per_window: config.threshold_per_window,
            key_disable_duration: config.disable_duration,
            key_management,
            protection_analysis: ProtectionAnalysis {
                total_protection_events: state.events.len(),
                recent_protection_events: state
                    .events
                    .since(now - chrono::Duration::hours(1))
                    .count(),
                last_protection_event: state.events.last().cloned(),
                protection_efficiency: if engine_stats.keys_disabled > 0 {
                    ProtectionEfficiency::Active
                } else {
                    ProtectionEfficiency::MonitoringOnly
                },
            },
        }
    }

    /// Detailed protection report; a pure read
    pub fn protection_status_report(&self) -> ProtectionStatusReport {
        let now = self.engine.clock().now();
        let config = self.engine.config();
        let engine_stats = self.engine.stats();
        let key_management_status = self.engine.status_summary();
        let state = self.state.lock();

        ProtectionStatusReport {
            protection_system_status: SystemStatus::Active,
            report_timestamp: now,
            monitoring_configuration: MonitoringConfiguration {
                check_interval: config.check_interval,
                threshold_per_window: config.threshold_per_window,
                key_disable_duration: config.disable_duration,
                cooldown: config.cooldown,
            },
            key_management_status,
            protection_history: ProtectionHistory {
                total_protection_events: state.events.len(),
                recent_events: state
                    .events
                    .since(now - chrono::Duration::hours(24))
                    .cloned()
                    .collect(),
                most_recent_event: state.events.last().cloned(),
            },
            account_safety_metrics: AccountSafetyMetrics {
                total_keys_disabled: engine_stats.keys_disabled,
                total_429_detected: state.total_429_detected,
                disable_success_rate: (engine_stats.disable_attempts > 0)
                    .then(|| engine_stats.disable_success_rate()),
            },
        }
    }
}

async fn check_resource(
    engine: &ProtectionEngine,
    metrics: &dyn MetricsSource,
    resource: ResourceDescriptor,
    threshold: u64,
) -> ResourceCheck {
    let error_count = match metrics.error_count(&resource).await {
        Ok(count) => count,
        Err(error) => {
            tracing::warn!(resource = %resource, error = %error, "Metrics query failed, counting zero");
            return ResourceCheck::failed(resource, error.to_string());
        }
    };

    if error_count < threshold {
        tracing::debug!(resource = %resource, error_count, threshold, "Below threshold");
        return ResourceCheck {
            resource,
            error_count,
            over_threshold: false,
            outcome: None,
            error: None,
        };
    }

    tracing::warn!(
        resource = %resource,
        error_count,
        threshold,
        "Rate-limit burst detected, protection activated"
    );
    let outcome = engine.handle_burst(&resource, error_count).await;
    ResourceCheck {
        resource,
        error_count,
        over_threshold: true,
        outcome: Some(outcome),
        error: None,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
