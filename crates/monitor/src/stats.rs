//! Host-facing projections of scheduler and engine state

use chrono::{DateTime, Utc};
use keyguard_credential::KeyStatusSummary;
use serde::Serialize;
use std::time::Duration;

use crate::event_log::ProtectionRecord;

/// Whether protection has acted yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionEfficiency {
    /// At least one credential has been disabled
    Active,
    /// Only monitoring so far
    MonitoringOnly,
}

/// Protection event figures inside [`MonitoringStats`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtectionAnalysis {
    pub total_protection_events: usize,
    /// Events in the last hour
    pub recent_protection_events: usize,
    pub last_protection_event: Option<ProtectionRecord>,
    pub protection_efficiency: ProtectionEfficiency,
}

/// Cumulative monitoring statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoringStats {
    /// Completed cycles
    pub total_checks: u64,
    /// Resource checks that met the threshold
    pub total_429_detected: u64,
    pub total_keys_disabled: u64,
    pub total_keys_reenabled: u64,
    pub disable_attempts: u64,
    /// Resource checks that failed
    pub failed_checks: u64,
    pub last_check_time: Option<DateTime<Utc>>,
    pub configured_services: usize,
    #[serde(with = "humantime_serde")]
    pub monitoring_interval: Duration,
    pub threshold_per_window: u64,
    #[serde(with = "humantime_serde")]
    pub key_disable_duration: Duration,
    pub key_management: KeyStatusSummary,
    pub protection_analysis: ProtectionAnalysis,
}

/// Overall system state in a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemStatus {
    Active,
}

/// Effective tunables echoed in a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitoringConfiguration {
    #[serde(with = "humantime_serde")]
    pub check_interval: Duration,
    pub threshold_per_window: u64,
    #[serde(with = "humantime_serde")]
    pub key_disable_duration: Duration,
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,
}

/// Protection events section of a report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtectionHistory {
    pub total_protection_events: usize,
    /// Events in the last 24 hours, oldest first
    pub recent_events: Vec<ProtectionRecord>,
    pub most_recent_event: Option<ProtectionRecord>,
}

/// Account safety figures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountSafetyMetrics {
    pub total_keys_disabled: u64,
    pub total_429_detected: u64,
    /// Percentage of disable attempts that succeeded; absent before any attempt
    pub disable_success_rate: Option<f64>,
}

/// Detailed protection status report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtectionStatusReport {
    pub protection_system_status: SystemStatus,
    pub report_timestamp: DateTime<Utc>,
    pub monitoring_configuration: MonitoringConfiguration,
    pub key_management_status: KeyStatusSummary,
    pub protection_history: ProtectionHistory,
    pub account_safety_metrics: AccountSafetyMetrics,
}

/// Result of a bounded monitoring run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub cycles: u64,
    /// Cycles that took longer than the check interval
    pub overruns: u64,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    /// Whether the run ended through its cancellation token
    pub cancelled: bool,
}
