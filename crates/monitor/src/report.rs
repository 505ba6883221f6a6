//! Per-cycle results

use chrono::{DateTime, Utc};
use keyguard_core::{CredentialFingerprint, ResourceDescriptor, SlotName};
use keyguard_credential::BurstOutcome;
use serde::Serialize;
use std::time::Duration;

/// Result of checking one resource
#[derive(Debug, Clone, Serialize)]
pub struct ResourceCheck {
    pub resource: ResourceDescriptor,
    /// Rate-limit errors in the last window (zero when the query failed)
    pub error_count: u64,
    /// Whether `error_count` met or exceeded the threshold
    pub over_threshold: bool,
    /// What the engine did, when the threshold was met
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<BurstOutcome>,
    /// Metrics failure or panic message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResourceCheck {
    pub(crate) fn failed(resource: ResourceDescriptor, error: impl Into<String>) -> Self {
        Self {
            resource,
            error_count: 0,
            over_threshold: false,
            outcome: None,
            error: Some(error.into()),
        }
    }
}

/// A credential disabled during a cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisabledCredential {
    pub resource: ResourceDescriptor,
    pub slot: SlotName,
    pub fingerprint: CredentialFingerprint,
    pub reenable_at: Option<DateTime<Utc>>,
}

/// Aggregate of one polling cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    /// Wall time the cycle took
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub resources_checked: usize,
    /// Resources whose count met the threshold, as `group/name`
    pub over_threshold: Vec<String>,
    pub credentials_disabled: Vec<DisabledCredential>,
    /// Resources whose check failed, as `group/name: error`
    pub errors: Vec<String>,
    /// Whether a critical multi-resource event was emitted
    pub critical_alert: bool,
    /// Individual results, in configuration order
    pub checks: Vec<ResourceCheck>,
}

impl CycleReport {
    pub(crate) fn from_checks(
        started_at: DateTime<Utc>,
        elapsed: Duration,
        checks: Vec<ResourceCheck>,
    ) -> Self {
        let over_threshold = checks
            .iter()
            .filter(|c| c.over_threshold)
            .map(|c| c.resource.to_string())
            .collect();
        let credentials_disabled = checks
            .iter()
            .filter_map(|c| {
                let credential = c.outcome.as_ref()?.disabled()?;
                Some(DisabledCredential {
                    resource: c.resource.clone(),
                    slot: credential.slot.clone(),
                    fingerprint: credential.fingerprint.clone(),
                    reenable_at: credential.will_reenable_at(),
                })
            })
            .collect();
        let errors = checks
            .iter()
            .filter_map(|c| Some(format!("{}: {}", c.resource, c.error.as_ref()?)))
            .collect();
        Self {
            started_at,
            elapsed,
            resources_checked: checks.len(),
            over_threshold,
            credentials_disabled,
            errors,
            critical_alert: false,
            checks,
        }
    }
}
