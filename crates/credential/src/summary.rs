//! Read-only projections of engine state

use serde::Serialize;
use std::fmt;

/// Overall protection posture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionStatus {
    /// No credential is disabled
    Active,
    /// At least one credential is disabled or being reinstated
    KeysDisabledForProtection,
}

impl fmt::Display for ProtectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::KeysDisabledForProtection => "keys_disabled_for_protection",
        })
    }
}

/// Snapshot returned by [`ProtectionEngine::status_summary`](crate::ProtectionEngine::status_summary)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyStatusSummary {
    /// Fingerprints seen in listings or history
    pub total_monitored_keys: usize,
    /// Fingerprints currently disabled or pending reinstatement
    pub currently_disabled_keys: usize,
    /// Fingerprints with a disable recorded in the last hour
    pub recently_disabled_keys: usize,
    pub key_disable_cooldown_minutes: u64,
    pub protection_status: ProtectionStatus,
}

/// Cumulative engine counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Calls to `disable`, whatever their outcome
    pub disable_attempts: u64,
    pub keys_disabled: u64,
    pub keys_reenabled: u64,
    pub cooldown_refusals: u64,
    pub reenable_failures: u64,
    pub notify_failures: u64,
}

impl EngineStats {
    /// Share of disable attempts that disabled a credential, in percent
    pub fn disable_success_rate(&self) -> f64 {
        if self.disable_attempts == 0 {
            return 0.0;
        }
        self.keys_disabled as f64 / self.disable_attempts as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_handles_zero_attempts() {
        assert_eq!(EngineStats::default().disable_success_rate(), 0.0);
        let stats = EngineStats {
            disable_attempts: 4,
            keys_disabled: 3,
            ..EngineStats::default()
        };
        assert_eq!(stats.disable_success_rate(), 75.0);
    }

    #[test]
    fn protection_status_wire_names() {
        assert_eq!(
            serde_json::to_value(ProtectionStatus::KeysDisabledForProtection).unwrap(),
            "keys_disabled_for_protection"
        );
        assert_eq!(ProtectionStatus::Active.to_string(), "active");
    }
}
