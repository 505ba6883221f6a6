//! Per-credential state transition history
//!
//! Each fingerprint keeps its entries in insertion order and only the most
//! recent `retention` are retained. The latest entry is the source of truth
//! when a credential listing is rebuilt after its cache entry expires.

use chrono::{DateTime, Utc};
use keyguard_core::{Credential, CredentialFingerprint, CredentialStatus, SlotName};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// One recorded state transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub fingerprint: CredentialFingerprint,
    pub slot: SlotName,
    /// Status the credential moved to
    pub status: CredentialStatus,
    pub disabled_at: Option<DateTime<Utc>>,
    pub reenable_at: Option<DateTime<Utc>>,
    /// Cumulative disables at the time of recording
    pub disable_count: u32,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Snapshot `credential` as it is now
    pub fn snapshot(
        credential: &Credential,
        reason: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            fingerprint: credential.fingerprint.clone(),
            slot: credential.slot.clone(),
            status: credential.status(),
            disabled_at: credential.disabled_at(),
            reenable_at: credential.will_reenable_at(),
            disable_count: credential.disable_count,
            reason: reason.into(),
            recorded_at,
        }
    }
}

/// Bounded history keyed by fingerprint
#[derive(Debug)]
pub struct CredentialHistory {
    entries: HashMap<CredentialFingerprint, VecDeque<HistoryEntry>>,
    retention: usize,
}

impl CredentialHistory {
    /// Empty history keeping `retention` entries per fingerprint (at least one)
    pub fn new(retention: usize) -> Self {
        Self {
            entries: HashMap::new(),
            retention: retention.max(1),
        }
    }

    /// Append an entry, evicting the oldest ones beyond retention
    pub fn record(&mut self, entry: HistoryEntry) {
        let log = self.entries.entry(entry.fingerprint.clone()).or_default();
        log.push_back(entry);
        while log.len() > self.retention {
            log.pop_front();
        }
    }

    /// Most recent entry for `fingerprint`
    pub fn latest(&self, fingerprint: &CredentialFingerprint) -> Option<&HistoryEntry> {
        self.entries.get(fingerprint).and_then(VecDeque::back)
    }

    /// Reason of the most recent disable still retained for `fingerprint`
    pub fn last_disable_reason(&self, fingerprint: &CredentialFingerprint) -> Option<&str> {
        self.entries.get(fingerprint).and_then(|log| {
            log.iter()
                .rev()
                .find(|e| e.status == CredentialStatus::Disabled)
                .map(|e| e.reason.as_str())
        })
    }

    /// Retained entries for `fingerprint`, oldest first
    pub fn entries(&self, fingerprint: &CredentialFingerprint) -> Vec<HistoryEntry> {
        self.entries
            .get(fingerprint)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether any retained entry of `fingerprint` records a disable at or after `since`
    pub fn disabled_since(&self, fingerprint: &CredentialFingerprint, since: DateTime<Utc>) -> bool {
        self.entries.get(fingerprint).is_some_and(|log| {
            log.iter()
                .any(|e| e.disabled_at.is_some_and(|at| at >= since))
        })
    }

    /// Number of tracked fingerprints
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use keyguard_core::{ResourceDescriptor, SecretString};
    use pretty_assertions::assert_eq;

    fn credential(slot: &str) -> Credential {
        let resource = ResourceDescriptor::new("sub", "rg", "svc");
        Credential::new(&resource, SlotName::new(slot), SecretString::new("v"))
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn retains_only_most_recent_entries() {
        let mut history = CredentialHistory::new(10);
        let cred = credential("key1");
        for i in 0..15 {
            history.record(HistoryEntry::snapshot(
                &cred,
                format!("entry-{i}"),
                base() + Duration::seconds(i),
            ));
        }

        let kept = history.entries(&cred.fingerprint);
        assert_eq!(kept.len(), 10);
        assert_eq!(kept[0].reason, "entry-5");
        assert_eq!(kept[9].reason, "entry-14");
        assert_eq!(history.latest(&cred.fingerprint).map(|e| e.reason.as_str()), Some("entry-14"));
    }

    #[test]
    fn fingerprints_are_independent() {
        let mut history = CredentialHistory::new(2);
        let a = credential("key1");
        let b = credential("key2");
        for i in 0..3 {
            history.record(HistoryEntry::snapshot(&a, format!("a{i}"), base()));
        }
        history.record(HistoryEntry::snapshot(&b, "b0", base()));

        assert_eq!(history.len(), 2);
        assert_eq!(history.entries(&a.fingerprint).len(), 2);
        assert_eq!(history.entries(&b.fingerprint).len(), 1);
    }

    #[test]
    fn last_disable_reason_skips_reenable_entries() {
        let mut history = CredentialHistory::new(10);
        let mut cred = credential("key1");
        cred.state = keyguard_core::CredentialState::disabled(base(), std::time::Duration::from_secs(60))
            .unwrap();
        history.record(HistoryEntry::snapshot(&cred, "429 burst", base()));
        cred.state = keyguard_core::CredentialState::Active;
        history.record(HistoryEntry::snapshot(&cred, "automatic_reenable", base()));

        assert_eq!(history.last_disable_reason(&cred.fingerprint), Some("429 burst"));
        assert!(history.disabled_since(&cred.fingerprint, base()));
        assert!(!history.disabled_since(&cred.fingerprint, base() + Duration::seconds(1)));
    }
}
