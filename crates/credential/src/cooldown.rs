//! Recent-disable ledger for anti-thrashing cooldowns

use chrono::{DateTime, Utc};
use keyguard_core::CredentialFingerprint;
use std::collections::HashMap;
use std::time::Duration;

/// Fingerprint → time of its most recent disable
///
/// Entries are overwritten, never removed.
#[derive(Debug)]
pub struct CooldownLedger {
    last_disable: HashMap<CredentialFingerprint, DateTime<Utc>>,
    cooldown: chrono::Duration,
}

impl CooldownLedger {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            last_disable: HashMap::new(),
            cooldown: chrono::Duration::from_std(cooldown).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// End of the cooldown blocking `fingerprint` at `now`, if any
    pub fn blocked_until(
        &self,
        fingerprint: &CredentialFingerprint,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let last = self.last_disable.get(fingerprint)?;
        let until = last.checked_add_signed(self.cooldown)?;
        (now < until).then_some(until)
    }

    /// Record a disable of `fingerprint` at `at`
    pub fn record(&mut self, fingerprint: CredentialFingerprint, at: DateTime<Utc>) {
        self.last_disable.insert(fingerprint, at);
    }

    /// Configured cooldown
    pub fn cooldown(&self) -> chrono::Duration {
        self.cooldown
    }
}
