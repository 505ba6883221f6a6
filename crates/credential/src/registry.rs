//! Credential registry: memoized listings with hit/miss tracking
//!
//! A listing is fetched from the provider at most once per TTL per resource.
//! When a listing is rebuilt, each credential's lifecycle state is carried
//! forward from its latest history entry, so an expired cache entry never
//! resets a disabled credential to active.

use chrono::{DateTime, Utc};
use keyguard_core::{
    Credential, CredentialFingerprint, CredentialState, CredentialStatus, ResourceDescriptor,
    ResourceKey, SlotName,
};
use std::collections::HashMap;
use std::time::Duration;

use crate::history::{CredentialHistory, HistoryEntry};
use crate::source::KeyListing;

#[derive(Debug, Clone)]
struct CachedListing {
    fetched_at: DateTime<Utc>,
    credentials: Vec<Credential>,
}

/// Memoized credential listings keyed by resource identity
#[derive(Debug)]
pub struct CredentialRegistry {
    entries: HashMap<ResourceKey, CachedListing>,
    ttl: chrono::Duration,
    hits: u64,
    misses: u64,
}

impl CredentialRegistry {
    /// Empty registry whose entries live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            hits: 0,
            misses: 0,
        }
    }

    /// Cached credentials for `key` if the entry is younger than the TTL
    pub fn fresh(&mut self, key: &ResourceKey, now: DateTime<Utc>) -> Option<Vec<Credential>> {
        let hit = self
            .entries
            .get(key)
            .filter(|cached| now.signed_duration_since(cached.fetched_at) < self.ttl)
            .map(|cached| cached.credentials.clone());
        if hit.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        hit
    }

    /// Store a freshly built listing
    pub fn store(&mut self, key: ResourceKey, fetched_at: DateTime<Utc>, credentials: Vec<Credential>) {
        self.entries.insert(
            key,
            CachedListing {
                fetched_at,
                credentials,
            },
        );
    }

    /// Replace the cached record of `credential` if its resource is cached
    pub fn update(&mut self, key: &ResourceKey, credential: &Credential) {
        self.modify(key, &credential.fingerprint, |cached| {
            *cached = credential.clone();
        });
    }

    /// Apply `f` to the cached record of `fingerprint`
    pub fn modify(
        &mut self,
        key: &ResourceKey,
        fingerprint: &CredentialFingerprint,
        f: impl FnOnce(&mut Credential),
    ) {
        if let Some(credential) = self
            .entries
            .get_mut(key)
            .and_then(|cached| cached.credentials.iter_mut().find(|c| &c.fingerprint == fingerprint))
        {
            f(credential);
        }
    }

    /// Drop the cached listing of `key`
    pub fn invalidate(&mut self, key: &ResourceKey) {
        self.entries.remove(key);
    }

    /// Hit/miss counters and entry count
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            hits: self.hits,
            misses: self.misses,
            cached_resources: self.entries.len(),
        }
    }
}

/// Registry performance counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct RegistryStats {
    pub hits: u64,
    pub misses: u64,
    pub cached_resources: usize,
}

/// Build credential records from a provider listing
///
/// Only `known_slots` with a non-empty secret are kept, in `known_slots`
/// order. State, deadlines, disable count and reason come from history;
/// `last_used` comes from `usage`.
pub fn build_credentials(
    resource: &ResourceDescriptor,
    listing: KeyListing,
    known_slots: &[SlotName],
    history: &CredentialHistory,
    usage: &HashMap<CredentialFingerprint, DateTime<Utc>>,
) -> Vec<Credential> {
    let mut listing = listing;
    known_slots
        .iter()
        .filter_map(|slot| {
            let secret = listing.remove(slot).filter(|s| !s.is_empty())?;
            let mut credential = Credential::new(resource, slot.clone(), secret);
            if let Some(latest) = history.latest(&credential.fingerprint) {
                credential.state = state_from(latest);
                credential.disable_count = latest.disable_count;
            }
            credential.last_disable_reason = history
                .last_disable_reason(&credential.fingerprint)
                .map(str::to_owned);
            credential.last_used = usage.get(&credential.fingerprint).copied();
            Some(credential)
        })
        .collect()
}

pub(crate) fn state_from(entry: &HistoryEntry) -> CredentialState {
    match (entry.status, entry.disabled_at, entry.reenable_at) {
        (CredentialStatus::Disabled, Some(disabled_at), Some(reenable_at)) => {
            CredentialState::Disabled {
                disabled_at,
                reenable_at,
            }
        }
        (CredentialStatus::PendingReenable, Some(disabled_at), Some(reenable_at)) => {
            CredentialState::PendingReenable {
                disabled_at,
                reenable_at,
            }
        }
        _ => CredentialState::Active,
    }
}
