//! Choice of which credential to sacrifice on a burst

use keyguard_core::Credential;
use std::cmp::Ordering;

/// Pick the active credential to disable
///
/// Lowest `disable_count` first; ties go to the oldest `last_used` (never
/// used counts as oldest); remaining ties to the lexically smallest slot
/// name. Returns `None` when no credential is active.
pub fn select_for_disable(credentials: &[Credential]) -> Option<&Credential> {
    credentials
        .iter()
        .filter(|c| c.is_active())
        .min_by(|a, b| disable_order(a, b))
}

fn disable_order(a: &Credential, b: &Credential) -> Ordering {
    a.disable_count
        .cmp(&b.disable_count)
        // `None < Some(_)`, so never-used sorts first
        .then_with(|| a.last_used.cmp(&b.last_used))
        .then_with(|| a.slot.cmp(&b.slot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use keyguard_core::{CredentialState, ResourceDescriptor, SecretString, SlotName};
    use proptest::prelude::*;
    use rstest::rstest;

    fn cred(slot: &str, disable_count: u32, last_used: Option<DateTime<Utc>>) -> Credential {
        let mut c = Credential::new(
            &ResourceDescriptor::new("sub", "rg", "svc"),
            SlotName::new(slot),
            SecretString::new("v"),
        );
        c.disable_count = disable_count;
        c.last_used = last_used;
        c
    }

    fn t(minutes: i64) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes))
    }

    #[test]
    fn lowest_disable_count_wins() {
        let creds = [cred("a", 2, None), cred("b", 0, None), cred("c", 1, None)];
        assert_eq!(select_for_disable(&creds).map(|c| c.slot.as_str()), Some("b"));
    }

    #[rstest]
    #[case::older_wins(t(5), t(1), "key2")]
    #[case::never_used_wins(t(5), None, "key2")]
    #[case::both_unused_by_name(None, None, "key1")]
    #[case::same_time_by_name(t(3), t(3), "key1")]
    fn tie_breaks(
        #[case] key1_used: Option<DateTime<Utc>>,
        #[case] key2_used: Option<DateTime<Utc>>,
        #[case] expected: &str,
    ) {
        let creds = [cred("key1", 1, key1_used), cred("key2", 1, key2_used)];
        assert_eq!(select_for_disable(&creds).map(|c| c.slot.as_str()), Some(expected));
    }

    #[test]
    fn skips_inactive_credentials() {
        let mut disabled = cred("key1", 0, None);
        disabled.state = CredentialState::disabled(t(0).unwrap(), std::time::Duration::from_secs(60))
            .unwrap();
        let creds = [disabled.clone(), cred("key2", 4, None)];
        assert_eq!(select_for_disable(&creds).map(|c| c.slot.as_str()), Some("key2"));
        assert!(select_for_disable(&[disabled]).is_none());
        assert!(select_for_disable(&[]).is_none());
    }

    proptest! {
        #[test]
        fn selection_is_total_and_order_independent(
            specs in proptest::collection::vec((0u32..4, proptest::option::of(0i64..5)), 1..6)
        ) {
            let creds: Vec<_> = specs
                .iter()
                .enumerate()
                .map(|(i, (count, used))| cred(&format!("key{i}"), *count, used.and_then(t)))
                .collect();
            let mut reversed = creds.clone();
            reversed.reverse();

            let picked = select_for_disable(&creds).map(|c| c.slot.clone());
            prop_assert!(picked.is_some());
            prop_assert_eq!(picked, select_for_disable(&reversed).map(|c| c.slot.clone()));

            let winner = select_for_disable(&creds).unwrap();
            prop_assert!(creds.iter().all(|c| c.disable_count >= winner.disable_count));
        }
    }
}
