//! Credential records and their lifecycle state
//!
//! ```text
//! Active ──disable──▶ Disabled ──reenable──▶ PendingReenable ──ok──▶ Active
//!                        ▲                          │
//!                        └─────────failure──────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::id::{CredentialFingerprint, ResourceDescriptor, SlotName};
use crate::secret::SecretString;

/// Lifecycle state of a credential
///
/// Both non-active variants carry their deadlines, and `reenable_at` is
/// always strictly after `disabled_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CredentialState {
    /// Usable
    Active,
    /// Rotated out, waiting for its reinstatement deadline
    Disabled {
        disabled_at: DateTime<Utc>,
        reenable_at: DateTime<Utc>,
    },
    /// Reinstatement call in flight
    PendingReenable {
        disabled_at: DateTime<Utc>,
        reenable_at: DateTime<Utc>,
    },
}

impl CredentialState {
    /// Disabled state starting at `at` and lasting `duration`
    ///
    /// Returns `None` for a zero duration or one that overflows the calendar.
    pub fn disabled(at: DateTime<Utc>, duration: Duration) -> Option<Self> {
        if duration.is_zero() {
            return None;
        }
        let span = chrono::Duration::from_std(duration).ok()?;
        let reenable_at = at.checked_add_signed(span)?;
        Some(Self::Disabled {
            disabled_at: at,
            reenable_at,
        })
    }

    /// Coarse status
    pub fn status(&self) -> CredentialStatus {
        match self {
            Self::Active => CredentialStatus::Active,
            Self::Disabled { .. } => CredentialStatus::Disabled,
            Self::PendingReenable { .. } => CredentialStatus::PendingReenable,
        }
    }

    /// When the credential was disabled, if it is not active
    pub fn disabled_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Active => None,
            Self::Disabled { disabled_at, .. } | Self::PendingReenable { disabled_at, .. } => {
                Some(*disabled_at)
            }
        }
    }

    /// When the credential is due to be reinstated, if it is not active
    pub fn reenable_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Active => None,
            Self::Disabled { reenable_at, .. } | Self::PendingReenable { reenable_at, .. } => {
                Some(*reenable_at)
            }
        }
    }

    /// Same deadlines, marked as in flight
    ///
    /// Returns `None` when already active.
    pub fn to_pending(self) -> Option<Self> {
        match self {
            Self::Active => None,
            Self::Disabled {
                disabled_at,
                reenable_at,
            }
            | Self::PendingReenable {
                disabled_at,
                reenable_at,
            } => Some(Self::PendingReenable {
                disabled_at,
                reenable_at,
            }),
        }
    }
}

/// Coarse credential status as reported to hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    Active,
    Disabled,
    PendingReenable,
}

impl fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Disabled => "disabled",
            Self::PendingReenable => "pending_reenable",
        })
    }
}

/// One named secret slot on a resource
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Credential {
    /// Stable identity
    pub fingerprint: CredentialFingerprint,
    /// Slot name (`key1`, `key2`)
    pub slot: SlotName,
    /// Current secret, redacted when serialized
    pub secret: SecretString,
    /// Lifecycle state
    pub state: CredentialState,
    /// Times this credential has been disabled
    pub disable_count: u32,
    /// Reason recorded at the most recent disable
    pub last_disable_reason: Option<String>,
    /// Last time the credential was known to be used
    pub last_used: Option<DateTime<Utc>>,
}

impl Credential {
    /// Fresh active credential for `slot` on `resource`
    pub fn new(resource: &ResourceDescriptor, slot: SlotName, secret: SecretString) -> Self {
        Self {
            fingerprint: CredentialFingerprint::derive(resource, &slot),
            slot,
            secret,
            state: CredentialState::Active,
            disable_count: 0,
            last_disable_reason: None,
            last_used: None,
        }
    }

    /// Coarse status
    pub fn status(&self) -> CredentialStatus {
        self.state.status()
    }

    /// Whether the credential can be selected for disabling
    pub fn is_active(&self) -> bool {
        matches!(self.state, CredentialState::Active)
    }

    /// When the credential was disabled
    pub fn disabled_at(&self) -> Option<DateTime<Utc>> {
        self.state.disabled_at()
    }

    /// When the credential will be reinstated
    pub fn will_reenable_at(&self) -> Option<DateTime<Utc>> {
        self.state.reenable_at()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap()
    }

    #[test]
    fn disabled_state_orders_deadlines() {
        let state = CredentialState::disabled(at(), Duration::from_secs(60)).unwrap();
        assert_eq!(state.status(), CredentialStatus::Disabled);
        assert_eq!(state.disabled_at(), Some(at()));
        assert_eq!(state.reenable_at(), Some(at() + chrono::Duration::seconds(60)));
        assert!(state.reenable_at() > state.disabled_at());
    }

    #[test]
    fn zero_duration_is_rejected() {
        assert_eq!(CredentialState::disabled(at(), Duration::ZERO), None);
    }

    #[test]
    fn pending_round_trip_keeps_deadlines() {
        let disabled = CredentialState::disabled(at(), Duration::from_secs(60)).unwrap();
        let pending = disabled.to_pending().unwrap();
        assert_eq!(pending.status(), CredentialStatus::PendingReenable);
        assert_eq!(pending.reenable_at(), disabled.reenable_at());
        assert_eq!(CredentialState::Active.to_pending(), None);
    }

    #[test]
    fn new_credential_is_active() {
        let resource = ResourceDescriptor::new("sub", "rg", "svc");
        let cred = Credential::new(&resource, SlotName::new("key2"), SecretString::new("v"));
        assert!(cred.is_active());
        assert_eq!(cred.disable_count, 0);
        assert_eq!(cred.disabled_at(), None);
        assert_eq!(cred.will_reenable_at(), None);
        assert_eq!(
            cred.fingerprint,
            CredentialFingerprint::derive(&resource, &SlotName::new("key2"))
        );
    }

    #[test]
    fn serialized_credential_hides_secret() {
        let resource = ResourceDescriptor::new("sub", "rg", "svc");
        let cred = Credential::new(&resource, SlotName::new("key1"), SecretString::new("hunter2"));
        let json = serde_json::to_value(&cred).unwrap();
        assert_eq!(json["secret"], "[REDACTED]");
        assert_eq!(json["state"]["status"], "active");
        assert_eq!(CredentialStatus::PendingReenable.to_string(), "pending_reenable");
    }
}
