//! Results of engine operations
//!
//! Negative outcomes (cooldown, upstream failure, nothing to disable) are
//! normal values, not errors: the polling loop records them and moves on.

use chrono::{DateTime, Utc};
use keyguard_core::{Credential, SlotName, UpstreamError};
use serde::Serialize;

/// Result of [`ProtectionEngine::disable`](crate::ProtectionEngine::disable)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DisableOutcome {
    /// Secret regenerated, credential now disabled
    Disabled { credential: Credential },
    /// Refused: the credential was disabled too recently
    CoolingDown { until: DateTime<Utc> },
    /// Regeneration failed; nothing changed
    UpstreamFailed {
        #[serde(serialize_with = "display")]
        error: UpstreamError,
    },
    /// Refused: the credential is already disabled or being rotated
    NotActive,
    /// Refused: zero or out-of-range duration
    InvalidDuration,
}

impl DisableOutcome {
    /// Whether the credential was actually disabled
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled { .. })
    }

    /// Disabled credential, if any
    pub fn credential(&self) -> Option<&Credential> {
        match self {
            Self::Disabled { credential } => Some(credential),
            _ => None,
        }
    }
}

/// Result of [`ProtectionEngine::handle_burst`](crate::ProtectionEngine::handle_burst)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BurstOutcome {
    /// Listing failed or was empty; nothing attempted
    NoCredentials,
    /// Every credential is already disabled or being reinstated
    NoActiveCredentials,
    /// A credential was selected and a disable attempted
    Attempted {
        slot: SlotName,
        result: DisableOutcome,
    },
}

impl BurstOutcome {
    /// Credential disabled by this burst, if any
    pub fn disabled(&self) -> Option<&Credential> {
        match self {
            Self::Attempted { result, .. } => result.credential(),
            _ => None,
        }
    }
}

/// Result of [`ProtectionEngine::reenable`](crate::ProtectionEngine::reenable)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReenableOutcome {
    /// Secret regenerated, credential active again
    Reenabled { credential: Credential },
    /// The credential was not disabled
    NotDisabled,
    /// Another reinstatement of the same credential is in flight
    InProgress,
    /// Regeneration failed; the credential stays disabled
    UpstreamFailed {
        #[serde(serialize_with = "display")]
        error: UpstreamError,
    },
}

impl ReenableOutcome {
    pub fn is_reenabled(&self) -> bool {
        matches!(self, Self::Reenabled { .. })
    }
}

fn display<S: serde::Serializer>(error: &UpstreamError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}
