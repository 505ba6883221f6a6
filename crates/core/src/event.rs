//! Protection events
//!
//! Emitted by the protection engine and the polling scheduler, consumed by
//! notifiers. Events are transient: once handed to a notifier they are not
//! kept anywhere except the scheduler's bounded event log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::id::{CredentialFingerprint, ResourceDescriptor, SlotName};

/// Kind of a protection event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    KeyAutoDisabled,
    KeyAutoReenabled,
    CriticalMultiResource,
}

impl EventKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeyAutoDisabled => "key_auto_disabled",
            Self::KeyAutoReenabled => "key_auto_reenabled",
            Self::CriticalMultiResource => "critical_multi_resource",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Critical => "critical",
        })
    }
}

/// Structured protection event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProtectionEvent {
    /// A credential was rotated out after a rate-limit burst
    KeyAutoDisabled {
        /// Affected resource
        resource: ResourceDescriptor,
        /// Rotated slot
        slot: SlotName,
        /// Credential identity
        fingerprint: CredentialFingerprint,
        /// Why the credential was disabled
        reason: String,
        /// Cumulative disables including this one
        disable_count: u32,
        /// When the credential was disabled
        disabled_at: DateTime<Utc>,
        /// When it will be reinstated
        reenable_at: DateTime<Utc>,
    },

    /// A disabled credential was reinstated
    KeyAutoReenabled {
        /// Affected resource
        resource: ResourceDescriptor,
        /// Reinstated slot
        slot: SlotName,
        /// Credential identity
        fingerprint: CredentialFingerprint,
        /// Cumulative disables so far
        disable_count: u32,
        /// When the credential became active again
        reenabled_at: DateTime<Utc>,
    },

    /// Several resources exceeded the threshold in the same cycle
    CriticalMultiResource {
        /// Resources over threshold, as `group/name`
        affected: Vec<String>,
        /// Number of resources over threshold
        services_with_429: usize,
        /// Number of resources checked in the cycle
        total_services: usize,
        /// Threshold in effect
        threshold: u64,
        /// Cycle time
        detected_at: DateTime<Utc>,
    },
}

impl ProtectionEvent {
    /// Event kind
    pub fn kind(&self) -> EventKind {
        match self {
            Self::KeyAutoDisabled { .. } => EventKind::KeyAutoDisabled,
            Self::KeyAutoReenabled { .. } => EventKind::KeyAutoReenabled,
            Self::CriticalMultiResource { .. } => EventKind::CriticalMultiResource,
        }
    }

    /// Event severity
    pub fn severity(&self) -> Severity {
        match self {
            Self::KeyAutoReenabled { .. } => Severity::Info,
            Self::KeyAutoDisabled { .. } | Self::CriticalMultiResource { .. } => {
                Severity::Critical
            }
        }
    }

    /// When the event happened
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::KeyAutoDisabled { disabled_at, .. } => *disabled_at,
            Self::KeyAutoReenabled { reenabled_at, .. } => *reenabled_at,
            Self::CriticalMultiResource { detected_at, .. } => *detected_at,
        }
    }

    /// Resource the event concerns, if it concerns exactly one
    pub fn resource(&self) -> Option<&ResourceDescriptor> {
        match self {
            Self::KeyAutoDisabled { resource, .. } | Self::KeyAutoReenabled { resource, .. } => {
                Some(resource)
            }
            Self::CriticalMultiResource { .. } => None,
        }
    }

    /// One-line human readable summary
    pub fn description(&self) -> String {
        match self {
            Self::KeyAutoDisabled {
                resource,
                slot,
                reason,
                reenable_at,
                ..
            } => format!(
                "Key {slot} of {resource} disabled ({reason}); reenable at {}",
                reenable_at.to_rfc3339()
            ),
            Self::KeyAutoReenabled {
                resource,
                slot,
                disable_count,
                ..
            } => format!(
                "Key {slot} of {resource} reenabled after {disable_count} total disable(s)"
            ),
            Self::CriticalMultiResource {
                services_with_429,
                total_services,
                threshold,
                ..
            } => format!(
                "{services_with_429} of {total_services} services exceeded {threshold} rate-limit errors in one cycle"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn resource() -> ResourceDescriptor {
        ResourceDescriptor::new("sub", "rg-ai", "openai-east")
    }

    fn disabled_event() -> ProtectionEvent {
        let at = Utc.with_ymd_and_hms(2025, 2, 3, 4, 5, 6).unwrap();
        ProtectionEvent::KeyAutoDisabled {
            resource: resource(),
            slot: SlotName::new("key1"),
            fingerprint: CredentialFingerprint::derive(&resource(), &SlotName::new("key1")),
            reason: "429 rate limit exceeded: 12 errors in 1 minute".into(),
            disable_count: 1,
            disabled_at: at,
            reenable_at: at + chrono::Duration::minutes(1),
        }
    }

    #[test]
    fn kind_and_severity() {
        let event = disabled_event();
        assert_eq!(event.kind(), EventKind::KeyAutoDisabled);
        assert_eq!(event.severity(), Severity::Critical);
        assert_eq!(event.resource(), Some(&resource()));
        assert!(event.description().contains("key1"));
        assert!(event.description().contains("rg-ai/openai-east"));
    }

    #[test]
    fn serializes_with_event_tag() {
        let json = serde_json::to_value(disabled_event()).unwrap();
        assert_eq!(json["event"], "key_auto_disabled");
        assert_eq!(json["slot"], "key1");
        assert_eq!(json["disable_count"], 1);
    }

    #[test]
    fn critical_event_has_no_single_resource() {
        let event = ProtectionEvent::CriticalMultiResource {
            affected: vec!["rg/a".into(), "rg/b".into()],
            services_with_429: 2,
            total_services: 3,
            threshold: 10,
            detected_at: Utc::now(),
        };
        assert_eq!(event.kind().as_str(), "critical_multi_resource");
        assert_eq!(event.severity(), Severity::Critical);
        assert!(event.resource().is_none());
        assert_eq!(
            event.description(),
            "2 of 3 services exceeded 10 rate-limit errors in one cycle"
        );
    }
}
