//! # Keyguard Credential
//!
//! The credential protection engine: decides which credential to rotate out
//! on a rate-limit burst, enforces anti-thrashing cooldowns, schedules
//! reinstatement and keeps an auditable history of every transition.
//!
//! ## Key Components
//!
//! - [`ProtectionEngine`]: the stateful engine, cheap to clone
//! - [`MetricsSource`], [`CredentialProvider`], [`Notifier`]: collaborator traits
//! - [`select_for_disable`]: deterministic selection policy
//! - [`CredentialHistory`], [`CredentialRegistry`], [`CooldownLedger`]: engine bookkeeping
//!
//! ## Lifecycle
//!
//! ```text
//! handle_burst ─▶ select_for_disable ─▶ disable ─▶ (sleep until reenable_at) ─▶ reenable
//!                                          │                                      │
//!                                          └── key_auto_disabled      key_auto_reenabled ──┘
//! ```
#![forbid(unsafe_code)]

pub mod cooldown;
pub mod engine;
pub mod error;
pub mod history;
pub mod outcome;
pub mod registry;
pub mod retry;
pub mod selection;
pub mod source;
pub mod summary;

#[cfg(feature = "test-util")]
pub mod testing;

pub use cooldown::CooldownLedger;
pub use engine::{EngineBuilder, PendingReinstatement, ProtectionEngine, REENABLE_REASON};
pub use error::{NotifyError, NotifyResult};
pub use history::{CredentialHistory, HistoryEntry};
pub use outcome::{BurstOutcome, DisableOutcome, ReenableOutcome};
pub use registry::{CredentialRegistry, RegistryStats};
pub use retry::retry_with_backoff;
pub use selection::select_for_disable;
pub use source::{CredentialProvider, KeyListing, MetricsSource, Notifier};
pub use summary::{EngineStats, KeyStatusSummary, ProtectionStatus};

/// Commonly used types and traits
pub mod prelude {
    pub use crate::{
        BurstOutcome, CredentialProvider, DisableOutcome, KeyListing, KeyStatusSummary,
        MetricsSource, Notifier, NotifyError, ProtectionEngine, ProtectionStatus, ReenableOutcome,
    };
}
