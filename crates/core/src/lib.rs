//! # Keyguard Core
//!
//! Core types shared by every keyguard crate.
//!
//! ## Key Components
//!
//! - **Identifiers**: [`ResourceDescriptor`], [`ResourceKey`], [`SlotName`], [`CredentialFingerprint`]
//! - **Credential model**: [`Credential`] with its explicit [`CredentialState`] machine
//! - **Protection events**: [`ProtectionEvent`] handed to notifiers
//! - **Clock**: [`Clock`] abstraction so cooldowns and TTLs are testable
//! - **Configuration**: [`config::AppConfig`] and its validation
//! - **Errors**: [`UpstreamError`] and [`ConfigError`]
//!
//! ## Usage
//!
//! ```rust
//! use keyguard_core::{CredentialFingerprint, ResourceDescriptor, SlotName};
//!
//! let resource = ResourceDescriptor::new("sub-1", "rg-ai", "openai-east");
//! let slot = SlotName::new("key1");
//! let fingerprint = CredentialFingerprint::derive(&resource, &slot);
//!
//! assert_eq!(fingerprint.as_str().len(), 16);
//! ```
#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
pub mod credential;
pub mod error;
pub mod event;
pub mod id;
pub mod secret;

pub use clock::{Clock, ManualClock, SystemClock};
pub use credential::{Credential, CredentialState, CredentialStatus};
pub use error::{ConfigError, UpstreamError};
pub use event::{EventKind, ProtectionEvent, Severity};
pub use id::{CredentialFingerprint, ResourceDescriptor, ResourceKey, SlotName};
pub use secret::SecretString;

/// Common prelude for keyguard crates
pub mod prelude {
    pub use super::{
        Clock, ConfigError, Credential, CredentialFingerprint, CredentialState, CredentialStatus,
        EventKind, ManualClock, ProtectionEvent, ResourceDescriptor, ResourceKey, SecretString,
        Severity, SlotName, SystemClock, UpstreamError,
    };
}
