//! Collaborator traits at the engine boundary
//!
//! The engine decides *that* a credential is rotated and *what* is notified.
//! Fetching metrics, talking to the credential store and delivering
//! notifications are behind these traits.

use async_trait::async_trait;
use keyguard_core::{ProtectionEvent, ResourceDescriptor, SecretString, SlotName, UpstreamError};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::NotifyResult;

/// Slots reported by a provider, ordered by slot name
///
/// A slot that is missing or has an empty secret counts as not present.
pub type KeyListing = BTreeMap<SlotName, SecretString>;

/// Source of the rate-limit signal
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Rate-limit errors observed for `resource` in the most recent 60 s window
    async fn error_count(&self, resource: &ResourceDescriptor) -> Result<u64, UpstreamError>;
}

/// Store holding a resource's credential slots
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// List the resource's slots and their current secrets
    async fn list(&self, resource: &ResourceDescriptor) -> Result<KeyListing, UpstreamError>;

    /// Replace the secret in `slot` atomically and return the new value
    async fn regenerate(
        &self,
        resource: &ResourceDescriptor,
        slot: &SlotName,
    ) -> Result<SecretString, UpstreamError>;
}

/// Receiver of protection events
///
/// # Example
///
/// ```rust,ignore
/// struct Stdout;
///
/// #[async_trait]
/// impl Notifier for Stdout {
///     async fn emit(&self, event: &ProtectionEvent) -> NotifyResult {
///         println!("{}", event.description());
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one event
    async fn emit(&self, event: &ProtectionEvent) -> NotifyResult;
}

#[async_trait]
impl<T: MetricsSource + ?Sized> MetricsSource for Arc<T> {
    async fn error_count(&self, resource: &ResourceDescriptor) -> Result<u64, UpstreamError> {
        (**self).error_count(resource).await
    }
}

#[async_trait]
impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    async fn emit(&self, event: &ProtectionEvent) -> NotifyResult {
        (**self).emit(event).await
    }
}
