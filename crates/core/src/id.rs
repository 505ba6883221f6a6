//! Identifiers for monitored resources and their credential slots.
//!
//! A [`ResourceDescriptor`] names one monitored cloud resource. Its identity is
//! the `(subscription, resource group, name)` triple captured by [`ResourceKey`];
//! the optional location is descriptive only.
//!
//! A [`CredentialFingerprint`] is derived deterministically from the resource
//! identity and a [`SlotName`], so the same credential maps to the same
//! fingerprint across process restarts without any persisted state.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Number of hex characters kept from the SHA-256 digest
const FINGERPRINT_LEN: usize = 16;

/// Identity of a monitored resource (location excluded)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    /// Subscription the resource belongs to
    pub subscription_id: String,
    /// Resource group containing the resource
    pub resource_group: String,
    /// Resource name
    pub name: String,
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.subscription_id, self.resource_group, self.name)
    }
}

/// A monitored cloud resource
///
/// Owned by configuration and immutable for the process lifetime. Equality and
/// hashing only consider the identity triple, never the location.
///
/// # Examples
///
/// ```
/// use keyguard_core::ResourceDescriptor;
///
/// let east = ResourceDescriptor::new("sub", "rg", "svc").with_location("eastus");
/// let west = ResourceDescriptor::new("sub", "rg", "svc").with_location("westus");
/// assert_eq!(east, west);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Subscription id
    pub subscription_id: String,
    /// Resource group
    pub resource_group: String,
    /// Resource name
    pub name: String,
    /// Optional region, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ResourceDescriptor {
    /// Create a descriptor without a location
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            name: name.into(),
            location: None,
        }
    }

    /// Attach a location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Identity triple of this resource
    pub fn key(&self) -> ResourceKey {
        ResourceKey {
            subscription_id: self.subscription_id.clone(),
            resource_group: self.resource_group.clone(),
            name: self.name.clone(),
        }
    }
}

impl PartialEq for ResourceDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.subscription_id == other.subscription_id
            && self.resource_group == other.resource_group
            && self.name == other.name
    }
}

impl Eq for ResourceDescriptor {}

impl Hash for ResourceDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.subscription_id.hash(state);
        self.resource_group.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_group, self.name)
    }
}

/// Name of a credential slot on a resource (e.g. `key1`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotName(String);

impl SlotName {
    /// Create a slot name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Slot name as string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SlotName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for SlotName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Stable credential identity
///
/// First 16 hex characters of SHA-256 over
/// `"{subscription}:{resource_group}:{name}:{slot}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialFingerprint(String);

impl CredentialFingerprint {
    /// Derive the fingerprint of `slot` on `resource`
    ///
    /// # Examples
    ///
    /// ```
    /// use keyguard_core::{CredentialFingerprint, ResourceDescriptor, SlotName};
    ///
    /// let resource = ResourceDescriptor::new("sub", "rg", "svc");
    /// let a = CredentialFingerprint::derive(&resource, &SlotName::new("key1"));
    /// let b = CredentialFingerprint::derive(&resource, &SlotName::new("key1"));
    /// assert_eq!(a, b);
    /// ```
    pub fn derive(resource: &ResourceDescriptor, slot: &SlotName) -> Self {
        let material = format!(
            "{}:{}:{}:{}",
            resource.subscription_id, resource.resource_group, resource.name, slot
        );
        let digest = Sha256::digest(material.as_bytes());
        let mut encoded = hex::encode(digest);
        encoded.truncate(FINGERPRINT_LEN);
        Self(encoded)
    }

    /// Fingerprint as string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn resource() -> ResourceDescriptor {
        ResourceDescriptor::new("sub-1", "rg-ai", "openai-east")
    }

    #[test]
    fn fingerprint_is_sixteen_hex_chars() {
        let fp = CredentialFingerprint::derive(&resource(), &SlotName::new("key1"));
        assert_eq!(fp.as_str().len(), 16);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_is_reproducible() {
        let first = CredentialFingerprint::derive(&resource(), &SlotName::new("key1"));
        let second = CredentialFingerprint::derive(&resource(), &SlotName::new("key1"));
        assert_eq!(first, second);
    }

    #[test]
    fn fingerprint_differs_per_slot_and_resource() {
        let other = ResourceDescriptor::new("sub-1", "rg-ai", "openai-west");
        let fps: HashSet<_> = [
            CredentialFingerprint::derive(&resource(), &SlotName::new("key1")),
            CredentialFingerprint::derive(&resource(), &SlotName::new("key2")),
            CredentialFingerprint::derive(&other, &SlotName::new("key1")),
        ]
        .into_iter()
        .collect();
        assert_eq!(fps.len(), 3);
    }

    #[test]
    fn fingerprint_ignores_location() {
        let located = resource().with_location("eastus");
        assert_eq!(
            CredentialFingerprint::derive(&located, &SlotName::new("key1")),
            CredentialFingerprint::derive(&resource(), &SlotName::new("key1")),
        );
    }

    #[test]
    fn descriptor_identity_excludes_location() {
        let a = resource().with_location("eastus");
        let b = resource();
        assert_eq!(a, b);
        assert_eq!(a.key(), b.key());

        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn descriptor_display_uses_group_and_name() {
        assert_eq!(resource().to_string(), "rg-ai/openai-east");
        assert_eq!(resource().key().to_string(), "sub-1:rg-ai:openai-east");
    }
}
