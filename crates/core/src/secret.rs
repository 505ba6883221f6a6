//! Credential secret values
//!
//! [`SecretString`] holds a key value returned by a credential provider. The
//! value is zeroed on drop and only reachable inside a closure passed to
//! [`SecretString::expose_secret`], so it never ends up in logs, events or
//! serialized reports by accident.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

const REDACTED: &str = "[REDACTED]";

/// Secret key value with zeroization on drop
///
/// # Examples
///
/// ```
/// use keyguard_core::SecretString;
///
/// let key = SecretString::new("0123abcd");
/// assert_eq!(key.expose_secret(str::len), 8);
/// assert_eq!(format!("{key:?}"), "[REDACTED]");
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString {
    inner: String,
}

impl SecretString {
    /// Wrap a secret value
    pub fn new<S: Into<String>>(s: S) -> Self {
        Self { inner: s.into() }
    }

    /// Run `f` with the plain value; the borrow cannot escape the closure
    pub fn expose_secret<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&str) -> R,
    {
        f(&self.inner)
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the secret is empty (providers report missing slots this way)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

// Compared without early exit so rotation checks do not leak prefix length.
impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        let (a, b) = (self.inner.as_bytes(), other.inner.as_bytes());
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

impl Eq for SecretString {}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(REDACTED)
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretString::new)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_value_inside_closure() {
        let key = SecretString::new("primary-key-value");
        key.expose_secret(|s| assert_eq!(s, "primary-key-value"));
        assert_eq!(key.len(), 17);
        assert!(!key.is_empty());
        assert!(SecretString::new("").is_empty());
    }

    #[test]
    fn debug_and_display_are_redacted() {
        let key = SecretString::new("super_secret_key");
        assert_eq!(format!("{key:?}"), "[REDACTED]");
        assert_eq!(key.to_string(), "[REDACTED]");
    }

    #[test]
    fn serializes_redacted_but_deserializes_plain() {
        let key = SecretString::new("should_not_leak");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"[REDACTED]\"");

        let parsed: SecretString = serde_json::from_str("\"from-config\"").unwrap();
        parsed.expose_secret(|s| assert_eq!(s, "from-config"));
    }

    #[test]
    fn equality_compares_values() {
        assert_eq!(SecretString::new("abc"), SecretString::new("abc"));
        assert_ne!(SecretString::new("abc"), SecretString::new("abd"));
        assert_ne!(SecretString::new("abc"), SecretString::new("abcd"));
    }

    #[test]
    fn redaction_survives_nesting() {
        #[derive(Debug)]
        #[allow(dead_code)]
        struct Holder {
            key: SecretString,
        }
        let holder = Holder {
            key: SecretString::new("nested-secret"),
        };
        assert!(!format!("{holder:?}").contains("nested-secret"));
    }
}
