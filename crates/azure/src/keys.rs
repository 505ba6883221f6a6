//! Cognitive Services account keys

use async_trait::async_trait;
use keyguard_core::{ResourceDescriptor, SecretString, SlotName, UpstreamError};
use keyguard_credential::{CredentialProvider, KeyListing};
use serde::Deserialize;
use std::sync::Arc;

use crate::client::ArmClient;
use crate::resource::{KEYS_API_VERSION, resource_id};

/// Body of `listKeys` and `regenerateKey`
#[derive(Deserialize)]
struct AccountKeys {
    #[serde(default)]
    key1: Option<String>,
    #[serde(default)]
    key2: Option<String>,
}

impl AccountKeys {
    fn into_listing(self) -> KeyListing {
        [("key1", self.key1), ("key2", self.key2)]
            .into_iter()
            .filter_map(|(slot, secret)| {
                let secret = secret.filter(|s| !s.is_empty())?;
                Some((SlotName::new(slot), SecretString::new(secret)))
            })
            .collect()
    }
}

/// [`CredentialProvider`] over the account's two key slots
#[derive(Debug, Clone)]
pub struct AzureKeyProvider {
    client: Arc<ArmClient>,
}

impl AzureKeyProvider {
    pub fn new(client: Arc<ArmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CredentialProvider for AzureKeyProvider {
    async fn list(&self, resource: &ResourceDescriptor) -> Result<KeyListing, UpstreamError> {
        let path = format!("{}/listKeys", resource_id(resource));
        let keys: AccountKeys = self
            .client
            .post_json("list_keys", &path, &[("api-version", KEYS_API_VERSION)], None)
            .await?;
        Ok(keys.into_listing())
    }

    async fn regenerate(
        &self,
        resource: &ResourceDescriptor,
        slot: &SlotName,
    ) -> Result<SecretString, UpstreamError> {
        let path = format!("{}/regenerateKey", resource_id(resource));
        let keys: AccountKeys = self
            .client
            .post_json(
                "regenerate_key",
                &path,
                &[("api-version", KEYS_API_VERSION)],
                Some(serde_json::json!({ "keyName": slot.as_str() })),
            )
            .await?;

        let mut listing = keys.into_listing();
        let secret = listing.remove(slot).ok_or_else(|| UpstreamError::Decode {
            operation: "regenerate_key".into(),
            reason: format!("response does not contain {slot}"),
        })?;
        tracing::info!(resource = %resource, slot = %slot, "Account key regenerated");
        Ok(secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_missing_slots_are_not_listed() {
        let keys: AccountKeys = serde_json::from_str(r#"{"key1":"abc","key2":""}"#).unwrap();
        let listing = keys.into_listing();
        assert_eq!(listing.len(), 1);
        assert!(listing.contains_key(&SlotName::new("key1")));

        let keys: AccountKeys = serde_json::from_str("{}").unwrap();
        assert!(keys.into_listing().is_empty());
    }
}
