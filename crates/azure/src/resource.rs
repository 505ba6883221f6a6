//! Azure Resource Manager identifiers and API versions

use keyguard_core::ResourceDescriptor;

/// `api-version` of the Azure Monitor metrics endpoint
pub const METRICS_API_VERSION: &str = "2021-05-01";

/// `api-version` of the Cognitive Services key endpoints
pub const KEYS_API_VERSION: &str = "2023-05-01";

/// Audience requested for management tokens
pub const MANAGEMENT_AUDIENCE: &str = "https://management.azure.com/";

/// ARM id of a Cognitive Services account
///
/// ```rust
/// use keyguard_azure::resource_id;
/// use keyguard_core::ResourceDescriptor;
///
/// let resource = ResourceDescriptor::new("sub-1", "rg-ai", "openai-east");
/// assert_eq!(
///     resource_id(&resource),
///     "/subscriptions/sub-1/resourceGroups/rg-ai/providers/Microsoft.CognitiveServices/accounts/openai-east"
/// );
/// ```
pub fn resource_id(resource: &ResourceDescriptor) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.CognitiveServices/accounts/{}",
        resource.subscription_id, resource.resource_group, resource.name
    )
}
