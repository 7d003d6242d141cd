//! Azure Subscriptions
//!
//! Functions for listing the subscriptions a principal can see.

use super::client::ResourceGraphClient;
use crate::error::ProviderError;
use serde_json::Value;

/// Subscriptions API version
pub const SUBSCRIPTIONS_API_VERSION: &str = "2020-01-01";

/// Subscription information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub subscription_id: String,
    pub display_name: String,
    pub tenant_id: String,
    pub state: String,
}

impl Subscription {
    /// Extract a subscription from an API record. Records without an id are skipped.
    pub fn from_value(value: &Value) -> Option<Self> {
        let subscription_id = value
            .get("subscriptionId")
            .and_then(|v| v.as_str())
            .filter(|id| !id.is_empty())?;

        let field = |name: &str, default: &str| {
            value
                .get(name)
                .and_then(|v| v.as_str())
                .unwrap_or(default)
                .to_string()
        };

        Some(Self {
            subscription_id: subscription_id.to_string(),
            display_name: field("displayName", "-"),
            tenant_id: field("tenantId", "-"),
            state: field("state", "Unknown"),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.state.eq_ignore_ascii_case("Enabled")
    }
}

/// List all enabled subscriptions, following `nextLink` pagination
pub async fn list_subscriptions(
    client: &ResourceGraphClient,
) -> Result<Vec<Subscription>, ProviderError> {
    let mut subscriptions = Vec::new();
    let mut next = Some(
        client
            .arm_url("subscriptions", SUBSCRIPTIONS_API_VERSION)?
            .to_string(),
    );

    while let Some(url) = next.take() {
        let response = client.get(&url).await?;

        if let Some(items) = response.body.get("value").and_then(|v| v.as_array()) {
            subscriptions.extend(
                items
                    .iter()
                    .filter_map(Subscription::from_value)
                    .filter(Subscription::is_enabled),
            );
        }

        next = response
            .body
            .get("nextLink")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
    }

    tracing::debug!("Found {} enabled subscriptions", subscriptions.len());
    Ok(subscriptions)
}

/// Get subscription IDs as a simple list
pub async fn list_subscription_ids(
    client: &ResourceGraphClient,
) -> Result<Vec<String>, ProviderError> {
    let subscriptions = list_subscriptions(client).await?;
    Ok(subscriptions.into_iter().map(|s| s.subscription_id).collect())
}
