//! Integration glue
//!
//! Health check and subscription discovery for a service principal, driven
//! by the JSON credential payload the integration platform hands over.

use crate::azure::auth::{ClientSecretCredential, DEFAULT_AUTHORITY};
use crate::azure::client::{ResourceGraphClient, DEFAULT_ARM_ENDPOINT};
use crate::azure::subscriptions::list_subscriptions;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::sync::Arc;

/// Credential payload stored by the integration platform
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationCredentials {
    #[serde(default)]
    pub tenant_id: String,
    pub client_id: String,
    pub client_password: String,
}

impl IntegrationCredentials {
    pub fn from_json(json: &[u8]) -> Result<Self> {
        serde_json::from_slice(json).context("Failed to parse integration credentials")
    }
}

/// A discovered integration (one per subscription)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Integration {
    pub provider_id: String,
    pub name: String,
}

/// Where to authenticate and which ARM endpoint to talk to
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub authority: String,
    pub arm: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            authority: DEFAULT_AUTHORITY.to_string(),
            arm: DEFAULT_ARM_ENDPOINT.to_string(),
        }
    }
}

fn build_client(
    credentials: &IntegrationCredentials,
    tenant_id: &str,
    endpoints: &Endpoints,
) -> Result<ResourceGraphClient> {
    let credential = ClientSecretCredential::with_authority(
        tenant_id,
        &credentials.client_id,
        &credentials.client_password,
        &endpoints.authority,
    )
    .context("Invalid service principal credentials")?;

    ResourceGraphClient::with_endpoint(Arc::new(credential), &endpoints.arm)
        .context("Failed to create Resource Graph client")
}

/// Check that the credentials authenticate against `tenant_id` and can see
/// at least one enabled subscription
pub async fn health_check(json: &[u8], tenant_id: &str, endpoints: &Endpoints) -> Result<bool> {
    let credentials = IntegrationCredentials::from_json(json)?;
    let client = build_client(&credentials, tenant_id, endpoints)?;

    let subscriptions = list_subscriptions(&client)
        .await
        .context("Health check failed")?;

    tracing::info!(
        "Health check for tenant {}: {} subscriptions visible",
        tenant_id,
        subscriptions.len()
    );
    Ok(!subscriptions.is_empty())
}

/// One integration per enabled subscription visible to the credentials
pub async fn discover_integrations(json: &[u8], endpoints: &Endpoints) -> Result<Vec<Integration>> {
    let credentials = IntegrationCredentials::from_json(json)?;
    if credentials.tenant_id.is_empty() {
        anyhow::bail!("Integration credentials are missing 'tenantId'");
    }
    let client = build_client(&credentials, &credentials.tenant_id, endpoints)?;

    let subscriptions = list_subscriptions(&client)
        .await
        .context("Subscription discovery failed")?;

    Ok(subscriptions
        .into_iter()
        .map(|s| Integration {
            provider_id: s.subscription_id,
            name: s.display_name,
        })
        .collect())
}
