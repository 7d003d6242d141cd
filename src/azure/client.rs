//! Resource Graph Client
//!
//! Main client for querying Azure Resource Graph, combining authentication
//! and HTTP functionality.

use super::auth::TokenCredential;
use super::http::{AzureHttpClient, JsonResponse};
use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// Default Azure Resource Manager endpoint
pub const DEFAULT_ARM_ENDPOINT: &str = "https://management.azure.com";

/// Resource Graph API version
pub const RESOURCE_GRAPH_API_VERSION: &str = "2021-03-01";

/// Shape of the rows in a query response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultFormat {
    ObjectArray,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequestOptions {
    pub result_format: ResultFormat,
    #[serde(rename = "$skipToken", skip_serializing_if = "Option::is_none")]
    pub skip_token: Option<String>,
}

/// One page request against the Resource Graph `resources` endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryRequest<'a> {
    pub subscriptions: &'a [String],
    pub query: &'a str,
    pub options: QueryRequestOptions,
}

impl<'a> QueryRequest<'a> {
    /// First-page request returning rows as JSON objects
    pub fn object_array(subscriptions: &'a [String], query: &'a str) -> Self {
        Self {
            subscriptions,
            query,
            options: QueryRequestOptions {
                result_format: ResultFormat::ObjectArray,
                skip_token: None,
            },
        }
    }
}

/// One page of query results
#[derive(Debug, Default)]
pub struct QueryPage {
    pub data: Vec<Value>,
    pub skip_token: Option<String>,
    pub headers: HeaderMap,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    data: Vec<Value>,
    #[serde(rename = "$skipToken", default)]
    skip_token: Option<String>,
}

/// The provider query endpoint
#[async_trait]
pub trait ResourceGraph: Send + Sync {
    async fn resources(&self, request: &QueryRequest<'_>) -> Result<QueryPage, ProviderError>;
}

/// Azure Resource Manager client
#[derive(Clone)]
pub struct ResourceGraphClient {
    credential: Arc<dyn TokenCredential>,
    http: AzureHttpClient,
    endpoint: Url,
}

impl ResourceGraphClient {
    /// Create a client against the public ARM endpoint
    pub fn new(credential: Arc<dyn TokenCredential>) -> Result<Self, ProviderError> {
        Self::with_endpoint(credential, DEFAULT_ARM_ENDPOINT)
    }

    /// Create a client against a custom ARM endpoint
    pub fn with_endpoint(
        credential: Arc<dyn TokenCredential>,
        endpoint: &str,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            credential,
            http: AzureHttpClient::new()?,
            endpoint: Url::parse(endpoint)?,
        })
    }

    /// Build an ARM URL for a path and api-version
    pub fn arm_url(&self, path: &str, api_version: &str) -> Result<Url, ProviderError> {
        let mut url = self.endpoint.join(path.trim_start_matches('/'))?;
        url.query_pairs_mut().append_pair("api-version", api_version);
        Ok(url)
    }

    /// Build the Resource Graph query URL
    pub fn resource_graph_url(&self) -> Result<Url, ProviderError> {
        self.arm_url(
            "providers/Microsoft.ResourceGraph/resources",
            RESOURCE_GRAPH_API_VERSION,
        )
    }

    /// Make an authenticated GET request to an absolute ARM URL
    pub async fn get(&self, url: &str) -> Result<JsonResponse, ProviderError> {
        let token = self.credential.get_token().await?;
        self.http.get(url, &token).await
    }
}

#[async_trait]
impl ResourceGraph for ResourceGraphClient {
    async fn resources(&self, request: &QueryRequest<'_>) -> Result<QueryPage, ProviderError> {
        let token = self.credential.get_token().await?;
        let url = self.resource_graph_url()?;

        let response = self.http.post_json(url.as_str(), &token, request).await?;
        let parsed: QueryResponse = serde_json::from_value(response.body)?;

        Ok(QueryPage {
            data: parsed.data,
            skip_token: parsed.skip_token.filter(|t| !t.is_empty()),
            headers: response.headers,
        })
    }
}
