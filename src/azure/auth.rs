//! Azure Authentication
//!
//! Acquires Azure Resource Manager access tokens with the OAuth2
//! client-credentials flow (service principal + client secret).

use crate::error::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use url::Url;

/// Default Entra ID authority host
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Scope for Azure Resource Manager API access
pub const ARM_SCOPE: &str = "https://management.azure.com/.default";

/// Token expiry buffer - refresh tokens this much before they actually expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Something that can hand out bearer tokens for ARM requests
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self) -> Result<String, ProviderError>;
}

/// A fixed, already-issued token
#[derive(Clone)]
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(&self) -> Result<String, ProviderError> {
        Ok(self.token.clone())
    }
}

/// Service principal credentials with token caching
#[derive(Clone)]
pub struct ClientSecretCredential {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    authority: Url,
    http: Client,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl std::fmt::Debug for ClientSecretCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecretCredential")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("authority", &self.authority.as_str())
            .finish_non_exhaustive()
    }
}

impl ClientSecretCredential {
    /// Create credentials against the public cloud authority
    pub fn new(
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Self, ProviderError> {
        Self::with_authority(tenant_id, client_id, client_secret, DEFAULT_AUTHORITY)
    }

    /// Create credentials against a custom authority host (sovereign clouds, tests)
    pub fn with_authority(
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
        authority: &str,
    ) -> Result<Self, ProviderError> {
        if tenant_id.is_empty() || client_id.is_empty() || client_secret.is_empty() {
            return Err(ProviderError::Auth {
                message: "tenant id, client id and client secret are required".to_string(),
            });
        }

        let http = Client::builder()
            .user_agent(concat!("azgraph/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            tenant_id: tenant_id.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            authority: Url::parse(authority)?,
            http,
            token_cache: Arc::new(RwLock::new(None)),
        })
    }

    fn token_url(&self) -> Result<Url, ProviderError> {
        let path = format!("{}/oauth2/v2.0/token", self.tenant_id);
        Ok(self.authority.join(&path)?)
    }

    async fn request_token(&self) -> Result<CachedToken, ProviderError> {
        let url = self.token_url()?;
        tracing::debug!("Requesting token for tenant {}", self.tenant_id);

        let response = self
            .http
            .post(url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", ARM_SCOPE),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Security: never log the raw body, it may echo request parameters
            let message = serde_json::from_str::<TokenErrorResponse>(&body)
                .map(|e| e.error_description.unwrap_or(e.error))
                .unwrap_or_else(|_| format!("token endpoint returned {}", status));
            tracing::error!("Token request failed: {}", status);
            return Err(ProviderError::Auth { message });
        }

        let token: TokenResponse = serde_json::from_str(&body)?;
        let ttl = Duration::from_secs(token.expires_in.unwrap_or(3600));

        Ok(CachedToken {
            token: token.access_token,
            expires_at: Instant::now() + ttl.saturating_sub(TOKEN_EXPIRY_BUFFER),
        })
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    /// Security: Checks token expiry before returning cached token
    async fn get_token(&self) -> Result<String, ProviderError> {
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let fresh = self.request_token().await?;
        let token = fresh.token.clone();

        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(fresh);
        }

        Ok(token)
    }
}
