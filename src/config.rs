//! Configuration Management
//!
//! Persistent settings live in a JSON file; the client secret is only ever
//! read from the environment.

use crate::azure::auth::DEFAULT_AUTHORITY;
use crate::azure::client::DEFAULT_ARM_ENDPOINT;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_TENANT_ID: &str = "AZURE_TENANT_ID";
pub const ENV_CLIENT_ID: &str = "AZURE_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "AZURE_CLIENT_SECRET";
pub const ENV_ENDPOINT: &str = "AZGRAPH_ENDPOINT";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    /// ARM endpoint override (sovereign clouds)
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Entra ID authority override
    #[serde(default)]
    pub authority: Option<String>,
    /// Subscriptions to describe when none are given on the command line
    #[serde(default)]
    pub subscriptions: Vec<String>,
    /// Batches queried at once
    #[serde(default)]
    pub concurrency: Option<usize>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("azgraph").join("config.json"))
    }

    /// Load configuration from disk, then apply environment overrides
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::from_file(&path))
            .unwrap_or_default()
            .with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Read a config file, falling back to defaults when it is missing or unreadable
    pub fn from_file(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str::<Config>(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring unreadable config file: {}", e);
                Self::default()
            }
        }
    }

    /// Apply overrides from a variable lookup (the process environment in practice)
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(tenant) = non_empty(ENV_TENANT_ID) {
            self.tenant_id = Some(tenant);
        }
        if let Some(client) = non_empty(ENV_CLIENT_ID) {
            self.client_id = Some(client);
        }
        if let Some(endpoint) = non_empty(ENV_ENDPOINT) {
            self.endpoint = Some(endpoint);
        }
        self
    }

    pub fn effective_endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ARM_ENDPOINT)
    }

    pub fn effective_authority(&self) -> &str {
        self.authority.as_deref().unwrap_or(DEFAULT_AUTHORITY)
    }

    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.unwrap_or(1).max(1)
    }

    /// Client secret from the environment
    pub fn client_secret() -> Option<String> {
        std::env::var(ENV_CLIENT_SECRET)
            .ok()
            .filter(|v| !v.is_empty())
    }
}
