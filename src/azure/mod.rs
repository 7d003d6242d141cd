//! Azure API interaction module
//!
//! This module provides the core functionality for interacting with Azure
//! Resource Manager, including authentication, HTTP client, Resource Graph
//! queries and subscription listing.
//!
//! # Module Structure
//!
//! - [`auth`] - Service principal authentication with token caching
//! - [`client`] - Resource Graph client and the [`client::ResourceGraph`] trait
//! - [`http`] - HTTP utilities for REST API calls
//! - [`quota`] - Throttling header parsing
//! - [`subscriptions`] - Subscription listing
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use azgraph::azure::auth::ClientSecretCredential;
//! use azgraph::azure::client::ResourceGraphClient;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let cred = ClientSecretCredential::new("tenant", "client", "secret")?;
//!     let client = ResourceGraphClient::new(Arc::new(cred))?;
//!     let subs = azgraph::azure::subscriptions::list_subscription_ids(&client).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
pub mod quota;
pub mod subscriptions;
