//! azgraph - Azure Resource Graph describer
//!
//! Discovers every resource of a given type across many subscriptions by
//! querying Azure Resource Graph in batches of at most
//! [`resource::SUBSCRIPTION_BATCH_SIZE`] subscriptions and following
//! `$skipToken` pagination. Resources are either collected and returned or
//! streamed to a [`resource::ResourceSink`] as they arrive.

pub mod azure;
pub mod config;
pub mod error;
pub mod integration;
pub mod resource;

pub use error::{DescribeError, ProviderError, SinkError};

/// Version injected at compile time via AZGRAPH_VERSION env var (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("AZGRAPH_VERSION") {
    Some(v) => v,
    None => "dev",
};
