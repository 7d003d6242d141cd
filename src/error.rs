//! Error types for azgraph
//!
//! Library APIs return typed errors defined here. The binary and the
//! integration glue wrap them with `anyhow` context at the edge.

use thiserror::Error;

/// Failure talking to the provider (authentication, transport, or response decoding)
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API request failed: {status}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

impl ProviderError {
    /// HTTP status code, if the provider answered with one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Failure reported by a resource sink
#[derive(Error, Debug)]
#[error("{message}")]
pub struct SinkError {
    pub message: String,
}

impl SinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure of a describe operation. Every variant aborts the whole operation.
#[derive(Error, Debug)]
pub enum DescribeError {
    #[error("resource graph query failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("malformed resource record: {reason}")]
    MalformedRecord { reason: String },

    #[error("resource sink failed: {0}")]
    Sink(#[from] SinkError),

    #[error("describe operation cancelled")]
    Cancelled,
}

impl DescribeError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            reason: reason.into(),
        }
    }
}
