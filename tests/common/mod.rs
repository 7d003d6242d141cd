//! Shared fakes for describe tests

#![allow(dead_code)]

use async_trait::async_trait;
use azgraph::azure::client::{QueryPage, QueryRequest, ResourceGraph};
use azgraph::ProviderError;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// A recorded page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub subscriptions: Vec<String>,
    pub query: String,
    pub skip_token: Option<String>,
}

/// Fake Resource Graph that answers by (first subscription of the batch, skip token).
///
/// Unscripted requests return an empty terminal page.
#[derive(Default)]
pub struct FakeGraph {
    pages: Mutex<HashMap<(String, Option<String>), Result<QueryPage, u16>>>,
    pub requests: Mutex<Vec<Recorded>>,
}

impl FakeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a page of records with the given ids
    pub fn page(
        self,
        batch_head: &str,
        token: Option<&str>,
        ids: &[&str],
        next: Option<&str>,
    ) -> Self {
        let data = ids
            .iter()
            .map(|id| json!({"id": id, "location": "westeurope"}))
            .collect();
        self.raw_page(batch_head, token, data, next)
    }

    pub fn raw_page(
        self,
        batch_head: &str,
        token: Option<&str>,
        data: Vec<serde_json::Value>,
        next: Option<&str>,
    ) -> Self {
        self.pages.lock().unwrap().insert(
            (batch_head.to_string(), token.map(String::from)),
            Ok(QueryPage {
                data,
                skip_token: next.map(String::from),
                ..Default::default()
            }),
        );
        self
    }

    /// Script a provider failure with an HTTP status
    pub fn failure(self, batch_head: &str, token: Option<&str>, status: u16) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert((batch_head.to_string(), token.map(String::from)), Err(status));
        self
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn queried_heads(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|r| r.subscriptions[0].clone())
            .collect()
    }
}

#[async_trait]
impl ResourceGraph for FakeGraph {
    async fn resources(&self, request: &QueryRequest<'_>) -> Result<QueryPage, ProviderError> {
        self.requests.lock().unwrap().push(Recorded {
            subscriptions: request.subscriptions.to_vec(),
            query: request.query.to_string(),
            skip_token: request.options.skip_token.clone(),
        });

        let key = (
            request.subscriptions[0].clone(),
            request.options.skip_token.clone(),
        );
        match self.pages.lock().unwrap().remove(&key) {
            Some(Ok(page)) => Ok(page),
            Some(Err(status)) => Err(ProviderError::Status {
                status,
                body: "{\"error\":{\"code\":\"Scripted\"}}".to_string(),
            }),
            None => Ok(QueryPage::default()),
        }
    }
}

/// Per-batch behaviour of a [`PacedGraph`]
#[derive(Debug, Clone, Copy)]
pub struct Pace {
    /// Time taken to answer each page
    pub delay: Duration,
    /// Fail with this status on the given (zero-based) page instead of answering
    pub fail_on: Option<(usize, u16)>,
}

/// Fake Resource Graph that answers after a per-batch delay.
///
/// Every answered page carries one record and a skip token, so a batch keeps
/// paging until its scripted failure.
#[derive(Default)]
pub struct PacedGraph {
    paces: HashMap<String, Pace>,
    pub requests: Mutex<Vec<Recorded>>,
}

impl PacedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch(mut self, batch_head: &str, delay_ms: u64, fail_on: Option<(usize, u16)>) -> Self {
        let pace = Pace {
            delay: Duration::from_millis(delay_ms),
            fail_on,
        };
        self.paces.insert(batch_head.to_string(), pace);
        self
    }

    /// Number of requests issued for the batch starting at `batch_head`
    pub fn requests_for(&self, batch_head: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.subscriptions[0] == batch_head)
            .count()
    }
}

#[async_trait]
impl ResourceGraph for PacedGraph {
    async fn resources(&self, request: &QueryRequest<'_>) -> Result<QueryPage, ProviderError> {
        let head = request.subscriptions[0].clone();
        let page_number = self.requests_for(&head);
        self.requests.lock().unwrap().push(Recorded {
            subscriptions: request.subscriptions.to_vec(),
            query: request.query.to_string(),
            skip_token: request.options.skip_token.clone(),
        });

        let pace = self.paces.get(&head).copied().unwrap_or(Pace {
            delay: Duration::ZERO,
            fail_on: None,
        });
        tokio::time::sleep(pace.delay).await;

        match pace.fail_on {
            Some((page, status)) if page == page_number => Err(ProviderError::Status {
                status,
                body: String::new(),
            }),
            _ => Ok(QueryPage {
                data: vec![json!({"id": format!("{head}/{page_number}")})],
                skip_token: Some(format!("p{}", page_number + 1)),
                ..Default::default()
            }),
        }
    }
}

/// Fake Resource Graph whose requests never complete
#[derive(Default)]
pub struct StalledGraph {
    pub requests: Mutex<usize>,
}

#[async_trait]
impl ResourceGraph for StalledGraph {
    async fn resources(&self, _request: &QueryRequest<'_>) -> Result<QueryPage, ProviderError> {
        *self.requests.lock().unwrap() += 1;
        std::future::pending::<Result<QueryPage, ProviderError>>().await
    }
}

/// Subscription ids `sub-000`, `sub-001`, ...
pub fn subscriptions(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("sub-{i:03}")).collect()
}
