//! Resource Fetcher
//!
//! Describes every resource of one type across a set of subscriptions by
//! paging through Azure Resource Graph query results.

use super::model::{Resource, TriggerType};
use super::sink::Delivery;
use crate::azure::client::{QueryPage, QueryRequest, ResourceGraph};
use crate::azure::quota::{parse_quota, QuotaReading};
use crate::error::DescribeError;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Resource Graph accepts at most this many subscriptions per query
pub const SUBSCRIPTION_BATCH_SIZE: usize = 100;

/// Default Resource Graph table
pub const DEFAULT_TABLE: &str = "Resources";

/// Tuning knobs for a describe operation
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Number of subscription batches queried at once. 1 means sequential.
    pub max_concurrent_batches: usize,
    /// Pause before the next request while the throttling quota is exhausted
    pub respect_quota: bool,
    /// Checked before every page request
    pub cancel: CancellationToken,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_concurrent_batches: 1,
            respect_quota: false,
            cancel: CancellationToken::new(),
        }
    }
}

impl FetchOptions {
    #[must_use]
    pub fn with_concurrency(mut self, batches: usize) -> Self {
        self.max_concurrent_batches = batches.max(1);
        self
    }

    #[must_use]
    pub fn with_respect_quota(mut self, respect: bool) -> Self {
        self.respect_quota = respect;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Split subscriptions into groups small enough for a single query
pub fn subscription_batches(subscriptions: &[String]) -> std::slice::Chunks<'_, String> {
    subscriptions.chunks(SUBSCRIPTION_BATCH_SIZE)
}

/// Describer for one Resource Graph table and resource type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceGraphDescriber {
    pub table: String,
    pub resource_type: String,
}

impl ResourceGraphDescriber {
    pub fn new(table: &str, resource_type: &str) -> Self {
        Self {
            table: table.to_string(),
            resource_type: resource_type.to_string(),
        }
    }

    /// Describer over the default `Resources` table
    pub fn for_type(resource_type: &str) -> Self {
        Self::new(DEFAULT_TABLE, resource_type)
    }

    /// The query sent for every batch and page. Resource types are stored lower-case.
    pub fn query(&self) -> String {
        format!(
            "{} | where type == \"{}\"",
            self.table,
            self.resource_type.to_lowercase()
        )
    }

    /// Fetch every matching resource across `subscriptions`.
    ///
    /// In [`Delivery::Stream`] mode each resource goes to the sink as soon as
    /// it is decoded and the returned vector is empty. Any error aborts the
    /// whole operation; resources already streamed stay delivered.
    pub async fn describe_resources(
        &self,
        provider: &dyn ResourceGraph,
        subscriptions: &[String],
        trigger: TriggerType,
        delivery: Delivery<'_>,
        options: &FetchOptions,
    ) -> Result<Vec<Resource>, DescribeError> {
        let span = tracing::info_span!(
            "describe_resources",
            trigger = %trigger,
            resource_type = %self.resource_type,
            subscriptions = subscriptions.len(),
        );

        async move {
            let query = self.query();
            let gate = QuotaGate::default();
            let run = BatchRun {
                provider,
                query: &query,
                delivery,
                options,
                gate: &gate,
            };

            let values = if options.max_concurrent_batches <= 1 {
                let mut values = Vec::new();
                for (index, batch) in subscription_batches(subscriptions).enumerate() {
                    values.extend(run.fetch(index, batch).await?);
                }
                values
            } else {
                // The first batch to fail ends the stream; dropping it cancels the siblings
                let mut per_batch: Vec<(usize, Vec<Resource>)> =
                    stream::iter(subscription_batches(subscriptions).enumerate())
                        .map(|(index, batch)| async move {
                            run.fetch(index, batch).await.map(|values| (index, values))
                        })
                        .buffer_unordered(options.max_concurrent_batches)
                        .try_collect()
                        .await?;
                per_batch.sort_unstable_by_key(|(index, _)| *index);
                per_batch.into_iter().flat_map(|(_, values)| values).collect()
            };

            if delivery.is_streaming() {
                tracing::info!("Streamed resources for {} subscriptions", subscriptions.len());
            } else {
                tracing::info!("Collected {} resources", values.len());
            }
            Ok(values)
        }
        .instrument(span)
        .await
    }
}

/// Everything a single batch needs, shared by all batches of one operation
#[derive(Clone, Copy)]
struct BatchRun<'a> {
    provider: &'a dyn ResourceGraph,
    query: &'a str,
    delivery: Delivery<'a>,
    options: &'a FetchOptions,
    gate: &'a QuotaGate,
}

impl BatchRun<'_> {
    /// Page through one batch until the provider stops returning a skip token
    async fn fetch(self, index: usize, batch: &[String]) -> Result<Vec<Resource>, DescribeError> {
        let mut request = QueryRequest::object_array(batch, self.query);
        let mut values = Vec::new();
        let mut page_number = 0usize;

        loop {
            if self.options.respect_quota {
                self.gate.wait(&self.options.cancel).await?;
            }

            let page = self.next_page(&request).await?;
            page_number += 1;
            tracing::debug!(
                "Batch {} page {}: {} records (more: {})",
                index,
                page_number,
                page.data.len(),
                page.skip_token.is_some()
            );

            if self.options.respect_quota {
                self.gate.record(&page);
            }

            for raw in page.data {
                let resource = Resource::from_raw(raw)?;
                match self.delivery {
                    Delivery::Stream(sink) => sink.deliver(resource).await?,
                    Delivery::Collect => values.push(resource),
                }
            }

            request.options.skip_token = page.skip_token;
            if request.options.skip_token.is_none() {
                break;
            }
        }

        Ok(values)
    }

    async fn next_page(&self, request: &QueryRequest<'_>) -> Result<QueryPage, DescribeError> {
        let cancel = &self.options.cancel;
        if cancel.is_cancelled() {
            return Err(DescribeError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DescribeError::Cancelled),
            page = self.provider.resources(request) => Ok(page?),
        }
    }
}

/// Holds requests back while the throttling quota is exhausted
#[derive(Default)]
struct QuotaGate {
    resume_at: Mutex<Option<Instant>>,
}

impl QuotaGate {
    fn record(&self, page: &QueryPage) {
        match parse_quota(&page.headers) {
            Ok(reading) => self.apply(reading),
            Err(e) => tracing::debug!("Ignoring quota headers: {}", e),
        }
    }

    fn apply(&self, reading: QuotaReading) {
        if !reading.is_exhausted() {
            return;
        }
        tracing::warn!(
            "Resource Graph quota exhausted, pausing for {:?}",
            reading.reset_after
        );
        let until = Instant::now() + reading.reset_after;
        if let Ok(mut resume_at) = self.resume_at.lock() {
            *resume_at = Some(resume_at.map_or(until, |current| current.max(until)));
        }
    }

    async fn wait(&self, cancel: &CancellationToken) -> Result<(), DescribeError> {
        let until = match self.resume_at.lock() {
            Ok(resume_at) => *resume_at,
            Err(_) => None,
        };
        let Some(until) = until else {
            return Ok(());
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DescribeError::Cancelled),
            _ = tokio::time::sleep_until(until) => Ok(()),
        }
    }
}
