//! Resource sinks
//!
//! A sink receives resources one at a time as they are discovered, instead of
//! the caller getting them back as a collection.

use super::model::Resource;
use crate::error::SinkError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Streaming delivery target.
///
/// Implementations must tolerate concurrent calls: when batches run in
/// parallel, deliveries from different batches interleave.
#[async_trait]
pub trait ResourceSink: Send + Sync {
    async fn deliver(&self, resource: Resource) -> Result<(), SinkError>;
}

/// How a describe operation hands back what it finds
#[derive(Clone, Copy)]
pub enum Delivery<'a> {
    /// Buffer everything and return it
    Collect,
    /// Push each resource to the sink as soon as it is built
    Stream(&'a dyn ResourceSink),
}

impl<'a> Delivery<'a> {
    pub fn stream(sink: &'a dyn ResourceSink) -> Self {
        Delivery::Stream(sink)
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Delivery::Stream(_))
    }
}

/// Adapts a synchronous closure into a sink
pub struct FnSink<F> {
    f: F,
}

impl<F> FnSink<F>
where
    F: Fn(Resource) -> Result<(), SinkError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> ResourceSink for FnSink<F>
where
    F: Fn(Resource) -> Result<(), SinkError> + Send + Sync,
{
    async fn deliver(&self, resource: Resource) -> Result<(), SinkError> {
        (self.f)(resource)
    }
}

/// Forwards resources into a bounded channel; back-pressure comes from the receiver
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Resource>,
}

impl ChannelSink {
    /// Create a sink and the receiving end of its channel
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Resource>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ResourceSink for ChannelSink {
    async fn deliver(&self, resource: Resource) -> Result<(), SinkError> {
        self.tx.send(resource).await.map_err(|e| {
            SinkError::new(format!("receiver dropped before {} was delivered", e.0.id))
        })
    }
}
