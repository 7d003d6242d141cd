//! Resource discovery layer
//!
//! Turns Resource Graph query results into [`Resource`] records.
//!
//! # Architecture
//!
//! - [`model`] - The normalized [`Resource`] record and raw-row decoding
//! - [`sink`] - Streaming delivery targets and the [`Delivery`] mode
//! - [`fetcher`] - Batched, paginated describe loop
//!
//! # Example
//!
//! ```ignore
//! use azgraph::resource::{Delivery, FetchOptions, ResourceGraphDescriber, TriggerType};
//!
//! async fn list_vms(client: &ResourceGraphClient, subs: &[String]) -> anyhow::Result<()> {
//!     let describer = ResourceGraphDescriber::for_type("Microsoft.Compute/virtualMachines");
//!     let vms = describer
//!         .describe_resources(
//!             client,
//!             subs,
//!             TriggerType::Manual,
//!             Delivery::Collect,
//!             &FetchOptions::default(),
//!         )
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod fetcher;
pub mod model;
pub mod sink;

pub use fetcher::{
    subscription_batches, FetchOptions, ResourceGraphDescriber, DEFAULT_TABLE,
    SUBSCRIPTION_BATCH_SIZE,
};
pub use model::{Resource, TriggerType, GLOBAL_LOCATION};
pub use sink::{ChannelSink, Delivery, FnSink, ResourceSink};
