//! Describe loop behaviour against a scripted Resource Graph
//!
//! Covers batching, pagination, sink vs collect delivery, and abort semantics.

mod common;

use azgraph::resource::{
    ChannelSink, Delivery, FetchOptions, FnSink, Resource, ResourceGraphDescriber, TriggerType,
};
use azgraph::{DescribeError, ProviderError, SinkError};
use common::{subscriptions, FakeGraph, PacedGraph, StalledGraph};
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn describer() -> ResourceGraphDescriber {
    ResourceGraphDescriber::new("Resources", "Microsoft.Storage/storageAccounts")
}

fn ids(resources: &[Resource]) -> Vec<String> {
    resources.iter().map(|r| r.id.clone()).collect()
}

/// Two batches, three pages each
fn two_batches_three_pages() -> FakeGraph {
    FakeGraph::new()
        .page("sub-000", None, &["a1"], Some("t1"))
        .page("sub-000", Some("t1"), &["a2", "a3"], Some("t2"))
        .page("sub-000", Some("t2"), &["a4"], None)
        .page("sub-100", None, &["b1"], Some("t1"))
        .page("sub-100", Some("t1"), &[], Some("t2"))
        .page("sub-100", Some("t2"), &["b2"], None)
}

#[tokio::test]
async fn test_three_pages_per_batch() {
    let graph = two_batches_three_pages();
    let subs = subscriptions(130);

    let out = describer()
        .describe_resources(
            &graph,
            &subs,
            TriggerType::Scheduled,
            Delivery::Collect,
            &FetchOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(ids(&out), vec!["a1", "a2", "a3", "a4", "b1", "b2"]);

    let requests = graph.requests();
    assert_eq!(requests.len(), 6);
    assert_eq!(requests[0].subscriptions, subs[..100].to_vec());
    assert_eq!(requests[3].subscriptions, subs[100..].to_vec());

    let tokens: Vec<Option<&str>> = requests.iter().map(|r| r.skip_token.as_deref()).collect();
    assert_eq!(
        tokens,
        vec![None, Some("t1"), Some("t2"), None, Some("t1"), Some("t2")]
    );
    assert!(requests
        .iter()
        .all(|r| r.query == "Resources | where type == \"microsoft.storage/storageaccounts\""));
}

#[tokio::test]
async fn test_sink_receives_same_resources_in_order() {
    let collected = describer()
        .describe_resources(
            &two_batches_three_pages(),
            &subscriptions(130),
            TriggerType::Scheduled,
            Delivery::Collect,
            &FetchOptions::default(),
        )
        .await
        .unwrap();

    let streamed = Mutex::new(Vec::new());
    let sink = FnSink::new(|r: Resource| {
        streamed.lock().unwrap().push(r);
        Ok(())
    });
    let returned = describer()
        .describe_resources(
            &two_batches_three_pages(),
            &subscriptions(130),
            TriggerType::Manual,
            Delivery::stream(&sink),
            &FetchOptions::default(),
        )
        .await
        .unwrap();
    drop(sink);

    assert!(returned.is_empty());
    assert_eq!(streamed.into_inner().unwrap(), collected);
}

#[tokio::test]
async fn test_location_normalization() {
    let graph = FakeGraph::new().raw_page(
        "sub-000",
        None,
        vec![
            json!({"id": "with-loc", "location": "eastus"}),
            json!({"id": "no-loc"}),
        ],
        None,
    );

    let out = describer()
        .describe_resources(
            &graph,
            &subscriptions(1),
            TriggerType::Scheduled,
            Delivery::Collect,
            &FetchOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(out[0].location, "eastus");
    assert_eq!(out[1].location, "global");
    assert_eq!(out[1].description, json!({"id": "no-loc"}));
}

#[tokio::test]
async fn test_missing_id_stops_deliveries() {
    let graph = FakeGraph::new()
        .raw_page(
            "sub-000",
            None,
            vec![json!({"id": "first"}), json!({"name": "broken"}), json!({"id": "third"})],
            Some("t1"),
        )
        .page("sub-000", Some("t1"), &["later"], None);

    let delivered = Mutex::new(Vec::new());
    let sink = FnSink::new(|r: Resource| {
        delivered.lock().unwrap().push(r.id);
        Ok(())
    });

    let err = describer()
        .describe_resources(
            &graph,
            &subscriptions(1),
            TriggerType::Scheduled,
            Delivery::stream(&sink),
            &FetchOptions::default(),
        )
        .await
        .unwrap_err();
    drop(sink);

    assert!(matches!(err, DescribeError::MalformedRecord { .. }));
    assert_eq!(delivered.into_inner().unwrap(), vec!["first"]);
    assert_eq!(graph.requests().len(), 1);
}

#[tokio::test]
async fn test_sink_failure_aborts() {
    let graph = FakeGraph::new()
        .page("sub-000", None, &["a", "b"], Some("t1"))
        .page("sub-000", Some("t1"), &["c"], None);

    let calls = Mutex::new(0);
    let sink = FnSink::new(|_r: Resource| {
        let mut calls = calls.lock().unwrap();
        *calls += 1;
        if *calls == 2 {
            Err(SinkError::new("queue full"))
        } else {
            Ok(())
        }
    });

    let err = describer()
        .describe_resources(
            &graph,
            &subscriptions(1),
            TriggerType::Scheduled,
            Delivery::stream(&sink),
            &FetchOptions::default(),
        )
        .await
        .unwrap_err();
    drop(sink);

    assert!(matches!(err, DescribeError::Sink(_)));
    assert!(err.to_string().contains("queue full"));
    assert_eq!(calls.into_inner().unwrap(), 2);
    assert_eq!(graph.requests().len(), 1);
}

#[tokio::test]
async fn test_error_on_second_page_skips_later_batches() {
    let graph = FakeGraph::new()
        .page("sub-000", None, &["a"], Some("t1"))
        .failure("sub-000", Some("t1"), 503)
        .page("sub-100", None, &["b"], None);

    let err = describer()
        .describe_resources(
            &graph,
            &subscriptions(200),
            TriggerType::Scheduled,
            Delivery::Collect,
            &FetchOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DescribeError::Provider(ProviderError::Status { status: 503, .. })
    ));
    assert_eq!(graph.queried_heads(), vec!["sub-000", "sub-000"]);
}

#[tokio::test]
async fn test_concurrent_batches_keep_batch_order() {
    let graph = FakeGraph::new()
        .page("sub-000", None, &["a1"], Some("t1"))
        .page("sub-000", Some("t1"), &["a2"], None)
        .page("sub-100", None, &["b1"], None)
        .page("sub-200", None, &["c1"], Some("t1"))
        .page("sub-200", Some("t1"), &["c2"], None);

    let out = describer()
        .describe_resources(
            &graph,
            &subscriptions(250),
            TriggerType::Scheduled,
            Delivery::Collect,
            &FetchOptions::default().with_concurrency(3),
        )
        .await
        .unwrap();

    assert_eq!(ids(&out), vec!["a1", "a2", "b1", "c1", "c2"]);
    assert_eq!(graph.requests().len(), 5);
}

#[tokio::test]
async fn test_concurrent_failure_fails_whole_operation() {
    let graph = FakeGraph::new()
        .page("sub-000", None, &["a1"], None)
        .failure("sub-100", None, 500)
        .page("sub-200", None, &["c1"], None);

    let result = describer()
        .describe_resources(
            &graph,
            &subscriptions(300),
            TriggerType::Scheduled,
            Delivery::Collect,
            &FetchOptions::default().with_concurrency(2),
        )
        .await;

    assert!(matches!(
        result,
        Err(DescribeError::Provider(ProviderError::Status { status: 500, .. }))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_first_error_wins_and_stops_siblings() {
    // The slow first batch would fail later with a different status
    let graph = PacedGraph::new()
        .batch("sub-000", 20, Some((5, 500)))
        .batch("sub-100", 5, Some((0, 503)));

    let err = describer()
        .describe_resources(
            &graph,
            &subscriptions(200),
            TriggerType::Scheduled,
            Delivery::Collect,
            &FetchOptions::default().with_concurrency(2),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DescribeError::Provider(ProviderError::Status { status: 503, .. })
    ));
    assert_eq!(graph.requests_for("sub-000"), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(graph.requests_for("sub-000"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_failure_stops_streaming_siblings() {
    let graph = PacedGraph::new()
        .batch("sub-000", 10, None)
        .batch("sub-100", 35, Some((0, 429)));

    let delivered = Mutex::new(Vec::new());
    let sink = FnSink::new(|r: Resource| {
        delivered.lock().unwrap().push(r.id);
        Ok(())
    });

    let err = describer()
        .describe_resources(
            &graph,
            &subscriptions(150),
            TriggerType::Manual,
            Delivery::stream(&sink),
            &FetchOptions::default().with_concurrency(2),
        )
        .await
        .unwrap_err();
    drop(sink);

    assert!(matches!(
        err,
        DescribeError::Provider(ProviderError::Status { status: 429, .. })
    ));
    let delivered = delivered.into_inner().unwrap();
    assert_eq!(delivered, vec!["sub-000/0", "sub-000/1", "sub-000/2"]);
}

#[tokio::test]
async fn test_channel_sink_streams_across_concurrent_batches() {
    let graph = FakeGraph::new()
        .page("sub-000", None, &["a1", "a2"], None)
        .page("sub-100", None, &["b1"], None);
    let (sink, mut rx) = ChannelSink::channel(16);

    let returned = describer()
        .describe_resources(
            &graph,
            &subscriptions(101),
            TriggerType::Manual,
            Delivery::stream(&sink),
            &FetchOptions::default().with_concurrency(2),
        )
        .await
        .unwrap();
    drop(sink);

    assert!(returned.is_empty());
    let mut received = Vec::new();
    while let Some(r) = rx.recv().await {
        received.push(r.id);
    }
    received.sort();
    assert_eq!(received, vec!["a1", "a2", "b1"]);
}

#[tokio::test]
async fn test_cancellation_mid_operation() {
    let graph = FakeGraph::new().page("sub-000", None, &["a1"], Some("t1"));
    let options = FetchOptions::default();
    let cancel = options.cancel.clone();

    let sink = FnSink::new(move |_r: Resource| {
        cancel.cancel();
        Ok(())
    });

    let err = describer()
        .describe_resources(
            &graph,
            &subscriptions(1),
            TriggerType::Scheduled,
            Delivery::stream(&sink),
            &options,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DescribeError::Cancelled));
    assert_eq!(graph.requests().len(), 1);
}

#[tokio::test]
async fn test_cancellation_during_page_request() {
    let graph = StalledGraph::default();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = describer()
        .describe_resources(
            &graph,
            &subscriptions(1),
            TriggerType::Scheduled,
            Delivery::Collect,
            &FetchOptions::default().with_cancellation(cancel),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DescribeError::Cancelled));
    assert_eq!(*graph.requests.lock().unwrap(), 1);
}
