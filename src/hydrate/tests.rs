//! Tests for hydrate module

use super::*;
use crate::error::Error;
use crate::http::{Backpressure, RecordingSleeper, TokioSleeper, DEFAULT_RETRY_MARGIN};
use crate::pagination::PageRequest;
use crate::testing::{fatal, rate_limited, success, ScriptedTransport};
use crate::types::{Locator, Record};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const SUFFIX: &str = "?version=2.0&embed=contributors";

fn locator(name: &str) -> Locator {
    format!("https://api.test/items/{name}/")
}

fn detail(name: &str) -> PageRequest {
    PageRequest::url(format!("{}{}", locator(name), SUFFIX))
}

/// Detail documents report a different self link than the listing did
fn document(name: &str) -> crate::pagination::PageResult {
    success(
        vec![Record::new(
            format!("https://api.test/v2/items/{name}/"),
            json!({"data": {"id": name}}),
        )],
        None,
    )
}

fn hydrator(transport: ScriptedTransport, sleeper: &RecordingSleeper) -> RecordHydrator {
    RecordHydrator::new(
        Arc::new(transport),
        Backpressure::new(Arc::new(sleeper.clone()), DEFAULT_RETRY_MARGIN),
    )
    .with_suffix(SUFFIX)
}

fn locators(records: &[Record]) -> Vec<Locator> {
    records.iter().map(|r| r.locator.clone()).collect()
}

#[tokio::test]
async fn test_hydrate_empty_input() {
    let sleeper = RecordingSleeper::new();
    let hydrator = hydrator(ScriptedTransport::new(), &sleeper);

    let result = hydrator.hydrate(&[], 7).await;
    assert!(matches!(result, Err(Error::NoLocators)));
}

#[tokio::test]
async fn test_hydrate_skips_fatal_record() {
    let sleeper = RecordingSleeper::new();
    let transport = ScriptedTransport::new()
        .on(&detail("a"), document("a"))
        .on(&detail("b"), fatal(404))
        .on(&detail("c"), document("c"));
    let hydrator = hydrator(transport, &sleeper);

    let input = vec![locator("a"), locator("b"), locator("c")];
    let outcome = hydrator.hydrate(&input, 0).await.unwrap();

    assert_eq!(locators(&outcome.records), vec![locator("a"), locator("c")]);
    assert_eq!(outcome.records[1].body, json!({"data": {"id": "c"}}));
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].locator, locator("b"));
    assert!(matches!(
        outcome.failures[0].error,
        Error::HttpStatus { status: 404, .. }
    ));
    assert_eq!(outcome.request_count, 3);
    assert!(!outcome.cancelled);
}

#[tokio::test]
async fn test_hydrate_carries_request_count() {
    let sleeper = RecordingSleeper::new();
    let transport = ScriptedTransport::new().on(&detail("a"), document("a"));
    let hydrator = hydrator(transport, &sleeper);

    let outcome = hydrator.hydrate(&[locator("a")], 12).await.unwrap();
    assert_eq!(outcome.request_count, 13);
}

#[tokio::test]
async fn test_hydrate_skips_malformed_and_network_failures() {
    let sleeper = RecordingSleeper::new();
    let transport = ScriptedTransport::new()
        .on(
            &detail("a"),
            crate::pagination::PageResult::malformed("response has no data"),
        )
        .fail(&detail("b"))
        .on(&detail("c"), document("c"));
    let hydrator = hydrator(transport, &sleeper);

    let input = vec![locator("a"), locator("b"), locator("c")];
    let outcome = hydrator.hydrate(&input, 0).await.unwrap();

    assert_eq!(locators(&outcome.records), vec![locator("c")]);
    assert_eq!(outcome.failures.len(), 2);
    assert!(matches!(outcome.failures[0].error, Error::Decode { .. }));
}

#[tokio::test]
async fn test_hydrate_retries_same_locator() {
    let sleeper = RecordingSleeper::new();
    let transport = ScriptedTransport::new()
        .on(&detail("a"), rate_limited(1.0))
        .on(&detail("a"), rate_limited(3.0))
        .on(&detail("a"), document("a"));
    let hydrator = hydrator(transport, &sleeper);

    let outcome = hydrator.hydrate(&[locator("a")], 0).await.unwrap();

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.request_count, 3);
    assert_eq!(outcome.rate_limited, 2);
    assert_eq!(
        sleeper.sleeps(),
        vec![Duration::from_millis(1500), Duration::from_millis(3500)]
    );
}

#[tokio::test]
async fn test_hydrate_concurrent_keeps_input_order() {
    let sleeper = RecordingSleeper::new();
    let names: Vec<String> = (0..8).map(|i| format!("r{i}")).collect();
    let mut transport = ScriptedTransport::new().on(&detail("r3"), rate_limited(2.0));
    for name in &names {
        transport = transport.on(&detail(name), document(name));
    }
    let hydrator = hydrator(transport, &sleeper).with_concurrency(4);

    let input: Vec<Locator> = names.iter().map(|n| locator(n)).collect();
    let outcome = hydrator.hydrate(&input, 0).await.unwrap();

    assert_eq!(locators(&outcome.records), input);
    assert_eq!(outcome.request_count, 9);
    assert_eq!(outcome.rate_limited, 1);
    assert_eq!(sleeper.sleeps()[0], Duration::from_millis(2500));
}

fn timed_hydrator(transport: Arc<ScriptedTransport>, concurrency: usize) -> RecordHydrator {
    RecordHydrator::new(
        transport,
        Backpressure::new(Arc::new(TokioSleeper), DEFAULT_RETRY_MARGIN),
    )
    .with_suffix(SUFFIX)
    .with_concurrency(concurrency)
}

#[tokio::test(start_paused = true)]
async fn test_simultaneous_rate_limits_share_one_pause() {
    let names = ["a", "b", "c", "d"];
    let mut transport = ScriptedTransport::new().with_latency(Duration::from_millis(100));
    for name in names {
        transport = transport
            .on(&detail(name), rate_limited(2.0))
            .on(&detail(name), document(name));
    }
    let transport = Arc::new(transport);
    let hydrator = timed_hydrator(Arc::clone(&transport), 4);

    let input: Vec<Locator> = names.iter().map(|n| locator(n)).collect();
    let started = Instant::now();
    let outcome = hydrator.hydrate(&input, 0).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(locators(&outcome.records), input);
    assert_eq!(outcome.rate_limited, 4);
    assert_eq!(outcome.request_count, 8);
    assert!(elapsed >= Duration::from_millis(2500), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_pauses_every_worker() {
    let transport = ScriptedTransport::new()
        .on(&detail("a"), rate_limited(2.0))
        .on(&detail("a"), document("a"))
        .on(&detail("b"), document("b"))
        .on(&detail("c"), document("c"));
    let transport = Arc::new(transport);
    let hydrator = timed_hydrator(Arc::clone(&transport), 2);

    let input = vec![locator("a"), locator("b"), locator("c")];
    let started = Instant::now();
    let outcome = hydrator.hydrate(&input, 0).await.unwrap();

    assert_eq!(locators(&outcome.records), input);
    assert_eq!(outcome.rate_limited, 1);

    let requests = transport.requests();
    let times = transport.request_times();
    assert_eq!(requests[0], detail("a"));
    assert_eq!(times.len(), 4);
    // Only the rate-limited request went out before the pause ended
    for at in &times[1..] {
        assert!(
            at.duration_since(started) >= Duration::from_millis(2500),
            "{:?}",
            at.duration_since(started)
        );
    }
}

#[tokio::test]
async fn test_hydrate_cancelled_before_start() {
    let sleeper = RecordingSleeper::new();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let hydrator = hydrator(ScriptedTransport::new(), &sleeper).with_cancellation(cancel);

    let outcome = hydrator.hydrate(&[locator("a")], 4).await.unwrap();

    assert!(outcome.cancelled);
    assert!(outcome.records.is_empty());
    assert!(outcome.failures.is_empty());
    assert_eq!(outcome.request_count, 4);
}

#[test]
fn test_concurrency_floor() {
    let sleeper = RecordingSleeper::new();
    let hydrator = hydrator(ScriptedTransport::new(), &sleeper).with_concurrency(0);
    assert!(format!("{:?}", hydrator).contains("concurrency: 1"));
}
