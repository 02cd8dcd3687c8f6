//! Integration tests using mock HTTP server
//!
//! Tests the full end-to-end flow: session config → HTTP requests → records
//! and run statistics.

use paged_harvest::http::RecordingSleeper;
use paged_harvest::output::{read_records_from_jsonl, write_records_to_jsonl};
use paged_harvest::providers::provider_of;
use paged_harvest::{parse_date, FetchSession, SessionConfig, SessionOutcome, SourceKind};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Link-style (JSON:API) Sessions
// ============================================================================

fn listing_entry(server: &MockServer, id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "type": "preprints",
        "links": {"self": format!("{}/v2/preprints/{id}/", server.uri())}
    })
}

fn detail_document(server: &MockServer, id: &str, provider: &str) -> serde_json::Value {
    json!({
        "data": {
            "id": id,
            "attributes": {"title": format!("Preprint {id}")},
            "relationships": {"provider": {"links": {"related": {
                "href": format!("{}/v2/providers/preprints/{provider}/", server.uri())
            }}}}
        }
    })
}

async fn mount_listing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v2/preprints/"))
        .and(query_param("filter[date_created][gte]", "2024-01-01"))
        .and(header("Authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [listing_entry(server, "p1"), listing_entry(server, "p2")],
            "links": {"next": format!("{}/v2/preprints/?page=2", server.uri())},
            "meta": {"total": 3, "per_page": 2}
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/preprints/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/preprints/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [listing_entry(server, "p3")],
            "links": {"next": null},
            "meta": {"total": 3, "per_page": 2}
        })))
        .with_priority(2)
        .mount(server)
        .await;
}

async fn mount_detail(server: &MockServer, id: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/v2/preprints/{id}/")))
        .and(query_param("version", "2.0"))
        .and(query_param("embed", "contributors"))
        .and(header("Authorization", "Bearer secret"))
        .respond_with(response)
        .mount(server)
        .await;
}

fn osf_config(server: &MockServer) -> SessionConfig {
    SessionConfig::builder()
        .source(SourceKind::Osf)
        .base_url(format!("{}/v2/preprints/", server.uri()))
        .start_date(parse_date("2024-01-01").unwrap())
        .token("secret")
        .build()
}

#[tokio::test]
async fn test_osf_session_end_to_end() {
    let server = MockServer::start().await;
    mount_listing(&server).await;
    mount_detail(
        &server,
        "p1",
        ResponseTemplate::new(200).set_body_json(detail_document(&server, "p1", "psyarxiv")),
    )
    .await;
    mount_detail(&server, "p2", ResponseTemplate::new(404)).await;
    mount_detail(
        &server,
        "p3",
        ResponseTemplate::new(200).set_body_json(detail_document(&server, "p3", "socarxiv")),
    )
    .await;

    let sleeper = RecordingSleeper::new();
    let outcome = FetchSession::new(osf_config(&server))
        .with_sleeper(Arc::new(sleeper.clone()))
        .run()
        .await
        .unwrap();

    let (records, stats) = match outcome {
        SessionOutcome::Completed { records, stats } => (records, stats),
        other => panic!("Expected completed session, got {}", other.label()),
    };

    let ids: Vec<_> = records
        .iter()
        .map(|r| r.field("data.id").cloned().unwrap_or_default())
        .collect();
    assert_eq!(ids, vec![json!("p1"), json!("p3")]);
    assert_eq!(
        records[0].locator,
        format!("{}/v2/preprints/p1/", server.uri())
    );
    assert_eq!(provider_of(&records[0]), "PsyArXiv");
    assert_eq!(provider_of(&records[1]), "SocArXiv");

    assert_eq!(stats.requests, 6);
    assert_eq!(stats.pages, 2);
    assert_eq!(stats.records, 2);
    assert_eq!(stats.records_dropped, 1);
    assert_eq!(stats.rate_limited_waits, 1);
    assert_eq!(sleeper.sleeps(), vec![Duration::from_millis(1500)]);
}

#[tokio::test]
async fn test_osf_session_partial_on_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/preprints/"))
        .and(query_param("filter[date_created][gte]", "2024-01-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [listing_entry(&server, "p1")],
            "links": {"next": format!("{}/v2/preprints/?page=2", server.uri())},
            "meta": {"total": 2, "per_page": 1}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/preprints/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = SessionConfig {
        hydrate: false,
        ..osf_config(&server)
    };
    let outcome = FetchSession::new(config)
        .with_sleeper(Arc::new(RecordingSleeper::new()))
        .run()
        .await
        .unwrap();

    assert!(matches!(outcome, SessionOutcome::Partial { .. }));
    assert_eq!(outcome.records().len(), 1);
    assert_eq!(outcome.stats().requests, 2);
    assert!(outcome.error().is_some());
}

#[tokio::test]
async fn test_osf_session_empty_on_malformed_first_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/preprints/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errors": ["oops"]})))
        .mount(&server)
        .await;

    let outcome = FetchSession::new(osf_config(&server))
        .with_sleeper(Arc::new(RecordingSleeper::new()))
        .run()
        .await
        .unwrap();

    assert!(outcome.is_empty());
    assert_eq!(outcome.stats().requests, 1);
}

// ============================================================================
// Token-style (OAI-PMH) Sessions
// ============================================================================

fn oai_page(ids: &[&str], token: &str, cursor: u64) -> String {
    let records: String = ids
        .iter()
        .map(|id| {
            format!(
                "<record><header><identifier>oai:arXiv.org:{id}</identifier></header>\
                 <metadata><arXiv><title>Paper {id}</title></arXiv></metadata></record>"
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <ListRecords>{records}<resumptionToken cursor="{cursor}" completeListSize="3">{token}</resumptionToken></ListRecords>
</OAI-PMH>"#
    )
}

#[tokio::test]
async fn test_arxiv_session_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oai2"))
        .and(query_param("verb", "ListRecords"))
        .and(query_param("metadataPrefix", "arXiv"))
        .and(query_param("from", "2024-03-01"))
        .respond_with(ResponseTemplate::new(200).set_body_string(oai_page(
            &["2403.00001", "2403.00002"],
            "tok1",
            0,
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oai2"))
        .and(query_param("resumptionToken", "tok1"))
        .respond_with(ResponseTemplate::new(503).insert_header("Retry-After", "2"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oai2"))
        .and(query_param("resumptionToken", "tok1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(oai_page(&["2403.00003"], "", 2)))
        .with_priority(2)
        .mount(&server)
        .await;

    let sleeper = RecordingSleeper::new();
    let config = SessionConfig::builder()
        .source(SourceKind::Arxiv)
        .base_url(format!("{}/oai2", server.uri()))
        .start_date(parse_date("2024-03-01").unwrap())
        .build();
    let outcome = FetchSession::new(config)
        .with_sleeper(Arc::new(sleeper.clone()))
        .run()
        .await
        .unwrap();

    assert!(outcome.is_complete());
    let locators: Vec<_> = outcome.records().iter().map(|r| r.locator.as_str()).collect();
    assert_eq!(
        locators,
        vec![
            "oai:arXiv.org:2403.00001",
            "oai:arXiv.org:2403.00002",
            "oai:arXiv.org:2403.00003"
        ]
    );
    assert_eq!(
        outcome.records()[2].field("metadata.arXiv.title"),
        Some(&json!("Paper 2403.00003"))
    );
    assert_eq!(outcome.stats().requests, 3);
    assert_eq!(outcome.stats().rate_limited_waits, 1);
    // Courtesy pause, then the 503 wait plus margin
    assert_eq!(
        sleeper.sleeps(),
        vec![Duration::from_secs(5), Duration::from_millis(2500)]
    );
}

#[tokio::test]
async fn test_arxiv_session_never_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/oai2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(oai_page(&["2403.00001"], "", 0)))
        .mount(&server)
        .await;

    let config = SessionConfig::builder()
        .source(SourceKind::Arxiv)
        .base_url(format!("{}/oai2", server.uri()))
        .start_date(parse_date("2024-03-01").unwrap())
        .token("secret")
        .build();
    let outcome = FetchSession::new(config)
        .with_sleeper(Arc::new(RecordingSleeper::new()))
        .run()
        .await
        .unwrap();

    assert!(outcome.is_complete());
    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert!(!received[0].headers.contains_key("authorization"));
}

// ============================================================================
// Output Round Trip
// ============================================================================

#[tokio::test]
async fn test_session_records_written_to_disk() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/preprints/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [listing_entry(&server, "p1"), listing_entry(&server, "p2")],
            "links": {},
            "meta": {"total": 2, "per_page": 10}
        })))
        .mount(&server)
        .await;

    let config = SessionConfig {
        hydrate: false,
        ..osf_config(&server)
    };
    let outcome = FetchSession::new(config).run().await.unwrap();

    let dir = tempdir().unwrap();
    let file = dir.path().join("out.jsonl");
    assert_eq!(write_records_to_jsonl(&file, outcome.records()).unwrap(), 2);
    assert_eq!(read_records_from_jsonl(&file).unwrap(), outcome.records());
}
