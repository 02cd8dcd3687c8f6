//! Tests for decoder module

use super::*;
use crate::pagination::{PageRequest, PageResult};
use pretty_assertions::assert_eq;
use serde_json::json;

fn expect_page(result: PageResult) -> crate::pagination::Page {
    match result {
        PageResult::Success(page) => page,
        other => panic!("Expected Success, got {other:?}"),
    }
}

// ============================================================================
// JSON:API Listing Tests
// ============================================================================

#[test]
fn test_listing_decodes_records_and_links() {
    let body = json!({
        "data": [
            {"id": "abc12", "links": {"self": "https://api.osf.io/v2/preprints/abc12/"}},
            {"id": "def34", "links": {"self": "https://api.osf.io/v2/preprints/def34/"}}
        ],
        "links": {"next": "https://api.osf.io/v2/preprints/?page=2"},
        "meta": {"total": 25, "per_page": 10}
    });

    let page = expect_page(JsonApiListDecoder::new().decode(&body.to_string()));

    assert_eq!(page.records.len(), 2);
    assert_eq!(
        page.records[0].locator,
        "https://api.osf.io/v2/preprints/abc12/"
    );
    assert_eq!(page.records[1].body["id"], "def34");
    assert_eq!(
        page.next,
        Some(PageRequest::url("https://api.osf.io/v2/preprints/?page=2"))
    );
    assert_eq!(page.declared_total, Some(25));
    assert_eq!(page.per_page, Some(10));
}

#[test]
fn test_listing_null_next_ends() {
    let body = json!({"data": [], "links": {"next": null}});
    let page = expect_page(JsonApiListDecoder::new().decode(&body.to_string()));
    assert!(page.records.is_empty());
    assert!(page.next.is_none());
    assert!(page.declared_total.is_none());
}

#[test]
fn test_listing_without_data_is_malformed() {
    let body = json!({"errors": [{"detail": "nope"}], "links": {"next": "https://x/?page=3"}});
    match JsonApiListDecoder::new().decode(&body.to_string()) {
        PageResult::Malformed { reason, next } => {
            assert!(reason.contains("no data"));
            assert_eq!(next, Some(PageRequest::url("https://x/?page=3")));
        }
        other => panic!("Expected Malformed, got {other:?}"),
    }
}

#[test]
fn test_listing_invalid_json_is_malformed() {
    let result = JsonApiListDecoder::new().decode("<html>gateway</html>");
    assert!(matches!(result, PageResult::Malformed { next: None, .. }));
}

#[test]
fn test_listing_skips_entries_without_self_link() {
    let body = json!({"data": [{"id": "x"}, {"links": {"self": "https://a/1/"}}]});
    let page = expect_page(JsonApiListDecoder::new().decode(&body.to_string()));
    assert_eq!(page.records.len(), 1);
    assert_eq!(page.records[0].locator, "https://a/1/");
}

// ============================================================================
// JSON:API Detail Tests
// ============================================================================

#[test]
fn test_detail_keeps_whole_document() {
    let body = json!({
        "data": {"id": "abc12", "links": {"self": "https://api.osf.io/v2/preprints/abc12/"}},
        "meta": {"version": "2.0"}
    });
    let page = expect_page(JsonApiDetailDecoder::new().decode(&body.to_string()));
    assert_eq!(page.records.len(), 1);
    assert_eq!(page.records[0].body, body);
    assert_eq!(
        page.records[0].locator,
        "https://api.osf.io/v2/preprints/abc12/"
    );
    assert!(page.next.is_none());
}

#[test]
fn test_detail_without_data_is_malformed() {
    let result = JsonApiDetailDecoder::new().decode(r#"{"errors": []}"#);
    assert!(matches!(result, PageResult::Malformed { .. }));
}

// ============================================================================
// OAI-PMH Tests
// ============================================================================

const OAI_BASE: &str = "http://export.arxiv.org/oai2";

fn oai_page(records: &[&str], token: &str) -> String {
    let records: String = records
        .iter()
        .map(|id| {
            format!(
                "<record><header><identifier>{id}</identifier><datestamp>2020-08-27</datestamp></header>\
                 <metadata><arXiv><id>{id}</id><title>Title of {id}</title></arXiv></metadata></record>"
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
<responseDate>2020-09-01T00:00:00Z</responseDate>
<ListRecords>{records}{token}</ListRecords>
</OAI-PMH>"#
    )
}

#[test]
fn test_oai_records_and_token() {
    let body = oai_page(
        &["oai:arXiv.org:2008.00001", "oai:arXiv.org:2008.00002"],
        r#"<resumptionToken cursor="0" completeListSize="2500">5551212|1001</resumptionToken>"#,
    );

    let page = expect_page(OaiPmhDecoder::new(OAI_BASE).decode(&body));

    assert_eq!(page.records.len(), 2);
    assert_eq!(page.records[0].locator, "oai:arXiv.org:2008.00001");
    assert_eq!(
        page.records[1].body["metadata"]["arXiv"]["title"],
        "Title of oai:arXiv.org:2008.00002"
    );
    assert_eq!(page.next, Some(PageRequest::token(OAI_BASE, "5551212|1001")));
    assert_eq!(page.declared_total, Some(2500));
    assert_eq!(page.cursor, Some(0));
}

#[test]
fn test_oai_single_record_is_a_list_of_one() {
    let body = oai_page(&["oai:arXiv.org:2008.00003"], "");
    let page = expect_page(OaiPmhDecoder::new(OAI_BASE).decode(&body));
    assert_eq!(page.records.len(), 1);
    assert!(page.next.is_none());
}

#[test]
fn test_oai_empty_token_ends_walk() {
    let body = oai_page(
        &["oai:arXiv.org:2008.00004"],
        r#"<resumptionToken cursor="2000" completeListSize="2001"/>"#,
    );
    let page = expect_page(OaiPmhDecoder::new(OAI_BASE).decode(&body));
    assert!(page.next.is_none());
    assert_eq!(page.cursor, Some(2000));
    assert_eq!(page.declared_total, Some(2001));
}

#[test]
fn test_oai_no_records_match_is_empty_success() {
    let body = r#"<OAI-PMH><error code="noRecordsMatch">No records</error></OAI-PMH>"#;
    let page = expect_page(OaiPmhDecoder::new(OAI_BASE).decode(body));
    assert!(page.records.is_empty());
    assert!(page.next.is_none());
}

#[test]
fn test_oai_other_error_is_malformed() {
    let body = r#"<OAI-PMH><error code="badResumptionToken">expired</error></OAI-PMH>"#;
    match OaiPmhDecoder::new(OAI_BASE).decode(body) {
        PageResult::Malformed { reason, .. } => assert!(reason.contains("badResumptionToken")),
        other => panic!("Expected Malformed, got {other:?}"),
    }
}

#[test]
fn test_oai_garbage_is_malformed() {
    let result = OaiPmhDecoder::new(OAI_BASE).decode("Service temporarily unavailable");
    assert!(matches!(result, PageResult::Malformed { .. }));
}
