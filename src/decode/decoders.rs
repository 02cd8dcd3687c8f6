//! Decoder implementations
//!
//! Each decoder handles one API's response shape.

use super::types::PageDecoder;
use super::xml::xml_to_json;
use crate::pagination::{Page, PageRequest, PageResult};
use crate::types::Record;
use serde_json::Value;
use tracing::warn;

// ============================================================================
// JSON:API Listing Decoder
// ============================================================================

/// Decoder for JSON:API listing pages
///
/// Expects `data: [{links: {self}}]`, with optional `links.next` and
/// `meta.total` / `meta.per_page`. Each entry becomes a record whose locator
/// is its self link.
#[derive(Debug, Clone, Default)]
pub struct JsonApiListDecoder;

impl JsonApiListDecoder {
    /// Create a new listing decoder
    pub fn new() -> Self {
        Self
    }
}

impl PageDecoder for JsonApiListDecoder {
    fn decode(&self, body: &str) -> PageResult {
        let json: Value = match serde_json::from_str(body) {
            Ok(json) => json,
            Err(e) => return PageResult::malformed(format!("invalid JSON: {e}")),
        };

        let next = next_link(&json);

        let Some(data) = json.get("data") else {
            return PageResult::Malformed {
                reason: "response has no data".to_string(),
                next,
            };
        };
        let Some(entries) = data.as_array() else {
            return PageResult::Malformed {
                reason: "data is not a list".to_string(),
                next,
            };
        };

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry.pointer("/links/self").and_then(Value::as_str) {
                Some(locator) => records.push(Record::new(locator, entry.clone())),
                None => warn!("Listing entry without a self link: {}", entry),
            }
        }

        let meta = json.get("meta");
        PageResult::Success(Page {
            records,
            next,
            declared_total: meta.and_then(|m| m.get("total")).and_then(Value::as_u64),
            per_page: meta
                .and_then(|m| m.get("per_page"))
                .and_then(Value::as_u64),
            cursor: None,
        })
    }
}

/// Extract a non-null `links.next`
fn next_link(json: &Value) -> Option<PageRequest> {
    json.pointer("/links/next")
        .and_then(Value::as_str)
        .filter(|next| !next.is_empty())
        .map(PageRequest::url)
}

// ============================================================================
// JSON:API Detail Decoder
// ============================================================================

/// Decoder for single-resource JSON:API documents
///
/// The whole document is kept as the record body; only the presence of a
/// top-level `data` member is checked.
#[derive(Debug, Clone, Default)]
pub struct JsonApiDetailDecoder;

impl JsonApiDetailDecoder {
    /// Create a new detail decoder
    pub fn new() -> Self {
        Self
    }
}

impl PageDecoder for JsonApiDetailDecoder {
    fn decode(&self, body: &str) -> PageResult {
        let json: Value = match serde_json::from_str(body) {
            Ok(json) => json,
            Err(e) => return PageResult::malformed(format!("invalid JSON: {e}")),
        };

        if json.get("data").is_none() {
            return PageResult::malformed("response has no data");
        }

        let locator = json
            .pointer("/data/links/self")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        PageResult::Success(Page::new(vec![Record::new(locator, json)]))
    }
}

// ============================================================================
// OAI-PMH Decoder
// ============================================================================

/// OAI error code meaning "the query matched nothing"
const NO_RECORDS_MATCH: &str = "noRecordsMatch";

/// Decoder for OAI-PMH `ListRecords` responses
///
/// Records are `OAI-PMH/ListRecords/record`, identified by
/// `header/identifier`. A `resumptionToken` with non-empty text continues
/// the walk against `base_url`.
#[derive(Debug, Clone)]
pub struct OaiPmhDecoder {
    base_url: String,
}

impl OaiPmhDecoder {
    /// Create a decoder whose continuations target `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl PageDecoder for OaiPmhDecoder {
    fn decode(&self, body: &str) -> PageResult {
        let doc = match xml_to_json(body) {
            Ok(doc) => doc,
            Err(e) => return PageResult::malformed(e.to_string()),
        };

        let Some(root) = doc.get("OAI-PMH") else {
            return PageResult::malformed("response has no OAI-PMH element");
        };

        let Some(list) = root.get("ListRecords") else {
            if let Some(code) = root.pointer("/error/@code").and_then(Value::as_str) {
                if code == NO_RECORDS_MATCH {
                    return PageResult::Success(Page::default());
                }
                return PageResult::malformed(format!("OAI-PMH error: {code}"));
            }
            return PageResult::malformed("response has no ListRecords");
        };

        let entries = match list.get("record") {
            Some(Value::Array(entries)) => entries.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(single) => vec![single.clone()],
        };

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            match record_identifier(&entry) {
                Some(id) => records.push(Record::new(id, entry)),
                None => warn!("OAI-PMH record without an identifier"),
            }
        }

        let token = list.get("resumptionToken");
        let attr = |name: &str| {
            token
                .and_then(|t| t.get(name))
                .and_then(Value::as_str)
                .and_then(|v| v.trim().parse::<u64>().ok())
        };

        PageResult::Success(Page {
            records,
            next: token_text(token).map(|t| PageRequest::token(&self.base_url, t)),
            declared_total: attr("@completeListSize"),
            per_page: None,
            cursor: attr("@cursor"),
        })
    }
}

/// `header/identifier` of an OAI-PMH record
fn record_identifier(record: &Value) -> Option<String> {
    match record.pointer("/header/identifier")? {
        Value::String(id) => Some(id.clone()),
        other => other.get("#text").and_then(Value::as_str).map(String::from),
    }
}

/// Token text, present only when non-empty
fn token_text(token: Option<&Value>) -> Option<&str> {
    let text = match token? {
        Value::String(text) => text.as_str(),
        other => other.get("#text")?.as_str()?,
    };
    Some(text.trim()).filter(|t| !t.is_empty())
}
