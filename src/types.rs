//! Common types used throughout paged-harvest
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// URL or identifier referencing one remote record
pub type Locator = String;

// ============================================================================
// Record
// ============================================================================

/// One remote record, identified by its locator
///
/// Records are never merged or compared by content. Two records with the
/// same locator are the same record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Self-link URL or item identifier
    pub locator: Locator,
    /// Raw record payload
    pub body: JsonValue,
}

impl Record {
    /// Create a new record
    pub fn new(locator: impl Into<Locator>, body: JsonValue) -> Self {
        Self {
            locator: locator.into(),
            body,
        }
    }

    /// Look up a nested field by dot-separated path
    pub fn field(&self, path: &str) -> Option<&JsonValue> {
        path.split('.')
            .try_fold(&self.body, |current, part| current.get(part))
    }
}

// ============================================================================
// Pagination Style
// ============================================================================

/// Pagination protocol spoken by a source API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationStyle {
    /// JSON body with a `links.next` URL
    Link,
    /// XML body with a resumption token
    Token,
}

// ============================================================================
// Date Range
// ============================================================================

/// Date format used on the wire and in file names
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive creation-date bounds of a run
///
/// Either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Inclusive lower bound
    pub start: Option<NaiveDate>,
    /// Inclusive upper bound
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// Create a range from optional bounds
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// Check if neither bound is set
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Check that the bounds are ordered
    pub fn is_ordered(&self) -> bool {
        match (self.start, self.end) {
            (Some(start), Some(end)) => start <= end,
            _ => true,
        }
    }

    /// Lower bound as `YYYY-MM-DD`
    pub fn start_str(&self) -> Option<String> {
        self.start.map(|d| d.format(DATE_FORMAT).to_string())
    }

    /// Upper bound as `YYYY-MM-DD`
    pub fn end_str(&self) -> Option<String> {
        self.end.map(|d| d.format(DATE_FORMAT).to_string())
    }
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}
