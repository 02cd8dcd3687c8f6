//! Decoder types and traits

use crate::pagination::PageResult;

/// Trait for decoding 200 response bodies into pages
///
/// Implementations only ever return `PageResult::Success` or
/// `PageResult::Malformed`; status classification belongs to the transport.
pub trait PageDecoder: Send + Sync + std::fmt::Debug {
    /// Decode the response body
    fn decode(&self, body: &str) -> PageResult;
}
