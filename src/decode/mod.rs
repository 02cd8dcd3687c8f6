//! Response decoder module
//!
//! Supports: JSON:API listings, JSON:API detail documents, OAI-PMH XML
//!
//! # Overview
//!
//! The decode module turns a 200 response body into a classified
//! [`PageResult`](crate::pagination::PageResult): either a `Success` page
//! carrying records and the continuation, or `Malformed` when the body lacks
//! the structure the API promises.

mod decoders;
mod types;
mod xml;

pub use decoders::{JsonApiDetailDecoder, JsonApiListDecoder, OaiPmhDecoder};
pub use types::PageDecoder;
pub use xml::xml_to_json;

#[cfg(test)]
mod tests;
