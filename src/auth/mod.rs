//! Authentication module
//!
//! Supports: anonymous access and Bearer tokens.
//!
//! Unauthenticated requests are allowed by the supported APIs but are held
//! to lower rate limits, so a token is worth configuring for large runs.

mod types;

pub use types::AuthConfig;
