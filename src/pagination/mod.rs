//! Pagination module
//!
//! Supports: Link (JSON `links.next`), Token (OAI-PMH resumption token)
//!
//! # Overview
//!
//! A walker turns one first request into the full result set by fetching
//! pages strictly in sequence. Rate limits are waited out through the shared
//! [`Backpressure`](crate::http::Backpressure) gate and the same request is
//! retried. A fatal status ends the walk but keeps every record collected so
//! far. Both walkers expose a step API (`next_page`) and a driver (`run`).

mod link;
mod token;
mod types;

pub use link::{LinkPageWalker, LinkQuery};
pub use token::{TokenPageWalker, TokenQuery, DEFAULT_COURTESY_DELAY};
pub use types::{
    FinalResult, Page, PageRequest, PageResult, Step, StopReason, WalkOutcome, WalkProgress,
};
pub(crate) use types::div_ceil;
