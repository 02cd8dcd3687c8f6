//! Scripted transport for unit tests

use crate::error::{Error, Result};
use crate::http::Transport;
use crate::pagination::{Page, PageRequest, PageResult};
use crate::types::Record;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// One canned reply
#[derive(Debug, Clone)]
pub enum Reply {
    Result(PageResult),
    NetworkError,
}

/// Transport answering from per-request queues and logging every call
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    log: Mutex<Vec<(PageRequest, Instant)>>,
    latency: Duration,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every reply, so concurrent requests are in flight together
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue a reply for `request`
    pub fn on(self, request: &PageRequest, result: PageResult) -> Self {
        self.push(request, Reply::Result(result));
        self
    }

    /// Queue a network failure for `request`
    pub fn fail(self, request: &PageRequest) -> Self {
        self.push(request, Reply::NetworkError);
        self
    }

    fn push(&self, request: &PageRequest, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry(request.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Every request issued, in order
    pub fn requests(&self) -> Vec<PageRequest> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .map(|(request, _)| request.clone())
            .collect()
    }

    /// When each request was issued, in order
    pub fn request_times(&self) -> Vec<Instant> {
        self.log.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, request: &PageRequest) -> Result<PageResult> {
        self.log.lock().unwrap().push((request.clone(), Instant::now()));
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&request.to_string())
            .and_then(VecDeque::pop_front);
        match reply {
            Some(Reply::Result(result)) => Ok(result),
            Some(Reply::NetworkError) => Err(Error::Other("connection reset".to_string())),
            None => Err(Error::Other(format!("unscripted request: {request}"))),
        }
    }
}

/// URL of listing page `n`
pub fn page_url(n: usize) -> PageRequest {
    PageRequest::url(format!("https://api.test/items/?page={n}"))
}

/// Records `from..to` with self-link locators
pub fn records(from: usize, to: usize) -> Vec<Record> {
    (from..to)
        .map(|i| {
            let locator = format!("https://api.test/items/{i}/");
            Record::new(locator.clone(), json!({"id": i, "links": {"self": locator}}))
        })
        .collect()
}

/// A successful listing page
pub fn success(records: Vec<Record>, next: Option<PageRequest>) -> PageResult {
    PageResult::Success(Page {
        records,
        next,
        ..Default::default()
    })
}

pub fn rate_limited(seconds: f64) -> PageResult {
    PageResult::RateLimited {
        retry_after_seconds: seconds,
    }
}

pub fn fatal(status: u16) -> PageResult {
    PageResult::Fatal {
        status,
        headers: HeaderMap::new(),
    }
}
