//! # Remote Transport
//!
//! [`RemoteRequest`] is the fully built description of one outgoing call. The
//! serialized query string is ordered by key segments (`filter[age][gt]` sorts
//! as `filter`, `age`, `gt`) no matter how the request was assembled, so
//! `filter[age]` comes before `filter[age2]`. Key segments and values are
//! percent-encoded; only the brackets between key segments stay literal.
//! Multiple values are encoded piece by piece and joined with commas.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

pub const JSONAPI_CONTENT_TYPE: &str = "application/vnd.api+json";

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    /// Absolute resource URL, without query string.
    pub url: String,
    /// `filter[age][gt]` → `["1"]`. Multiple values are comma-joined.
    pub query: BTreeMap<String, Vec<String>>,
    pub headers: BTreeMap<String, String>,
    pub timeout: Duration,
    pub open_timeout: Duration,
}

impl RemoteRequest {
    pub fn new(url: impl Into<String>, timeout: Duration, open_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            timeout,
            open_timeout,
        }
    }

    pub fn param(&self, key: &str) -> Option<String> {
        self.query.get(key).map(|values| values.join(","))
    }

    pub fn set_param(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.query.insert(key.into(), values);
    }

    pub fn query_string(&self) -> String {
        let mut entries: Vec<(&String, &Vec<String>)> = self.query.iter().collect();
        entries.sort_by(|(a, _), (b, _)| key_segments(a).cmp(&key_segments(b)));
        entries
            .into_iter()
            .map(|(key, values)| {
                let encoded: Vec<String> = values
                    .iter()
                    .map(|value| urlencoding::encode(value).into_owned())
                    .collect();
                format!("{}={}", encode_key(key), encoded.join(","))
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// URL with the query string appended, as sent on the wire.
    pub fn full_url(&self) -> String {
        if self.query.is_empty() {
            self.url.clone()
        } else {
            format!("{}?{}", self.url, self.query_string())
        }
    }
}

/// `filter[age][gt]` → `["filter", "age", "gt"]`.
fn key_segments(key: &str) -> Vec<&str> {
    key.split(['[', ']']).filter(|segment| !segment.is_empty()).collect()
}

/// Percent-encodes everything in a parameter key except `[` and `]`.
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    let mut segment = String::new();
    for c in key.chars() {
        if c == '[' || c == ']' {
            encoded.push_str(&urlencoding::encode(&segment));
            segment.clear();
            encoded.push(c);
        } else {
            segment.push(c);
        }
    }
    encoded.push_str(&urlencoding::encode(&segment));
    encoded
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: String,
}

impl RemoteResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

/// Issues GET requests against remote JSON:API services.
#[async_trait]
pub trait RemoteTransport: Send + Sync + 'static {
    async fn get(&self, request: &RemoteRequest) -> Result<RemoteResponse, TransportError>;
}
