//! # Mocks & Testing Guide
//!
//! Two in-memory doubles let resolver logic be tested without a database or a
//! network:
//!
//! - [`MockTransport`] answers remote calls from expectations set up front and
//!   records every request it receives.
//! - [`MockAdapter`] serves records from in-memory tables, supports equality
//!   filters and page size, and logs every scope it executes.
//!
//! | Concern | Mock | Real |
//! |---------|------|------|
//! | **Remote calls** | `MockTransport` (instant, scripted) | `HttpTransport` in the sample crate |
//! | **Local store** | `MockAdapter` (eq filters only) | `MemoryAdapter` in the sample crate |
//! | **Error injection** | `return_err`, `return_json(500, ..)`, `delay` | Hard |
//!
//! ## Pattern: scripted remote service
//!
//! ```rust
//! use resource_graph::mock::{MockAdapter, MockTransport};
//! use resource_graph::{GraphResolver, RemoteEndpoint, ResolveRequest, ResourceConfig, ResourceRegistry};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = ResourceRegistry::new().register(
//!         ResourceConfig::new("employees")
//!             .remote(RemoteEndpoint::from_url("http://foo.com/api/v1/employees")),
//!     );
//!     let transport = Arc::new(MockTransport::new());
//!     transport
//!         .expect_get("http://foo.com/api/v1/employees")
//!         .return_json(200, json!({"data": [{"type": "employees", "id": "1"}]}));
//!
//!     let resolver = GraphResolver::new(Arc::new(registry), Arc::new(MockAdapter::new()), transport.clone());
//!     let graph = resolver.resolve(ResolveRequest::index("employees", json!({}))).await.unwrap();
//!     assert_eq!(graph.records.len(), 1);
//!     transport.verify();
//! }
//! ```
//!
//! Expectations are matched by URL, not by arrival order, because sibling
//! relationships are fetched concurrently. An unexpected call panics.

use crate::adapter::{LocalAdapter, WriteOperation};
use crate::error::BoxError;
use crate::query::{Page, QueryDescriptor, EQ};
use crate::record::{canonical_id, Record};
use crate::resource::ResourceConfig;
use crate::transport::{RemoteRequest, RemoteResponse, RemoteTransport, TransportError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// MOCK TRANSPORT
// =============================================================================

struct Expectation {
    url: String,
    delay: Option<Duration>,
    response: Result<RemoteResponse, TransportError>,
}

/// A scripted [`RemoteTransport`].
#[derive(Clone, Default)]
pub struct MockTransport {
    expectations: Arc<Mutex<Vec<Expectation>>>,
    requests: Arc<Mutex<Vec<RemoteRequest>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expects one GET against `url` (without query string).
    pub fn expect_get(&self, url: impl Into<String>) -> GetExpectationBuilder {
        GetExpectationBuilder {
            url: url.into(),
            delay: None,
            expectations: self.expectations.clone(),
        }
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<RemoteRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Panics unless every expectation was consumed.
    pub fn verify(&self) {
        let exps = self.expectations.lock().unwrap();
        if !exps.is_empty() {
            let urls: Vec<&str> = exps.iter().map(|e| e.url.as_str()).collect();
            panic!("Not all expectations were met. {} remaining: {urls:?}", exps.len());
        }
    }
}

#[async_trait]
impl RemoteTransport for MockTransport {
    async fn get(&self, request: &RemoteRequest) -> Result<RemoteResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let expectation = {
            let mut exps = self.expectations.lock().unwrap();
            match exps.iter().position(|e| e.url == request.url) {
                Some(index) => exps.remove(index),
                None => panic!("Unexpected remote request: {}", request.full_url()),
            }
        };
        if let Some(delay) = expectation.delay {
            tokio::time::sleep(delay).await;
        }
        expectation.response
    }
}

/// Builder for GET expectations.
pub struct GetExpectationBuilder {
    url: String,
    delay: Option<Duration>,
    expectations: Arc<Mutex<Vec<Expectation>>>,
}

impl GetExpectationBuilder {
    /// Waits before answering.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Answers with `status` and a JSON body.
    pub fn return_json(self, status: u16, body: Value) {
        self.return_body(status, body.to_string());
    }

    /// Answers with `status` and a raw body.
    pub fn return_body(self, status: u16, body: impl Into<String>) {
        self.push(Ok(RemoteResponse::new(status, body)));
    }

    /// Fails at the transport level.
    pub fn return_err(self, error: TransportError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<RemoteResponse, TransportError>) {
        self.expectations.lock().unwrap().push(Expectation {
            url: self.url,
            delay: self.delay,
            response,
        });
    }
}

// =============================================================================
// MOCK ADAPTER
// =============================================================================

/// Scope produced by [`MockAdapter`]: the resource and the descriptor it was
/// built from.
#[derive(Debug, Clone, PartialEq)]
pub struct MockScope {
    pub resource: String,
    pub descriptor: QueryDescriptor,
}

/// An in-memory [`LocalAdapter`].
#[derive(Clone, Default)]
pub struct MockAdapter {
    tables: Arc<Mutex<HashMap<String, Vec<Record>>>>,
    executed: Arc<Mutex<Vec<MockScope>>>,
    writes: Arc<Mutex<Vec<(String, WriteOperation)>>>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds rows to the table of `resource`.
    pub fn with_records(self, resource: impl Into<String>, records: Vec<Record>) -> Self {
        self.tables
            .lock()
            .unwrap()
            .entry(resource.into())
            .or_default()
            .extend(records);
        self
    }

    /// Every scope executed so far.
    pub fn executed(&self) -> Vec<MockScope> {
        self.executed.lock().unwrap().clone()
    }

    /// Every write received so far.
    pub fn writes(&self) -> Vec<(String, WriteOperation)> {
        self.writes.lock().unwrap().clone()
    }

    fn matching(&self, scope: &MockScope) -> Result<Vec<Record>, BoxError> {
        let tables = self.tables.lock().unwrap();
        let rows = tables.get(&scope.resource).cloned().unwrap_or_default();
        let mut wanted: Vec<(&String, HashSet<String>)> = Vec::new();
        for (field, ops) in &scope.descriptor.filters {
            for (op, values) in ops {
                if op != EQ {
                    return Err(format!("MockAdapter does not support filter operator '{op}'").into());
                }
                wanted.push((field, values.iter().filter_map(canonical_id).collect()));
            }
        }
        let records: Vec<Record> = rows
            .into_iter()
            .filter(|record| {
                wanted.iter().all(|(field, values)| {
                    record
                        .key(field)
                        .is_some_and(|key| values.contains(&key))
                })
            })
            .collect();
        let (skip, take) = scope.descriptor.page.window();
        Ok(records.into_iter().skip(skip).take(take).collect())
    }
}

#[async_trait]
impl LocalAdapter for MockAdapter {
    type Scope = MockScope;

    async fn build_scope(
        &self,
        resource: &ResourceConfig,
        descriptor: &QueryDescriptor,
    ) -> Result<MockScope, BoxError> {
        Ok(MockScope {
            resource: resource.type_name.clone(),
            descriptor: descriptor.clone(),
        })
    }

    async fn execute(&self, scope: MockScope) -> Result<Vec<Record>, BoxError> {
        let records = self.matching(&scope)?;
        self.executed.lock().unwrap().push(scope);
        Ok(records)
    }

    /// Supports the `count` aggregate; anything else yields `null`.
    async fn compute_stats(
        &self,
        mut scope: MockScope,
        stats: &BTreeMap<String, Vec<String>>,
    ) -> Result<Map<String, Value>, BoxError> {
        scope.descriptor.page = Default::default();
        let count = self.matching(&scope)?.len();
        let mut result = Map::new();
        for (name, aggregates) in stats {
            let mut values = Map::new();
            for aggregate in aggregates {
                let value = if aggregate == "count" { Value::from(count) } else { Value::Null };
                values.insert(aggregate.clone(), value);
            }
            result.insert(name.clone(), Value::Object(values));
        }
        Ok(result)
    }

    async fn write(
        &self,
        resource: &ResourceConfig,
        operation: WriteOperation,
    ) -> Result<Option<Record>, BoxError> {
        self.writes
            .lock()
            .unwrap()
            .push((resource.type_name.clone(), operation.clone()));
        match operation {
            WriteOperation::Create { attributes } => {
                let mut tables = self.tables.lock().unwrap();
                let table = tables.entry(resource.type_name.clone()).or_default();
                let mut record = Record::new(resource.type_name.clone(), (table.len() + 1) as u64);
                record.attributes = attributes;
                table.push(record.clone());
                Ok(Some(record))
            }
            WriteOperation::Update { .. } | WriteOperation::Destroy { .. } => Ok(None),
        }
    }
}
