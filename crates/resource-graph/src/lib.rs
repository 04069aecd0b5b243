//! # Resource Graph
//!
//! A query-normalization and resource-composition layer. It sits between an
//! HTTP-style request (filters, sorts, pagination, sparse fieldsets, extra
//! fields, includes, statistics) and a set of data sources, and produces a
//! single JSON:API document.
//!
//! Data sources come in two kinds:
//!
//! - **Local** resources are read through a [`LocalAdapter`], which turns a
//!   validated [`QueryDescriptor`] into records.
//! - **Remote** resources are read from other JSON:API services through a
//!   [`RemoteTransport`]. Relationships between resources of the same service
//!   are merged into one call; everything else is stitched together here.
//!
//! ## Architecture Overview
//!
//! 1. **Configuration** ([`ResourceConfig`], [`ResourceRegistry`]) - built once
//!    at startup, immutable and shared.
//! 2. **Normalization** ([`NormalizedQuery`], [`IncludeTree`]) - the raw
//!    parameter mapping becomes one descriptor per include-tree node.
//! 3. **Resolution** ([`GraphResolver`]) - plans every node before any I/O,
//!    then resolves parents before children and siblings concurrently.
//! 4. **Composition** ([`document::compose`]) - `data`, `included`, `meta`.
//!
//! ## Example
//!
//! ```rust
//! use resource_graph::mock::{MockAdapter, MockTransport};
//! use resource_graph::{
//!     Attribute, AttributeType, GraphResolver, Record, Relationship, ResolveRequest,
//!     ResourceConfig, ResourceRegistry,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = ResourceRegistry::new()
//!         .register(
//!             ResourceConfig::new("employees")
//!                 .attribute(Attribute::new("first_name", AttributeType::String))
//!                 .relationship(Relationship::has_many("positions", "positions", "employee_id")),
//!         )
//!         .register(
//!             ResourceConfig::new("positions")
//!                 .attribute(Attribute::new("title", AttributeType::String))
//!                 .attribute(Attribute::new("employee_id", AttributeType::Integer)),
//!         );
//!     let adapter = MockAdapter::new()
//!         .with_records("employees", vec![Record::new("employees", 1).with_attribute("first_name", "Jane")])
//!         .with_records(
//!             "positions",
//!             vec![Record::new("positions", 10)
//!                 .with_attribute("title", "Engineer")
//!                 .with_attribute("employee_id", 1)],
//!         );
//!
//!     let resolver = GraphResolver::new(Arc::new(registry), Arc::new(adapter), Arc::new(MockTransport::new()));
//!     let document = resolver
//!         .render(ResolveRequest::index("employees", json!({"include": "positions"})))
//!         .await
//!         .unwrap();
//!
//!     assert_eq!(document["data"][0]["attributes"]["first_name"], "Jane");
//!     assert_eq!(document["included"][0]["attributes"]["title"], "Engineer");
//! }
//! ```
//!
//! ## Errors
//!
//! Every failure is a [`GraphError`]. Parameter problems and writes against
//! remote resources are reported before any I/O. A failing remote call aborts
//! the whole request; no partial document is ever returned.
//!
//! ## Testing
//!
//! The [`mock`] module provides [`mock::MockTransport`] and
//! [`mock::MockAdapter`] for fast, deterministic tests without a database or a
//! network.

pub mod adapter;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod graph;
pub mod include;
pub mod mock;
pub mod query;
pub mod record;
pub mod remote;
pub mod resource;
pub mod scope;
pub mod tracing;
pub mod transport;

// Re-export core types for convenience
pub use adapter::{LocalAdapter, WriteOperation};
pub use config::{ConfigError, ResolverConfig};
pub use context::{Action, RequestContext};
pub use error::{BoxError, GraphError};
pub use graph::{GraphResolver, ResolveRequest, ResolvedGraph};
pub use include::{IncludeTree, IncludeWhitelist};
pub use query::{NormalizedQuery, Page, QueryDescriptor, SortDirection, SortField, EQ};
pub use record::{canonical_id, Cardinality, Identifier, Record, Slot};
pub use resource::{
    Attribute, AttributeType, Relationship, RelationshipKind, RemoteEndpoint, ResourceConfig,
    ResourceRegistry,
};
pub use scope::Scope;
pub use transport::{RemoteRequest, RemoteResponse, RemoteTransport, TransportError};
