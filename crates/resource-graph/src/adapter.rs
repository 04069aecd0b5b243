//! # Local Adapter
//!
//! The seam between the resolver and a local data store. The resolver hands the
//! adapter a fully validated [`QueryDescriptor`] (defaults layered, parent
//! linkage applied) and never looks inside the scope it gets back.

use crate::error::BoxError;
use crate::query::QueryDescriptor;
use crate::record::Record;
use crate::resource::ResourceConfig;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A write forwarded to the adapter for a local resource.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOperation {
    Create { attributes: Map<String, Value> },
    Update { id: String, attributes: Map<String, Value> },
    Destroy { id: String },
}

impl WriteOperation {
    pub fn name(&self) -> &'static str {
        match self {
            WriteOperation::Create { .. } => "create",
            WriteOperation::Update { .. } => "update",
            WriteOperation::Destroy { .. } => "destroy",
        }
    }
}

/// Contract every local data source implements.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use resource_graph::{BoxError, LocalAdapter, QueryDescriptor, Record, ResourceConfig};
/// use serde_json::{Map, Value};
/// use std::collections::BTreeMap;
///
/// struct Empty;
///
/// #[async_trait]
/// impl LocalAdapter for Empty {
///     type Scope = String;
///
///     async fn build_scope(&self, resource: &ResourceConfig, _: &QueryDescriptor) -> Result<String, BoxError> {
///         Ok(resource.type_name.clone())
///     }
///     async fn execute(&self, _: String) -> Result<Vec<Record>, BoxError> {
///         Ok(Vec::new())
///     }
///     async fn compute_stats(&self, _: String, _: &BTreeMap<String, Vec<String>>) -> Result<Map<String, Value>, BoxError> {
///         Ok(Map::new())
///     }
/// }
/// ```
#[async_trait]
pub trait LocalAdapter: Send + Sync + 'static {
    /// Opaque executable query.
    type Scope: Clone + Send + Sync + 'static;

    /// Builds a scope for `resource` from a validated descriptor.
    async fn build_scope(
        &self,
        resource: &ResourceConfig,
        descriptor: &QueryDescriptor,
    ) -> Result<Self::Scope, BoxError>;

    /// Runs the scope, returning records in scope order.
    async fn execute(&self, scope: Self::Scope) -> Result<Vec<Record>, BoxError>;

    /// Computes the requested aggregates, keyed by stat name then aggregate.
    async fn compute_stats(
        &self,
        scope: Self::Scope,
        stats: &BTreeMap<String, Vec<String>>,
    ) -> Result<Map<String, Value>, BoxError>;

    /// Persists a write. Adapters are read-only unless they override this.
    async fn write(
        &self,
        resource: &ResourceConfig,
        operation: WriteOperation,
    ) -> Result<Option<Record>, BoxError> {
        Err(format!(
            "{} is not supported for '{}'",
            operation.name(),
            resource.type_name
        )
        .into())
    }
}
