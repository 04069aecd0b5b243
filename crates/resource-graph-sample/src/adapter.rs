//! # Memory Adapter
//!
//! [`LocalAdapter`] over the actor-backed tables in [`crate::store`]. A scope
//! is the table name plus a [`TableQuery`]; executing it is one round trip to
//! the table's actor.

use crate::store::{StoreError, TableClient, TableQuery};
use async_trait::async_trait;
use resource_graph::{BoxError, LocalAdapter, QueryDescriptor, Record, ResourceConfig, WriteOperation};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct TableScope {
    pub table: String,
    pub query: TableQuery,
}

/// Routes every local resource to the table of the same name.
#[derive(Clone, Default)]
pub struct MemoryAdapter {
    tables: HashMap<String, TableClient>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, client: TableClient) -> Self {
        self.tables.insert(client.table().to_string(), client);
        self
    }

    pub fn table(&self, name: &str) -> Result<&TableClient, StoreError> {
        self.tables
            .get(name)
            .ok_or_else(|| StoreError::UnknownTable(name.to_string()))
    }
}

#[async_trait]
impl LocalAdapter for MemoryAdapter {
    type Scope = TableScope;

    async fn build_scope(
        &self,
        resource: &ResourceConfig,
        descriptor: &QueryDescriptor,
    ) -> Result<TableScope, BoxError> {
        self.table(&resource.type_name)?;
        let query = TableQuery::from_descriptor(descriptor)?;
        debug!(table = %resource.type_name, conditions = query.conditions.len(), "Built scope");
        Ok(TableScope {
            table: resource.type_name.clone(),
            query,
        })
    }

    async fn execute(&self, scope: TableScope) -> Result<Vec<Record>, BoxError> {
        Ok(self.table(&scope.table)?.query(scope.query).await?)
    }

    async fn compute_stats(
        &self,
        scope: TableScope,
        stats: &BTreeMap<String, Vec<String>>,
    ) -> Result<Map<String, Value>, BoxError> {
        Ok(self
            .table(&scope.table)?
            .stats(scope.query, stats.clone())
            .await?)
    }

    async fn write(
        &self,
        resource: &ResourceConfig,
        operation: WriteOperation,
    ) -> Result<Option<Record>, BoxError> {
        let table = self.table(&resource.type_name)?;
        match operation {
            WriteOperation::Create { attributes } => Ok(Some(table.insert(attributes).await?)),
            WriteOperation::Update { id, attributes } => Ok(Some(table.update(id, attributes).await?)),
            WriteOperation::Destroy { id } => {
                table.delete(id).await?;
                Ok(None)
            }
        }
    }
}
