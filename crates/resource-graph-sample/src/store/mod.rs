//! # In-Memory Table Store
//!
//! Each table is owned by one [`TableActor`] running in its own task. The
//! actor processes [`TableRequest`]s one at a time, so the rows need no lock.
//! Callers talk to it through a [`TableClient`].
//!
//! ```rust
//! use resource_graph_sample::store::{TableActor, TableQuery};
//! use serde_json::{json, Map, Value};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (actor, client) = TableActor::new("teams", 10);
//!     tokio::spawn(actor.run());
//!
//!     let mut row = Map::new();
//!     row.insert("name".into(), Value::from("Platform"));
//!     let created = client.insert(row).await.unwrap();
//!     assert_eq!(created.id, "1");
//!
//!     let rows = client.query(TableQuery::new()).await.unwrap();
//!     assert_eq!(rows[0].attribute("name"), Some(&json!("Platform")));
//! }
//! ```

pub mod client;
pub mod error;
pub mod filter;
pub mod message;

pub use client::TableClient;
pub use error::StoreError;
pub use filter::{aggregate, Condition, Operator, TableQuery};
pub use message::{Response, TableRequest};

use resource_graph::{canonical_id, Record};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Owns the rows of one table. Rows are kept in id order.
pub struct TableActor {
    table: String,
    receiver: mpsc::Receiver<TableRequest>,
    rows: BTreeMap<u64, Record>,
    next_id: u64,
}

impl TableActor {
    /// Creates the actor and its client. `buffer_size` bounds the request
    /// channel; senders wait when it is full.
    pub fn new(table: impl Into<String>, buffer_size: usize) -> (Self, TableClient) {
        let table = table.into();
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = Self {
            table: table.clone(),
            receiver,
            rows: BTreeMap::new(),
            next_id: 1,
        };
        (actor, TableClient::new(table, sender))
    }

    /// Processes requests until every client is dropped.
    pub async fn run(mut self) {
        let name = self.table.clone();
        let table = name.as_str();
        info!(table, "Actor started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                TableRequest::Query { query, respond_to } => {
                    let rows = query.apply(self.rows.values());
                    debug!(table, conditions = query.conditions.len(), found = rows.len(), "Query");
                    let _ = respond_to.send(Ok(rows));
                }
                TableRequest::Stats {
                    query,
                    stats,
                    respond_to,
                } => {
                    let selected = query.select(self.rows.values());
                    debug!(table, ?stats, rows = selected.len(), "Stats");
                    let _ = respond_to.send(aggregate(&selected, &stats));
                }
                TableRequest::Insert {
                    attributes,
                    respond_to,
                } => {
                    let result = self.insert(attributes);
                    match &result {
                        Ok(record) => info!(table, id = %record.id, size = self.rows.len(), "Inserted"),
                        Err(e) => warn!(table, error = %e, "Insert failed"),
                    }
                    let _ = respond_to.send(result);
                }
                TableRequest::Update {
                    id,
                    attributes,
                    respond_to,
                } => {
                    let result = self.update(&id, attributes);
                    match &result {
                        Ok(_) => info!(table, %id, "Updated"),
                        Err(e) => warn!(table, %id, error = %e, "Update failed"),
                    }
                    let _ = respond_to.send(result);
                }
                TableRequest::Delete { id, respond_to } => {
                    let result = self.delete(&id);
                    match &result {
                        Ok(()) => info!(table, %id, size = self.rows.len(), "Deleted"),
                        Err(e) => warn!(table, %id, error = %e, "Delete failed"),
                    }
                    let _ = respond_to.send(result);
                }
            }
        }

        info!(table, "Actor stopped");
    }

    fn insert(&mut self, mut attributes: Map<String, Value>) -> Result<Record, StoreError> {
        let id = match attributes.remove("id") {
            Some(value) => parse_id(&value)?,
            None => self.next_id,
        };
        self.next_id = self.next_id.max(id + 1);
        let mut record = Record::new(self.table.clone(), id);
        record.attributes = attributes;
        self.rows.insert(id, record.clone());
        Ok(record)
    }

    fn update(&mut self, id: &str, attributes: Map<String, Value>) -> Result<Record, StoreError> {
        let key = parse_id(&Value::from(id))?;
        let record = self
            .rows
            .get_mut(&key)
            .ok_or_else(|| not_found(&self.table, id))?;
        for (name, value) in attributes {
            if name != "id" {
                record.attributes.insert(name, value);
            }
        }
        Ok(record.clone())
    }

    fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        let key = parse_id(&Value::from(id))?;
        self.rows
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| not_found(&self.table, id))
    }
}

fn not_found(table: &str, id: &str) -> StoreError {
    StoreError::RowNotFound {
        table: table.to_string(),
        id: id.to_string(),
    }
}

fn parse_id(value: &Value) -> Result<u64, StoreError> {
    let id = canonical_id(value).unwrap_or_else(|| value.to_string());
    id.parse().map_err(|_| StoreError::InvalidId(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_and_honors_ids() {
        let (actor, client) = TableActor::new("teams", 10);
        tokio::spawn(actor.run());

        let first = client.insert(row(json!({"name": "A"}))).await.unwrap();
        let explicit = client.insert(row(json!({"id": 10, "name": "B"}))).await.unwrap();
        let next = client.insert(row(json!({"name": "C"}))).await.unwrap();
        assert_eq!(first.id, "1");
        assert_eq!(explicit.id, "10");
        assert_eq!(next.id, "11");
        assert!(explicit.attribute("id").is_none());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (actor, client) = TableActor::new("teams", 10);
        tokio::spawn(actor.run());

        client.insert(row(json!({"name": "A"}))).await.unwrap();
        let updated = client.update("1", row(json!({"name": "Z"}))).await.unwrap();
        assert_eq!(updated.attribute("name"), Some(&json!("Z")));

        client.delete("1").await.unwrap();
        assert!(client.query(TableQuery::new()).await.unwrap().is_empty());
        assert!(matches!(
            client.delete("1").await,
            Err(StoreError::RowNotFound { .. })
        ));
        assert!(matches!(
            client.update("abc", Map::new()).await,
            Err(StoreError::InvalidId(_))
        ));
    }

    #[tokio::test]
    async fn test_stats_ignore_pagination() {
        let (actor, client) = TableActor::new("teams", 10);
        tokio::spawn(actor.run());
        for name in ["A", "B", "C"] {
            client.insert(row(json!({"name": name}))).await.unwrap();
        }
        let mut query = TableQuery::new();
        query.page.size = Some(1);
        let mut stats = BTreeMap::new();
        stats.insert("total".to_string(), vec!["count".to_string()]);

        assert_eq!(client.query(query.clone()).await.unwrap().len(), 1);
        let result = client.stats(query, stats).await.unwrap();
        assert_eq!(result["total"]["count"], json!(3));
    }

    #[tokio::test]
    async fn test_page_past_the_end_keeps_actor_running() {
        let (actor, client) = TableActor::new("teams", 10);
        tokio::spawn(actor.run());
        client.insert(row(json!({"name": "A"}))).await.unwrap();

        let mut query = TableQuery::new();
        query.page.number = Some(u64::MAX);
        query.page.size = Some(20);
        assert!(client.query(query).await.unwrap().is_empty());
        assert_eq!(client.query(TableQuery::new()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_client_reports_closed_actor() {
        let (actor, client) = TableActor::new("teams", 10);
        drop(actor);
        assert!(matches!(
            client.query(TableQuery::new()).await,
            Err(StoreError::ActorClosed)
        ));
    }
}
