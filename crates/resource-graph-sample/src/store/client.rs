//! # Table Client
//!
//! Cheap-to-clone handle for a [`TableActor`](super::TableActor). Every method
//! sends one [`TableRequest`] and awaits the reply.

use super::error::StoreError;
use super::filter::TableQuery;
use super::message::TableRequest;
use resource_graph::Record;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct TableClient {
    table: String,
    sender: mpsc::Sender<TableRequest>,
}

impl TableClient {
    pub fn new(table: impl Into<String>, sender: mpsc::Sender<TableRequest>) -> Self {
        Self {
            table: table.into(),
            sender,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    #[instrument(skip(self, query), fields(table = %self.table))]
    pub async fn query(&self, query: TableQuery) -> Result<Vec<Record>, StoreError> {
        debug!("Sending request");
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(TableRequest::Query { query, respond_to })
            .await
            .map_err(|_| StoreError::ActorClosed)?;
        response.await.map_err(|_| StoreError::ActorDropped)?
    }

    pub async fn stats(
        &self,
        query: TableQuery,
        stats: BTreeMap<String, Vec<String>>,
    ) -> Result<Map<String, Value>, StoreError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(TableRequest::Stats {
                query,
                stats,
                respond_to,
            })
            .await
            .map_err(|_| StoreError::ActorClosed)?;
        response.await.map_err(|_| StoreError::ActorDropped)?
    }

    /// Inserts a row. An `id` attribute is honored; otherwise the next free id
    /// is assigned.
    #[instrument(skip(self, attributes), fields(table = %self.table))]
    pub async fn insert(&self, attributes: Map<String, Value>) -> Result<Record, StoreError> {
        debug!("Sending request");
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(TableRequest::Insert {
                attributes,
                respond_to,
            })
            .await
            .map_err(|_| StoreError::ActorClosed)?;
        response.await.map_err(|_| StoreError::ActorDropped)?
    }

    #[instrument(skip(self, attributes), fields(table = %self.table))]
    pub async fn update(
        &self,
        id: impl Into<String> + std::fmt::Debug,
        attributes: Map<String, Value>,
    ) -> Result<Record, StoreError> {
        debug!("Sending request");
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(TableRequest::Update {
                id: id.into(),
                attributes,
                respond_to,
            })
            .await
            .map_err(|_| StoreError::ActorClosed)?;
        response.await.map_err(|_| StoreError::ActorDropped)?
    }

    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn delete(&self, id: impl Into<String> + std::fmt::Debug) -> Result<(), StoreError> {
        debug!("Sending request");
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(TableRequest::Delete {
                id: id.into(),
                respond_to,
            })
            .await
            .map_err(|_| StoreError::ActorClosed)?;
        response.await.map_err(|_| StoreError::ActorDropped)?
    }
}
