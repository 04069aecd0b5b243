//! # Table Messages
//!
//! Requests understood by a [`TableActor`](super::TableActor). Each carries a
//! oneshot sender the actor answers on.

use super::error::StoreError;
use super::filter::TableQuery;
use resource_graph::Record;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tokio::sync::oneshot;

pub type Response<T> = oneshot::Sender<Result<T, StoreError>>;

#[derive(Debug)]
pub enum TableRequest {
    /// Filtered, sorted and paginated rows.
    Query {
        query: TableQuery,
        respond_to: Response<Vec<Record>>,
    },
    /// Aggregates over the filtered rows, ignoring pagination.
    Stats {
        query: TableQuery,
        stats: BTreeMap<String, Vec<String>>,
        respond_to: Response<Map<String, Value>>,
    },
    Insert {
        attributes: Map<String, Value>,
        respond_to: Response<Record>,
    },
    Update {
        id: String,
        attributes: Map<String, Value>,
        respond_to: Response<Record>,
    },
    Delete { id: String, respond_to: Response<()> },
}
