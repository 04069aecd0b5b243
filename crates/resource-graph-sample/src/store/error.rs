//! # Store Errors

/// Errors raised by the in-memory table store and its actors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Actor closed")]
    ActorClosed,
    #[error("Actor dropped response channel")]
    ActorDropped,
    #[error("No table registered for resource '{0}'")]
    UnknownTable(String),
    #[error("Row {id} not found in '{table}'")]
    RowNotFound { table: String, id: String },
    #[error("Unsupported filter operator '{0}'")]
    UnsupportedOperator(String),
    #[error("Unsupported aggregate '{0}'")]
    UnsupportedAggregate(String),
    #[error("Invalid row id '{0}'")]
    InvalidId(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
