//! # Employee Directory
//!
//! A concrete service built on `resource_graph`: employees, positions,
//! departments and teams kept in actor-owned in-memory tables, with the option
//! of reading employees from another JSON:API service over HTTP.
//!
//! - **[model]**: typed rows and their resource declarations.
//! - **[store]**: one [`TableActor`](store::TableActor) per table and the
//!   [`TableClient`](store::TableClient) that talks to it.
//! - **[adapter]**: [`MemoryAdapter`](adapter::MemoryAdapter), the local
//!   adapter over those tables.
//! - **[clients]**: [`HttpTransport`](clients::HttpTransport), the `reqwest`
//!   remote transport.
//! - **[lifecycle]**: [`DirectorySystem`](lifecycle::DirectorySystem) starts,
//!   seeds and stops everything.

pub mod adapter;
pub mod clients;
pub mod lifecycle;
pub mod model;
pub mod store;
