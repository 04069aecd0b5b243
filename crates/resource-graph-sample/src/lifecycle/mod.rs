//! # System Lifecycle
//!
//! Starts the table actors, wires them into a [`GraphResolver`] and shuts
//! everything down again.
//!
//! ```rust,ignore
//! let system = DirectorySystem::new();
//! system.seed().await?;
//! let document = system
//!     .resolver
//!     .render(ResolveRequest::index("employees", json!({"include": "positions"})))
//!     .await?;
//! system.shutdown().await?;
//! ```
//!
//! ## Graceful Shutdown
//!
//! 1. Drop the resolver and every table client, closing the channels.
//! 2. Each actor sees `recv()` return `None` and leaves its loop.
//! 3. Await every actor task.
//!
//! The resolver holds clones of the table clients inside its adapter, so it
//! has to go first; otherwise the actors never see their channels close.
//!
//! [`GraphResolver`]: resource_graph::GraphResolver

pub mod directory_system;

pub use directory_system::*;
