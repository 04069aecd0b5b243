//! # Observability & Tracing
//!
//! [`setup_tracing`] installs a compact `tracing-subscriber` formatter driven by
//! `RUST_LOG`. The resolver emits structured events at these levels:
//!
//! - `info`: one line per resolved request (`resource`, `count`)
//! - `debug`: one line per node query (`resource`, `path`, `url` for remote
//!   calls) and every include pruned by a whitelist
//! - `warn`: remote calls that failed or timed out
//!
//! ```bash
//! RUST_LOG=info cargo run -p resource-graph-sample
//! RUST_LOG=resource_graph=debug cargo run -p resource-graph-sample
//! ```
//!
//! With `RUST_LOG=debug` a remote-parent request with a local child reads:
//!
//! ```text
//! INFO resolve: Resolving request resource="employees" action=index
//! DEBUG resolve: Remote call url="http://foo.com/api/v1/employees" path=""
//! DEBUG resolve: Local query resource="positions" path="positions"
//! INFO resolve: Resolved resource="employees" count=3
//! ```

/// Initializes the global subscriber. Call once, from `main`.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
