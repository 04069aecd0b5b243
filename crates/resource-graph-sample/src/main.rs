//! # Directory Demo
//!
//! Starts the directory, seeds it and renders a few documents:
//!
//! ```bash
//! RUST_LOG=info cargo run -p resource-graph-sample
//! RUST_LOG=debug cargo run -p resource-graph-sample -- resolver.toml
//! ```
//!
//! The optional argument is a TOML file read into a [`ResolverConfig`].

use resource_graph::tracing::setup_tracing;
use resource_graph::{Action, RequestContext, ResolveRequest, ResolverConfig};
use resource_graph_sample::clients::HttpTransport;
use resource_graph_sample::lifecycle::DirectorySystem;
use resource_graph_sample::model::{self, Employee};
use serde_json::json;
use tracing::{error, info, Instrument};

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    let config = match std::env::args().nth(1) {
        Some(path) => ResolverConfig::load(&path).map_err(|e| e.to_string())?,
        None => ResolverConfig::default(),
    };
    info!(?config, "Starting directory");

    let system = DirectorySystem::start(model::registry(), HttpTransport::new(), config);
    system.seed().await.map_err(|e| e.to_string())?;

    let span = tracing::info_span!("index");
    let index = async {
        system
            .resolver
            .render(ResolveRequest::index(
                "employees",
                json!({
                    "include": "positions.department,teams",
                    "filter": {"age": {"gt": 30}},
                    "sort": "-age",
                    "extra_fields": {"employees": "salary"},
                    "stats": {"total": "count", "age": "average,maximum"},
                }),
            ))
            .await
    }
    .instrument(span)
    .await;

    match index {
        Ok(document) => println!("{}", serde_json::to_string_pretty(&document).map_err(|e| e.to_string())?),
        Err(e) => error!(error = %e, status = e.status(), "Index failed"),
    }

    let show = system
        .resolver
        .resolve(
            ResolveRequest::show("employees", "1", json!({"include": "positions.department,teams"}))
                .with_context(RequestContext::new(Action::Show).with_value("active_only", true)),
        )
        .await;
    match show {
        Ok(graph) => {
            for record in &graph.records {
                let employee: Employee = model::from_record(record).map_err(|e| e.to_string())?;
                info!(
                    id = employee.id,
                    name = %employee.first_name,
                    positions = record.related("positions").len(),
                    teams = record.related("teams").len(),
                    "Shown"
                );
            }
        }
        Err(e) => error!(error = %e, "Show failed"),
    }

    system.shutdown().await?;
    info!("Demo completed successfully");
    Ok(())
}
