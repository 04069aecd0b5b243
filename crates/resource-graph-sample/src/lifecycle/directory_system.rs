use crate::adapter::MemoryAdapter;
use crate::clients::HttpTransport;
use crate::model::{self, Department, Employee, Position, Team};
use crate::store::{StoreError, TableActor, TableClient};
use resource_graph::{GraphResolver, RemoteTransport, ResolverConfig, ResourceRegistry};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

const CHANNEL_BUFFER: usize = 32;

/// The running directory: one actor per table and a resolver over them.
///
/// Generic over the transport so tests can swap in a scripted one.
pub struct DirectorySystem<T: RemoteTransport = HttpTransport> {
    pub resolver: GraphResolver<MemoryAdapter, T>,
    pub employees: TableClient,
    pub positions: TableClient,
    pub departments: TableClient,
    pub teams: TableClient,
    handles: Vec<JoinHandle<()>>,
}

impl DirectorySystem<HttpTransport> {
    /// All resources local, default resolver settings.
    pub fn new() -> Self {
        Self::start(model::registry(), HttpTransport::new(), ResolverConfig::default())
    }
}

impl Default for DirectorySystem<HttpTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RemoteTransport> DirectorySystem<T> {
    /// Spawns the table actors and builds the resolver.
    pub fn start(registry: ResourceRegistry, transport: T, config: ResolverConfig) -> Self {
        let mut handles = Vec::new();
        let mut spawn = |table: &str| {
            let (actor, client) = TableActor::new(table, CHANNEL_BUFFER);
            handles.push(tokio::spawn(actor.run()));
            client
        };
        let employees = spawn(model::employee::TYPE);
        let positions = spawn(model::position::TYPE);
        let departments = spawn(model::department::TYPE);
        let teams = spawn(model::team::TYPE);

        let adapter = MemoryAdapter::new()
            .with_table(employees.clone())
            .with_table(positions.clone())
            .with_table(departments.clone())
            .with_table(teams.clone());
        let resolver = GraphResolver::new(Arc::new(registry), Arc::new(adapter), Arc::new(transport))
            .with_config(config);

        info!(tables = handles.len(), "Directory started");
        Self {
            resolver,
            employees,
            positions,
            departments,
            teams,
            handles,
        }
    }

    /// Loads a small fixed data set.
    pub async fn seed(&self) -> Result<(), StoreError> {
        let employees = [
            Employee::new(1, "Jane", "Doe", 40, "2015-03-01").with_salary(150_000),
            Employee::new(2, "Joe", "Smith", 25, "2021-06-15").with_salary(90_000),
            Employee::new(3, "Anna", "Lee", 33, "2018-09-10").with_salary(120_000),
            Employee::new(4, "Mark", "Stone", 58, "2001-01-20")
                .with_salary(110_000)
                .inactive(),
        ];
        let departments = [Department::new(1, "Engineering"), Department::new(2, "Sales")];
        let positions = [
            Position::new(1, "Engineer", 1, 1),
            Position::new(2, "Tech Lead", 1, 1),
            Position::new(3, "Account Manager", 2, 2),
            Position::new(4, "Engineer", 3, 1),
        ];
        let teams = [
            Team::new(1, "Platform", 1),
            Team::new(2, "Growth", 2),
            Team::new(3, "Infrastructure", 3),
        ];

        insert_all(&self.employees, &employees).await?;
        insert_all(&self.departments, &departments).await?;
        insert_all(&self.positions, &positions).await?;
        insert_all(&self.teams, &teams).await?;
        info!("Directory seeded");
        Ok(())
    }

    /// Closes every channel and waits for the actors to stop.
    pub async fn shutdown(self) -> Result<(), String> {
        info!("Shutting down directory...");

        drop(self.resolver);
        drop(self.employees);
        drop(self.positions);
        drop(self.departments);
        drop(self.teams);

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Actor task failed: {:?}", e);
                return Err(format!("Actor task failed: {:?}", e));
            }
        }

        info!("Directory shutdown complete.");
        Ok(())
    }
}

async fn insert_all<M: Serialize>(table: &TableClient, rows: &[M]) -> Result<(), StoreError> {
    for row in rows {
        table.insert(model::to_row(row)?).await?;
    }
    Ok(())
}
