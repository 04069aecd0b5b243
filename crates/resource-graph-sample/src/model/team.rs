use resource_graph::{Attribute, AttributeType, ResourceConfig};
use serde::{Deserialize, Serialize};

pub const TYPE: &str = "teams";

/// A team an employee belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: u64,
    pub name: String,
    pub employee_id: u64,
}

impl Team {
    pub fn new(id: u64, name: impl Into<String>, employee_id: u64) -> Self {
        Self {
            id,
            name: name.into(),
            employee_id,
        }
    }
}

pub fn resource() -> ResourceConfig {
    ResourceConfig::new(TYPE)
        .attribute(Attribute::new("name", AttributeType::String))
        .attribute(Attribute::new("employee_id", AttributeType::Integer))
}
