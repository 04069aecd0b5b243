use resource_graph::{Attribute, AttributeType, Relationship, ResourceConfig};
use serde::{Deserialize, Serialize};

pub const TYPE: &str = "departments";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Department {
    pub id: u64,
    pub name: String,
}

impl Department {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

pub fn resource() -> ResourceConfig {
    ResourceConfig::new(TYPE)
        .attribute(Attribute::new("name", AttributeType::String))
        .relationship(Relationship::has_many("positions", super::position::TYPE, "department_id"))
}
