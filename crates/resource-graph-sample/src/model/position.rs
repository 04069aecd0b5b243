use resource_graph::{Attribute, AttributeType, Relationship, ResourceConfig};
use serde::{Deserialize, Serialize};

pub const TYPE: &str = "positions";

/// A role an employee holds within a department.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: u64,
    pub title: String,
    pub employee_id: u64,
    pub department_id: u64,
}

impl Position {
    pub fn new(id: u64, title: impl Into<String>, employee_id: u64, department_id: u64) -> Self {
        Self {
            id,
            title: title.into(),
            employee_id,
            department_id,
        }
    }
}

pub fn resource() -> ResourceConfig {
    ResourceConfig::new(TYPE)
        .attribute(Attribute::new("title", AttributeType::String))
        .attribute(Attribute::new("employee_id", AttributeType::Integer))
        .attribute(Attribute::new("department_id", AttributeType::Integer))
        .relationship(Relationship::belongs_to("department", super::department::TYPE, "department_id"))
}
