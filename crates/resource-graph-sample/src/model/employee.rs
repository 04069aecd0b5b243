use resource_graph::{
    Action, Attribute, AttributeType, IncludeTree, QueryDescriptor, Relationship, RemoteEndpoint,
    RequestContext, ResourceConfig, SortField, EQ,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TYPE: &str = "employees";

/// A person on the payroll.
///
/// `salary` is an extra attribute: it is only rendered when asked for through
/// `extra_fields[employees]=salary`. `full_name` is computed at render time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub age: i64,
    pub active: bool,
    /// `YYYY-MM-DD`
    pub hired_on: String,
    pub salary: i64,
}

impl Employee {
    pub fn new(
        id: u64,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        age: i64,
        hired_on: impl Into<String>,
    ) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            age,
            active: true,
            hired_on: hired_on.into(),
            salary: 0,
        }
    }

    pub fn with_salary(mut self, salary: i64) -> Self {
        self.salary = salary;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Local employees, stored in the directory's own tables.
///
/// A show request may only include `positions.department`. Passing
/// `active_only: true` in the request context restricts every query to
/// active employees.
pub fn resource() -> ResourceConfig {
    declare_attributes(ResourceConfig::new(TYPE))
        .relationship(Relationship::has_many("positions", super::position::TYPE, "employee_id"))
        .relationship(Relationship::has_many("teams", super::team::TYPE, "employee_id"))
        .default_sort(SortField::asc("id"))
        .max_page_size(100)
        .allow_includes(Action::Show, IncludeTree::parse("positions.department"))
        .on_params(active_only)
}

/// Employees served by another JSON:API service at `base_url`.
///
/// Only `positions` is declared; anything else requested under an employee
/// is forwarded to the remote service in the same call.
pub fn remote_resource(base_url: &str) -> ResourceConfig {
    let endpoint = RemoteEndpoint::from_url(&format!("{}/employees", base_url.trim_end_matches('/')));
    declare_attributes(ResourceConfig::new(TYPE).remote(endpoint))
        .relationship(Relationship::has_many("positions", super::position::TYPE, "employee_id"))
}

fn declare_attributes(config: ResourceConfig) -> ResourceConfig {
    config
        .attribute(Attribute::new("first_name", AttributeType::String))
        .attribute(Attribute::new("last_name", AttributeType::String))
        .attribute(Attribute::new("age", AttributeType::Integer))
        .attribute(Attribute::new("active", AttributeType::Boolean))
        .attribute(Attribute::new("hired_on", AttributeType::Date))
        .attribute(Attribute::new("salary", AttributeType::Integer).extra().not_sortable())
        .attribute(Attribute::computed("full_name", AttributeType::String, |record, _| {
            let first = record.attribute("first_name").and_then(Value::as_str).unwrap_or_default();
            let last = record.attribute("last_name").and_then(Value::as_str).unwrap_or_default();
            Value::from(format!("{first} {last}").trim())
        }))
}

fn active_only(descriptor: &mut QueryDescriptor, context: &RequestContext) -> Result<(), resource_graph::GraphError> {
    if context.value("active_only") == Some(&Value::Bool(true)) {
        descriptor.add_filter("active", EQ, vec![Value::Bool(true)]);
    }
    Ok(())
}
