//! # Directory Model
//!
//! Plain data structures for an employee directory and the resource
//! declarations that expose them:
//!
//! ```text
//! employees ──< positions >── departments
//!     └──────< teams
//! ```
//!
//! Rows travel through the store as JSON objects; [`to_row`] and
//! [`from_record`] convert between those and the typed structs.

pub mod department;
pub mod employee;
pub mod position;
pub mod team;

pub use department::Department;
pub use employee::Employee;
pub use position::Position;
pub use team::Team;

use crate::store::StoreError;
use resource_graph::{Record, ResourceRegistry};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Every table the directory owns locally.
pub const TABLES: [&str; 4] = [employee::TYPE, position::TYPE, department::TYPE, team::TYPE];

/// All resources served from local tables.
pub fn registry() -> ResourceRegistry {
    ResourceRegistry::new()
        .register(employee::resource())
        .register(position::resource())
        .register(department::resource())
        .register(team::resource())
}

/// Employees come from the service at `base_url`; positions and departments
/// stay local.
pub fn remote_registry(base_url: &str) -> ResourceRegistry {
    ResourceRegistry::new()
        .register(employee::remote_resource(base_url))
        .register(position::resource())
        .register(department::resource())
}

/// Serializes a model into a store row, `id` included.
pub fn to_row<T: Serialize>(model: &T) -> Result<Map<String, Value>, StoreError> {
    match serde_json::to_value(model)? {
        Value::Object(row) => Ok(row),
        other => Err(StoreError::Serialization(serde::ser::Error::custom(format!(
            "expected an object, got {other}"
        )))),
    }
}

/// Reads a typed model back out of a record.
pub fn from_record<T: DeserializeOwned>(record: &Record) -> Result<T, StoreError> {
    let mut row = record.attributes.clone();
    let id = record.id.parse::<u64>().map(Value::from).unwrap_or_else(|_| Value::from(record.id.clone()));
    row.insert("id".to_string(), id);
    Ok(serde_json::from_value(Value::Object(row))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_conversion() {
        let employee = Employee::new(3, "Jane", "Doe", 40, "2020-01-15").with_salary(120);
        let row = to_row(&employee).unwrap();
        assert_eq!(row["first_name"], "Jane");

        let record = Record::from_row(employee::TYPE, row).unwrap();
        assert_eq!(record.id, "3");
        let back: Employee = from_record(&record).unwrap();
        assert_eq!(back, employee);
    }

    #[test]
    fn test_registries() {
        let local = registry();
        assert_eq!(local.len(), 4);
        assert!(!local.get("employees").unwrap().is_remote());

        let remote = remote_registry("http://hr.example.com/api/v1/");
        let employees = remote.get("employees").unwrap();
        assert_eq!(
            employees.remote.as_ref().map(|e| e.url()),
            Some("http://hr.example.com/api/v1/employees".to_string())
        );
        assert!(remote.get("teams").is_err());
    }
}
