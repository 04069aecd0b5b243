//! # Records
//!
//! A [`Record`] is one resolved resource: its JSON:API type, its id, its
//! attribute values and the relationship slots filled in by the graph resolver.
//!
//! ## Identifier canonicalization
//!
//! Remote services always send ids as strings while local stores usually hand
//! back integers. Every id comparison in this crate goes through
//! [`canonical_id`], so `1`, `1.0` and `"1"` all match each other.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Returns the canonical string form of an identifier value.
///
/// Strings are kept verbatim, integral numbers lose any fractional part.
/// Booleans, arrays, objects and `null` are not identifiers.
pub fn canonical_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                let f = n.as_f64()?;
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    Some((f as i64).to_string())
                } else {
                    Some(f.to_string())
                }
            }
        }
        _ => None,
    }
}

/// A `(type, id)` pair, the JSON:API resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub type_name: String,
    pub id: String,
}

impl Identifier {
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
        }
    }
}

/// Whether a relationship slot holds at most one record or a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// The resolved contents of one relationship on one record.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub cardinality: Cardinality,
    pub records: Vec<Record>,
}

/// Relationship linkage reported by a remote service for a record.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteLinkage {
    pub cardinality: Cardinality,
    pub identifiers: Vec<Identifier>,
}

/// One resolved resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub type_name: String,
    pub id: String,
    pub attributes: Map<String, Value>,
    pub relationships: BTreeMap<String, Slot>,
    pub(crate) remote_links: BTreeMap<String, RemoteLinkage>,
}

impl Record {
    /// Creates a record. The id is canonicalized; non-identifier values fall
    /// back to their JSON text.
    pub fn new(type_name: impl Into<String>, id: impl Into<Value>) -> Self {
        let id = id.into();
        let id = canonical_id(&id).unwrap_or_else(|| id.to_string());
        Self {
            type_name: type_name.into(),
            id,
            attributes: Map::new(),
            relationships: BTreeMap::new(),
            remote_links: BTreeMap::new(),
        }
    }

    /// Builds a record from a row of attribute values keyed by column name.
    ///
    /// Returns `None` when the row has no usable `id` column.
    pub fn from_row(type_name: impl Into<String>, mut row: Map<String, Value>) -> Option<Self> {
        let id = row.remove("id").as_ref().and_then(canonical_id)?;
        Some(Self {
            type_name: type_name.into(),
            id,
            attributes: row,
            relationships: BTreeMap::new(),
            remote_links: BTreeMap::new(),
        })
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn identifier(&self) -> Identifier {
        Identifier::new(self.type_name.clone(), self.id.clone())
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Canonical id stored under `name`; `"id"` reads the record's own id.
    pub fn key(&self, name: &str) -> Option<String> {
        if name == "id" {
            return Some(self.id.clone());
        }
        self.attributes.get(name).and_then(canonical_id)
    }

    /// Records attached under the relationship `name` (empty if not resolved).
    pub fn related(&self, name: &str) -> &[Record] {
        self.relationships
            .get(name)
            .map(|slot| slot.records.as_slice())
            .unwrap_or(&[])
    }

    pub fn set_relationship(&mut self, name: impl Into<String>, slot: Slot) {
        self.relationships.insert(name.into(), slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_id_normalizes_numbers_and_strings() {
        assert_eq!(canonical_id(&json!(1)), Some("1".to_string()));
        assert_eq!(canonical_id(&json!("1")), Some("1".to_string()));
        assert_eq!(canonical_id(&json!(1.0)), Some("1".to_string()));
        assert_eq!(canonical_id(&json!(true)), None);
        assert_eq!(canonical_id(&Value::Null), None);
    }

    #[test]
    fn test_integer_and_string_ids_are_equal() {
        assert_eq!(Record::new("employees", 7).id, Record::new("employees", "7").id);
    }

    #[test]
    fn test_from_row_moves_id_out_of_attributes() {
        let row = json!({"id": 3, "title": "Engineer", "employee_id": 1});
        let record = Record::from_row("positions", row.as_object().cloned().unwrap()).unwrap();
        assert_eq!(record.id, "3");
        assert!(record.attribute("id").is_none());
        assert_eq!(record.key("employee_id"), Some("1".to_string()));
        assert_eq!(record.key("id"), Some("3".to_string()));
    }

    #[test]
    fn test_from_row_without_id() {
        let row = json!({"title": "Engineer"});
        assert!(Record::from_row("positions", row.as_object().cloned().unwrap()).is_none());
    }
}
