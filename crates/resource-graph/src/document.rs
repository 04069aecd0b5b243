//! # Document Composer
//!
//! Serializes a [`ResolvedGraph`] into a JSON:API document:
//!
//! ```json
//! {
//!   "data": [{"id": "1", "type": "employees", "attributes": {...},
//!             "relationships": {"positions": {"data": [{"type": "positions", "id": "10"}]}}}],
//!   "included": [{"id": "10", "type": "positions", ...}],
//!   "meta": {"stats": {"total": {"count": 3}}}
//! }
//! ```
//!
//! `included` holds every related record exactly once, keyed by `(type, id)`,
//! and never repeats a primary record.

use crate::context::RequestContext;
use crate::graph::ResolvedGraph;
use crate::query::{join_path, NormalizedQuery};
use crate::record::{Cardinality, Identifier, Record};
use crate::resource::{ResourceConfig, ResourceRegistry};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

struct Composer<'a> {
    registry: &'a ResourceRegistry,
    query: &'a NormalizedQuery,
    context: &'a RequestContext,
    seen: HashSet<Identifier>,
    included: Vec<Value>,
}

/// Builds the `{data, included, meta}` document for `graph`.
pub fn compose(graph: &ResolvedGraph, registry: &ResourceRegistry, context: &RequestContext) -> Value {
    let mut composer = Composer {
        registry,
        query: &graph.query,
        context,
        seen: graph.records.iter().map(Record::identifier).collect(),
        included: Vec::new(),
    };

    let root = Some(graph.resource.clone());
    let mut data: Vec<Value> = graph
        .records
        .iter()
        .map(|record| composer.resource_object(record, root.as_deref(), ""))
        .collect();
    for record in &graph.records {
        composer.walk(record, root.as_deref(), "");
    }

    let data = if graph.single {
        if data.is_empty() {
            Value::Null
        } else {
            data.swap_remove(0)
        }
    } else {
        Value::Array(data)
    };

    let mut meta = graph.meta.clone();
    if !graph.stats.is_empty() {
        meta.insert("stats".to_string(), Value::Object(graph.stats.clone()));
    }

    json!({
        "data": data,
        "included": composer.included,
        "meta": meta,
    })
}

impl Composer<'_> {
    /// Configuration of the records found under `name` on `owner`'s records.
    ///
    /// Undeclared relationships fall back to a registration under the record's
    /// own type name, then to schemaless rendering.
    fn related_config(&self, owner: Option<&ResourceConfig>, name: &str, type_name: &str) -> Option<Arc<ResourceConfig>> {
        owner
            .and_then(|config| config.find_relationship(name))
            .and_then(|relationship| self.registry.target(relationship).ok())
            .or_else(|| self.registry.get(type_name).ok())
    }

    fn walk(&mut self, record: &Record, config: Option<&ResourceConfig>, path: &str) {
        for (name, slot) in &record.relationships {
            let child_path = join_path(path, name);
            for child in &slot.records {
                let child_config = self.related_config(config, name, &child.type_name);
                if self.seen.insert(child.identifier()) {
                    let object = self.resource_object(child, child_config.as_deref(), &child_path);
                    self.included.push(object);
                }
                self.walk(child, child_config.as_deref(), &child_path);
            }
        }
    }

    fn resource_object(&self, record: &Record, config: Option<&ResourceConfig>, path: &str) -> Value {
        let fields = self.query.fields_for(path, &record.type_name);
        let extra = self.query.extra_fields_for(path, &record.type_name);
        let wanted = |name: &str| fields.map_or(true, |set| set.contains(name));

        let mut attributes = Map::new();
        match config.filter(|c| !c.is_schemaless()) {
            Some(config) => {
                for attribute in config.attributes.iter().filter(|a| a.readable) {
                    let show = if attribute.extra {
                        extra.is_some_and(|set| set.contains(&attribute.name))
                    } else {
                        wanted(&attribute.name)
                    };
                    if show {
                        attributes.insert(attribute.name.clone(), attribute.value(record, self.context));
                    }
                }
            }
            None => {
                for (name, value) in &record.attributes {
                    if wanted(name) {
                        attributes.insert(name.clone(), value.clone());
                    }
                }
            }
        }

        let mut relationships = Map::new();
        for (name, slot) in &record.relationships {
            let linkage = match slot.cardinality {
                Cardinality::Many => Value::Array(slot.records.iter().map(identifier).collect()),
                Cardinality::One => slot.records.first().map(identifier).unwrap_or(Value::Null),
            };
            relationships.insert(name.clone(), json!({ "data": linkage }));
        }

        json!({
            "id": record.id,
            "type": record.type_name,
            "attributes": attributes,
            "relationships": relationships,
        })
    }
}

fn identifier(record: &Record) -> Value {
    json!({"type": record.type_name, "id": record.id})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Slot;
    use crate::resource::{Attribute, AttributeType, Relationship};
    use serde_json::json;

    fn registry() -> ResourceRegistry {
        ResourceRegistry::new()
            .register(
                ResourceConfig::new("employees")
                    .attribute(Attribute::new("first_name", AttributeType::String))
                    .attribute(Attribute::new("age", AttributeType::Integer))
                    .attribute(Attribute::new("salary", AttributeType::Integer).extra())
                    .attribute(Attribute::new("ssn", AttributeType::String).unreadable())
                    .attribute(Attribute::computed("title", AttributeType::String, |record, _| {
                        record
                            .related("positions")
                            .first()
                            .and_then(|p| p.attribute("title").cloned())
                            .unwrap_or(Value::Null)
                    }))
                    .relationship(Relationship::has_many("positions", "positions", "employee_id")),
            )
            .register(
                ResourceConfig::new("positions")
                    .attribute(Attribute::new("title", AttributeType::String))
                    .attribute(Attribute::new("employee_id", AttributeType::Integer)),
            )
    }

    fn employee(id: i64, position: Record) -> Record {
        let mut record = Record::new("employees", id)
            .with_attribute("first_name", "Jane")
            .with_attribute("age", 40)
            .with_attribute("salary", 100)
            .with_attribute("ssn", "secret");
        record.set_relationship(
            "positions",
            Slot {
                cardinality: Cardinality::Many,
                records: vec![position],
            },
        );
        record
    }

    fn graph(records: Vec<Record>, params: Value) -> ResolvedGraph {
        let registry = registry();
        ResolvedGraph {
            resource: registry.get("employees").unwrap(),
            records,
            single: false,
            stats: Map::new(),
            meta: Map::new(),
            query: NormalizedQuery::from_params(&params).unwrap(),
        }
    }

    #[test]
    fn test_included_is_deduplicated() {
        let shared = Record::new("positions", 10)
            .with_attribute("title", "Dev")
            .with_attribute("employee_id", 1);
        let graph = graph(
            vec![employee(1, shared.clone()), employee(2, shared)],
            Value::Null,
        );
        let document = compose(&graph, &registry(), &RequestContext::default());
        assert_eq!(document["data"].as_array().unwrap().len(), 2);
        assert_eq!(document["included"].as_array().unwrap().len(), 1);
        assert_eq!(
            document["data"][0]["relationships"]["positions"]["data"],
            json!([{"type": "positions", "id": "10"}])
        );
    }

    #[test]
    fn test_attribute_visibility() {
        let position = Record::new("positions", 10).with_attribute("title", "Dev");
        let document = compose(
            &graph(vec![employee(1, position.clone())], Value::Null),
            &registry(),
            &RequestContext::default(),
        );
        let attributes = &document["data"][0]["attributes"];
        assert_eq!(attributes["title"], json!("Dev"));
        assert!(attributes.get("salary").is_none());
        assert!(attributes.get("ssn").is_none());

        let document = compose(
            &graph(
                vec![employee(1, position)],
                json!({"fields": {"employees": "age"}, "extra_fields": {"employees": "salary"}}),
            ),
            &registry(),
            &RequestContext::default(),
        );
        assert_eq!(
            document["data"][0]["attributes"],
            json!({"age": 40, "salary": 100})
        );
    }

    #[test]
    fn test_primary_records_not_repeated_in_included() {
        let mut manager = Record::new("employees", 1).with_attribute("first_name", "Ann");
        manager.set_relationship(
            "reports",
            Slot {
                cardinality: Cardinality::Many,
                records: vec![Record::new("employees", 1)],
            },
        );
        let document = compose(&graph(vec![manager], Value::Null), &registry(), &RequestContext::default());
        assert!(document["included"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_single_and_stats() {
        let mut graph = graph(vec![Record::new("employees", 1)], Value::Null);
        graph.single = true;
        graph.stats.insert("total".into(), json!({"count": 1}));
        let graph = graph.with_meta("generated_by", "test");
        let document = compose(&graph, &registry(), &RequestContext::default());
        assert_eq!(document["data"]["id"], json!("1"));
        assert_eq!(document["meta"]["stats"]["total"]["count"], json!(1));
        assert_eq!(document["meta"]["generated_by"], json!("test"));
    }
}
