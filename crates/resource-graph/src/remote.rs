//! # Remote Documents
//!
//! Decodes JSON:API response bodies from remote services into [`Record`]s and
//! turns error envelopes into a single [`GraphError::RemoteError`].
//!
//! Two error shapes are understood. A raw error carries the upstream exception
//! under `meta.__raw_error__` and its `message` is used verbatim. Otherwise each
//! structured entry contributes `title - detail` and the entries are joined
//! with `"; "`.

use crate::error::GraphError;
use crate::include::IncludeTree;
use crate::record::{canonical_id, Cardinality, Identifier, Record, RemoteLinkage, Slot};
use crate::transport::RemoteResponse;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

const RAW_ERROR_KEY: &str = "__raw_error__";
const MAX_BODY_IN_ERROR: usize = 200;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PrimaryData {
    Many(Vec<ResourceObject>),
    One(Option<ResourceObject>),
}

impl Default for PrimaryData {
    fn default() -> Self {
        PrimaryData::Many(Vec::new())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteDocument {
    #[serde(default)]
    pub data: PrimaryData,
    #[serde(default)]
    pub included: Vec<ResourceObject>,
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(default)]
    pub errors: Vec<ErrorObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceObject {
    #[serde(rename = "type")]
    pub type_name: String,
    pub id: Value,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub relationships: BTreeMap<String, RelationshipObject>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelationshipObject {
    #[serde(default)]
    pub data: Option<LinkageData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LinkageData {
    Many(Vec<ResourceIdentifier>),
    One(ResourceIdentifier),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceIdentifier {
    #[serde(rename = "type")]
    pub type_name: String,
    pub id: Value,
}

impl ResourceIdentifier {
    fn canonical(&self) -> Identifier {
        Identifier::new(self.type_name.clone(), id_string(&self.id))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorObject {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub meta: Map<String, Value>,
}

impl ErrorObject {
    fn raw_message(&self) -> Option<&str> {
        self.meta
            .get(RAW_ERROR_KEY)
            .and_then(|raw| raw.get("message"))
            .and_then(Value::as_str)
    }

    fn summary(&self) -> String {
        match (&self.title, &self.detail) {
            (Some(title), Some(detail)) => format!("{title} - {detail}"),
            (Some(title), None) => title.clone(),
            (None, Some(detail)) => detail.clone(),
            (None, None) => "Error".to_string(),
        }
    }
}

fn id_string(id: &Value) -> String {
    canonical_id(id).unwrap_or_else(|| id.to_string())
}

impl ResourceObject {
    pub fn into_record(self) -> Record {
        let mut record = Record::new(self.type_name, id_string(&self.id));
        record.attributes = self.attributes;
        for (name, relationship) in self.relationships {
            let linkage = match relationship.data {
                Some(LinkageData::Many(ids)) => RemoteLinkage {
                    cardinality: Cardinality::Many,
                    identifiers: ids.iter().map(ResourceIdentifier::canonical).collect(),
                },
                Some(LinkageData::One(id)) => RemoteLinkage {
                    cardinality: Cardinality::One,
                    identifiers: vec![id.canonical()],
                },
                None => continue,
            };
            record.remote_links.insert(name, linkage);
        }
        record
    }
}

impl RemoteDocument {
    /// Primary records, in response order.
    pub fn primary_records(&self) -> Vec<Record> {
        match &self.data {
            PrimaryData::Many(objects) => objects.iter().cloned().map(ResourceObject::into_record).collect(),
            PrimaryData::One(Some(object)) => vec![object.clone().into_record()],
            PrimaryData::One(None) => Vec::new(),
        }
    }

    /// The `included` side-table keyed by `(type, id)`.
    pub fn side_table(&self) -> HashMap<Identifier, Record> {
        self.included
            .iter()
            .cloned()
            .map(ResourceObject::into_record)
            .map(|record| (record.identifier(), record))
            .collect()
    }

    /// Stats reported by the remote service under `meta.stats`.
    pub fn stats(&self) -> Option<&Map<String, Value>> {
        self.meta.get("stats").and_then(Value::as_object)
    }
}

/// Builds the message of the error raised for an `errors` array.
pub fn error_message(errors: &[ErrorObject]) -> String {
    if let Some(raw) = errors.iter().find_map(ErrorObject::raw_message) {
        return raw.to_string();
    }
    if errors.is_empty() {
        return "Error".to_string();
    }
    errors
        .iter()
        .map(ErrorObject::summary)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Decodes a response, mapping non-2xx statuses and `errors` arrays to
/// [`GraphError::RemoteError`].
pub fn parse_response(response: &RemoteResponse) -> Result<RemoteDocument, GraphError> {
    if !response.is_success() {
        return Err(match serde_json::from_str::<RemoteDocument>(&response.body) {
            Ok(document) if !document.errors.is_empty() => {
                GraphError::RemoteError(error_message(&document.errors))
            }
            _ => GraphError::RemoteError(format!(
                "status {}: {}",
                response.status,
                truncate(&response.body)
            )),
        });
    }
    let document: RemoteDocument = serde_json::from_str(&response.body)?;
    if !document.errors.is_empty() {
        return Err(GraphError::RemoteError(error_message(&document.errors)));
    }
    Ok(document)
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_BODY_IN_ERROR) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}

/// Fills the relationship slots named by `include` from the side-table,
/// following the linkage each record reported.
pub(crate) fn assemble(records: &mut [Record], include: &IncludeTree, table: &HashMap<Identifier, Record>) {
    for (name, subtree) in include.children() {
        for record in records.iter_mut() {
            let Some(linkage) = record.remote_links.get(name) else {
                continue;
            };
            let cardinality = linkage.cardinality;
            let mut related: Vec<Record> = linkage
                .identifiers
                .iter()
                .filter_map(|identifier| table.get(identifier).cloned())
                .collect();
            assemble(&mut related, subtree, table);
            record.set_relationship(
                name,
                Slot {
                    cardinality,
                    records: related,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: u16, body: Value) -> RemoteResponse {
        RemoteResponse::new(status, body.to_string())
    }

    #[test]
    fn test_raw_error_message_used_verbatim() {
        let body = json!({"errors": [{
            "title": "Internal",
            "meta": {"__raw_error__": {"message": "foo bar", "backtrace": ["a.rb:1"]}}
        }]});
        let err = parse_response(&response(500, body)).unwrap_err();
        assert!(matches!(&err, GraphError::RemoteError(msg) if msg == "foo bar"));
        assert!(err.to_string().contains("foo bar"));
    }

    #[test]
    fn test_structured_errors_joined() {
        let errors = vec![
            ErrorObject {
                title: Some("Invalid".into()),
                detail: Some("age is bad".into()),
                ..Default::default()
            },
            ErrorObject {
                title: Some("Forbidden".into()),
                ..Default::default()
            },
            ErrorObject::default(),
        ];
        assert_eq!(error_message(&errors), "Invalid - age is bad; Forbidden; Error");
    }

    #[test]
    fn test_errors_array_on_success_status_is_fatal() {
        let body = json!({"errors": [{"title": "Nope", "detail": "no access"}]});
        let err = parse_response(&response(200, body)).unwrap_err();
        assert_eq!(err.to_string(), "Remote error: Nope - no access");
    }

    #[test]
    fn test_non_2xx_without_envelope() {
        let err = parse_response(&RemoteResponse::new(503, "upstream down")).unwrap_err();
        assert!(matches!(err, GraphError::RemoteError(msg) if msg == "status 503: upstream down"));
    }

    #[test]
    fn test_malformed_success_body() {
        let err = parse_response(&RemoteResponse::new(200, "<html>")).unwrap_err();
        assert!(matches!(err, GraphError::Decode(_)));
    }

    #[test]
    fn test_side_table_assembly_follows_linkage() {
        let body = json!({
            "data": [{
                "type": "employees", "id": "1",
                "attributes": {"first_name": "Jane"},
                "relationships": {
                    "positions": {"data": [{"type": "positions", "id": 10}]},
                    "teams": {"data": []}
                }
            }],
            "included": [
                {"type": "positions", "id": "10", "attributes": {"title": "Dev"},
                 "relationships": {"department": {"data": {"type": "departments", "id": "5"}}}},
                {"type": "departments", "id": "5", "attributes": {"name": "R&D"}}
            ]
        });
        let document = parse_response(&response(200, body)).unwrap();
        let mut records = document.primary_records();
        assemble(
            &mut records,
            &IncludeTree::parse("positions.department,teams"),
            &document.side_table(),
        );
        let position = &records[0].related("positions")[0];
        assert_eq!(position.id, "10");
        assert_eq!(position.related("department")[0].attribute("name"), Some(&json!("R&D")));
        assert_eq!(records[0].relationships["teams"].records.len(), 0);
        assert_eq!(
            records[0].relationships["positions"].cardinality,
            Cardinality::Many
        );
    }

    #[test]
    fn test_single_and_null_data() {
        let one = parse_response(&response(200, json!({"data": {"type": "t", "id": 1}}))).unwrap();
        assert_eq!(one.primary_records()[0].id, "1");
        let none = parse_response(&response(200, json!({"data": null}))).unwrap();
        assert!(none.primary_records().is_empty());
    }
}
