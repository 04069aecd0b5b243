//! # Resource Configuration & Registry
//!
//! A [`ResourceConfig`] declares everything the resolver needs to know about a
//! resource type: its attributes and their semantic types, its relationships,
//! its default base query, an optional parameter hook, its include whitelist
//! and, for resources served by another service, its [`RemoteEndpoint`].
//!
//! Configurations are built once at startup and registered in a
//! [`ResourceRegistry`], which is shared read-only (`Arc`) by every request.
//!
//! ```rust
//! use resource_graph::{Attribute, AttributeType, Relationship, ResourceConfig, ResourceRegistry};
//!
//! let registry = ResourceRegistry::new()
//!     .register(
//!         ResourceConfig::new("employees")
//!             .attribute(Attribute::new("first_name", AttributeType::String))
//!             .relationship(Relationship::has_many("positions", "positions", "employee_id")),
//!     )
//!     .register(
//!         ResourceConfig::new("positions")
//!             .attribute(Attribute::new("title", AttributeType::String))
//!             .attribute(Attribute::new("employee_id", AttributeType::Integer)),
//!     );
//! assert!(registry.get("employees").is_ok());
//! ```

use crate::context::{Action, RequestContext};
use crate::error::GraphError;
use crate::include::{IncludeTree, IncludeWhitelist};
use crate::query::{QueryDescriptor, SortField};
use crate::record::{Cardinality, Record};
use chrono::{DateTime, NaiveDate};
use serde_json::{Number, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Computes an attribute value from a record at serialization time.
pub type ComputeFn = Arc<dyn Fn(&Record, &RequestContext) -> Value + Send + Sync>;

/// Transforms the request descriptor of a node before it is validated.
pub type ParamHook =
    Arc<dyn Fn(&mut QueryDescriptor, &RequestContext) -> Result<(), GraphError> + Send + Sync>;

/// Semantic type of an attribute, used to coerce filter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Integer,
    Float,
    Boolean,
    /// ISO-8601 calendar date (`2024-03-01`).
    Date,
    /// RFC 3339 timestamp.
    Datetime,
    /// Any JSON value, passed through untouched.
    Json,
}

impl AttributeType {
    /// Coerces a wire value to this type. `null` always passes.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        if value.is_null() {
            return Some(Value::Null);
        }
        match self {
            AttributeType::String => match value {
                Value::String(_) => Some(value.clone()),
                Value::Number(n) => Some(Value::String(n.to_string())),
                Value::Bool(b) => Some(Value::String(b.to_string())),
                _ => None,
            },
            AttributeType::Integer => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
                Value::Number(n) => n
                    .as_f64()
                    .filter(|f| f.fract() == 0.0)
                    .map(|f| Value::from(f as i64)),
                Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
                _ => None,
            },
            AttributeType::Float => match value {
                Value::Number(_) => Some(value.clone()),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number),
                _ => None,
            },
            AttributeType::Boolean => match value {
                Value::Bool(_) => Some(value.clone()),
                Value::String(s) => match s.trim() {
                    "true" | "1" => Some(Value::Bool(true)),
                    "false" | "0" => Some(Value::Bool(false)),
                    _ => None,
                },
                Value::Number(n) => match n.as_u64() {
                    Some(1) => Some(Value::Bool(true)),
                    Some(0) => Some(Value::Bool(false)),
                    _ => None,
                },
                _ => None,
            },
            AttributeType::Date => value
                .as_str()
                .filter(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok())
                .map(|s| Value::String(s.to_string())),
            AttributeType::Datetime => value
                .as_str()
                .filter(|s| DateTime::parse_from_rfc3339(s).is_ok())
                .map(|s| Value::String(s.to_string())),
            AttributeType::Json => Some(value.clone()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AttributeType::String => "string",
            AttributeType::Integer => "integer",
            AttributeType::Float => "float",
            AttributeType::Boolean => "boolean",
            AttributeType::Date => "date",
            AttributeType::Datetime => "datetime",
            AttributeType::Json => "json",
        }
    }
}

/// A declared attribute.
#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    pub kind: AttributeType,
    pub readable: bool,
    pub filterable: bool,
    pub sortable: bool,
    /// Rendered only when requested through `extra_fields`.
    pub extra: bool,
    compute: Option<ComputeFn>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, kind: AttributeType) -> Self {
        Self {
            name: name.into(),
            kind,
            readable: true,
            filterable: true,
            sortable: true,
            extra: false,
            compute: None,
        }
    }

    /// An attribute whose value is computed from the record when rendered.
    ///
    /// Computed attributes cannot be filtered or sorted on.
    pub fn computed(
        name: impl Into<String>,
        kind: AttributeType,
        compute: impl Fn(&Record, &RequestContext) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            filterable: false,
            sortable: false,
            compute: Some(Arc::new(compute)),
            ..Self::new(name, kind)
        }
    }

    pub fn extra(mut self) -> Self {
        self.extra = true;
        self
    }

    pub fn unreadable(mut self) -> Self {
        self.readable = false;
        self
    }

    pub fn not_filterable(mut self) -> Self {
        self.filterable = false;
        self
    }

    pub fn not_sortable(mut self) -> Self {
        self.sortable = false;
        self
    }

    pub fn is_computed(&self) -> bool {
        self.compute.is_some()
    }

    /// The rendered value of this attribute for `record`.
    pub fn value(&self, record: &Record, context: &RequestContext) -> Value {
        match &self.compute {
            Some(compute) => compute(record, context),
            None => record.attribute(&self.name).cloned().unwrap_or(Value::Null),
        }
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("readable", &self.readable)
            .field("filterable", &self.filterable)
            .field("sortable", &self.sortable)
            .field("extra", &self.extra)
            .field("computed", &self.is_computed())
            .finish()
    }
}

/// Which side of a relationship holds the foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    /// Children carry `foreign_key` pointing at the parent's `primary_key`.
    HasMany,
    /// Like `HasMany`, but at most one child is attached.
    HasOne,
    /// The parent carries `foreign_key` pointing at the child's `primary_key`.
    BelongsTo,
}

/// Where the records of a relationship come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationshipTarget {
    /// A registered resource, looked up by key when the relationship is resolved.
    Resource(String),
    /// An undeclared remote endpoint; its configuration is inferred from the URL.
    Remote { url: String, type_name: String },
}

#[derive(Debug, Clone)]
pub struct Relationship {
    pub name: String,
    pub kind: RelationshipKind,
    pub target: RelationshipTarget,
    pub foreign_key: String,
    pub primary_key: String,
}

impl Relationship {
    fn build(
        name: impl Into<String>,
        kind: RelationshipKind,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            target: RelationshipTarget::Resource(target.into()),
            foreign_key: foreign_key.into(),
            primary_key: "id".to_string(),
        }
    }

    pub fn has_many(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::build(name, RelationshipKind::HasMany, target, foreign_key)
    }

    pub fn has_one(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::build(name, RelationshipKind::HasOne, target, foreign_key)
    }

    pub fn belongs_to(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::build(name, RelationshipKind::BelongsTo, target, foreign_key)
    }

    /// Points this relationship at an undeclared remote endpoint.
    pub fn remote(mut self, url: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.target = RelationshipTarget::Remote {
            url: url.into(),
            type_name: type_name.into(),
        };
        self
    }

    pub fn primary_key(mut self, key: impl Into<String>) -> Self {
        self.primary_key = key.into();
        self
    }

    pub fn cardinality(&self) -> Cardinality {
        match self.kind {
            RelationshipKind::HasMany => Cardinality::Many,
            RelationshipKind::HasOne | RelationshipKind::BelongsTo => Cardinality::One,
        }
    }

    /// Registry key of the target resource.
    pub fn target_key(&self) -> String {
        match &self.target {
            RelationshipTarget::Resource(key) => key.clone(),
            RelationshipTarget::Remote { url, .. } => remote_key(url),
        }
    }
}

/// Synthetic registry key for an anonymous remote resource.
pub fn remote_key(url: &str) -> String {
    format!("remote:{url}")
}

/// Location and call settings of a remote JSON:API service.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEndpoint {
    /// Scheme, host and any shared path prefix (`http://foo.com/api/v1`).
    pub base_url: String,
    /// Path of this resource below the base (`/employees`).
    pub path: String,
    pub timeout: Option<Duration>,
    pub open_timeout: Option<Duration>,
    /// Headers layered over every other header on calls to this endpoint.
    pub headers: BTreeMap<String, String>,
}

impl RemoteEndpoint {
    pub fn new(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            path,
            timeout: None,
            open_timeout: None,
            headers: BTreeMap::new(),
        }
    }

    /// Splits a full resource URL at its last path segment:
    /// `http://foo.com/api/v1/employees` has base `http://foo.com/api/v1`.
    pub fn from_url(url: &str) -> Self {
        let trimmed = url.trim_end_matches('/');
        let authority_start = trimmed.find("://").map(|i| i + 3).unwrap_or(0);
        match trimmed[authority_start..].rfind('/') {
            Some(split) => {
                let split = authority_start + split;
                Self::new(&trimmed[..split], &trimmed[split..])
            }
            None => Self::new(trimmed, "/"),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = Some(timeout);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, self.path)
    }
}

/// Immutable declaration of one resource type.
#[derive(Clone)]
pub struct ResourceConfig {
    pub type_name: String,
    pub attributes: Vec<Attribute>,
    pub relationships: Vec<Relationship>,
    /// Filters, sort and page size applied when the request leaves them out.
    pub base_query: QueryDescriptor,
    pub max_page_size: Option<u64>,
    pub remote: Option<RemoteEndpoint>,
    pub whitelist: IncludeWhitelist,
    param_hook: Option<ParamHook>,
}

impl ResourceConfig {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            attributes: Vec::new(),
            relationships: Vec::new(),
            base_query: QueryDescriptor::default(),
            max_page_size: None,
            remote: None,
            whitelist: IncludeWhitelist::default(),
            param_hook: None,
        }
    }

    /// Configuration inferred for an undeclared remote endpoint.
    ///
    /// It declares no attributes, so filters and sorts are forwarded without
    /// validation and every attribute the service returns is rendered.
    pub fn anonymous_remote(url: &str, type_name: impl Into<String>) -> Self {
        Self::new(type_name).remote(RemoteEndpoint::from_url(url))
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn remote(mut self, endpoint: RemoteEndpoint) -> Self {
        self.remote = Some(endpoint);
        self
    }

    pub fn default_filter<V: Into<Value>>(
        mut self,
        field: impl Into<String>,
        operator: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.base_query = self.base_query.with_filter(field, operator, values);
        self
    }

    pub fn default_sort(mut self, sort: SortField) -> Self {
        self.base_query.sort.push(sort);
        self
    }

    pub fn default_page_size(mut self, size: u64) -> Self {
        self.base_query.page.size = Some(size);
        self
    }

    pub fn max_page_size(mut self, size: u64) -> Self {
        self.max_page_size = Some(size);
        self
    }

    pub fn allow_includes(mut self, action: Action, tree: IncludeTree) -> Self {
        self.whitelist = self.whitelist.allow(action, tree);
        self
    }

    pub fn on_params(
        mut self,
        hook: impl Fn(&mut QueryDescriptor, &RequestContext) -> Result<(), GraphError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.param_hook = Some(Arc::new(hook));
        self
    }

    pub fn is_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Resources without declared attributes skip parameter validation and
    /// render whatever attributes their records carry.
    pub fn is_schemaless(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn find_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn find_relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name == name)
    }

    pub(crate) fn param_hook(&self) -> Option<&ParamHook> {
        self.param_hook.as_ref()
    }

    /// Whether `other` is served from the same remote base URL.
    pub fn shares_base_url(&self, other: &ResourceConfig) -> bool {
        match (&self.remote, &other.remote) {
            (Some(a), Some(b)) => a.base_url == b.base_url,
            _ => false,
        }
    }
}

impl fmt::Debug for ResourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceConfig")
            .field("type_name", &self.type_name)
            .field("attributes", &self.attributes)
            .field("relationships", &self.relationships)
            .field("base_query", &self.base_query)
            .field("max_page_size", &self.max_page_size)
            .field("remote", &self.remote)
            .field("whitelist", &self.whitelist)
            .field("param_hook", &self.param_hook.is_some())
            .finish()
    }
}

/// Process-wide map from resource key to configuration.
///
/// Built once, then shared behind an `Arc` and never mutated.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    resources: HashMap<String, Arc<ResourceConfig>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `config` under its type name.
    pub fn register(self, config: ResourceConfig) -> Self {
        let key = config.type_name.clone();
        self.register_as(key, config)
    }

    /// Registers `config` under an explicit key.
    ///
    /// Relationships pointing at undeclared remote endpoints get an inferred
    /// configuration registered under `remote:<url>`.
    pub fn register_as(mut self, key: impl Into<String>, config: ResourceConfig) -> Self {
        for relationship in &config.relationships {
            if let RelationshipTarget::Remote { url, type_name } = &relationship.target {
                self.resources
                    .entry(remote_key(url))
                    .or_insert_with(|| Arc::new(ResourceConfig::anonymous_remote(url, type_name.clone())));
            }
        }
        self.resources.insert(key.into(), Arc::new(config));
        self
    }

    pub fn get(&self, key: &str) -> Result<Arc<ResourceConfig>, GraphError> {
        self.resources
            .get(key)
            .cloned()
            .ok_or_else(|| GraphError::UnknownResource(key.to_string()))
    }

    /// Configuration of the resource a relationship points at.
    pub fn target(&self, relationship: &Relationship) -> Result<Arc<ResourceConfig>, GraphError> {
        self.get(&relationship.target_key())
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_integer() {
        let kind = AttributeType::Integer;
        assert_eq!(kind.coerce(&json!("42")), Some(json!(42)));
        assert_eq!(kind.coerce(&json!(42)), Some(json!(42)));
        assert_eq!(kind.coerce(&json!(2.0)), Some(json!(2)));
        assert_eq!(kind.coerce(&json!("forty")), None);
        assert_eq!(kind.coerce(&json!(true)), None);
        assert_eq!(kind.coerce(&Value::Null), Some(Value::Null));
    }

    #[test]
    fn test_coerce_boolean_and_dates() {
        assert_eq!(AttributeType::Boolean.coerce(&json!("true")), Some(json!(true)));
        assert_eq!(AttributeType::Boolean.coerce(&json!("yes")), None);
        assert_eq!(AttributeType::Date.coerce(&json!("2024-02-29")), Some(json!("2024-02-29")));
        assert_eq!(AttributeType::Date.coerce(&json!("2023-02-29")), None);
        assert!(AttributeType::Datetime.coerce(&json!("2024-01-01T10:00:00Z")).is_some());
        assert_eq!(AttributeType::String.coerce(&json!(5)), Some(json!("5")));
    }

    #[test]
    fn test_endpoint_from_url() {
        let endpoint = RemoteEndpoint::from_url("http://foo.com/api/v1/employees");
        assert_eq!(endpoint.base_url, "http://foo.com/api/v1");
        assert_eq!(endpoint.path, "/employees");
        assert_eq!(endpoint.url(), "http://foo.com/api/v1/employees");

        let bare = RemoteEndpoint::from_url("http://foo.com");
        assert_eq!(bare.base_url, "http://foo.com");
        assert_eq!(bare.path, "/");
    }

    #[test]
    fn test_registry_infers_anonymous_remote_targets() {
        let registry = ResourceRegistry::new().register(
            ResourceConfig::new("employees").relationship(
                Relationship::has_many("notes", "notes", "employee_id")
                    .remote("http://notes.example.com/api/notes", "notes"),
            ),
        );
        let employees = registry.get("employees").unwrap();
        let notes = registry
            .target(employees.find_relationship("notes").unwrap())
            .unwrap();
        assert!(notes.is_remote());
        assert!(notes.is_schemaless());
        assert_eq!(notes.type_name, "notes");
        assert!(registry.get("remote:http://notes.example.com/api/notes").is_ok());
    }

    #[test]
    fn test_unknown_resource() {
        let err = ResourceRegistry::new().get("ghosts").unwrap_err();
        assert!(matches!(err, GraphError::UnknownResource(key) if key == "ghosts"));
    }

    #[test]
    fn test_shares_base_url() {
        let a = ResourceConfig::new("employees")
            .remote(RemoteEndpoint::from_url("http://foo.com/api/v1/employees"));
        let b = ResourceConfig::new("positions")
            .remote(RemoteEndpoint::from_url("http://foo.com/api/v1/positions"));
        let c = ResourceConfig::new("teams")
            .remote(RemoteEndpoint::from_url("http://bar.com/api/v1/teams"));
        assert!(a.shares_base_url(&b));
        assert!(!a.shares_base_url(&c));
        assert!(!a.shares_base_url(&ResourceConfig::new("local")));
    }

    #[test]
    fn test_computed_attribute_reads_record_and_context() {
        let attribute = Attribute::computed("greeting", AttributeType::String, |record, ctx| {
            let name = record.attribute("first_name").and_then(Value::as_str).unwrap_or("");
            let salutation = ctx.value("salutation").and_then(Value::as_str).unwrap_or("Hi");
            json!(format!("{salutation} {name}"))
        });
        let record = Record::new("employees", 1).with_attribute("first_name", "Jane");
        let ctx = RequestContext::default().with_value("salutation", "Hello");
        assert_eq!(attribute.value(&record, &ctx), json!("Hello Jane"));
        assert!(!attribute.filterable);
    }
}
