//! # Query Descriptors
//!
//! Normalizes the raw parameter mapping of a request into one
//! [`QueryDescriptor`] for the root resource plus one per relationship path
//! addressed by a dotted key.
//!
//! ## Wire shape
//!
//! The input is the nested mapping a query-string parser produces:
//!
//! ```text
//! filter[age][gt]=30            {"filter": {"age": {"gt": "30"}}}
//! filter[first_name]=Jane       {"filter": {"first_name": "Jane"}}
//! sort=-age,positions.title     {"sort": "-age,positions.title"}
//! page[size]=10                 {"page": {"size": "10"}}
//! page[positions.size]=5        {"page": {"positions.size": "5"}}
//! fields[employees]=first_name  {"fields": {"employees": "first_name"}}
//! stats[total]=count            {"stats": {"total": "count"}}
//! include=positions.department  {"include": "positions.department"}
//! ```
//!
//! ## Path routing
//!
//! A key prefixed with a relationship path (`positions.title`,
//! `positions.department.name`) applies only to the node at that path and
//! never to the root. `fields` and `extra_fields` are keyed by type name: an
//! unprefixed key applies wherever that type is rendered, a prefixed key
//! (`positions.departments`) only at that path.

use crate::error::GraphError;
use crate::include::IncludeTree;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Filter operator used for unkeyed scalar values.
pub const EQ: &str = "eq";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub field: String,
    pub direction: SortDirection,
}

impl SortField {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Wire form, optionally prefixed with a relationship path.
    pub fn to_param(&self, prefix: &str) -> String {
        let sign = match self.direction {
            SortDirection::Asc => "",
            SortDirection::Desc => "-",
        };
        format!("{sign}{}", join_path(prefix, &self.field))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub number: Option<u64>,
    pub size: Option<u64>,
}

impl Page {
    /// Rows to skip and rows to keep. A window past the addressable range
    /// skips everything rather than wrapping.
    pub fn window(&self) -> (usize, usize) {
        match self.size {
            Some(size) => {
                let number = self.number.unwrap_or(1).max(1);
                let skip = (number - 1)
                    .checked_mul(size)
                    .and_then(|skip| usize::try_from(skip).ok())
                    .unwrap_or(usize::MAX);
                (skip, usize::try_from(size).unwrap_or(usize::MAX))
            }
            None => (0, usize::MAX),
        }
    }
}

/// Field → operator → values. Several values mean "any of".
pub type Filters = BTreeMap<String, BTreeMap<String, Vec<Value>>>;

/// Normalized parameters for one node of the include tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryDescriptor {
    pub filters: Filters,
    pub sort: Vec<SortField>,
    pub page: Page,
    /// Sparse fieldsets, per type.
    pub fields: BTreeMap<String, BTreeSet<String>>,
    /// Opt-in attributes, per type.
    pub extra_fields: BTreeMap<String, BTreeSet<String>>,
    /// Stat name → aggregates (`stats[total]=count`).
    pub stats: BTreeMap<String, Vec<String>>,
}

impl QueryDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter<V: Into<Value>>(
        mut self,
        field: impl Into<String>,
        operator: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.add_filter(field, operator, values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_sort(mut self, sort: SortField) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn with_page_size(mut self, size: u64) -> Self {
        self.page.size = Some(size);
        self
    }

    pub fn add_filter(&mut self, field: impl Into<String>, operator: impl Into<String>, values: Vec<Value>) {
        self.filters
            .entry(field.into())
            .or_default()
            .insert(operator.into(), values);
    }

    pub fn filter(&self, field: &str, operator: &str) -> Option<&[Value]> {
        self.filters
            .get(field)
            .and_then(|ops| ops.get(operator))
            .map(Vec::as_slice)
    }

    /// Restricts `field` to `values`, replacing any requested operators on it.
    pub fn constrain(&mut self, field: &str, values: &[String]) {
        let mut ops = BTreeMap::new();
        ops.insert(
            EQ.to_string(),
            values.iter().cloned().map(Value::String).collect(),
        );
        self.filters.insert(field.to_string(), ops);
    }

    /// Fills in whatever the request left unspecified from `base`.
    ///
    /// Default filters apply per field (a requested filter on the same field
    /// wins), the default sort applies only when no sort was requested.
    pub fn layer_defaults(&mut self, base: &QueryDescriptor) {
        for (field, ops) in &base.filters {
            self.filters
                .entry(field.clone())
                .or_insert_with(|| ops.clone());
        }
        if self.sort.is_empty() {
            self.sort = base.sort.clone();
        }
        if self.page.size.is_none() {
            self.page.size = base.page.size;
        }
        if self.page.number.is_none() {
            self.page.number = base.page.number;
        }
        for (type_name, fields) in &base.fields {
            self.fields
                .entry(type_name.clone())
                .or_insert_with(|| fields.clone());
        }
    }
}

/// All descriptors of one request, keyed by relationship path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedQuery {
    pub include: IncludeTree,
    pub root: QueryDescriptor,
    pub nested: BTreeMap<String, QueryDescriptor>,
}

impl NormalizedQuery {
    /// Normalizes a raw parameter mapping. `null` is treated as no parameters.
    pub fn from_params(params: &Value) -> Result<Self, GraphError> {
        let params = match params {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            other => {
                return Err(GraphError::invalid(
                    "params",
                    format!("expected a mapping, got {other}"),
                ))
            }
        };

        let mut query = Self::default();
        if let Some(include) = params.get("include") {
            query.include = IncludeTree::from_json(include)?;
        }
        if let Some(filter) = params.get("filter") {
            query.parse_filters(filter)?;
        }
        if let Some(sort) = params.get("sort") {
            query.parse_sort(sort)?;
        }
        if let Some(page) = params.get("page") {
            query.parse_page(page)?;
        }
        if let Some(fields) = params.get("fields") {
            for (path, type_name, set) in parse_fieldsets("fields", fields)? {
                query.at(path.as_deref()).fields.entry(type_name).or_default().extend(set);
            }
        }
        if let Some(extra) = params.get("extra_fields") {
            for (path, type_name, set) in parse_fieldsets("extra_fields", extra)? {
                query
                    .at(path.as_deref())
                    .extra_fields
                    .entry(type_name)
                    .or_default()
                    .extend(set);
            }
        }
        if let Some(stats) = params.get("stats") {
            query.parse_stats(stats)?;
        }
        Ok(query)
    }

    /// The descriptor that applies at `path` (`""` is the root).
    ///
    /// Type-keyed fieldsets given at the root are inherited by every node.
    pub fn descriptor_for(&self, path: &str) -> QueryDescriptor {
        if path.is_empty() {
            return self.root.clone();
        }
        let mut descriptor = self.nested.get(path).cloned().unwrap_or_default();
        for (type_name, set) in &self.root.fields {
            descriptor
                .fields
                .entry(type_name.clone())
                .or_insert_with(|| set.clone());
        }
        for (type_name, set) in &self.root.extra_fields {
            descriptor
                .extra_fields
                .entry(type_name.clone())
                .or_insert_with(|| set.clone());
        }
        descriptor
    }

    /// Sparse fieldset for `type_name` as seen at `path`.
    pub fn fields_for(&self, path: &str, type_name: &str) -> Option<&BTreeSet<String>> {
        self.nested
            .get(path)
            .and_then(|d| d.fields.get(type_name))
            .or_else(|| self.root.fields.get(type_name))
    }

    /// Extra fields for `type_name` as seen at `path`.
    pub fn extra_fields_for(&self, path: &str, type_name: &str) -> Option<&BTreeSet<String>> {
        self.nested
            .get(path)
            .and_then(|d| d.extra_fields.get(type_name))
            .or_else(|| self.root.extra_fields.get(type_name))
    }

    fn at(&mut self, path: Option<&str>) -> &mut QueryDescriptor {
        match path {
            None | Some("") => &mut self.root,
            Some(path) => self.nested.entry(path.to_string()).or_default(),
        }
    }

    fn parse_filters(&mut self, filter: &Value) -> Result<(), GraphError> {
        let filter = as_map("filter", filter)?;
        for (key, value) in filter {
            let (path, field) = split_path(key);
            let parameter = format!("filter[{key}]");
            match value {
                Value::Object(ops) => {
                    for (op, raw) in ops {
                        let values = filter_values(&format!("{parameter}[{op}]"), raw)?;
                        self.at(path).add_filter(field, op.clone(), values);
                    }
                }
                scalar => {
                    let values = filter_values(&parameter, scalar)?;
                    self.at(path).add_filter(field, EQ, values);
                }
            }
        }
        Ok(())
    }

    fn parse_sort(&mut self, sort: &Value) -> Result<(), GraphError> {
        for entry in string_list("sort", sort)? {
            let (direction, key) = match entry.strip_prefix('-') {
                Some(rest) => (SortDirection::Desc, rest),
                None => (SortDirection::Asc, entry.as_str()),
            };
            if key.is_empty() {
                return Err(GraphError::invalid("sort", "empty sort attribute"));
            }
            let (path, field) = split_path(key);
            self.at(path).sort.push(SortField {
                field: field.to_string(),
                direction,
            });
        }
        Ok(())
    }

    fn parse_page(&mut self, page: &Value) -> Result<(), GraphError> {
        let page = as_map("page", page)?;
        for (key, value) in page {
            let (path, name) = split_path(key);
            let parameter = format!("page[{key}]");
            let number = positive_integer(&parameter, value)?;
            let target = &mut self.at(path).page;
            match name {
                "size" => target.size = Some(number),
                "number" => target.number = Some(number),
                other => {
                    return Err(GraphError::invalid(
                        parameter,
                        format!("unknown pagination key '{other}'"),
                    ))
                }
            }
        }
        Ok(())
    }

    fn parse_stats(&mut self, stats: &Value) -> Result<(), GraphError> {
        let stats = as_map("stats", stats)?;
        for (key, value) in stats {
            let (path, name) = split_path(key);
            let aggregates = string_list(&format!("stats[{key}]"), value)?;
            self.at(path)
                .stats
                .entry(name.to_string())
                .or_default()
                .extend(aggregates);
        }
        Ok(())
    }
}

/// Joins a relationship path and a field name with a dot.
pub fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// Splits `a.b.field` into `(Some("a.b"), "field")`.
fn split_path(key: &str) -> (Option<&str>, &str) {
    match key.rsplit_once('.') {
        Some((path, name)) => (Some(path), name),
        None => (None, key),
    }
}

fn as_map<'a>(parameter: &str, value: &'a Value) -> Result<&'a Map<String, Value>, GraphError> {
    value
        .as_object()
        .ok_or_else(|| GraphError::invalid(parameter, format!("expected a mapping, got {value}")))
}

/// Comma-separated string or list of strings.
fn string_list(parameter: &str, value: &Value) -> Result<Vec<String>, GraphError> {
    let items = match value {
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(|s| s.trim().to_string())
                    .ok_or_else(|| GraphError::invalid(parameter, format!("expected a string, got {item}")))
            })
            .collect::<Result<Vec<_>, _>>()?,
        other => {
            return Err(GraphError::invalid(
                parameter,
                format!("expected a comma-separated string, got {other}"),
            ))
        }
    };
    Ok(items)
}

fn filter_values(parameter: &str, value: &Value) -> Result<Vec<Value>, GraphError> {
    match value {
        Value::String(s) if s.contains(',') => Ok(s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string()))
            .collect()),
        Value::Array(items) => {
            if let Some(nested) = items.iter().find(|v| v.is_object() || v.is_array()) {
                return Err(GraphError::invalid(
                    parameter,
                    format!("nested value {nested} is not a filter value"),
                ));
            }
            Ok(items.clone())
        }
        Value::Object(_) => Err(GraphError::invalid(
            parameter,
            "operator values cannot be mappings",
        )),
        scalar => Ok(vec![scalar.clone()]),
    }
}

fn positive_integer(parameter: &str, value: &Value) -> Result<u64, GraphError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    match parsed {
        Some(n) if n > 0 => Ok(n),
        _ => Err(GraphError::invalid(
            parameter,
            format!("expected a positive integer, got {value}"),
        )),
    }
}

fn parse_fieldsets(
    parameter: &str,
    value: &Value,
) -> Result<Vec<(Option<String>, String, BTreeSet<String>)>, GraphError> {
    let map = as_map(parameter, value)?;
    let mut sets = Vec::with_capacity(map.len());
    for (key, list) in map {
        let (path, type_name) = split_path(key);
        let names = string_list(&format!("{parameter}[{key}]"), list)?;
        sets.push((
            path.map(str::to_string),
            type_name.to_string(),
            names.into_iter().collect(),
        ));
    }
    Ok(sets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_filter_is_equality() {
        let query = NormalizedQuery::from_params(&json!({"filter": {"first_name": "Jane"}})).unwrap();
        assert_eq!(query.root.filter("first_name", EQ), Some(&[json!("Jane")][..]));
    }

    #[test]
    fn test_operator_filter_and_lists() {
        let query = NormalizedQuery::from_params(&json!({
            "filter": {"age": {"gt": "30"}, "id": "1,2,3"}
        }))
        .unwrap();
        assert_eq!(query.root.filter("age", "gt"), Some(&[json!("30")][..]));
        assert_eq!(
            query.root.filter("id", EQ),
            Some(&[json!("1"), json!("2"), json!("3")][..])
        );
    }

    #[test]
    fn test_sort_preserves_order_and_routes_paths() {
        let query = NormalizedQuery::from_params(&json!({
            "sort": "-age,first_name,positions.department.name,-positions.title"
        }))
        .unwrap();
        assert_eq!(
            query.root.sort,
            vec![SortField::desc("age"), SortField::asc("first_name")]
        );
        assert_eq!(query.nested["positions.department"].sort, vec![SortField::asc("name")]);
        assert_eq!(query.nested["positions"].sort, vec![SortField::desc("title")]);
    }

    #[test]
    fn test_nested_page_never_applies_to_root() {
        let query = NormalizedQuery::from_params(&json!({
            "page": {"size": "10", "positions.size": 5}
        }))
        .unwrap();
        assert_eq!(query.root.page.size, Some(10));
        assert_eq!(query.nested["positions"].page.size, Some(5));
        assert_eq!(query.descriptor_for("").page.size, Some(10));
    }

    #[test]
    fn test_invalid_page_values() {
        for page in [json!({"size": "ten"}), json!({"size": 0}), json!({"cursor": 1})] {
            let err = NormalizedQuery::from_params(&json!({ "page": page })).unwrap_err();
            assert!(matches!(err, GraphError::InvalidParameterKind { .. }), "{err}");
        }
    }

    #[test]
    fn test_fieldsets_inherit_by_type() {
        let query = NormalizedQuery::from_params(&json!({
            "fields": {"employees": "first_name,age", "positions.departments": "name"},
            "extra_fields": {"employees": "salary", "positions.departments": "budget"}
        }))
        .unwrap();
        let nested = query.descriptor_for("positions");
        assert!(nested.fields["employees"].contains("age"));
        assert!(nested.fields["departments"].contains("name"));
        assert!(query.root.fields.get("departments").is_none());
        assert!(query.extra_fields_for("teams", "employees").unwrap().contains("salary"));
        assert!(query.extra_fields_for("positions", "departments").unwrap().contains("budget"));
        assert!(query.root.extra_fields.get("departments").is_none());
    }

    #[test]
    fn test_page_window() {
        let page = Page {
            number: Some(3),
            size: Some(10),
        };
        assert_eq!(page.window(), (20, 10));
        assert_eq!(Page::default().window(), (0, usize::MAX));

        let past_the_end = Page {
            number: Some(u64::MAX),
            size: Some(20),
        };
        assert_eq!(past_the_end.window(), (usize::MAX, 20));
    }

    #[test]
    fn test_stats_and_include() {
        let query = NormalizedQuery::from_params(&json!({
            "stats": {"total": "count", "age": "sum,average"},
            "include": "positions.department,teams"
        }))
        .unwrap();
        assert_eq!(query.root.stats["total"], vec!["count"]);
        assert_eq!(query.root.stats["age"], vec!["sum", "average"]);
        assert_eq!(query.include.to_param(), "positions.department,teams");
    }

    #[test]
    fn test_non_mapping_params_rejected() {
        assert!(NormalizedQuery::from_params(&json!("nope")).is_err());
        assert!(NormalizedQuery::from_params(&json!({"filter": "x"})).is_err());
        assert_eq!(NormalizedQuery::from_params(&Value::Null).unwrap(), NormalizedQuery::default());
    }

    #[test]
    fn test_layer_defaults_request_wins() {
        let base = QueryDescriptor::new()
            .with_filter("active", EQ, [true])
            .with_filter("age", "gt", [18])
            .with_sort(SortField::asc("last_name"))
            .with_page_size(25);
        let mut request = QueryDescriptor::new().with_filter("age", "gt", [40]);
        request.layer_defaults(&base);
        assert_eq!(request.filter("age", "gt"), Some(&[json!(40)][..]));
        assert_eq!(request.filter("active", EQ), Some(&[json!(true)][..]));
        assert_eq!(request.sort, vec![SortField::asc("last_name")]);
        assert_eq!(request.page.size, Some(25));
    }
}
