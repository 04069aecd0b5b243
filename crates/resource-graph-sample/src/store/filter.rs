//! # Row Filtering
//!
//! [`TableQuery`] is the store-side form of a validated
//! [`QueryDescriptor`]: typed operators, sort keys and a page window. It is
//! plain data so it can travel inside a [`TableRequest`](super::TableRequest)
//! and be evaluated by the owning actor.
//!
//! | Operator | Meaning |
//! |----------|---------|
//! | `eq` / `not_eq` | any of the values matches / none does |
//! | `gt` `gte` `lt` `lte` | numeric, else lexicographic comparison |
//! | `prefix` / `suffix` | string starts / ends with |
//! | `match` | case-insensitive substring |

use super::error::StoreError;
use resource_graph::{canonical_id, Page, QueryDescriptor, Record, SortDirection, SortField};
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Prefix,
    Suffix,
    Match,
}

impl FromStr for Operator {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(Operator::Eq),
            "not_eq" => Ok(Operator::NotEq),
            "gt" => Ok(Operator::Gt),
            "gte" => Ok(Operator::Gte),
            "lt" => Ok(Operator::Lt),
            "lte" => Ok(Operator::Lte),
            "prefix" => Ok(Operator::Prefix),
            "suffix" => Ok(Operator::Suffix),
            "match" => Ok(Operator::Match),
            other => Err(StoreError::UnsupportedOperator(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub values: Vec<Value>,
}

impl Condition {
    fn matches(&self, record: &Record) -> bool {
        let actual = field_value(record, &self.field);
        match self.operator {
            Operator::Eq => self.values.iter().any(|v| same(&actual, v)),
            Operator::NotEq => !self.values.iter().any(|v| same(&actual, v)),
            Operator::Gt => self.any_ordering(&actual, |o| o == Ordering::Greater),
            Operator::Gte => self.any_ordering(&actual, |o| o != Ordering::Less),
            Operator::Lt => self.any_ordering(&actual, |o| o == Ordering::Less),
            Operator::Lte => self.any_ordering(&actual, |o| o != Ordering::Greater),
            Operator::Prefix => self.any_text(&actual, |a, v| a.starts_with(v)),
            Operator::Suffix => self.any_text(&actual, |a, v| a.ends_with(v)),
            Operator::Match => self.any_text(&actual, |a, v| {
                a.to_lowercase().contains(&v.to_lowercase())
            }),
        }
    }

    fn any_ordering(&self, actual: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
        if actual.is_null() {
            return false;
        }
        self.values
            .iter()
            .any(|v| compare(actual, v).is_some_and(&accept))
    }

    fn any_text(&self, actual: &Value, accept: impl Fn(&str, &str) -> bool) -> bool {
        let Some(actual) = text(actual) else {
            return false;
        };
        self.values
            .iter()
            .filter_map(text)
            .any(|v| accept(actual.as_str(), v.as_str()))
    }
}

/// A query a [`TableActor`](super::TableActor) can evaluate against its rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableQuery {
    pub conditions: Vec<Condition>,
    pub sort: Vec<SortField>,
    pub page: Page,
}

impl TableQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translates a validated descriptor. Fails on operators the store does
    /// not implement.
    pub fn from_descriptor(descriptor: &QueryDescriptor) -> Result<Self, StoreError> {
        let mut conditions = Vec::new();
        for (field, operators) in &descriptor.filters {
            for (operator, values) in operators {
                conditions.push(Condition {
                    field: field.clone(),
                    operator: operator.parse()?,
                    values: values.clone(),
                });
            }
        }
        Ok(Self {
            conditions,
            sort: descriptor.sort.clone(),
            page: descriptor.page,
        })
    }

    pub fn with_condition(mut self, field: impl Into<String>, operator: Operator, values: Vec<Value>) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            operator,
            values,
        });
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }

    /// Matching rows in sort order, without pagination.
    pub fn select<'a>(&self, rows: impl Iterator<Item = &'a Record>) -> Vec<&'a Record> {
        let mut selected: Vec<&Record> = rows.filter(|r| self.matches(r)).collect();
        if !self.sort.is_empty() {
            selected.sort_by(|a, b| self.ordering(a, b));
        }
        selected
    }

    /// Matching rows, sorted and cut to the requested page.
    pub fn apply<'a>(&self, rows: impl Iterator<Item = &'a Record>) -> Vec<Record> {
        let selected = self.select(rows);
        let (skip, take) = self.page.window();
        selected.into_iter().skip(skip).take(take).cloned().collect()
    }

    fn ordering(&self, a: &Record, b: &Record) -> Ordering {
        for key in &self.sort {
            let left = field_value(a, &key.field);
            let right = field_value(b, &key.field);
            let ordering = match (left.is_null(), right.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                (false, false) => compare(&left, &right).unwrap_or(Ordering::Equal),
            };
            let ordering = match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// Computes `stats[name]=aggregate,...` over `rows`.
///
/// `count` counts rows whatever the name; the other aggregates read the
/// attribute called `name`.
pub fn aggregate(
    rows: &[&Record],
    stats: &BTreeMap<String, Vec<String>>,
) -> Result<Map<String, Value>, StoreError> {
    let mut result = Map::new();
    for (name, aggregates) in stats {
        let values: Vec<Value> = rows
            .iter()
            .map(|r| field_value(r, name))
            .filter(|v| !v.is_null())
            .collect();
        let numbers: Vec<f64> = values.iter().filter_map(number).collect();
        let mut computed = Map::new();
        for aggregate in aggregates {
            let value = match aggregate.as_str() {
                "count" => Value::from(rows.len()),
                "sum" => float(numbers.iter().sum()),
                "average" if numbers.is_empty() => Value::Null,
                "average" => float(numbers.iter().sum::<f64>() / numbers.len() as f64),
                "maximum" => extreme(&values, Ordering::Greater),
                "minimum" => extreme(&values, Ordering::Less),
                other => return Err(StoreError::UnsupportedAggregate(other.to_string())),
            };
            computed.insert(aggregate.clone(), value);
        }
        result.insert(name.clone(), Value::Object(computed));
    }
    Ok(result)
}

fn field_value(record: &Record, field: &str) -> Value {
    if field == "id" {
        return Value::String(record.id.clone());
    }
    record.attribute(field).cloned().unwrap_or(Value::Null)
}

fn same(actual: &Value, expected: &Value) -> bool {
    match (canonical_id(actual), canonical_id(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => actual == expected,
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (number(left), number(right)) {
        return a.partial_cmp(&b);
    }
    match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn extreme(values: &[Value], wanted: Ordering) -> Value {
    values
        .iter()
        .fold(None::<&Value>, |best, v| match best {
            Some(b) if compare(v, b) != Some(wanted) => Some(b),
            _ => Some(v),
        })
        .cloned()
        .unwrap_or(Value::Null)
}

fn float(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Vec<Record> {
        vec![
            Record::new("employees", 1)
                .with_attribute("first_name", "Jane")
                .with_attribute("age", 40),
            Record::new("employees", 2)
                .with_attribute("first_name", "Joe")
                .with_attribute("age", 25),
            Record::new("employees", 3)
                .with_attribute("first_name", "Anna")
                .with_attribute("age", 33),
        ]
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_operators() {
        let rows = rows();
        let gt = TableQuery::new().with_condition("age", Operator::Gt, vec![json!(30)]);
        assert_eq!(ids(&gt.apply(rows.iter())), vec!["1", "3"]);

        let prefix = TableQuery::new().with_condition("first_name", Operator::Prefix, vec![json!("Jo")]);
        assert_eq!(ids(&prefix.apply(rows.iter())), vec!["2"]);

        let matched = TableQuery::new().with_condition("first_name", Operator::Match, vec![json!("AN")]);
        assert_eq!(ids(&matched.apply(rows.iter())), vec!["1", "3"]);

        let not_eq = TableQuery::new().with_condition("id", Operator::NotEq, vec![json!(1), json!("2")]);
        assert_eq!(ids(&not_eq.apply(rows.iter())), vec!["3"]);
    }

    #[test]
    fn test_sort_and_page() {
        let rows = rows();
        let mut query = TableQuery::new();
        query.sort = vec![SortField::desc("age")];
        query.page = Page {
            number: Some(2),
            size: Some(2),
        };
        assert_eq!(ids(&query.apply(rows.iter())), vec!["2"]);
    }

    #[test]
    fn test_page_past_the_end_is_empty() {
        let rows = rows();
        let mut query = TableQuery::new();
        query.page = Page {
            number: Some(u64::MAX),
            size: Some(20),
        };
        assert!(query.apply(rows.iter()).is_empty());

        query.page.number = Some(0);
        assert_eq!(ids(&query.apply(rows.iter())), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_from_descriptor_rejects_unknown_operator() {
        let descriptor = QueryDescriptor::new().with_filter("age", "between", [1]);
        assert!(matches!(
            TableQuery::from_descriptor(&descriptor),
            Err(StoreError::UnsupportedOperator(op)) if op == "between"
        ));
    }

    #[test]
    fn test_aggregates() {
        let rows = rows();
        let selected: Vec<&Record> = rows.iter().collect();
        let mut stats = BTreeMap::new();
        stats.insert("total".to_string(), vec!["count".to_string()]);
        stats.insert(
            "age".to_string(),
            vec!["sum".into(), "average".into(), "maximum".into(), "minimum".into()],
        );
        let result = aggregate(&selected, &stats).unwrap();
        assert_eq!(result["total"], json!({"count": 3}));
        assert_eq!(result["age"]["sum"], json!(98.0));
        assert_eq!(result["age"]["maximum"], json!(40));
        assert_eq!(result["age"]["minimum"], json!(25));

        stats.insert("age".to_string(), vec!["median".to_string()]);
        assert!(aggregate(&selected, &stats).is_err());
    }
}
