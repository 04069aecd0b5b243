//! # Request Context
//!
//! Everything the resolver knows about the inbound call lives here and is passed
//! down explicitly. Hooks, computed attributes and remote header injection read
//! from this object; nothing is read from ambient state.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// The controller action a request is being resolved for.
///
/// Include whitelists are declared per action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Action {
    #[default]
    Index,
    Show,
    Create,
    Update,
    Destroy,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Index => "index",
            Action::Show => "show",
            Action::Create => "create",
            Action::Update => "update",
            Action::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request state populated by the caller before resolution begins.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub action: Action,
    /// Headers forwarded to every remote call made for this request
    /// (e.g. an authorization token taken from the inbound request).
    pub headers: BTreeMap<String, String>,
    /// Free-form values available to hooks and computed attributes.
    pub values: Map<String, Value>,
}

impl RequestContext {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}
