//! # Include Trees
//!
//! Parses `include=positions.department,teams` (or the nested JSON form used
//! to declare whitelists) into an [`IncludeTree`] and intersects it with the
//! per-action [`IncludeWhitelist`] of the root resource.
//!
//! Overlapping paths merge: `a.b,a.c` yields a single `a` node with two
//! children. Children are kept in a `BTreeMap`, so iteration and
//! re-serialization are deterministic regardless of request order.
//!
//! Whitelist pruning is silent. A requested path that the whitelist does not
//! contain is dropped, never reported as an error.

use crate::context::Action;
use crate::error::GraphError;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;

/// A tree of relationship names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeTree {
    children: BTreeMap<String, IncludeTree>,
}

impl IncludeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a comma-separated list of dotted paths.
    ///
    /// Whitespace around segments and empty segments are ignored, so
    /// `" a.b , ,c"` is the same as `"a.b,c"`.
    pub fn parse(expression: &str) -> Self {
        let mut tree = Self::new();
        for path in expression.split(',') {
            tree.insert_path(path.split('.').map(str::trim).filter(|s| !s.is_empty()));
        }
        tree
    }

    /// Parses the nested JSON form.
    ///
    /// Strings are parsed like [`IncludeTree::parse`], arrays merge their
    /// elements and objects nest each value under its key:
    /// `["blog", {"comments": "author"}]` allows `blog` and `comments.author`.
    pub fn from_json(value: &Value) -> Result<Self, GraphError> {
        let mut tree = Self::new();
        match value {
            Value::Null => {}
            Value::String(expression) => tree = Self::parse(expression),
            Value::Array(items) => {
                for item in items {
                    tree.merge(Self::from_json(item)?);
                }
            }
            Value::Object(map) => {
                for (key, nested) in map {
                    let mut node = Self::new();
                    let segments: Vec<&str> =
                        key.split('.').map(str::trim).filter(|s| !s.is_empty()).collect();
                    node.insert_path(segments.iter().copied());
                    node.graft(&segments, Self::from_json(nested)?);
                    tree.merge(node);
                }
            }
            other => {
                return Err(GraphError::invalid(
                    "include",
                    format!("expected a string, list or map, got {other}"),
                ))
            }
        }
        Ok(tree)
    }

    /// Adds one path, creating intermediate nodes as needed.
    pub fn insert_path<I, S>(&mut self, path: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut node = self;
        for segment in path {
            node = node.children.entry(segment.into()).or_default();
        }
    }

    /// Merges `other` into `self`, unioning children at every level.
    pub fn merge(&mut self, other: IncludeTree) {
        for (name, subtree) in other.children {
            self.children.entry(name).or_default().merge(subtree);
        }
    }

    fn graft(&mut self, at: &[&str], subtree: IncludeTree) {
        match at.split_first() {
            None => self.merge(subtree),
            Some((head, rest)) => self
                .children
                .entry((*head).to_string())
                .or_default()
                .graft(rest, subtree),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn child(&self, name: &str) -> Option<&IncludeTree> {
        self.children.get(name)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &IncludeTree)> {
        self.children.iter().map(|(name, tree)| (name.as_str(), tree))
    }

    pub fn insert_child(&mut self, name: impl Into<String>, subtree: IncludeTree) {
        self.children.entry(name.into()).or_default().merge(subtree);
    }

    /// Whether the full path exists in this tree.
    pub fn contains_path(&self, path: &[&str]) -> bool {
        match path.split_first() {
            None => true,
            Some((head, rest)) => self
                .children
                .get(*head)
                .is_some_and(|child| child.contains_path(rest)),
        }
    }

    /// Keeps exactly the nodes present in both trees.
    pub fn intersect(&self, whitelist: &IncludeTree) -> IncludeTree {
        let mut kept = IncludeTree::new();
        for (name, subtree) in &self.children {
            match whitelist.children.get(name) {
                Some(allowed) => {
                    kept.children.insert(name.clone(), subtree.intersect(allowed));
                }
                None => debug!(include = %name, "Pruned include outside whitelist"),
            }
        }
        kept
    }

    /// Dotted paths of every leaf, in lexicographic order.
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for (name, subtree) in &self.children {
            if subtree.is_empty() {
                paths.push(name.clone());
            } else {
                paths.extend(
                    subtree
                        .leaf_paths()
                        .into_iter()
                        .map(|rest| format!("{name}.{rest}")),
                );
            }
        }
        paths
    }

    /// Dotted paths of every node (leaves and intermediate nodes).
    pub fn node_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        for (name, subtree) in &self.children {
            paths.push(name.clone());
            paths.extend(
                subtree
                    .node_paths()
                    .into_iter()
                    .map(|rest| format!("{name}.{rest}")),
            );
        }
        paths
    }

    /// The `include` query parameter value for this tree.
    pub fn to_param(&self) -> String {
        self.leaf_paths().join(",")
    }
}

impl fmt::Display for IncludeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_param())
    }
}

impl From<&str> for IncludeTree {
    fn from(expression: &str) -> Self {
        Self::parse(expression)
    }
}

/// Include paths a resource allows, per action.
///
/// An action without an entry allows every include.
#[derive(Debug, Clone, Default)]
pub struct IncludeWhitelist {
    actions: HashMap<Action, IncludeTree>,
}

impl IncludeWhitelist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, action: Action, tree: IncludeTree) -> Self {
        self.actions.entry(action).or_default().merge(tree);
        self
    }

    pub fn for_action(&self, action: Action) -> Option<&IncludeTree> {
        self.actions.get(&action)
    }

    /// Prunes `requested` down to what `action` allows.
    pub fn apply(&self, action: Action, requested: &IncludeTree) -> IncludeTree {
        match self.actions.get(&action) {
            Some(allowed) => requested.intersect(allowed),
            None => requested.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_merges_overlapping_paths() {
        let tree = IncludeTree::parse("a.b,a.c");
        let a = tree.child("a").unwrap();
        assert_eq!(tree.children().count(), 1);
        assert!(a.child("b").is_some());
        assert!(a.child("c").is_some());
    }

    #[test]
    fn test_parse_ignores_blank_segments() {
        assert_eq!(IncludeTree::parse(" a.b , ,c"), IncludeTree::parse("a.b,c"));
        assert!(IncludeTree::parse("").is_empty());
    }

    #[test]
    fn test_to_param_is_order_independent() {
        let left = IncludeTree::parse("teams,positions.department");
        let right = IncludeTree::parse("positions.department,teams");
        assert_eq!(left.to_param(), "positions.department,teams");
        assert_eq!(left.to_param(), right.to_param());
    }

    #[test]
    fn test_from_json_nested_form() {
        let tree = IncludeTree::from_json(&json!(["blog", {"comments": "author"}])).unwrap();
        assert!(tree.contains_path(&["blog"]));
        assert!(tree.contains_path(&["comments", "author"]));
        assert!(!tree.contains_path(&["author"]));
    }

    #[test]
    fn test_from_json_rejects_numbers() {
        let err = IncludeTree::from_json(&json!(5)).unwrap_err();
        assert!(matches!(err, GraphError::InvalidParameterKind { .. }));
    }

    #[test]
    fn test_whitelist_prunes_unlisted_paths() {
        let whitelist = IncludeWhitelist::new().allow(
            Action::Show,
            IncludeTree::from_json(&json!(["blog", {"comments": "author"}])).unwrap(),
        );
        let requested = IncludeTree::parse("positions.department,teams");
        let pruned = whitelist.apply(Action::Show, &requested);
        assert!(pruned.is_empty());

        // Actions without an entry allow everything.
        assert_eq!(whitelist.apply(Action::Index, &requested), requested);
    }

    #[test]
    fn test_intersection_is_exact() {
        let whitelist = IncludeTree::parse("comments.author,blog");
        let requested = IncludeTree::parse("comments.author.avatar,comments.post,blog,tags");
        let kept = requested.intersect(&whitelist);
        assert_eq!(kept.leaf_paths(), vec!["blog", "comments.author"]);
    }

    #[test]
    fn test_node_paths_include_intermediate_nodes() {
        let tree = IncludeTree::parse("positions.department,teams");
        assert_eq!(
            tree.node_paths(),
            vec!["positions", "positions.department", "teams"]
        );
    }
}
