//! # Scope Resolver
//!
//! Turns the requested descriptor of one include-tree node into something
//! executable: a validated [`QueryDescriptor`] for the local adapter, or a
//! [`RemoteRequest`] for a remote service.
//!
//! Preparation runs in a fixed order:
//!
//! 1. the resource's parameter hook, with the request context
//! 2. the resource's default base query, layered under the request
//! 3. the configured default page size (local roots only)
//! 4. attribute validation and filter value coercion
//! 5. the page size cap

use crate::config::ResolverConfig;
use crate::context::RequestContext;
use crate::error::GraphError;
use crate::include::IncludeTree;
use crate::query::{join_path, QueryDescriptor};
use crate::resource::ResourceConfig;
use crate::transport::{RemoteRequest, JSONAPI_CONTENT_TYPE};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// An executable query for one node.
#[derive(Debug, Clone, PartialEq)]
pub enum Scope<S> {
    Local(S),
    Remote(RemoteRequest),
}

/// Applies hook, defaults, validation and limits to the descriptor at `path`.
pub fn prepare_descriptor(
    resource: &ResourceConfig,
    mut descriptor: QueryDescriptor,
    path: &str,
    is_root: bool,
    context: &RequestContext,
    config: &ResolverConfig,
) -> Result<QueryDescriptor, GraphError> {
    if let Some(hook) = resource.param_hook() {
        hook(&mut descriptor, context)?;
    }
    descriptor.layer_defaults(&resource.base_query);
    if is_root && !resource.is_remote() && descriptor.page.size.is_none() {
        descriptor.page.size = Some(config.default_page_size);
    }
    validate(resource, &mut descriptor, path)?;

    let limit = resource.max_page_size.unwrap_or(config.max_page_size);
    if let Some(size) = descriptor.page.size {
        if size > limit {
            return Err(GraphError::invalid(
                format!("page[{}]", join_path(path, "size")),
                format!("{size} exceeds the maximum page size of {limit}"),
            ));
        }
    }
    Ok(descriptor)
}

fn validate(resource: &ResourceConfig, descriptor: &mut QueryDescriptor, path: &str) -> Result<(), GraphError> {
    if resource.is_schemaless() {
        return Ok(());
    }
    for (field, ops) in descriptor.filters.iter_mut() {
        if field == "id" {
            continue;
        }
        let attribute = resource
            .find_attribute(field)
            .filter(|a| a.filterable)
            .ok_or_else(|| GraphError::UnknownAttribute {
                resource: resource.type_name.clone(),
                attribute: field.clone(),
                usage: "filter",
            })?;
        for (op, values) in ops.iter_mut() {
            for value in values.iter_mut() {
                let coerced = attribute.kind.coerce(value).ok_or_else(|| {
                    GraphError::invalid(
                        format!("filter[{}][{op}]", join_path(path, field)),
                        format!("{value} is not a valid {}", attribute.kind.name()),
                    )
                })?;
                *value = coerced;
            }
        }
    }
    for sort in &descriptor.sort {
        if sort.field == "id" {
            continue;
        }
        if !resource
            .find_attribute(&sort.field)
            .is_some_and(|a| a.sortable)
        {
            return Err(GraphError::UnknownAttribute {
                resource: resource.type_name.clone(),
                attribute: sort.field.clone(),
                usage: "sort",
            });
        }
    }
    Ok(())
}

/// Wire form of a filter value.
pub fn param_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Builds the outgoing request for a remote node.
///
/// `forwarded` holds the descriptors of same-service relationships merged into
/// this call, keyed by their path relative to this node. Their parameters are
/// sent with path-prefixed keys (`page[positions.size]`).
pub fn remote_request(
    resource: &ResourceConfig,
    descriptor: &QueryDescriptor,
    forwarded: &[(String, QueryDescriptor)],
    include: &IncludeTree,
    context: &RequestContext,
    config: &ResolverConfig,
) -> Result<RemoteRequest, GraphError> {
    let endpoint = resource
        .remote
        .as_ref()
        .ok_or_else(|| GraphError::UnknownResource(format!("{} has no remote endpoint", resource.type_name)))?;

    let mut request = RemoteRequest::new(
        endpoint.url(),
        endpoint.timeout.unwrap_or_else(|| config.timeout()),
        endpoint.open_timeout.unwrap_or_else(|| config.open_timeout()),
    );

    let mut sort = Vec::new();
    let mut fields: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut extra_fields: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    let nodes = std::iter::once(("", descriptor)).chain(
        forwarded
            .iter()
            .map(|(prefix, descriptor)| (prefix.as_str(), descriptor)),
    );
    for (prefix, node) in nodes {
        for (field, ops) in &node.filters {
            for (op, values) in ops {
                request.set_param(
                    format!("filter[{}][{op}]", join_path(prefix, field)),
                    values.iter().map(param_value).collect(),
                );
            }
        }
        sort.extend(node.sort.iter().map(|s| s.to_param(prefix)));
        if let Some(size) = node.page.size {
            request.set_param(format!("page[{}]", join_path(prefix, "size")), vec![size.to_string()]);
        }
        if let Some(number) = node.page.number {
            request.set_param(format!("page[{}]", join_path(prefix, "number")), vec![number.to_string()]);
        }
        for (type_name, set) in &node.fields {
            fields.entry(type_name.clone()).or_default().extend(set.iter().cloned());
        }
        for (type_name, set) in &node.extra_fields {
            extra_fields
                .entry(type_name.clone())
                .or_default()
                .extend(set.iter().cloned());
        }
        for (name, aggregates) in &node.stats {
            request.set_param(format!("stats[{}]", join_path(prefix, name)), aggregates.clone());
        }
    }

    if !sort.is_empty() {
        request.set_param("sort", sort);
    }
    for (type_name, set) in fields {
        request.set_param(format!("fields[{type_name}]"), set.into_iter().collect());
    }
    for (type_name, set) in extra_fields {
        request.set_param(format!("extra_fields[{type_name}]"), set.into_iter().collect());
    }
    if !include.is_empty() {
        request.set_param("include", include.leaf_paths());
    }

    request
        .headers
        .insert("content-type".to_string(), JSONAPI_CONTENT_TYPE.to_string());
    // Header names are case-insensitive; later layers replace earlier ones.
    for (name, value) in context.headers.iter().chain(endpoint.headers.iter()) {
        request.headers.insert(name.to_ascii_lowercase(), value.clone());
    }
    Ok(request)
}
