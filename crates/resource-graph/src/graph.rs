//! # Graph Resolver
//!
//! Resolves one request into a tree of [`Record`]s.
//!
//! Resolution happens in two passes. Planning walks the include tree without
//! touching any data source: it validates every include and every descriptor,
//! decides which relationships are merged into a remote parent's call and which
//! need their own query, and rejects writes against remote resources. Only a
//! request that plans cleanly issues I/O.
//!
//! Execution then resolves each node, waits for its complete record set, and
//! resolves its child relationships constrained to the parent's keys. Sibling
//! relationships run concurrently with `try_join_all`, so the first failure
//! drops every other in-flight sibling.
//!
//! ## Remote subtrees
//!
//! For a remote node, a declared relationship whose target is served from the
//! same base URL is merged into the parent's call: its include path is
//! forwarded and its parameters are sent with path-prefixed keys. Relationships
//! the remote resource does not declare are forwarded as-is. Everything else,
//! local resources and remote resources on a different base URL, is resolved
//! separately and attached to the records found at that point of the
//! forwarded tree.

use crate::adapter::{LocalAdapter, WriteOperation};
use crate::config::ResolverConfig;
use crate::context::{Action, RequestContext};
use crate::error::GraphError;
use crate::include::IncludeTree;
use crate::query::{join_path, NormalizedQuery, QueryDescriptor};
use crate::record::{Cardinality, Record, Slot};
use crate::remote::{self, RemoteDocument};
use crate::resource::{Relationship, RelationshipKind, ResourceConfig, ResourceRegistry};
use crate::scope::{self, Scope};
use crate::transport::{RemoteRequest, RemoteTransport, TransportError};
use futures::future::{try_join_all, BoxFuture, FutureExt};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A read request against one resource.
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    /// Registry key of the root resource.
    pub resource: String,
    /// Raw parameter mapping (`filter`, `sort`, `page`, `include`, ...).
    pub params: Value,
    /// Set for `show` requests.
    pub id: Option<String>,
    pub context: RequestContext,
}

impl ResolveRequest {
    pub fn index(resource: impl Into<String>, params: Value) -> Self {
        Self {
            resource: resource.into(),
            params,
            id: None,
            context: RequestContext::new(Action::Index),
        }
    }

    pub fn show(resource: impl Into<String>, id: impl Into<String>, params: Value) -> Self {
        Self {
            resource: resource.into(),
            params,
            id: Some(id.into()),
            context: RequestContext::new(Action::Show),
        }
    }

    /// Replaces the context. The action of `context` is kept as given.
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }
}

/// The resolved object graph of one request.
#[derive(Debug, Clone)]
pub struct ResolvedGraph {
    pub resource: Arc<ResourceConfig>,
    pub records: Vec<Record>,
    /// Rendered as a single object rather than a list.
    pub single: bool,
    pub stats: Map<String, Value>,
    /// Extra top-level meta supplied by the caller.
    pub meta: Map<String, Value>,
    /// The normalized query, with the include tree already pruned.
    pub query: NormalizedQuery,
}

impl ResolvedGraph {
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

/// How a planned node fetches its own records.
#[derive(Debug)]
enum Source {
    Local,
    Remote {
        /// Include tree sent with the call.
        forward: IncludeTree,
        /// Descriptors merged into the call, by path relative to the node.
        forwarded: Vec<(String, QueryDescriptor)>,
    },
}

#[derive(Debug)]
struct PlanNode {
    resource: Arc<ResourceConfig>,
    path: String,
    descriptor: QueryDescriptor,
    source: Source,
    edges: Vec<PlanEdge>,
}

/// A relationship resolved by its own query.
#[derive(Debug)]
struct PlanEdge {
    relationship: Relationship,
    /// Path from the parent node's records to the records that own the
    /// relationship. Non-empty only inside a forwarded remote subtree.
    via: Vec<String>,
    node: PlanNode,
}

impl PlanEdge {
    /// The child field to constrain and the parent keys to constrain it to.
    fn constraint(&self, parents: &[Record]) -> (String, Vec<String>) {
        let rel = &self.relationship;
        let (child_field, parent_field) = match rel.kind {
            RelationshipKind::BelongsTo => (&rel.primary_key, &rel.foreign_key),
            RelationshipKind::HasMany | RelationshipKind::HasOne => (&rel.foreign_key, &rel.primary_key),
        };
        let mut seen = HashSet::new();
        let keys = records_at(parents, &self.via)
            .into_iter()
            .filter_map(|record| record.key(parent_field))
            .filter(|key| seen.insert(key.clone()))
            .collect();
        (child_field.clone(), keys)
    }
}

/// Resolves requests against a registry, a local adapter and a remote transport.
pub struct GraphResolver<A: LocalAdapter, T: RemoteTransport> {
    registry: Arc<ResourceRegistry>,
    adapter: Arc<A>,
    transport: Arc<T>,
    config: ResolverConfig,
}

impl<A: LocalAdapter, T: RemoteTransport> Clone for GraphResolver<A, T> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            adapter: self.adapter.clone(),
            transport: self.transport.clone(),
            config: self.config.clone(),
        }
    }
}

impl<A: LocalAdapter, T: RemoteTransport> GraphResolver<A, T> {
    pub fn new(registry: Arc<ResourceRegistry>, adapter: Arc<A>, transport: Arc<T>) -> Self {
        Self {
            registry,
            adapter,
            transport,
            config: ResolverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolves `request` and serializes the result as a JSON:API document.
    pub async fn render(&self, request: ResolveRequest) -> Result<Value, GraphError> {
        let context = request.context.clone();
        let graph = self.resolve(request).await?;
        Ok(crate::document::compose(&graph, &self.registry, &context))
    }

    /// Resolves `request` into a record graph.
    #[instrument(skip(self, request), fields(resource = %request.resource, action = %request.context.action))]
    pub async fn resolve(&self, request: ResolveRequest) -> Result<ResolvedGraph, GraphError> {
        info!("Resolving request");
        let context = &request.context;
        let root = self.registry.get(&request.resource)?;
        if is_write(context.action) && root.is_remote() {
            return Err(GraphError::RemoteWriteUnsupported(root.type_name.clone()));
        }

        let mut query = NormalizedQuery::from_params(&request.params)?;
        query.include = root.whitelist.apply(context.action, &query.include);

        let mut plan = self.plan_node(root.clone(), "", &query.include, &query, context)?;
        if let Some(id) = &request.id {
            plan.descriptor.constrain("id", std::slice::from_ref(id));
        }

        let (mut records, stats) = self.resolve_node(&plan, None, context).await?;
        let single = request.id.is_some();
        if let Some(id) = &request.id {
            if records.is_empty() {
                return Err(GraphError::RecordNotFound {
                    resource: root.type_name.clone(),
                    id: id.clone(),
                });
            }
            records.truncate(1);
        }
        info!(count = records.len(), "Resolved");

        Ok(ResolvedGraph {
            resource: root,
            records,
            single,
            stats,
            meta: Map::new(),
            query,
        })
    }

    /// Creates, updates or destroys a record of a local resource.
    ///
    /// Remote resources are rejected before any call is made.
    #[instrument(skip(self, operation), fields(operation = operation.name()))]
    pub async fn write(&self, resource: &str, operation: WriteOperation) -> Result<Option<Record>, GraphError> {
        let config = self.registry.get(resource)?;
        if config.is_remote() {
            warn!("Rejected write against remote resource");
            return Err(GraphError::RemoteWriteUnsupported(config.type_name.clone()));
        }
        self.adapter
            .write(&config, operation)
            .await
            .map_err(GraphError::Adapter)
    }

    pub async fn create(&self, resource: &str, attributes: Map<String, Value>) -> Result<Option<Record>, GraphError> {
        self.write(resource, WriteOperation::Create { attributes }).await
    }

    pub async fn update(
        &self,
        resource: &str,
        id: impl Into<String>,
        attributes: Map<String, Value>,
    ) -> Result<Option<Record>, GraphError> {
        self.write(
            resource,
            WriteOperation::Update {
                id: id.into(),
                attributes,
            },
        )
        .await
    }

    pub async fn destroy(&self, resource: &str, id: impl Into<String>) -> Result<(), GraphError> {
        self.write(resource, WriteOperation::Destroy { id: id.into() })
            .await
            .map(|_| ())
    }

    // =========================================================================
    // PLANNING
    // =========================================================================

    fn plan_node(
        &self,
        resource: Arc<ResourceConfig>,
        path: &str,
        include: &IncludeTree,
        query: &NormalizedQuery,
        context: &RequestContext,
    ) -> Result<PlanNode, GraphError> {
        let descriptor = scope::prepare_descriptor(
            &resource,
            query.descriptor_for(path),
            path,
            path.is_empty(),
            context,
            &self.config,
        )?;

        let mut edges = Vec::new();
        let source = if resource.is_remote() {
            let mut forwarded = Vec::new();
            let forward = self.plan_forwarded(
                &resource,
                Some(resource.as_ref()),
                path,
                &[],
                include,
                query,
                context,
                &mut forwarded,
                &mut edges,
            )?;
            Source::Remote { forward, forwarded }
        } else {
            for (name, subtree) in include.children() {
                let relationship = resource.find_relationship(name).ok_or_else(|| {
                    GraphError::invalid(
                        "include",
                        format!("'{}' has no relationship '{name}'", resource.type_name),
                    )
                })?;
                let target = self.registry.target(relationship)?;
                let node = self.plan_node(target, &join_path(path, name), subtree, query, context)?;
                edges.push(PlanEdge {
                    relationship: relationship.clone(),
                    via: Vec::new(),
                    node,
                });
            }
            Source::Local
        };

        Ok(PlanNode {
            resource,
            path: path.to_string(),
            descriptor,
            source,
            edges,
        })
    }

    /// Plans the include subtree below a remote node and returns the part of
    /// it that is forwarded with the node's call.
    #[allow(clippy::too_many_arguments)]
    fn plan_forwarded(
        &self,
        remote_root: &ResourceConfig,
        owner: Option<&ResourceConfig>,
        owner_path: &str,
        via: &[String],
        include: &IncludeTree,
        query: &NormalizedQuery,
        context: &RequestContext,
        forwarded: &mut Vec<(String, QueryDescriptor)>,
        edges: &mut Vec<PlanEdge>,
    ) -> Result<IncludeTree, GraphError> {
        let mut forward = IncludeTree::new();
        for (name, subtree) in include.children() {
            let path = join_path(owner_path, name);
            let mut relative = via.to_vec();
            relative.push(name.to_string());

            match owner.and_then(|o| o.find_relationship(name)) {
                None => {
                    forward.insert_child(name, subtree.clone());
                    let mut node = IncludeTree::new();
                    node.insert_child(name, subtree.clone());
                    for node_path in node.node_paths() {
                        if let Some(descriptor) = query.nested.get(&join_path(owner_path, &node_path)) {
                            let prefix = join_path(&via.join("."), &node_path);
                            forwarded.push((prefix, descriptor.clone()));
                        }
                    }
                }
                Some(relationship) => {
                    let target = self.registry.target(relationship)?;
                    if target.is_remote() && target.shares_base_url(remote_root) {
                        let descriptor = scope::prepare_descriptor(
                            &target,
                            query.descriptor_for(&path),
                            &path,
                            false,
                            context,
                            &self.config,
                        )?;
                        forwarded.push((relative.join("."), descriptor));
                        let nested = self.plan_forwarded(
                            remote_root,
                            Some(target.as_ref()),
                            &path,
                            &relative,
                            subtree,
                            query,
                            context,
                            forwarded,
                            edges,
                        )?;
                        forward.insert_child(name, nested);
                    } else {
                        let node = self.plan_node(target, &path, subtree, query, context)?;
                        edges.push(PlanEdge {
                            relationship: relationship.clone(),
                            via: via.to_vec(),
                            node,
                        });
                    }
                }
            }
        }
        Ok(forward)
    }

    // =========================================================================
    // EXECUTION
    // =========================================================================

    fn resolve_node<'a>(
        &'a self,
        node: &'a PlanNode,
        constraint: Option<(String, Vec<String>)>,
        context: &'a RequestContext,
    ) -> BoxFuture<'a, Result<(Vec<Record>, Map<String, Value>), GraphError>> {
        async move {
            let mut descriptor = node.descriptor.clone();
            if let Some((field, keys)) = &constraint {
                descriptor.constrain(field, keys);
            }
            let is_root = node.path.is_empty();

            let (mut records, stats) = match self.build_scope(node, &descriptor, context).await? {
                Scope::Local(scope) => {
                    debug!(resource = %node.resource.type_name, path = %node.path, "Local query");
                    let stats = if is_root && !descriptor.stats.is_empty() {
                        self.adapter
                            .compute_stats(scope.clone(), &descriptor.stats)
                            .await
                            .map_err(GraphError::Adapter)?
                    } else {
                        Map::new()
                    };
                    let records = self.adapter.execute(scope).await.map_err(GraphError::Adapter)?;
                    (records, stats)
                }
                Scope::Remote(request) => {
                    let document = self.fetch(&request, &node.path).await?;
                    let mut records = document.primary_records();
                    if let Source::Remote { forward, .. } = &node.source {
                        remote::assemble(&mut records, forward, &document.side_table());
                    }
                    let stats = if is_root {
                        document.stats().cloned().unwrap_or_default()
                    } else {
                        Map::new()
                    };
                    (records, stats)
                }
            };

            let children = if self.config.concurrent {
                try_join_all(node.edges.iter().map(|edge| self.resolve_edge(edge, &records, context))).await?
            } else {
                let mut children = Vec::with_capacity(node.edges.len());
                for edge in &node.edges {
                    children.push(self.resolve_edge(edge, &records, context).await?);
                }
                children
            };
            for (edge, related) in node.edges.iter().zip(children) {
                attach(&mut records, edge, related);
            }
            Ok((records, stats))
        }
        .boxed()
    }

    async fn build_scope(
        &self,
        node: &PlanNode,
        descriptor: &QueryDescriptor,
        context: &RequestContext,
    ) -> Result<Scope<A::Scope>, GraphError> {
        match &node.source {
            Source::Local => self
                .adapter
                .build_scope(&node.resource, descriptor)
                .await
                .map(Scope::Local)
                .map_err(GraphError::Adapter),
            Source::Remote { forward, forwarded } => scope::remote_request(
                &node.resource,
                descriptor,
                forwarded,
                forward,
                context,
                &self.config,
            )
            .map(Scope::Remote),
        }
    }

    async fn resolve_edge(
        &self,
        edge: &PlanEdge,
        parents: &[Record],
        context: &RequestContext,
    ) -> Result<Vec<Record>, GraphError> {
        let (field, keys) = edge.constraint(parents);
        if keys.is_empty() {
            debug!(path = %edge.node.path, "No parent keys, skipping query");
            return Ok(Vec::new());
        }
        let (records, _) = self.resolve_node(&edge.node, Some((field, keys)), context).await?;
        Ok(records)
    }

    async fn fetch(&self, request: &RemoteRequest, path: &str) -> Result<RemoteDocument, GraphError> {
        debug!(url = %request.full_url(), path = %path, "Remote call");
        let response = match tokio::time::timeout(request.timeout, self.transport.get(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => {
                warn!(url = %request.url, %error, "Remote call failed");
                return Err(GraphError::RemoteError(error.to_string()));
            }
            Err(_) => {
                let error = TransportError::Timeout(request.timeout);
                warn!(url = %request.url, %error, "Remote call timed out");
                return Err(GraphError::RemoteError(error.to_string()));
            }
        };
        remote::parse_response(&response).inspect_err(|error| {
            warn!(url = %request.url, status = response.status, %error, "Remote service returned an error");
        })
    }
}

fn is_write(action: Action) -> bool {
    matches!(action, Action::Create | Action::Update | Action::Destroy)
}

/// Records reached by following `via` from `records`.
fn records_at<'a>(records: &'a [Record], via: &[String]) -> Vec<&'a Record> {
    let mut current: Vec<&Record> = records.iter().collect();
    for name in via {
        current = current
            .into_iter()
            .flat_map(|record| record.related(name).iter())
            .collect();
    }
    current
}

fn for_each_at(records: &mut [Record], via: &[String], visit: &mut dyn FnMut(&mut Record)) {
    match via.split_first() {
        None => records.iter_mut().for_each(|record| visit(record)),
        Some((head, rest)) => {
            for record in records.iter_mut() {
                if let Some(slot) = record.relationships.get_mut(head) {
                    for_each_at(&mut slot.records, rest, visit);
                }
            }
        }
    }
}

/// Attaches `related` to every owner record of the edge by canonical key.
fn attach(records: &mut [Record], edge: &PlanEdge, related: Vec<Record>) {
    let rel = &edge.relationship;
    let (child_field, owner_field) = match rel.kind {
        RelationshipKind::BelongsTo => (&rel.primary_key, &rel.foreign_key),
        RelationshipKind::HasMany | RelationshipKind::HasOne => (&rel.foreign_key, &rel.primary_key),
    };
    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for (position, record) in related.iter().enumerate() {
        if let Some(key) = record.key(child_field) {
            index.entry(key).or_default().push(position);
        }
    }
    let cardinality = rel.cardinality();
    for_each_at(records, &edge.via, &mut |owner| {
        let mut matched: Vec<Record> = owner
            .key(owner_field)
            .and_then(|key| index.get(&key))
            .map(|positions| positions.iter().map(|&i| related[i].clone()).collect())
            .unwrap_or_default();
        if cardinality == Cardinality::One {
            matched.truncate(1);
        }
        owner.set_relationship(
            rel.name.clone(),
            Slot {
                cardinality,
                records: matched,
            },
        );
    });
}
