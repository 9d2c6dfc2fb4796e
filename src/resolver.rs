//! Base-URI propagation and reference binding.
//!
//! Resolution runs in two phases over the whole arena:
//!
//! 1. [`attach_base_uris`] walks each document top-down and gives every node
//!    its canonical base URI, joining declared `$id`s against the parent's.
//! 2. [`resolve`] indexes every schema node under its canonical URIs, then
//!    binds each `$ref`/`$recursiveRef` slot to a node in that index.
//!
//! Phase 2 reads every node's final base URI, so phase 1 must have run on
//! every document in the graph first.

use std::collections::{BTreeSet, HashMap};

use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::SchemaError;
use crate::node::{Graph, NodeId, NodeKind};
use crate::pointer::JsonPointer;

/// Phase 1: propagate base URIs below `root`, starting from `base`.
pub fn attach_base_uris(graph: &mut Graph, root: NodeId, base: &Url) -> Result<(), SchemaError> {
    let mut stack = vec![(root, base.clone())];
    while let Some((id, inherited)) = stack.pop() {
        let own = match &graph.node(id).id {
            Some(declared) => {
                let mut joined = inherited.join(declared).map_err(|e| SchemaError::InvalidUri {
                    uri: declared.clone(),
                    location: graph.node(id).location.to_string(),
                    message: e.to_string(),
                })?;
                joined.set_fragment(None);
                joined
            }
            None => inherited,
        };
        for child in graph.node(id).children() {
            stack.push((child, own.clone()));
        }
        graph.node_mut(id).base_uri = Some(own);
    }
    Ok(())
}

/// Canonical lookup key: fragment percent-decoded, empty fragment dropped.
pub fn canonical_key(uri: &Url) -> String {
    let mut base = uri.clone();
    base.set_fragment(None);
    match uri.fragment() {
        None | Some("") => base.to_string(),
        Some(fragment) => format!("{}#{}", base, percent_decode_str(fragment).decode_utf8_lossy()),
    }
}

/// Canonical URI → schema node index for one compiled graph.
#[derive(Debug, Default)]
pub struct UriContext {
    entries: HashMap<String, NodeId>,
}

impl UriContext {
    fn register(&mut self, key: String, node: NodeId) -> Result<(), SchemaError> {
        match self.entries.get(&key) {
            Some(existing) if *existing != node => Err(SchemaError::DuplicateUri { uri: key }),
            Some(_) => Ok(()),
            None => {
                self.entries.insert(key, node);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, uri: &Url) -> Option<NodeId> {
        self.entries.get(&canonical_key(uri)).copied()
    }

    /// Every registered URI, sorted.
    pub fn known(&self) -> Vec<String> {
        let mut known: Vec<String> = self.entries.keys().cloned().collect();
        known.sort();
        known
    }
}

/// Output of phase 2.
#[derive(Debug)]
pub struct Resolution {
    /// Target of each reference slot, indexed by slot.
    pub targets: Vec<NodeId>,
    pub context: UriContext,
}

/// Phase 2 over every document in the graph.
pub fn resolve(graph: &Graph) -> Result<Resolution, SchemaError> {
    let context = generate_context(graph)?;
    let targets = resolve_references(graph, &context)?;
    check_recursion(graph, &targets)?;
    Ok(Resolution { targets, context })
}

/// Build the URI index: own id, id + pointer, id + anchor.
pub fn generate_context(graph: &Graph) -> Result<UriContext, SchemaError> {
    let mut context = UriContext::default();
    for document in &graph.documents {
        context.register(canonical_key(&document.retrieval_uri), document.root)?;

        // (node, nearest enclosing resource root)
        let mut stack = vec![(document.root, document.root)];
        while let Some((id, resource)) = stack.pop() {
            let node = graph.node(id);
            let resource = if node.id.is_some() { id } else { resource };

            if node.is_schema() {
                let base = base_uri(graph, id)?;
                if id == resource {
                    context.register(canonical_key(base), id)?;
                }
                let resource_node = graph.node(resource);
                if let Some(relative) = node.location.relative_to(&resource_node.location) {
                    register_pointer(&mut context, base, &relative, id)?;
                }
                if resource != document.root {
                    let document_base = base_uri(graph, document.root)?;
                    register_pointer(&mut context, document_base, &node.location, id)?;
                }
                if let Some(anchor) = &node.anchor {
                    context.register(format!("{}#{}", base, anchor), id)?;
                }
            }

            for child in node.children() {
                stack.push((child, resource));
            }
        }
    }
    tracing::debug!(uris = context.entries.len(), "generated URI context");
    Ok(context)
}

fn register_pointer(
    context: &mut UriContext,
    base: &Url,
    pointer: &JsonPointer,
    id: NodeId,
) -> Result<(), SchemaError> {
    if pointer.as_str().is_empty() {
        return Ok(());
    }
    context.register(format!("{}#{}", base, pointer), id)
}

/// Bind every reference slot.
///
/// `$ref` slots bind first. The resource entries they record are what
/// `$recursiveRef` slots then follow outward.
pub fn resolve_references(graph: &Graph, context: &UriContext) -> Result<Vec<NodeId>, SchemaError> {
    let mut targets = vec![None; graph.slot_count()];
    let mut entries = ResourceEntries::default();

    for id in graph.ids() {
        if let NodeKind::Ref { reference, slot } = &graph.node(id).kind {
            let target = lookup_reference(graph, context, id, reference)?;
            entries.record(resource_root(graph, id), resource_root(graph, target));
            trace_binding(graph, id, target);
            targets[*slot] = Some(target);
        }
    }
    for id in graph.ids() {
        if graph.node(id).id.is_some() {
            if let Some(parent) = graph.node(id).parent {
                entries.record(resource_root(graph, parent), id);
            }
        }
    }

    let primary = graph.documents.first().map(|document| document.root);
    for id in graph.ids() {
        if let NodeKind::RecursiveRef { slot } = &graph.node(id).kind {
            let mut scope = Vec::new();
            let target = recursive_target(graph, &entries, primary, resource_root(graph, id), &mut scope);
            trace_binding(graph, id, target);
            targets[*slot] = Some(target);
        }
    }

    Ok(targets.into_iter().flatten().collect())
}

fn trace_binding(graph: &Graph, from: NodeId, to: NodeId) {
    tracing::trace!(
        from = %graph.node(from).location,
        to = %graph.node(to).location,
        "bound reference"
    );
}

/// Resource roots that can be entered from each resource root: through a
/// `$ref` into it, or by lexically embedding it.
#[derive(Default)]
struct ResourceEntries(HashMap<NodeId, Vec<NodeId>>);

impl ResourceEntries {
    fn record(&mut self, from: NodeId, into: NodeId) {
        if from == into {
            return;
        }
        let sources = self.0.entry(into).or_default();
        if !sources.contains(&from) {
            sources.push(from);
        }
    }

    fn sources(&self, resource: NodeId) -> &[NodeId] {
        self.0.get(&resource).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Nearest enclosing node declaring `$id`, or the document root.
fn resource_root(graph: &Graph, id: NodeId) -> NodeId {
    let mut current = id;
    loop {
        let node = graph.node(current);
        match node.parent {
            Some(parent) if node.id.is_none() => current = parent,
            _ => return current,
        }
    }
}

/// Where `$recursiveRef: "#"` inside `resource` lands.
///
/// A resource without `$recursiveAnchor: true` is the target itself, as
/// with `$ref: "#"`. An anchored one defers outward through the resources
/// it is entered from, for as long as each of them is anchored too. The
/// primary document is always entered first, so nothing lies beyond it.
/// When entry paths disagree on the outermost anchor, the resource binds to
/// itself.
fn recursive_target(
    graph: &Graph,
    entries: &ResourceEntries,
    primary: Option<NodeId>,
    resource: NodeId,
    scope: &mut Vec<NodeId>,
) -> NodeId {
    if !graph.node(resource).recursive_anchor || Some(resource) == primary {
        return resource;
    }
    scope.push(resource);
    let mut outermost = None;
    for &source in entries.sources(resource) {
        if scope.contains(&source) {
            continue;
        }
        let candidate = if graph.node(source).recursive_anchor {
            recursive_target(graph, entries, primary, source, scope)
        } else {
            resource
        };
        match outermost {
            None => outermost = Some(candidate),
            Some(previous) if previous != candidate => {
                outermost = Some(resource);
                break;
            }
            Some(_) => {}
        }
    }
    scope.pop();
    outermost.unwrap_or(resource)
}

/// Absolute URI a reference at `id` points to.
pub fn reference_target(graph: &Graph, id: NodeId, reference: &str) -> Result<Url, SchemaError> {
    base_uri(graph, id)?
        .join(reference)
        .map_err(|e| SchemaError::InvalidUri {
            uri: reference.to_string(),
            location: graph.node(id).location.to_string(),
            message: e.to_string(),
        })
}

fn lookup_reference(
    graph: &Graph,
    context: &UriContext,
    id: NodeId,
    reference: &str,
) -> Result<NodeId, SchemaError> {
    let target = reference_target(graph, id, reference)?;
    context
        .lookup(&target)
        .ok_or_else(|| SchemaError::Unresolvable {
            uri: canonical_key(&target),
            location: graph.node(id).location.to_string(),
            known: context.known(),
        })
}

/// Reference targets whose document is not compiled into `graph` yet, with
/// the location of the first reference naming each.
pub fn missing_documents(graph: &Graph) -> Result<Vec<(Url, String)>, SchemaError> {
    let mut resources = BTreeSet::new();
    for document in &graph.documents {
        resources.insert(canonical_key(&document.retrieval_uri));
        for id in graph.walk(document.root) {
            let node = graph.node(id);
            if node.id.is_some() {
                resources.insert(canonical_key(base_uri(graph, id)?));
            }
        }
    }

    let mut missing: Vec<(Url, String)> = Vec::new();
    for id in graph.ids() {
        let NodeKind::Ref { reference, .. } = &graph.node(id).kind else {
            continue;
        };
        let mut document = reference_target(graph, id, reference)?;
        document.set_fragment(None);
        let key = canonical_key(&document);
        if !resources.contains(&key) && missing.iter().all(|(uri, _)| canonical_key(uri) != key) {
            missing.push((document, graph.node(id).location.to_string()));
        }
    }
    Ok(missing)
}

fn base_uri(graph: &Graph, id: NodeId) -> Result<&Url, SchemaError> {
    graph
        .node(id)
        .base_uri
        .as_ref()
        .ok_or_else(|| SchemaError::InvalidUri {
            uri: String::new(),
            location: graph.node(id).location.to_string(),
            message: "base URI was never attached".to_string(),
        })
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    Active,
    Done,
}

/// Reject reference cycles that re-evaluate the same instance forever.
fn check_recursion(graph: &Graph, targets: &[NodeId]) -> Result<(), SchemaError> {
    let edges = |id: NodeId| -> Vec<NodeId> {
        match &graph.node(id).kind {
            NodeKind::Ref { slot, .. } | NodeKind::RecursiveRef { slot } => vec![targets[*slot]],
            _ => graph.node(id).in_place_children(),
        }
    };

    let mut marks = vec![Mark::Unvisited; graph.len()];
    for start in graph.ids() {
        if marks[start.0] != Mark::Unvisited {
            continue;
        }
        // (node, its edges, next edge to follow)
        let mut stack = vec![(start, edges(start), 0usize)];
        marks[start.0] = Mark::Active;
        while let Some((id, next, index)) = stack.last_mut() {
            if let Some(&child) = next.get(*index) {
                *index += 1;
                match marks[child.0] {
                    Mark::Active => {
                        return Err(SchemaError::InfiniteRecursion {
                            location: graph.node(*id).location.to_string(),
                        })
                    }
                    Mark::Unvisited => {
                        marks[child.0] = Mark::Active;
                        stack.push((child, edges(child), 0));
                    }
                    Mark::Done => {}
                }
            } else {
                marks[id.0] = Mark::Done;
                stack.pop();
            }
        }
    }
    Ok(())
}
