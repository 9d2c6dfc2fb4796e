//! Validator node arena.
//!
//! Every validator lives in one `Vec<Node>` owned by the graph. Children are
//! owned through the tree of [`NodeId`]s returned by [`Node::children`];
//! `parent` links and reference targets are plain indices into the same
//! arena and never own anything.

use regex::Regex;
use serde_json::Value;
use url::Url;

use crate::pointer::JsonPointer;
use crate::types::JsonType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub location: JsonPointer,
    pub parent: Option<NodeId>,
    /// Declared `$id`, verbatim.
    pub id: Option<String>,
    pub anchor: Option<String>,
    pub recursive_anchor: bool,
    /// Set once by the resolver.
    pub base_uri: Option<Url>,
}

#[derive(Debug)]
pub enum NodeKind {
    AcceptAll,
    RejectAll,
    /// A schema object: the conjunction of its keyword nodes.
    Schema(Vec<NodeId>),
    /// `$ref`. `slot` indexes the resolved target table.
    Ref { reference: String, slot: usize },
    /// `$recursiveRef: "#"`.
    RecursiveRef { slot: usize },
    Defs(Vec<(String, NodeId)>),
    /// The `type` keyword with every type-specific keyword underneath it.
    Types {
        declared: Option<Vec<JsonType>>,
        branches: Vec<NodeId>,
    },
    /// One JSON type and the keywords that apply to it.
    Type {
        json_type: JsonType,
        keywords: Vec<NodeId>,
    },
    Keyword(Keyword),
    Properties {
        properties: Vec<(String, NodeId)>,
        patterns: Vec<(Regex, NodeId)>,
        additional: Option<NodeId>,
    },
    Items {
        items: Option<Items>,
        additional: Option<NodeId>,
    },
    Contains {
        schema: NodeId,
        min: u64,
        max: Option<u64>,
    },
    PropertyNames(NodeId),
    DependentSchemas(Vec<(String, NodeId)>),
    AllOf(Vec<NodeId>),
    AnyOf(Vec<NodeId>),
    OneOf(Vec<NodeId>),
    Not(NodeId),
    Conditional {
        condition: NodeId,
        then: Option<NodeId>,
        otherwise: Option<NodeId>,
    },
}

#[derive(Debug)]
pub enum Items {
    Single(NodeId),
    Tuple(Vec<NodeId>),
}

/// Leaf keywords that never hold subschemas.
#[derive(Debug)]
pub enum Keyword {
    Const(Value),
    Enum(Vec<Value>),
    MinLength(u64),
    MaxLength(u64),
    Pattern(Regex),
    Minimum(f64),
    Maximum(f64),
    ExclusiveMinimum(f64),
    ExclusiveMaximum(f64),
    MultipleOf(f64),
    MinItems(u64),
    MaxItems(u64),
    UniqueItems,
    Required(Vec<String>),
    MinProperties(u64),
    MaxProperties(u64),
    DependentRequired(Vec<(String, Vec<String>)>),
}

impl Node {
    /// Nodes built from a (sub)schema rather than from a keyword.
    /// Only these are addressable by URI.
    pub fn is_schema(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Schema(_) | NodeKind::AcceptAll | NodeKind::RejectAll
        )
    }

    /// Owned sub-validators, in build order.
    pub fn children(&self) -> Vec<NodeId> {
        match &self.kind {
            NodeKind::AcceptAll
            | NodeKind::RejectAll
            | NodeKind::Keyword(_)
            | NodeKind::Ref { .. }
            | NodeKind::RecursiveRef { .. } => Vec::new(),
            NodeKind::Schema(children)
            | NodeKind::AllOf(children)
            | NodeKind::AnyOf(children)
            | NodeKind::OneOf(children) => children.clone(),
            NodeKind::Types { branches, .. } => branches.clone(),
            NodeKind::Type { keywords, .. } => keywords.clone(),
            NodeKind::Defs(entries) | NodeKind::DependentSchemas(entries) => {
                entries.iter().map(|(_, id)| *id).collect()
            }
            NodeKind::Properties {
                properties,
                patterns,
                additional,
            } => properties
                .iter()
                .map(|(_, id)| *id)
                .chain(patterns.iter().map(|(_, id)| *id))
                .chain(*additional)
                .collect(),
            NodeKind::Items { items, additional } => {
                let mut children = match items {
                    Some(Items::Single(id)) => vec![*id],
                    Some(Items::Tuple(ids)) => ids.clone(),
                    None => Vec::new(),
                };
                children.extend(*additional);
                children
            }
            NodeKind::Contains { schema, .. } => vec![*schema],
            NodeKind::PropertyNames(id) | NodeKind::Not(id) => vec![*id],
            NodeKind::Conditional {
                condition,
                then,
                otherwise,
            } => std::iter::once(*condition)
                .chain(*then)
                .chain(*otherwise)
                .collect(),
        }
    }

    /// Children evaluated against the same instance as this node.
    ///
    /// Everything else (`properties`, `items`, ...) descends into a strictly
    /// smaller part of the instance. `$defs` is never evaluated.
    pub fn in_place_children(&self) -> Vec<NodeId> {
        match &self.kind {
            NodeKind::Defs(_)
            | NodeKind::Properties { .. }
            | NodeKind::Items { .. }
            | NodeKind::Contains { .. }
            | NodeKind::PropertyNames(_) => Vec::new(),
            _ => self.children(),
        }
    }
}

/// A document compiled into the arena.
#[derive(Debug)]
pub struct Document {
    pub root: NodeId,
    /// URI the document was compiled or retrieved under.
    pub retrieval_uri: Url,
}

/// The arena plus per-document bookkeeping.
#[derive(Debug, Default)]
pub struct Graph {
    pub(crate) nodes: Vec<Node>,
    pub(crate) documents: Vec<Document>,
    slots: usize,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a node whose kind is filled in once its children exist.
    pub fn reserve(&mut self, location: JsonPointer, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind: NodeKind::AcceptAll,
            location,
            parent,
            id: None,
            anchor: None,
            recursive_anchor: false,
            base_uri: None,
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn set_kind(&mut self, id: NodeId, kind: NodeKind) {
        self.nodes[id.0].kind = kind;
    }

    /// Claim the next reference slot.
    pub fn next_slot(&mut self) -> usize {
        let slot = self.slots;
        self.slots += 1;
        slot
    }

    pub fn slot_count(&self) -> usize {
        self.slots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Depth-first pre-order walk from `root`.
    pub fn walk(&self, root: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            order.push(id);
            let mut children = self.node(id).children();
            children.reverse();
            stack.extend(children);
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_links_parents() {
        let mut graph = Graph::new();
        let root = graph.reserve(JsonPointer::root(), None);
        let child = graph.reserve(JsonPointer::root().push("not"), Some(root));
        graph.set_kind(child, NodeKind::RejectAll);
        let not = graph.reserve(JsonPointer::root().push("not"), Some(root));
        graph.set_kind(not, NodeKind::Not(child));
        graph.set_kind(root, NodeKind::Schema(vec![not]));

        assert_eq!(graph.node(child).parent, Some(root));
        assert_eq!(graph.walk(root), vec![root, not, child]);
    }

    #[test]
    fn refs_have_no_owned_children() {
        let mut graph = Graph::new();
        let id = graph.reserve(JsonPointer::root().push("$ref"), None);
        let slot = graph.next_slot();
        graph.set_kind(
            id,
            NodeKind::Ref {
                reference: "#".into(),
                slot,
            },
        );
        assert!(graph.node(id).children().is_empty());
        assert_eq!(graph.slot_count(), 1);
    }

    #[test]
    fn applicator_children_are_in_place() {
        let mut graph = Graph::new();
        let a = graph.reserve(JsonPointer::root(), None);
        let b = graph.reserve(JsonPointer::root(), None);
        let all_of = graph.reserve(JsonPointer::root().push("allOf"), None);
        graph.set_kind(all_of, NodeKind::AllOf(vec![a, b]));
        let items = graph.reserve(JsonPointer::root().push("items"), None);
        graph.set_kind(
            items,
            NodeKind::Items {
                items: Some(Items::Single(a)),
                additional: None,
            },
        );

        assert_eq!(graph.node(all_of).in_place_children(), vec![a, b]);
        assert!(graph.node(items).in_place_children().is_empty());
        assert_eq!(graph.node(items).children(), vec![a]);
    }
}
