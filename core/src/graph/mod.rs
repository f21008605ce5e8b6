//! file: core/src/graph/mod.rs
//! description: the in-memory block graph handed to the compiler.
//!
//! A `NodeGraph` is an immutable arena of `Node`s plus the ordered list of
//! root blocks (the editor's top-level stacks). It can only be produced by
//! `GraphBuilder::build` (directly or through `GraphDocument`), which
//! validates the structure and derives containment parents. Compilation
//! therefore never observes a cyclic or dangling graph.

use std::collections::HashMap;

pub mod document;
pub mod err;
pub mod node;
mod validate;

pub use document::{GraphDocument, NodeRecord};
pub use err::{GraphError, GraphErrorKind};
pub use node::{Node, NodeId};

#[derive(Debug, Clone)]
pub struct NodeGraph {
    nodes: Vec<Node>,
    roots: Vec<NodeId>,
    index: HashMap<String, NodeId>,
}

impl NodeGraph {
    /// Node by arena id. Ids are only handed out by this graph's builder.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Look a node up by its editor key.
    pub fn find(&self, key: &str) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    /// Direct children of the graph root, in editor order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Containment chain above `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            graph: self,
            cursor: self.node(id).parent,
        }
    }

    /// `head` followed by every node chained after it.
    pub fn chain(&self, head: NodeId) -> Chain<'_> {
        Chain {
            graph: self,
            cursor: Some(head),
        }
    }

    /// Every node contained (at any depth) by `id`, in pre-order.
    /// The node's own `next` chain is not part of it.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let node = self.node(id);
        let mut out = Vec::new();
        let mut pending: Vec<NodeId> = node
            .values
            .values()
            .chain(node.statements.values())
            .copied()
            .collect();
        pending.reverse();

        while let Some(current) = pending.pop() {
            out.push(current);
            let mut children: Vec<NodeId> = validate::children(self.node(current)).collect();
            children.reverse();
            pending.extend(children);
        }

        out
    }
}

pub struct Ancestors<'g> {
    graph: &'g NodeGraph,
    cursor: Option<NodeId>,
}

impl<'g> Iterator for Ancestors<'g> {
    type Item = &'g Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.graph.node(self.cursor?);
        self.cursor = node.parent;
        Some(node)
    }
}

pub struct Chain<'g> {
    graph: &'g NodeGraph,
    cursor: Option<NodeId>,
}

impl<'g> Iterator for Chain<'g> {
    type Item = &'g Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.graph.node(self.cursor?);
        self.cursor = node.next;
        Some(node)
    }
}

/// Incremental construction of a `NodeGraph`.
///
/// Roots are either marked explicitly (`root`, `mark_root`) or, when none
/// are marked, inferred as every node nothing else refers to, in insertion
/// order.
///
/// # Examples
/// ```
/// use blockforge_core::graph::GraphBuilder;
///
/// let mut b = GraphBuilder::new();
/// let entry = b.root("A", "arduino_entry");
/// let delay = b.node("B", "time_delay");
/// b.set_statement(entry, "LOOP", delay);
/// let graph = b.build().expect("valid graph");
/// assert_eq!(graph.node(delay).parent(), Some(entry));
/// ```
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    index: HashMap<String, NodeId>,
    roots: Vec<NodeId>,
    duplicates: Vec<String>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&mut self, key: &str, node_type: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        if self.index.insert(key.to_string(), id).is_some() {
            self.duplicates.push(key.to_string());
        }
        self.nodes.push(Node::new(id, key.to_string(), node_type.to_string()));
        id
    }

    pub fn root(&mut self, key: &str, node_type: &str) -> NodeId {
        let id = self.node(key, node_type);
        self.mark_root(id);
        id
    }

    pub fn mark_root(&mut self, id: NodeId) {
        self.roots.push(id);
    }

    pub fn find(&self, key: &str) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    pub fn set_field(&mut self, id: NodeId, name: &str, value: &str) -> &mut Self {
        self.nodes[id.0].fields.insert(name.to_string(), value.to_string());
        self
    }

    pub fn set_value(&mut self, owner: NodeId, slot: &str, child: NodeId) -> &mut Self {
        self.nodes[owner.0].values.insert(slot.to_string(), child);
        self
    }

    pub fn set_statement(&mut self, owner: NodeId, slot: &str, head: NodeId) -> &mut Self {
        self.nodes[owner.0].statements.insert(slot.to_string(), head);
        self
    }

    pub fn set_next(&mut self, previous: NodeId, next: NodeId) -> &mut Self {
        self.nodes[previous.0].next = Some(next);
        self
    }

    /// Chain `sequence` together and place it in `owner`'s statement slot.
    pub fn set_body(&mut self, owner: NodeId, slot: &str, sequence: &[NodeId]) -> &mut Self {
        if let Some(head) = sequence.first() {
            self.set_statement(owner, slot, *head);
        }
        for pair in sequence.windows(2) {
            self.set_next(pair[0], pair[1]);
        }
        self
    }

    pub fn build(self) -> Result<NodeGraph, GraphError> {
        let GraphBuilder { mut nodes, index, roots, duplicates } = self;

        if let Some(key) = duplicates.into_iter().next() {
            return Err(GraphError::with(
                GraphErrorKind::DuplicateNode,
                format!("More than one node uses the key '{}'", key),
                "blockforge.graph.build".to_string(),
                Some(key),
            ));
        }

        let explicit_roots = !roots.is_empty();
        let roots = if explicit_roots {
            roots
        } else {
            let mut referenced = vec![false; nodes.len()];
            for node in &nodes {
                for child in validate::children(node) {
                    referenced[child.0] = true;
                }
            }
            nodes
                .iter()
                .filter(|node| !referenced[node.id.0])
                .map(|node| node.id)
                .collect()
        };

        validate::validate(&nodes, &roots, explicit_roots)?;
        validate::derive_containment(&mut nodes);

        log::debug!(
            "built graph with {} nodes and {} roots",
            nodes.len(),
            roots.len()
        );

        Ok(NodeGraph { nodes, roots, index })
    }
}
