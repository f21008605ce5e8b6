//! file: core/src/scope.rs
//! description: containment legality checks.
//!
//! A block whose meaning only exists inside a routine (loops, conditionals,
//! early exits, timed repeats) is legal when some block above it in the
//! containment chain is a registered container. These helpers walk that
//! chain; they never mutate anything and terminate because a built graph is
//! acyclic.

use crate::backend::ContainerRegistry;
use crate::graph::{NodeGraph, NodeId};

/// True when any ancestor of `node` (starting at its parent) has a type in
/// `allowed`. A node without a parent is never in an allowed context.
pub fn is_in_allowed_context(graph: &NodeGraph, node: NodeId, allowed: &ContainerRegistry) -> bool {
    enclosing_container(graph, node, allowed).is_some()
}

/// The nearest ancestor whose type is in `allowed`.
pub fn enclosing_container(graph: &NodeGraph, node: NodeId, allowed: &ContainerRegistry) -> Option<NodeId> {
    graph
        .ancestors(node)
        .find(|ancestor| allowed.contains(ancestor.node_type()))
        .map(|ancestor| ancestor.id())
}

/// Nearest ancestor of `node` whose type is one of `types`, stopping at the
/// first container. Used by statements that need a specific construct
/// around them within the same routine (`break` inside a loop).
pub fn enclosing_within_routine(
    graph: &NodeGraph,
    node: NodeId,
    types: &[&str],
    containers: &ContainerRegistry,
) -> Option<NodeId> {
    for ancestor in graph.ancestors(node) {
        if types.contains(&ancestor.node_type()) {
            return Some(ancestor.id());
        }
        if containers.contains(ancestor.node_type()) {
            return None;
        }
    }
    None
}
