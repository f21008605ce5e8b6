//! file: core/src/graph/validate.rs
//! description: structural checks run once while a graph is built.
//!
//! The compiler relies on containment being a forest: every node has at most
//! one owner, no chain of slots or `next` links loops back on itself, and
//! every node hangs from a root. These checks run before containment parents
//! are derived, so the scope guard's upward walk always terminates.

use std::collections::HashSet;

use super::err::{GraphError, GraphErrorKind};
use super::node::{Node, NodeId};

const ISSUER: &str = "blockforge.graph.validate";

/// Outgoing structural edges of a node: value slots, statement slots and the
/// chaining link, in a stable order.
pub(crate) fn children(node: &Node) -> impl Iterator<Item = NodeId> + '_ {
    node.values
        .values()
        .chain(node.statements.values())
        .copied()
        .chain(node.next)
}

pub(crate) fn validate(nodes: &[Node], roots: &[NodeId], explicit_roots: bool) -> Result<(), GraphError> {
    check_single_owner(nodes, roots)?;
    check_acyclic(nodes)?;
    if explicit_roots {
        check_reachable(nodes, roots)?;
    }
    Ok(())
}

fn check_single_owner(nodes: &[Node], roots: &[NodeId]) -> Result<(), GraphError> {
    let mut owner: Vec<Option<NodeId>> = vec![None; nodes.len()];

    for node in nodes {
        for child in children(node) {
            if let Some(previous) = owner[child.0] {
                return Err(GraphError::with(
                    GraphErrorKind::MultipleOwners,
                    format!(
                        "Node '{}' is attached to both '{}' and '{}'",
                        nodes[child.0].key, nodes[previous.0].key, node.key
                    ),
                    ISSUER.to_string(),
                    Some(nodes[child.0].key.clone()),
                ));
            }
            owner[child.0] = Some(node.id);
        }
    }

    let mut seen_roots = HashSet::new();
    for root in roots {
        if !seen_roots.insert(*root) {
            return Err(GraphError::with(
                GraphErrorKind::MultipleOwners,
                format!("Node '{}' is listed as a root more than once", nodes[root.0].key),
                ISSUER.to_string(),
                Some(nodes[root.0].key.clone()),
            ));
        }
        if let Some(previous) = owner[root.0] {
            return Err(GraphError::with(
                GraphErrorKind::MultipleOwners,
                format!(
                    "Node '{}' is a root but is also attached to '{}'",
                    nodes[root.0].key, nodes[previous.0].key
                ),
                ISSUER.to_string(),
                Some(nodes[root.0].key.clone()),
            ));
        }
    }

    Ok(())
}

fn check_acyclic(nodes: &[Node]) -> Result<(), GraphError> {
    #[derive(PartialEq, Eq, Clone, Copy)]
    enum VisitState { Unseen, Visiting, Done }

    fn dfs(
        node: NodeId,
        nodes: &[Node],
        state: &mut [VisitState],
        stack: &mut Vec<NodeId>,
    ) -> Option<Vec<NodeId>> {
        state[node.0] = VisitState::Visiting;
        stack.push(node);

        for child in children(&nodes[node.0]) {
            match state[child.0] {
                VisitState::Unseen => {
                    if let Some(cycle) = dfs(child, nodes, state, stack) {
                        return Some(cycle);
                    }
                }
                VisitState::Visiting => {
                    // capture the cycle slice from the stack
                    let pos = stack.iter().position(|n| *n == child).unwrap_or(0);
                    let mut cycle = stack[pos..].to_vec();
                    cycle.push(child);
                    return Some(cycle);
                }
                VisitState::Done => {}
            }
        }

        stack.pop();
        state[node.0] = VisitState::Done;
        None
    }

    let mut state = vec![VisitState::Unseen; nodes.len()];
    let mut stack = Vec::new();

    for node in nodes {
        if state[node.id.0] != VisitState::Unseen {
            continue;
        }
        if let Some(cycle) = dfs(node.id, nodes, &mut state, &mut stack) {
            let human = cycle
                .iter()
                .map(|id| nodes[id.0].key.as_str())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(GraphError::with(
                GraphErrorKind::Cycle,
                format!("Cycle detected in block containment: {}", human),
                ISSUER.to_string(),
                Some(nodes[cycle[0].0].key.clone()),
            ));
        }
    }

    Ok(())
}

fn check_reachable(nodes: &[Node], roots: &[NodeId]) -> Result<(), GraphError> {
    let mut reached = vec![false; nodes.len()];
    let mut pending: Vec<NodeId> = roots.to_vec();

    while let Some(id) = pending.pop() {
        if reached[id.0] {
            continue;
        }
        reached[id.0] = true;
        pending.extend(children(&nodes[id.0]));
    }

    match nodes.iter().find(|node| !reached[node.id.0]) {
        Some(node) => Err(GraphError::with(
            GraphErrorKind::Detached,
            format!("Node '{}' is not reachable from any root", node.key),
            ISSUER.to_string(),
            Some(node.key.clone()),
        )),
        None => Ok(()),
    }
}

/// Fill in `parent` for every node. Value children and every member of a
/// statement chain are contained by the slot owner; chains hanging from a
/// root have no parent.
pub(crate) fn derive_containment(nodes: &mut [Node]) {
    let mut assignments: Vec<(NodeId, NodeId)> = Vec::new();

    for node in nodes.iter() {
        for head in node.values.values().chain(node.statements.values()) {
            let mut cursor = Some(*head);
            while let Some(member) = cursor {
                assignments.push((member, node.id));
                cursor = nodes[member.0].next;
            }
        }
    }

    for (member, owner) in assignments {
        nodes[member.0].parent = Some(owner);
    }
}
