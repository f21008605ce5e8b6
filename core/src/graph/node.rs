//! file: core/src/graph/node.rs
//! description: a single typed block of the visual program.
//!
//! `Node` is the read-only view the compiler gets of one block: its type tag,
//! field values, value slots, statement slots, chaining link and derived
//! containment parent. Nodes live in the `NodeGraph` arena and refer to each
//! other by `NodeId`.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Arena index of a node inside its `NodeGraph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, PartialEq)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) key: String,
    pub(crate) node_type: String,
    pub(crate) fields: BTreeMap<String, String>,
    pub(crate) values: BTreeMap<String, NodeId>,
    pub(crate) statements: BTreeMap<String, NodeId>,
    pub(crate) next: Option<NodeId>,
    pub(crate) parent: Option<NodeId>,
}

impl Node {
    pub(crate) fn new(id: NodeId, key: String, node_type: String) -> Self {
        Node {
            id,
            key,
            node_type,
            fields: BTreeMap::new(),
            values: BTreeMap::new(),
            statements: BTreeMap::new(),
            next: None,
            parent: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Identity of the block on the editing surface.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Field value, or `default` when the field is absent or blank.
    pub fn field_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        match self.field(name) {
            Some(value) if !value.trim().is_empty() => value,
            _ => default,
        }
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn value(&self, slot: &str) -> Option<NodeId> {
        self.values.get(slot).copied()
    }

    pub fn values(&self) -> &BTreeMap<String, NodeId> {
        &self.values
    }

    pub fn statement(&self, slot: &str) -> Option<NodeId> {
        self.statements.get(slot).copied()
    }

    pub fn statements(&self) -> &BTreeMap<String, NodeId> {
        &self.statements
    }

    pub fn next(&self) -> Option<NodeId> {
        self.next
    }

    /// Enclosing node, if any. Chained siblings never contain each other.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Highest `N` for which a slot named `{prefix}{N}` exists in either the
    /// value or statement slots, plus one. Used by blocks with a variable
    /// number of inputs (`IF0`/`DO0`, `ARG0`, ...).
    pub fn slot_count(&self, prefixes: &[&str]) -> usize {
        self.values
            .keys()
            .chain(self.statements.keys())
            .filter_map(|name| {
                prefixes
                    .iter()
                    .find_map(|prefix| name.strip_prefix(prefix))
                    .and_then(|suffix| suffix.parse::<usize>().ok())
            })
            .map(|n| n + 1)
            .max()
            .unwrap_or(0)
    }

    /// Identifier-safe form of the key, used to derive per-node symbols.
    pub fn symbol_suffix(&self) -> String {
        self.key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn fmt_indent(f: &mut fmt::Formatter<'_>, s: &str, indent: usize) -> fmt::Result {
            for _ in 0..indent { write!(f, " ")?; }
            write!(f, "{}", s)
        }

        writeln!(f, "Node {{")?;
        fmt_indent(f, &format!("id: {},\n", self.id), 2)?;
        fmt_indent(f, &format!("key: {},\n", self.key), 2)?;
        fmt_indent(f, &format!("type: {},\n", self.node_type), 2)?;
        fmt_indent(f, &format!("fields: {:?},\n", self.fields), 2)?;
        fmt_indent(f, &format!("values: {:?},\n", self.values), 2)?;
        fmt_indent(f, &format!("statements: {:?},\n", self.statements), 2)?;

        match self.next {
            Some(next) => fmt_indent(f, &format!("next: {}\n", next), 2)?,
            None => fmt_indent(f, "next: None\n", 2)?,
        }
        match self.parent {
            Some(parent) => fmt_indent(f, &format!("parent: {}\n", parent), 2)?,
            None => fmt_indent(f, "parent: None\n", 2)?,
        }

        writeln!(f, "}}")?;
        Ok(())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}
