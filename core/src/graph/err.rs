//! Error type for malformed graphs.
//!
//! `GraphError` is returned while building a `NodeGraph` when the input does
//! not describe a forest of blocks. It is fatal to the whole compilation and
//! implements `BlockforgeErrorExt` for unified reporting.

use crate::error::{BlockforgeErrorExt, Level};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphErrorKind {
    DuplicateNode,
    DanglingLink,
    MultipleOwners,
    Cycle,
    Detached,
    Unreadable,
}

#[derive(Debug, Clone)]
pub struct GraphError {
    kind: GraphErrorKind,
    level: Level,
    message: String,
    issuer: String,
    node: Option<String>,
}

impl GraphError {
    pub fn with(
        kind: GraphErrorKind,
        message: String,
        issuer: String,
        node: Option<String>,
    ) -> Self {
        GraphError {
            kind,
            level: Level::Critical,
            message,
            issuer,
            node,
        }
    }

    pub fn kind(&self) -> &GraphErrorKind {
        &self.kind
    }
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(node) = &self.node {
            write!(f, "{} (at node '{}')", self.message, node)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for GraphError {}

impl BlockforgeErrorExt for GraphError {
    fn level(&self) -> Level {
        self.level
    }

    fn message(&self) -> String {
        self.message.clone()
    }

    fn issuer(&self) -> String {
        self.issuer.clone()
    }

    fn node(&self) -> Option<String> {
        self.node.clone()
    }
}
