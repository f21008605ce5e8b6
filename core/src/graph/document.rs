//! file: core/src/graph/document.rs
//! description: serialised block workspace as exchanged with the editor.
//!
//! The editing surface hands the compiler a flat JSON document: a list of
//! node records that refer to each other by key, and an optional ordered list
//! of root keys. `GraphDocument::into_graph` resolves the keys and builds a
//! validated `NodeGraph`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::err::{GraphError, GraphErrorKind};
use super::{GraphBuilder, NodeGraph, NodeId};

const ISSUER: &str = "blockforge.graph.document";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
    #[serde(default)]
    pub statements: BTreeMap<String, String>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Keys of the top-level blocks in editor order. When absent, every node
    /// not referenced by another one is a root.
    #[serde(default)]
    pub roots: Option<Vec<String>>,
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
}

impl GraphDocument {
    pub fn from_json(raw: &str) -> Result<GraphDocument, GraphError> {
        serde_json::from_str(raw).map_err(|e| {
            GraphError::with(
                GraphErrorKind::Unreadable,
                format!("parse graph document: {}", e),
                ISSUER.to_string(),
                None,
            )
        })
    }

    /// Load a document from a JSON file path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<GraphDocument, GraphError> {
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            GraphError::with(
                GraphErrorKind::Unreadable,
                format!("read graph document {:?}: {}", path.as_ref(), e),
                ISSUER.to_string(),
                None,
            )
        })?;
        Self::from_json(&raw)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn into_graph(self) -> Result<NodeGraph, GraphError> {
        let mut builder = GraphBuilder::new();

        for record in &self.nodes {
            let id = builder.node(&record.id, &record.node_type);
            for (name, value) in &record.fields {
                builder.set_field(id, name, &field_text(value));
            }
        }

        let resolve = |builder: &GraphBuilder, owner: &str, key: &str| -> Result<NodeId, GraphError> {
            builder.find(key).ok_or_else(|| {
                GraphError::with(
                    GraphErrorKind::DanglingLink,
                    format!("Node '{}' refers to missing node '{}'", owner, key),
                    ISSUER.to_string(),
                    Some(owner.to_string()),
                )
            })
        };

        for record in &self.nodes {
            let owner = resolve(&builder, &record.id, &record.id)?;
            for (slot, key) in &record.values {
                let child = resolve(&builder, &record.id, key)?;
                builder.set_value(owner, slot, child);
            }
            for (slot, key) in &record.statements {
                let head = resolve(&builder, &record.id, key)?;
                builder.set_statement(owner, slot, head);
            }
            if let Some(key) = &record.next {
                let next = resolve(&builder, &record.id, key)?;
                builder.set_next(owner, next);
            }
        }

        if let Some(roots) = &self.roots {
            for key in roots {
                let root = resolve(&builder, "<root>", key)?;
                builder.mark_root(root);
            }
        }

        builder.build()
    }
}

fn field_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
