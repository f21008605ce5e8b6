// Structured diagnostics produced during a compilation.
// Each diagnostic names the offending block, its type and a fixed reason
// code; the host decides how to show them. Diagnostics never stop a
// compilation.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt;

use crate::error::{BlockforgeErrorExt, Level};

/// Fixed reason codes reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    /// A root block that is not a container.
    OrphanedTopLevel,
    /// A guarded block with no container anywhere above it.
    OrphanedNested,
    /// The active backend has no generator for the block type.
    MissingGenerator,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::OrphanedTopLevel => "ORPHANED_TOP_LEVEL",
            DiagnosticCode::OrphanedNested => "ORPHANED_NESTED",
            DiagnosticCode::MissingGenerator => "MISSING_GENERATOR",
        }
    }

    /// Orphans are user-correctable; a missing generator is a configuration
    /// problem no edit can fix.
    pub fn level(&self) -> Level {
        match self {
            DiagnosticCode::OrphanedTopLevel | DiagnosticCode::OrphanedNested => Level::Warning,
            DiagnosticCode::MissingGenerator => Level::Error,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub level: Level,
    /// Editor key of the offending block.
    pub node: String,
    pub node_type: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(code: DiagnosticCode, node: &str, node_type: &str, message: String) -> Self {
        Diagnostic {
            code,
            level: code.level(),
            node: node.to_string(),
            node_type: node_type.to_string(),
            message,
        }
    }

    pub fn orphaned_top_level(node: &str, node_type: &str, containers: &str) -> Self {
        Diagnostic::new(
            DiagnosticCode::OrphanedTopLevel,
            node,
            node_type,
            format!(
                "Block '{}' is not inside a container; place it inside one of: {}",
                node_type, containers
            ),
        )
    }

    pub fn orphaned_nested(node: &str, node_type: &str, containers: &str) -> Self {
        Diagnostic::new(
            DiagnosticCode::OrphanedNested,
            node,
            node_type,
            format!(
                "Block '{}' has no container above it; move it inside one of: {}",
                node_type, containers
            ),
        )
    }

    pub fn missing_generator(node: &str, node_type: &str, backend: &str) -> Self {
        Diagnostic::new(
            DiagnosticCode::MissingGenerator,
            node,
            node_type,
            format!("No code generator for block '{}' in the {} backend", node_type, backend),
        )
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} at {} ({}): {}",
            self.level, self.code, self.node, self.node_type, self.message
        )
    }
}

impl Error for Diagnostic {}

impl BlockforgeErrorExt for Diagnostic {
    fn level(&self) -> Level {
        self.level
    }

    fn message(&self) -> String {
        self.message.clone()
    }

    fn issuer(&self) -> String {
        format!("blockforge.codegen.{}", self.code.as_str().to_lowercase())
    }

    fn node(&self) -> Option<String> {
        Some(self.node.clone())
    }
}

/// Ordered diagnostics of one compilation. A block is reported at most once
/// per reason code.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
    seen: HashSet<(DiagnosticCode, String)>, // dedupe key: (code, node)
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, d: Diagnostic) {
        let key = (d.code, d.node.clone());
        if self.seen.insert(key) {
            self.diagnostics.push(d);
        }
    }

    pub fn extend(&mut self, others: impl IntoIterator<Item = Diagnostic>) {
        for d in others {
            self.push(d);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| matches!(d.level, Level::Error | Level::Critical))
    }

    pub fn has_warnings(&self) -> bool {
        self.diagnostics.iter().any(|d| d.level == Level::Warning)
    }

    /// (errors, warnings)
    pub fn counts(&self) -> (usize, usize) {
        let mut e = 0;
        let mut w = 0;
        for d in &self.diagnostics {
            match d.level {
                Level::Error | Level::Critical => e += 1,
                Level::Warning => w += 1,
                Level::Info => {}
            }
        }
        (e, w)
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.diagnostics)
    }
}
