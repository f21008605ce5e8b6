//! file: core/src/compile.rs
//! description: top-level driver, host entry points and compile options.
//!
//! The driver walks only the top-level stacks: each root and the blocks
//! chained after it. Containers and always-emitted blocks are generated;
//! every other block of a stack is an orphan and gets a placeholder comment
//! plus an `ORPHANED_TOP_LEVEL` diagnostic. The result is the flushed
//! declarations, the banner, then the generated sections.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backend::{self, Backend, BackendId};
use crate::codegen::{Code, CodeGen};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::error::{BlockforgeErrorExt, Level};
use crate::graph::{GraphDocument, GraphError, Node, NodeGraph, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Emit the "Generated by" banner comment.
    pub banner: bool,
    /// Emit a placeholder comment where an orphaned root was skipped.
    pub placeholders: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            banner: true,
            placeholders: true,
        }
    }
}

impl CompileOptions {
    /// Load options from a JSON file. Missing keys keep their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<CompileOptions, CompileError> {
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            CompileError::Config(format!("read options {:?}: {}", path.as_ref(), e))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| CompileError::Config(format!("parse options {:?}: {}", path.as_ref(), e)))
    }
}

/// Generated source and everything worth telling the user about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationResult {
    pub backend: String,
    pub source: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompilationResult {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| matches!(d.level, Level::Error | Level::Critical))
    }

    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.code == code)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Fatal failures of the host entry points.
#[derive(Debug)]
pub enum CompileError {
    Graph(GraphError),
    UnknownBackend(String),
    Config(String),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Graph(e) => write!(f, "malformed graph: {}", e),
            CompileError::UnknownBackend(msg) => write!(f, "{}", msg),
            CompileError::Config(msg) => write!(f, "invalid options: {}", msg),
        }
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CompileError::Graph(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GraphError> for CompileError {
    fn from(e: GraphError) -> Self {
        CompileError::Graph(e)
    }
}

impl BlockforgeErrorExt for CompileError {
    fn level(&self) -> Level {
        match self {
            CompileError::Graph(e) => e.level(),
            _ => Level::Critical,
        }
    }

    fn message(&self) -> String {
        match self {
            CompileError::Graph(e) => e.message(),
            other => other.to_string(),
        }
    }

    fn issuer(&self) -> String {
        match self {
            CompileError::Graph(e) => e.issuer(),
            CompileError::UnknownBackend(_) => "blockforge.backend.select".to_string(),
            CompileError::Config(_) => "blockforge.compile.options".to_string(),
        }
    }

    fn node(&self) -> Option<String> {
        match self {
            CompileError::Graph(e) => e.node(),
            _ => None,
        }
    }
}

/// Compile `graph` with a built-in backend and default options.
pub fn compile(graph: &NodeGraph, backend: BackendId) -> CompilationResult {
    compile_with_options(graph, backend::select(backend), &CompileOptions::default())
}

pub fn compile_with_options(
    graph: &NodeGraph,
    backend: &Backend,
    options: &CompileOptions,
) -> CompilationResult {
    let mut ctx = CodeGen::new(graph, backend);
    let roots = graph.roots();
    let mut sections: Vec<String> = vec![String::new(); roots.len()];

    // Entry points go last so that setup lines registered by any other root
    // are in the collector when the entry point reads it.
    for entry_pass in [false, true] {
        for (slot, &root) in roots.iter().enumerate() {
            let node = graph.node(root);
            if backend.is_entry_point(node.node_type()) != entry_pass {
                continue;
            }
            sections[slot] = top_level_stack(&mut ctx, node, options);
        }
    }

    if ctx.entry_points_seen() == 0 && !ctx.setups().is_empty() {
        log::warn!(
            "{} setup line(s) registered but the graph has no entry point; dropped",
            ctx.setups().len()
        );
    }

    let ordered: Vec<String> = if backend.formatting.entry_points_last {
        let (entries, others): (Vec<_>, Vec<_>) = roots
            .iter()
            .zip(sections)
            .partition(|(root, _)| backend.is_entry_point(graph.node(**root).node_type()));
        others.into_iter().chain(entries).map(|(_, code)| code).collect()
    } else {
        sections
    };

    let banner = options
        .banner
        .then(|| ctx.comment(&format!("Generated by blockforge for {}", backend.display_name)));

    let (declarations, _setups, diagnostics) = ctx.into_parts();
    let source = assemble(&declarations.flush(), banner.as_deref(), &ordered);

    let (errors, warnings) = diagnostics.counts();
    log::info!(
        "compiled {} roots for {}: {} error(s), {} warning(s)",
        roots.len(),
        backend.name,
        errors,
        warnings
    );

    CompilationResult {
        backend: backend.name.to_string(),
        source,
        diagnostics: diagnostics.into_vec(),
    }
}

/// Host entry point: build the serialised graph and compile it with the
/// backend named `backend_name`.
pub fn compile_document(
    document: GraphDocument,
    backend_name: &str,
    options: &CompileOptions,
) -> Result<CompilationResult, CompileError> {
    let id: BackendId = backend_name.parse().map_err(CompileError::UnknownBackend)?;
    let graph = document.into_graph()?;
    Ok(compile_with_options(&graph, backend::select(id), options))
}

/// Code of a single node for an editor preview. A root is rendered with
/// the stack chained below it, judged the same way `compile` judges it.
/// Declarations it registers are flushed in front of it.
pub fn generate_fragment(graph: &NodeGraph, node: NodeId, backend: &Backend) -> CompilationResult {
    let options = CompileOptions::default();
    let mut ctx = CodeGen::new(graph, backend);
    let target = graph.node(node);

    let code = if graph.roots().contains(&node) {
        top_level_stack(&mut ctx, target, &options)
    } else {
        match ctx.generate(node) {
            Code::Statement(text) => text,
            Code::Expression(text, _) if text.is_empty() => text,
            Code::Expression(text, _) => format!("{}\n", text),
        }
    };

    let (declarations, _setups, diagnostics) = ctx.into_parts();
    CompilationResult {
        backend: backend.name.to_string(),
        source: assemble(&declarations.flush(), None, &[code]),
        diagnostics: diagnostics.into_vec(),
    }
}

/// A root and every block chained after it. Chained blocks sit outside any
/// container too, so each one is judged like a root.
fn top_level_stack(ctx: &mut CodeGen<'_>, root: &Node, options: &CompileOptions) -> String {
    let graph = ctx.graph();
    let mut code = String::new();
    for node in graph.chain(root.id()) {
        code.push_str(&top_level(ctx, node, options));
    }
    code
}

fn top_level(ctx: &mut CodeGen<'_>, node: &Node, options: &CompileOptions) -> String {
    let backend = ctx.backend();
    let node_type = node.node_type();

    if backend.is_container(node_type) || backend.is_always_emitted(node_type) {
        log::debug!("generating root '{}' ({})", node.key(), node_type);
        return ctx.generate(node.id()).into_text();
    }

    let allowed = backend.containers.describe();
    log::warn!(
        "root block '{}' ({}) is outside any container; skipped",
        node.key(),
        node_type
    );
    ctx.push_diagnostic(Diagnostic::orphaned_top_level(node.key(), node_type, &allowed));

    if options.placeholders {
        ctx.comment(&format!(
            "[{}] '{}' skipped: place it inside one of: {}",
            DiagnosticCode::OrphanedTopLevel,
            node_type,
            allowed
        ))
    } else {
        String::new()
    }
}

/// Declarations, banner and non-empty sections separated by blank lines.
fn assemble(declarations: &str, banner: Option<&str>, sections: &[String]) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if !declarations.is_empty() {
        parts.push(declarations);
    }
    if let Some(banner) = banner {
        parts.push(banner);
    }
    parts.extend(
        sections
            .iter()
            .map(String::as_str)
            .filter(|code| !code.trim().is_empty()),
    );

    if parts.is_empty() {
        return String::new();
    }

    parts
        .iter()
        .map(|part| part.trim_end_matches('\n'))
        .collect::<Vec<_>>()
        .join("\n\n")
        + "\n"
}
