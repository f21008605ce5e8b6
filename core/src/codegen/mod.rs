//! file: core/src/codegen/mod.rs
//! description: per-compilation generation context and registry dispatch.
//!
//! `CodeGen` is created fresh for every compilation and owns all mutable
//! state of that run: the deferred declaration collector, the setup
//! collector and the diagnostics. Generators receive it mutably and use it to
//! recurse into slots, check their containment, and register one-time
//! fragments. Nothing here is global, so compilations stay independent.

use crate::backend::{Backend, Formatting};
use crate::declarations::DeclarationCollector;
use crate::diagnostics::{Diagnostic, DiagnosticCollector};
use crate::graph::{Node, NodeGraph, NodeId};
use crate::scope;

/// Binding strength of a generated expression. Lower binds tighter; each
/// backend defines its own scale between `ORDER_ATOMIC` and `ORDER_NONE`.
pub type Order = u8;

pub const ORDER_ATOMIC: Order = 0;
pub const ORDER_NONE: Order = 99;

/// Output of a single generator call.
#[derive(Debug, Clone, PartialEq)]
pub enum Code {
    /// Complete statement text, including its terminator and newline.
    Statement(String),
    /// Expression text and the order of its outermost operator.
    Expression(String, Order),
}

impl Code {
    pub fn empty() -> Self {
        Code::Statement(String::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Code::Statement(text) | Code::Expression(text, _) => text.is_empty(),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Code::Statement(text) | Code::Expression(text, _) => text,
        }
    }
}

/// Signature shared by every entry of a generator registry.
pub type GeneratorFn = fn(&mut CodeGen<'_>, &Node) -> Code;

pub struct CodeGen<'g> {
    graph: &'g NodeGraph,
    backend: &'g Backend,
    declarations: DeclarationCollector,
    setups: DeclarationCollector,
    diagnostics: DiagnosticCollector,
    always_emitted_done: bool,
    entry_points_seen: usize,
}

impl<'g> CodeGen<'g> {
    pub fn new(graph: &'g NodeGraph, backend: &'g Backend) -> Self {
        CodeGen {
            graph,
            backend,
            declarations: DeclarationCollector::new(),
            setups: DeclarationCollector::new(),
            diagnostics: DiagnosticCollector::new(),
            always_emitted_done: false,
            entry_points_seen: 0,
        }
    }

    pub fn graph(&self) -> &'g NodeGraph {
        self.graph
    }

    pub fn backend(&self) -> &'g Backend {
        self.backend
    }

    pub fn formatting(&self) -> &'g Formatting {
        &self.backend.formatting
    }

    /// Generate one node through the backend registry. A type the registry
    /// does not know yields empty code and a `MISSING_GENERATOR` diagnostic;
    /// the rest of the compilation carries on.
    pub fn generate(&mut self, id: NodeId) -> Code {
        let graph = self.graph;
        let node = graph.node(id);

        match self.backend.generators.get(node.node_type()) {
            Some(generator) => generator(self, node),
            None => {
                log::error!(
                    "no generator for block type '{}' (node '{}') in backend '{}'",
                    node.node_type(),
                    node.key(),
                    self.backend.name
                );
                self.diagnostics.push(Diagnostic::missing_generator(
                    node.key(),
                    node.node_type(),
                    self.backend.name,
                ));
                Code::empty()
            }
        }
    }

    /// Statement text for a single node. A bare expression at statement
    /// position is terminated like a statement.
    pub fn statement_code(&mut self, id: NodeId) -> String {
        match self.generate(id) {
            Code::Statement(text) => text,
            Code::Expression(text, _) if text.is_empty() => text,
            Code::Expression(text, _) => self.line(&text),
        }
    }

    /// Code of `head` and every node chained after it, unindented.
    pub fn chain_to_code(&mut self, head: NodeId) -> String {
        let graph = self.graph;
        let mut out = String::new();
        for node in graph.chain(head) {
            out.push_str(&self.statement_code(node.id()));
        }
        out
    }

    /// Indented code of the sequence in `owner`'s statement slot. Empty when
    /// the slot is unfilled or generates nothing.
    pub fn statements_to_code(&mut self, owner: &Node, slot: &str) -> String {
        match owner.statement(slot) {
            Some(head) => {
                let code = self.chain_to_code(head);
                self.indent(&code)
            }
            None => String::new(),
        }
    }

    /// Like `statements_to_code`, but falls back to the backend's empty-body
    /// statement (`pass`) where the target language requires one.
    pub fn statement_body(&mut self, owner: &Node, slot: &str) -> String {
        let code = self.statements_to_code(owner, slot);
        match self.backend.formatting.empty_body {
            Some(filler) if code.trim().is_empty() => {
                let line = self.line(filler);
                self.indent(&line)
            }
            _ => code,
        }
    }

    /// Expression text of `owner`'s value slot, parenthesised when its order
    /// binds looser than `outer`. `None` when the slot is unfilled or its
    /// node produced nothing.
    pub fn value_to_code(&mut self, owner: &Node, slot: &str, outer: Order) -> Option<String> {
        let child = owner.value(slot)?;

        match self.generate(child) {
            Code::Expression(code, _) if code.is_empty() => None,
            Code::Expression(code, inner) => Some(parenthesize(code, inner, outer)),
            Code::Statement(code) => {
                if !code.is_empty() {
                    log::warn!(
                        "statement block '{}' plugged into value slot '{}' of '{}'; ignored",
                        self.graph.node(child).node_type(),
                        slot,
                        owner.key()
                    );
                }
                None
            }
        }
    }

    pub fn value_or(&mut self, owner: &Node, slot: &str, outer: Order, default: &str) -> String {
        self.value_to_code(owner, slot, outer)
            .unwrap_or_else(|| default.to_string())
    }

    /// Scope guard for generators whose block only makes sense inside a
    /// routine. Records `ORPHANED_NESTED` when there is no container above.
    pub fn in_allowed_context(&mut self, node: &Node) -> bool {
        if scope::is_in_allowed_context(self.graph, node.id(), &self.backend.containers) {
            return true;
        }

        log::warn!(
            "block '{}' (node '{}') has no container above it; skipped",
            node.node_type(),
            node.key()
        );
        self.diagnostics.push(Diagnostic::orphaned_nested(
            node.key(),
            node.node_type(),
            &self.backend.containers.describe(),
        ));
        false
    }

    /// Nearest container around `node`, if any.
    pub fn enclosing_container(&self, node: &Node) -> Option<&'g Node> {
        scope::enclosing_container(self.graph, node.id(), &self.backend.containers)
            .map(|id| self.graph.node(id))
    }

    /// Nearest ancestor of one of `types` inside the same routine.
    pub fn enclosing_within_routine(&self, node: &Node, types: &[&str]) -> Option<&'g Node> {
        scope::enclosing_within_routine(self.graph, node.id(), types, &self.backend.containers)
            .map(|id| self.graph.node(id))
    }

    pub fn ensure_declared(&mut self, symbol: &str, text: &str) -> bool {
        self.declarations.ensure_declared(symbol, text)
    }

    pub fn ensure_setup(&mut self, symbol: &str, text: &str) -> bool {
        self.setups.ensure_declared(symbol, text)
    }

    pub fn declarations(&self) -> &DeclarationCollector {
        &self.declarations
    }

    pub fn setups(&self) -> &DeclarationCollector {
        &self.setups
    }

    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> &DiagnosticCollector {
        &self.diagnostics
    }

    /// Generate every always-emitted node in the graph, wherever it sits.
    ///
    /// This bypasses slot-driven recursion and orphan filtering. It runs at
    /// most once per compilation; the entry point's generator calls it before
    /// reading the setup collector.
    pub fn run_always_emitted_pass(&mut self) {
        if self.always_emitted_done {
            return;
        }
        self.always_emitted_done = true;

        let graph = self.graph;
        for node in graph.nodes() {
            if !self.backend.always_emitted.contains(node.node_type()) {
                continue;
            }
            let leftover = self.generate(node.id());
            if !leftover.is_empty() {
                log::debug!(
                    "always-emitted block '{}' returned inline code; discarded",
                    node.key()
                );
            }
        }
    }

    /// Called by entry-point generators; warns when a graph holds more than
    /// one of them.
    pub fn note_entry_point(&mut self, node: &Node) {
        self.entry_points_seen += 1;
        if self.entry_points_seen > 1 {
            log::warn!(
                "entry point '{}' is not the first one in this graph; setup lines are repeated",
                node.key()
            );
        }
    }

    pub fn entry_points_seen(&self) -> usize {
        self.entry_points_seen
    }

    /// Prefix every non-empty line with one indent unit.
    pub fn indent(&self, code: &str) -> String {
        let unit = self.backend.formatting.indent;
        let mut out = String::with_capacity(code.len());
        for line in code.lines() {
            if !line.is_empty() {
                out.push_str(unit);
                out.push_str(line);
            }
            out.push('\n');
        }
        out
    }

    /// A single statement line with the backend's separator.
    pub fn line(&self, code: &str) -> String {
        format!("{}{}\n", code, self.backend.formatting.statement_separator)
    }

    pub fn comment(&self, text: &str) -> String {
        self.backend.formatting.comment(text)
    }

    pub fn into_parts(self) -> (DeclarationCollector, DeclarationCollector, DiagnosticCollector) {
        (self.declarations, self.setups, self.diagnostics)
    }
}

fn parenthesize(code: String, inner: Order, outer: Order) -> String {
    let same_neutral = inner == outer && (outer == ORDER_ATOMIC || outer == ORDER_NONE);
    if inner >= outer && !same_neutral {
        format!("({})", code)
    } else {
        code
    }
}
