//! file: core/src/declarations.rs
//! description: run-scoped, symbol-keyed one-time output fragments.
//!
//! Generators call `ensure_declared` whenever they need a piece of one-time
//! output (an include, a global, a prototype, a setup line). The first call
//! for a symbol records its text; later calls for the same symbol are no-ops,
//! so the fragment appears exactly once no matter how many blocks ask for it.
//! `flush` joins the fragments in first-registration order.

use std::collections::HashSet;

/// Insertion-ordered collector keyed by symbol.
///
/// # Examples
/// ```
/// use blockforge_core::declarations::DeclarationCollector;
///
/// let mut decls = DeclarationCollector::new();
/// decls.ensure_declared("servo_h", "#include <Servo.h>");
/// decls.ensure_declared("servo_h", "#include <Servo.h>");
/// assert_eq!(decls.flush(), "#include <Servo.h>\n");
/// ```
#[derive(Debug, Clone, Default)]
pub struct DeclarationCollector {
    entries: Vec<(String, String)>,
    seen: HashSet<String>,
}

impl DeclarationCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `text` under `symbol` unless the symbol is already present.
    /// Returns true when this call inserted the entry.
    pub fn ensure_declared(&mut self, symbol: &str, text: &str) -> bool {
        if !self.seen.insert(symbol.to_string()) {
            return false;
        }
        self.entries.push((symbol.to_string(), text.to_string()));
        true
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.seen.contains(symbol)
    }

    pub fn get(&self, symbol: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, text)| text.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fragment texts in registration order.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, text)| text.as_str())
    }

    /// Ordered text of every fragment, each terminated by a newline.
    pub fn flush(&self) -> String {
        let mut out = String::new();
        for text in self.lines() {
            out.push_str(text.trim_end_matches('\n'));
            out.push('\n');
        }
        out
    }
}
