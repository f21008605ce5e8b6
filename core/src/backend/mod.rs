//! file: core/src/backend/mod.rs
//! description: target language backends and their registries.
//!
//! A `Backend` bundles everything target-specific: the generator registry,
//! the set of container types, the entry-point and always-emitted types, and
//! the formatting conventions. The two built-in backends are immutable
//! statics selected by `BackendId`; hosts can assemble their own with
//! `Backend::new` and hand it to `compile_with_options`.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::codegen::GeneratorFn;
use crate::graph::Node;

pub mod arduino;
pub mod micropython;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    Arduino,
    MicroPython,
}

impl BackendId {
    pub const ALL: [BackendId; 2] = [BackendId::Arduino, BackendId::MicroPython];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::Arduino => "arduino",
            BackendId::MicroPython => "micropython",
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BackendId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arduino" | "cpp" => Ok(BackendId::Arduino),
            "micropython" | "python" => Ok(BackendId::MicroPython),
            other => Err(format!(
                "unknown backend '{}' (expected one of: arduino, micropython)",
                other
            )),
        }
    }
}

/// A set of block type names. Used for the container registry as well as
/// the entry-point and always-emitted sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeSet {
    types: BTreeSet<&'static str>,
}

/// Block types that legitimately host nested statements at top level.
pub type ContainerRegistry = TypeSet;

impl TypeSet {
    pub fn new(types: &[&'static str]) -> Self {
        TypeSet {
            types: types.iter().copied().collect(),
        }
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.types.contains(node_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.types.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Sorted, comma separated list for user-facing messages.
    pub fn describe(&self) -> String {
        self.types.iter().copied().collect::<Vec<_>>().join(", ")
    }
}

/// Block type name to generator function.
#[derive(Clone, Default)]
pub struct GeneratorRegistry {
    generators: HashMap<&'static str, GeneratorFn>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, node_type: &'static str, generator: GeneratorFn) -> &mut Self {
        if self.generators.insert(node_type, generator).is_some() {
            log::warn!("generator for '{}' registered twice; last one wins", node_type);
        }
        self
    }

    pub fn remove(&mut self, node_type: &str) -> Option<GeneratorFn> {
        self.generators.remove(node_type)
    }

    pub fn get(&self, node_type: &str) -> Option<GeneratorFn> {
        self.generators.get(node_type).copied()
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.generators.contains_key(node_type)
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    /// Registered type names, sorted.
    pub fn types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.generators.keys().copied().collect();
        types.sort_unstable();
        types
    }
}

impl fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.types()).finish()
    }
}

/// Textual conventions of a target language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formatting {
    pub statement_separator: &'static str,
    pub comment_prefix: &'static str,
    pub indent: &'static str,
    /// Statement required where a block body would otherwise be empty.
    pub empty_body: Option<&'static str>,
    /// Place entry-point sections after every other top-level section.
    /// Needed by targets that execute the file top to bottom.
    pub entry_points_last: bool,
}

impl Formatting {
    pub fn comment(&self, text: &str) -> String {
        let mut out = String::new();
        for line in text.lines() {
            out.push_str(self.comment_prefix);
            out.push(' ');
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct Backend {
    pub name: &'static str,
    pub display_name: &'static str,
    pub containers: ContainerRegistry,
    pub entry_points: TypeSet,
    pub always_emitted: TypeSet,
    pub generators: GeneratorRegistry,
    pub formatting: Formatting,
}

impl Backend {
    pub fn new(name: &'static str, display_name: &'static str, formatting: Formatting) -> Self {
        Backend {
            name,
            display_name,
            containers: TypeSet::default(),
            entry_points: TypeSet::default(),
            always_emitted: TypeSet::default(),
            generators: GeneratorRegistry::new(),
            formatting,
        }
    }

    pub fn is_container(&self, node_type: &str) -> bool {
        self.containers.contains(node_type)
    }

    pub fn is_entry_point(&self, node_type: &str) -> bool {
        self.entry_points.contains(node_type)
    }

    pub fn is_always_emitted(&self, node_type: &str) -> bool {
        self.always_emitted.contains(node_type)
    }

    /// Every block type this backend knows about.
    pub fn block_types(&self) -> Vec<&'static str> {
        self.generators.types()
    }
}

/// Block types that `break`/`continue` may exit.
pub(crate) const LOOP_TYPES: &[&str] = &["controls_repeat_ext", "controls_whileUntil", "controls_for"];

/// Identifier-safe rendering of a user supplied name.
pub(crate) fn identifier(raw: &str, default: &str) -> String {
    let mut out: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() {
        return default.to_string();
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Identifier-safe fragment appended to a generated name (`pin_out_13`).
pub(crate) fn suffix(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Parameter names of a function definition, from its comma separated
/// `PARAMS` field.
pub(crate) fn parameters(node: &Node) -> Vec<String> {
    node.field("PARAMS")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| identifier(p, "arg"))
        .collect()
}

/// Arguments of a call block, read from its `ARG0..ARGn` value slots.
pub(crate) fn call_arguments(ctx: &mut crate::codegen::CodeGen<'_>, node: &Node, default: &str) -> Vec<String> {
    (0..node.slot_count(&["ARG"]))
        .map(|i| ctx.value_or(node, &format!("ARG{}", i), crate::codegen::ORDER_NONE, default))
        .collect()
}

/// Value of generated expression text that is a plain number literal.
/// Identifiers such as `inf` or `nan` are not literals.
pub(crate) fn numeric_literal(code: &str) -> Option<f64> {
    code.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// True when the field holds a truthy editor value (`TRUE`, `true`, `1`).
pub(crate) fn flag(node: &Node, name: &str, default: bool) -> bool {
    match node.field(name).map(|v| v.trim().to_ascii_uppercase()) {
        Some(v) if v == "TRUE" || v == "1" => true,
        Some(v) if v == "FALSE" || v == "0" => false,
        _ => default,
    }
}

lazy_static! {
    static ref ARDUINO: Backend = arduino::backend();
    static ref MICROPYTHON: Backend = micropython::backend();
}

/// The built-in backend for `id`.
pub fn select(id: BackendId) -> &'static Backend {
    match id {
        BackendId::Arduino => &ARDUINO,
        BackendId::MicroPython => &MICROPYTHON,
    }
}
