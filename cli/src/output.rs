/// cli/src/output.rs
/// Output utilities for the CLI
/// description: Renders compilation diagnostics, fatal errors and the
/// backend listing as console-styled text, JSON or tables.

use std::io::{self, Write};
use std::str::FromStr;

use blockforge_core::backend::{self, BackendId};
use blockforge_core::{BlockforgeErrorExt, CompilationResult, Diagnostic, Level, generate_error_report};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use console::{Style, measure_text_width};

/// How diagnostics are written to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticFormat {
    Text,
    Json,
    Table,
}

impl FromStr for DiagnosticFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(DiagnosticFormat::Text),
            "json" => Ok(DiagnosticFormat::Json),
            "table" => Ok(DiagnosticFormat::Table),
            other => Err(format!("unknown format '{}'", other)),
        }
    }
}

/// Styles for different output elements
pub struct FormatStyle {
    pub title: Style,
    pub info: Style,
    pub warning: Style,
    pub error: Style,
    pub success: Style,
    pub dim: Style,
}

impl Default for FormatStyle {
    fn default() -> Self {
        FormatStyle {
            title: Style::new().for_stderr().bold().underlined(),
            info: Style::new().for_stderr().cyan(),
            warning: Style::new().for_stderr().yellow(),
            error: Style::new().for_stderr().red().bold(),
            success: Style::new().for_stderr().green().bold(),
            dim: Style::new().for_stderr().dim(),
        }
    }
}

impl FormatStyle {
    fn for_level(&self, level: Level) -> &Style {
        match level {
            Level::Info => &self.info,
            Level::Warning => &self.warning,
            Level::Error | Level::Critical => &self.error,
        }
    }
}

/// Writes diagnostics and summaries into any `Write`.
pub struct Reporter<T: Write> {
    out: T,
    formatting: FormatStyle,
}

impl<T: Write> Reporter<T> {
    pub fn new(out: T) -> Self {
        Reporter { out, formatting: FormatStyle::default() }
    }

    /// Write a single line, styled when a style is given.
    pub fn line(&mut self, text: &str, style: Option<&Style>) -> io::Result<()> {
        match style {
            Some(s) => writeln!(self.out, "{}", s.apply_to(text)),
            None => writeln!(self.out, "{}", text),
        }
    }

    pub fn diagnostics(&mut self, result: &CompilationResult, format: DiagnosticFormat) -> io::Result<()> {
        match format {
            DiagnosticFormat::Text => self.text(result),
            DiagnosticFormat::Json => {
                let json = serde_json::to_string_pretty(&result.diagnostics)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                writeln!(self.out, "{}", json)
            }
            DiagnosticFormat::Table => {
                if !result.diagnostics.is_empty() {
                    writeln!(self.out, "{}", diagnostics_table(&result.diagnostics))?;
                }
                self.summary(result)
            }
        }
    }

    fn text(&mut self, result: &CompilationResult) -> io::Result<()> {
        for d in &result.diagnostics {
            let head = format!("{}[{}]", d.level.to_string().to_lowercase(), d.code);
            let style = self.formatting.for_level(d.level).clone();
            let dim = self.formatting.dim.clone();
            writeln!(
                self.out,
                "{} {} {}",
                style.apply_to(head),
                dim.apply_to(format!("{} ({}):", d.node, d.node_type)),
                d.message
            )?;
        }
        self.summary(result)
    }

    /// One line with the error and warning counts.
    pub fn summary(&mut self, result: &CompilationResult) -> io::Result<()> {
        let errors = result
            .diagnostics
            .iter()
            .filter(|d| matches!(d.level, Level::Error | Level::Critical))
            .count();
        let warnings = result.diagnostics.iter().filter(|d| d.level == Level::Warning).count();
        let text = format!(
            "compiled for {}: {} error(s), {} warning(s)",
            result.backend, errors, warnings
        );

        let style = if errors > 0 {
            self.formatting.error.clone()
        } else if warnings > 0 {
            self.formatting.warning.clone()
        } else {
            self.formatting.success.clone()
        };
        self.line(&text, Some(&style))
    }

    /// Report an error that stopped the compilation.
    pub fn fatal<E: BlockforgeErrorExt + ?Sized>(&mut self, error: &E) -> io::Result<()> {
        let style = self.formatting.error.clone();
        self.line(&generate_error_report(error), Some(&style))
    }

    /// Title followed by an underline sized to it.
    pub fn title(&mut self, text: &str) -> io::Result<()> {
        let style = self.formatting.title.clone();
        self.line(text, Some(&style))?;
        self.line(&"=".repeat(measure_text_width(text)), None)
    }
}

pub fn diagnostics_table(diagnostics: &[Diagnostic]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Level", "Code", "Node", "Type", "Message"]);

    for d in diagnostics {
        table.add_row(vec![
            d.level.to_string(),
            d.code.to_string(),
            d.node.clone(),
            d.node_type.clone(),
            d.message.clone(),
        ]);
    }
    table
}

/// Built-in backends with their structural block types.
pub fn targets_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Target", "Name", "Containers", "Always emitted", "Block types"]);

    for id in BackendId::ALL {
        let b = backend::select(id);
        table.add_row(vec![
            id.to_string(),
            b.display_name.to_string(),
            b.containers.describe(),
            b.always_emitted.describe(),
            b.block_types().len().to_string(),
        ]);
    }
    table
}
