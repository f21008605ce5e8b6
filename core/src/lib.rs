pub mod backend;
pub mod codegen;
pub mod compile;
pub mod declarations;
pub mod diagnostics;
pub mod error;
pub mod graph;
pub mod scope;

pub use backend::{Backend, BackendId, ContainerRegistry, GeneratorRegistry, select};
pub use codegen::{Code, CodeGen, GeneratorFn};
pub use compile::{
    CompilationResult, CompileError, CompileOptions, compile, compile_document,
    compile_with_options, generate_fragment,
};
pub use declarations::DeclarationCollector;
pub use diagnostics::{Diagnostic, DiagnosticCode, DiagnosticCollector};
pub use error::{BlockforgeErrorExt, Level};
pub use graph::{GraphBuilder, GraphDocument, GraphError, Node, NodeGraph, NodeId};
pub use scope::is_in_allowed_context;

pub fn generate_error_report<E: BlockforgeErrorExt + ?Sized>(error: &E) -> String {
    let level = error.level();
    let node = match error.node() {
        Some(key) => key,
        None => "no node".to_string(),
    };
    let message = error.message();

    format!("BLOCKFORGE | {} | {} | {}", level, node, message)
}
