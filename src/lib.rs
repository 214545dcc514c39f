//! Umbrella crate for the tracelang frontend.
//!
//! Re-exports the member crates so users depend on one crate: `core` for
//! spans, types and errors, `ast` for the source-level function
//! representation, `ir` for the block-structured graph, `registry` for
//! operator schemas, and `compiler` for the AST-to-graph emitter.

pub use tracelang_ast as ast;
pub use tracelang_compiler as compiler;
pub use tracelang_core as core;
pub use tracelang_ir as ir;
pub use tracelang_registry as registry;

pub use tracelang_compiler::{EmptyResolver, FunctionResolver, Resolver, compile_function};
pub use tracelang_core::{CompileError, CompileResult};
pub use tracelang_registry::{CompiledFunction, OpRegistry};
