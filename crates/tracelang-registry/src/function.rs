//! Compiled script functions.

use tracelang_core::FunctionSchema;
use tracelang_ir::Graph;

/// The result of compiling one function definition: its graph plus the
/// schema extracted from its signature. Calls to a compiled function are
/// inlined into the caller's graph.
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    pub name: String,
    pub graph: Graph,
    pub schema: FunctionSchema,
}

impl CompiledFunction {
    pub fn num_outputs(&self) -> usize {
        self.schema.returns.len()
    }
}
