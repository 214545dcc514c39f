//! Resolution of free names that are not locals or builtin operators.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracelang_core::Span;
use tracelang_registry::CompiledFunction;

use crate::binding::{Binding, Callable};

/// Hook for the embedder to resolve names the compiler does not know:
/// previously compiled functions, constants, anything the host environment
/// exposes to scripts.
pub trait Resolver {
    fn resolve(&self, name: &str, span: Span) -> Option<Binding>;
}

/// A resolver that knows nothing.
#[derive(Debug, Default)]
pub struct EmptyResolver;

impl Resolver for EmptyResolver {
    fn resolve(&self, _name: &str, _span: Span) -> Option<Binding> {
        None
    }
}

/// Resolver backed by a table of compiled script functions.
#[derive(Debug, Default)]
pub struct FunctionResolver {
    functions: FxHashMap<String, Arc<CompiledFunction>>,
}

impl FunctionResolver {
    pub fn new() -> FunctionResolver {
        FunctionResolver::default()
    }

    pub fn insert(&mut self, function: Arc<CompiledFunction>) {
        self.functions.insert(function.name.clone(), function);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<CompiledFunction>> {
        self.functions.get(name)
    }
}

impl Resolver for FunctionResolver {
    fn resolve(&self, name: &str, _span: Span) -> Option<Binding> {
        self.functions
            .get(name)
            .map(|f| Binding::Callable(Callable::Function(Arc::clone(f))))
    }
}
