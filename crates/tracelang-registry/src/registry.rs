//! The operator registry.
//!
//! Operators are keyed by [`OpSym`]; each symbol maps to the list of
//! overload schemas in registration order, which is also the order schema
//! resolution tries them in. A symbol can additionally carry compiled
//! library functions, which join resolution as candidates right after the
//! operator overloads. The registry keeps the reverse symbol-to-name
//! mapping so diagnostics can spell operator names out.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracelang_core::{FunctionSchema, OpSym};

use crate::function::CompiledFunction;

#[derive(Debug, Default)]
pub struct OpRegistry {
    schemas: FxHashMap<OpSym, Vec<FunctionSchema>>,
    functions: FxHashMap<OpSym, Vec<Arc<CompiledFunction>>>,
    names: FxHashMap<OpSym, String>,
}

impl OpRegistry {
    pub fn new() -> OpRegistry {
        OpRegistry::default()
    }

    /// An empty registry pre-populated with the builtin operator set.
    pub fn with_prelude() -> OpRegistry {
        let mut registry = OpRegistry::new();
        crate::prelude::install(&mut registry);
        registry
    }

    /// Register one overload for `name`. Overloads accumulate in call
    /// order.
    pub fn register(&mut self, name: &str, schema: FunctionSchema) -> OpSym {
        let sym = OpSym::from_name(name);
        self.names.entry(sym).or_insert_with(|| name.to_string());
        self.schemas.entry(sym).or_default().push(schema);
        sym
    }

    /// Register a compiled script function as a library candidate for its
    /// own name. Like overloads, library functions accumulate in call
    /// order.
    pub fn register_function(&mut self, function: Arc<CompiledFunction>) -> OpSym {
        let sym = OpSym::from_name(&function.name);
        self.names.entry(sym).or_insert_with(|| function.name.clone());
        self.functions.entry(sym).or_default().push(function);
        sym
    }

    pub fn lookup(&self, sym: OpSym) -> &[FunctionSchema] {
        self.schemas.get(&sym).map_or(&[], Vec::as_slice)
    }

    pub fn library_functions(&self, sym: OpSym) -> &[Arc<CompiledFunction>] {
        self.functions.get(&sym).map_or(&[], Vec::as_slice)
    }

    /// The registered spelling of a symbol, for diagnostics.
    pub fn name_of(&self, sym: OpSym) -> Option<&str> {
        self.names.get(&sym).map(String::as_str)
    }

    pub fn contains(&self, sym: OpSym) -> bool {
        self.schemas.contains_key(&sym) || self.functions.contains_key(&sym)
    }
}
