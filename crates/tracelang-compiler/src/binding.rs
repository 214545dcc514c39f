//! What a name can be bound to during compilation.
//!
//! Most bindings are plain graph values, but names can also refer to things
//! that have no first-class representation in the IR: builtin operators,
//! compiled functions, and the handful of special callables like `print`
//! and `fork`. Those can be called but never passed around as values.

use std::sync::Arc;

use tracelang_core::{CompileError, CompileResult, OpSym, Span, Type};
use tracelang_ir::ValueId;
use tracelang_registry::CompiledFunction;

/// Result of the static `None`-ness test used to narrow `is` / `is not`
/// conditionals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoneStatus {
    Always,
    Never,
    Maybe,
}

#[derive(Debug, Clone)]
pub enum Binding {
    /// A first-class graph value.
    Value(ValueId),
    /// A name that resolved to nothing callable or usable; calling or
    /// reading it as a value is an error with a better message than
    /// "undefined".
    None,
    Callable(Callable),
}

#[derive(Debug, Clone)]
pub enum Callable {
    /// A builtin operator, called as a free function.
    Op(OpSym),
    /// Method-call sugar: `x.foo(y)` resolves to `foo` with `x` bound as
    /// the `self` argument.
    Method { sym: OpSym, receiver: ValueId },
    /// A compiled script function; calls are inlined at the call site.
    Function(Arc<CompiledFunction>),
    /// `int`, `float`, `bool`, `_to_tensor`: identity when the argument
    /// already has the target type, otherwise the given operator.
    Cast { ty: Type, sym: OpSym },
    Print,
    GetAttr,
    IsInstance,
    Annotate,
    Fork,
}

impl Binding {
    pub fn value(v: ValueId) -> Binding {
        Binding::Value(v)
    }

    /// A short description used in "cannot be used as a value" errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Binding::Value(_) => "value",
            Binding::None => "None",
            Binding::Callable(c) => c.kind(),
        }
    }

    pub fn as_value(&self, name: &str, span: Span) -> CompileResult<ValueId> {
        match self {
            Binding::Value(v) => Ok(*v),
            _ => Err(CompileError::NotFirstClass {
                name: name.to_string(),
                span,
            }),
        }
    }

    pub fn as_simple(&self) -> Option<ValueId> {
        match self {
            Binding::Value(v) => Some(*v),
            _ => None,
        }
    }
}

impl Callable {
    pub fn kind(&self) -> &'static str {
        match self {
            Callable::Op(_) | Callable::Method { .. } => "builtin",
            Callable::Function(_) => "function",
            Callable::Cast { .. } => "cast",
            Callable::Print => "print",
            Callable::GetAttr => "getattr",
            Callable::IsInstance => "isinstance",
            Callable::Annotate => "annotate",
            Callable::Fork => "fork",
        }
    }
}
