//! Frontend emitter: lowers function ASTs to the block-structured graph IR.
//!
//! [`compile_function`] drives the whole pipeline for a single function:
//! parameter typing, statement emission through a chain of environment
//! frames, operator overload resolution against the registry,
//! and final return handling. Free functions referenced by name are found
//! through a caller-supplied [`Resolver`].

mod binding;
mod conversion;
mod expr;
mod function_compiler;
mod matcher;
mod resolver;
mod scope;
mod stmt;
mod subscript;
mod type_resolver;

pub use binding::{Binding, Callable, NoneStatus};
pub use function_compiler::compile_function;
pub use matcher::{MatchedSchema, NamedArg, try_match_schema};
pub use resolver::{EmptyResolver, FunctionResolver, Resolver};
pub use type_resolver::{parse_arg_type, parse_type};
