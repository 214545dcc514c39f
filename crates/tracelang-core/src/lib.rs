//! Core data types shared across the tracelang frontend: source spans,
//! operator symbols, the type system, constants, schemas and errors.

pub mod constant;
pub mod error;
pub mod op_sym;
pub mod schema;
pub mod span;
pub mod types;

pub use constant::Constant;
pub use error::{CompileError, CompileResult};
pub use op_sym::{OpSym, ops};
pub use schema::{Argument, FunctionSchema};
pub use span::Span;
pub use types::{Type, TypeEnv, eval_type_variables, match_type_variables, unify};
