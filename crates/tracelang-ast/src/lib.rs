//! The abstract syntax tree consumed by the tracelang compiler.
//!
//! The frontend does not include a parser; embedders construct these nodes
//! directly (or from their own surface syntax) and hand a [`FunctionDef`]
//! to the compiler.

pub mod expr;
pub mod ops;
pub mod stmt;

pub use expr::{Expr, Ident, Kwarg, SubscriptEntry, TypeExpr};
pub use ops::{AugOp, BinaryOp, BoolOpKind, UnaryOp};
pub use stmt::{FunctionDef, Param, Stmt};
