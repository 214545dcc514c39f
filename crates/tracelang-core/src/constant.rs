//! Compile-time constant values.
//!
//! These are the payloads of `Constant` nodes in the IR and the values of
//! schema argument defaults. Floats keep their raw bits here; the per-graph
//! constant cache is responsible for hashing them.

use std::fmt;

use crate::types::Type;

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    /// The `None` literal.
    None,
    /// A list of integers, as produced by list-typed argument defaults.
    IntList(Vec<i64>),
}

impl Constant {
    pub fn ty(&self) -> Type {
        match self {
            Constant::Int(_) => Type::Int,
            Constant::Float(_) => Type::Float,
            Constant::Bool(_) => Type::Bool,
            Constant::Str(_) => Type::Str,
            Constant::None => Type::None,
            Constant::IntList(_) => Type::list(Type::Int),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{v}"),
            Constant::Float(v) => write!(f, "{v:?}"),
            Constant::Bool(v) => write!(f, "{v}"),
            Constant::Str(v) => write!(f, "{v:?}"),
            Constant::None => write!(f, "None"),
            Constant::IntList(v) => write!(f, "{v:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_types() {
        assert_eq!(Constant::Int(3).ty(), Type::Int);
        assert_eq!(Constant::None.ty(), Type::None);
        assert_eq!(Constant::IntList(vec![1, 2]).ty(), Type::list(Type::Int));
    }
}
