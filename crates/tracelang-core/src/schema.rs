//! Operator and function schemas.
//!
//! A schema declares an operator's name, formal arguments and return types.
//! Resolution binds a call site's positional and keyword arguments against
//! the argument list; the `Display` impl produces the signature text that
//! appears in "no matching schemas" diagnostics.

use std::fmt;

use crate::constant::Constant;
use crate::types::Type;

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub ty: Type,
    /// For fixed-arity list arguments that accept a broadcast scalar:
    /// the required list length.
    pub n: Option<usize>,
    pub default: Option<Constant>,
    pub kwarg_only: bool,
}

impl Argument {
    pub fn new(name: impl Into<String>, ty: Type) -> Argument {
        Argument {
            name: name.into(),
            ty,
            n: None,
            default: None,
            kwarg_only: false,
        }
    }

    pub fn with_default(mut self, default: Constant) -> Argument {
        self.default = Some(default);
        self
    }

    pub fn kwarg_only(mut self) -> Argument {
        self.kwarg_only = true;
        self
    }

    /// Fixed list length for scalar broadcasting.
    pub fn with_len(mut self, n: usize) -> Argument {
        self.n = Some(n);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSchema {
    pub name: String,
    pub arguments: Vec<Argument>,
    pub returns: Vec<Type>,
    /// A trailing unsized-list argument absorbs excess positional
    /// arguments when set.
    pub is_vararg: bool,
}

impl FunctionSchema {
    pub fn new(name: impl Into<String>, arguments: Vec<Argument>, returns: Vec<Type>) -> Self {
        FunctionSchema {
            name: name.into(),
            arguments,
            returns,
            is_vararg: false,
        }
    }

    pub fn vararg(mut self) -> Self {
        self.is_vararg = true;
        self
    }

    pub fn argument(&self, name: &str) -> Option<(usize, &Argument)> {
        self.arguments.iter().enumerate().find(|(_, a)| a.name == name)
    }
}

impl fmt::Display for FunctionSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.arguments.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", arg.ty, arg.name)?;
            if let Some(default) = &arg.default {
                write!(f, "={default}")?;
            }
        }
        if self.is_vararg {
            write!(f, ", ...")?;
        }
        write!(f, ") -> ")?;
        match self.returns.len() {
            1 => write!(f, "{}", self.returns[0]),
            _ => {
                write!(f, "(")?;
                for (i, ret) in self.returns.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{ret}")?;
                }
                write!(f, ")")
            }
        }
    }
}
