//! Compilation errors.
//!
//! Every user-facing variant carries the [`Span`] of the offending source
//! construct. Deferred type errors (a variable that failed branch
//! unification) surface as [`CompileError::TypeMismatch`] only when the
//! variable is actually read.

use thiserror::Error;

use crate::span::Span;

pub type CompileResult<T> = std::result::Result<T, CompileError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompileError {
    #[error("at {span}: undefined value {name}")]
    UndefinedValue { name: String, span: Span },

    #[error("at {span}: {name} cannot be used as a value")]
    NotFirstClass { name: String, span: Span },

    #[error("at {span}: {message}")]
    TypeMismatch { message: String, span: Span },

    #[error("at {span}: unknown builtin op {name}")]
    UnknownBuiltinOp { name: String, span: Span },

    #[error("at {span}: arguments for call to {name} are not valid\n{failures}")]
    NoMatchingSchemas {
        name: String,
        failures: String,
        span: Span,
    },

    #[error("at {span}: {message}")]
    InvalidSyntax { message: String, span: Span },

    #[error("internal compiler error: {message}")]
    Internal { message: String },
}

impl CompileError {
    pub fn type_mismatch(message: impl Into<String>, span: Span) -> CompileError {
        CompileError::TypeMismatch {
            message: message.into(),
            span,
        }
    }

    pub fn invalid_syntax(message: impl Into<String>, span: Span) -> CompileError {
        CompileError::InvalidSyntax {
            message: message.into(),
            span,
        }
    }

    pub fn internal(message: impl Into<String>) -> CompileError {
        CompileError::Internal {
            message: message.into(),
        }
    }
}
