//! Statement and function-definition AST nodes.

use tracelang_core::Span;

use crate::expr::{Expr, Ident, TypeExpr};
use crate::ops::AugOp;

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// A bare expression evaluated for effect.
    ExprStmt { expr: Expr, span: Span },
    /// `targets = value`; more than one target means tuple unpacking.
    Assign {
        targets: Vec<Expr>,
        value: Expr,
        span: Span,
    },
    AugAssign {
        target: Expr,
        op: AugOp,
        value: Expr,
        span: Span,
    },
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
        span: Span,
    },
    For {
        targets: Vec<Expr>,
        iters: Vec<Expr>,
        body: Vec<Stmt>,
        span: Span,
    },
    Return {
        values: Vec<Expr>,
        span: Span,
    },
    Raise {
        exception: Option<Expr>,
        span: Span,
    },
    Assert {
        cond: Expr,
        message: Option<Expr>,
        span: Span,
    },
    Pass { span: Span },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::ExprStmt { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::AugAssign { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Raise { span, .. }
            | Stmt::Assert { span, .. }
            | Stmt::Pass { span } => *span,
        }
    }
}

/// A formal parameter of a function definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    /// Missing annotations default to `Tensor`.
    pub ty: Option<TypeExpr>,
    pub default: Option<Expr>,
}

impl Param {
    pub fn new(name: Ident) -> Param {
        Param {
            name,
            ty: None,
            default: None,
        }
    }

    pub fn with_type(mut self, ty: TypeExpr) -> Param {
        self.ty = Some(ty);
        self
    }

    pub fn with_default(mut self, default: Expr) -> Param {
        self.default = Some(default);
        self
    }
}

/// A single function definition, the compilation unit of the frontend.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: Ident,
    pub params: Vec<Param>,
    pub return_ty: Option<TypeExpr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}
