//! Expression AST nodes.
//!
//! The tree is fully owned; every node carries the [`Span`] of its source
//! text so diagnostics can point back at the script.

use tracelang_core::Span;

use crate::ops::{BinaryOp, BoolOpKind, UnaryOp};

/// An identifier with its source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Ident {
        Ident {
            name: name.into(),
            span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Var(Ident),
    IntLit {
        value: i64,
        span: Span,
    },
    FloatLit {
        value: f64,
        span: Span,
    },
    BoolLit {
        value: bool,
        span: Span,
    },
    StrLit {
        value: String,
        span: Span,
    },
    NoneLit {
        span: Span,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },
    /// `and` / `or`, lowered as a two-block conditional.
    BoolOp {
        op: BoolOpKind,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    /// `true_expr if cond else false_expr`
    Ternary {
        cond: Box<Expr>,
        true_expr: Box<Expr>,
        false_expr: Box<Expr>,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<Kwarg>,
        span: Span,
    },
    Attribute {
        value: Box<Expr>,
        attr: Ident,
        span: Span,
    },
    Subscript {
        value: Box<Expr>,
        indices: Vec<SubscriptEntry>,
        span: Span,
    },
    TupleLit {
        elems: Vec<Expr>,
        span: Span,
    },
    ListLit {
        elems: Vec<Expr>,
        span: Span,
    },
    /// `*x`, valid only in assignment targets and argument lists.
    Starred {
        value: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Var(ident) => ident.span,
            Expr::IntLit { span, .. }
            | Expr::FloatLit { span, .. }
            | Expr::BoolLit { span, .. }
            | Expr::StrLit { span, .. }
            | Expr::NoneLit { span }
            | Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::BoolOp { span, .. }
            | Expr::Ternary { span, .. }
            | Expr::Call { span, .. }
            | Expr::Attribute { span, .. }
            | Expr::Subscript { span, .. }
            | Expr::TupleLit { span, .. }
            | Expr::ListLit { span, .. }
            | Expr::Starred { span, .. } => *span,
        }
    }

    pub fn is_starred(&self) -> bool {
        matches!(self, Expr::Starred { .. })
    }
}

/// A keyword argument at a call site.
#[derive(Debug, Clone, PartialEq)]
pub struct Kwarg {
    pub name: Ident,
    pub value: Expr,
}

/// One entry inside a subscript's brackets.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptEntry {
    Index(Expr),
    Slice {
        start: Option<Expr>,
        end: Option<Expr>,
        span: Span,
    },
}

impl SubscriptEntry {
    pub fn span(&self) -> Span {
        match self {
            SubscriptEntry::Index(expr) => expr.span(),
            SubscriptEntry::Slice { span, .. } => *span,
        }
    }
}

/// A source-level type annotation, resolved to a frontend type by the
/// compiler.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    /// `Tensor`, `int`, a type-variable name, ...
    Named(Ident),
    /// `List[int]`, `Optional[Tensor]`, `Tuple[int, float]`,
    /// `BroadcastingList2[int]`, ...
    Subscript {
        base: Ident,
        args: Vec<TypeExpr>,
        span: Span,
    },
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Named(ident) => ident.span,
            TypeExpr::Subscript { span, .. } => *span,
        }
    }
}
