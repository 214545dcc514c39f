//! Operator kinds appearing in expressions.

use tracelang_core::op_sym::{OpSym, ops};

/// Binary operators, including comparisons and identity tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Remainder,
    Pow,
    MatMul,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Is,
    IsNot,
}

impl BinaryOp {
    /// The builtin operator symbol this maps to.
    pub fn op_sym(self) -> OpSym {
        match self {
            BinaryOp::Add => ops::ADD,
            BinaryOp::Sub => ops::SUB,
            BinaryOp::Mul => ops::MUL,
            BinaryOp::Div => ops::DIV,
            BinaryOp::FloorDiv => ops::FLOORDIV,
            BinaryOp::Remainder => ops::REMAINDER,
            BinaryOp::Pow => ops::POW,
            BinaryOp::MatMul => ops::MATMUL,
            BinaryOp::Eq => ops::EQ,
            BinaryOp::Ne => ops::NE,
            BinaryOp::Lt => ops::LT,
            BinaryOp::Gt => ops::GT,
            BinaryOp::Le => ops::LE,
            BinaryOp::Ge => ops::GE,
            BinaryOp::Is => ops::IS,
            BinaryOp::IsNot => ops::IS_NOT,
        }
    }

    /// The source-level spelling, for diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Remainder => "%",
            BinaryOp::Pow => "**",
            BinaryOp::MatMul => "@",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Is => "is",
            BinaryOp::IsNot => "is not",
        }
    }
}

/// Unary prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn op_sym(self) -> OpSym {
        match self {
            UnaryOp::Neg => ops::NEG,
            UnaryOp::Not => ops::NOT,
        }
    }
}

/// Short-circuiting boolean connectives. Kept apart from [`BinaryOp`]
/// because they lower to conditionals, not operator calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOpKind {
    And,
    Or,
}

/// Operators usable in augmented assignment (`x += y` and friends).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AugOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl AugOp {
    /// The plain binary form, used when the target is not a tensor.
    pub fn binary(self) -> BinaryOp {
        match self {
            AugOp::Add => BinaryOp::Add,
            AugOp::Sub => BinaryOp::Sub,
            AugOp::Mul => BinaryOp::Mul,
            AugOp::Div => BinaryOp::Div,
        }
    }

    /// The in-place operator symbol, used when the target is a tensor.
    pub fn in_place_sym(self) -> OpSym {
        match self {
            AugOp::Add => ops::ADD_,
            AugOp::Sub => ops::SUB_,
            AugOp::Mul => ops::MUL_,
            AugOp::Div => ops::DIV_,
        }
    }
}
