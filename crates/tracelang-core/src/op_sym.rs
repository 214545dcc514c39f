//! Deterministic hash-based operator identity.
//!
//! Provides [`OpSym`], a 64-bit hash that identifies an operator or built-in
//! function by name. Hashes are computed deterministically with XXHash64, so
//! the same name always yields the same symbol and well-known operators can
//! be pre-computed as constants. The registry keeps the reverse symbol→name
//! mapping for diagnostics.

use std::fmt;
use xxhash_rust::const_xxh64::xxh64 as const_xxh64;
use xxhash_rust::xxh64::xxh64;

/// Domain marker mixed into every operator hash so that operator symbols can
/// never collide with other hashed identifier spaces.
const OPERATOR_DOMAIN: u64 = 0x3e9f5d2a8c7b1403;

/// A deterministic 64-bit hash identifying an operator by name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct OpSym(pub u64);

impl OpSym {
    /// Create an operator symbol from a name.
    ///
    /// The same name always produces the same symbol.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        OpSym(OPERATOR_DOMAIN ^ xxh64(name.as_bytes(), 0))
    }

    /// Const version of [`OpSym::from_name`] for the well-known symbols below.
    #[inline]
    pub const fn from_name_const(name: &str) -> Self {
        OpSym(OPERATOR_DOMAIN ^ const_xxh64(name.as_bytes(), 0))
    }

    /// Get the underlying u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for OpSym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpSym({:#018x})", self.0)
    }
}

impl fmt::Display for OpSym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Well-known operator symbols used by the desugaring rules in the compiler.
///
/// Desugared syntax (binary operators, subscripting, augmented assignment)
/// resolves against these names; all of them are registered by the prelude.
pub mod ops {
    use super::OpSym;

    pub const ADD: OpSym = OpSym::from_name_const("add");
    pub const SUB: OpSym = OpSym::from_name_const("sub");
    pub const MUL: OpSym = OpSym::from_name_const("mul");
    pub const DIV: OpSym = OpSym::from_name_const("div");
    pub const REMAINDER: OpSym = OpSym::from_name_const("remainder");
    pub const POW: OpSym = OpSym::from_name_const("pow");
    pub const MATMUL: OpSym = OpSym::from_name_const("matmul");
    pub const NEG: OpSym = OpSym::from_name_const("neg");
    pub const FLOORDIV: OpSym = OpSym::from_name_const("floordiv");

    pub const EQ: OpSym = OpSym::from_name_const("eq");
    pub const NE: OpSym = OpSym::from_name_const("ne");
    pub const LT: OpSym = OpSym::from_name_const("lt");
    pub const GT: OpSym = OpSym::from_name_const("gt");
    pub const LE: OpSym = OpSym::from_name_const("le");
    pub const GE: OpSym = OpSym::from_name_const("ge");
    pub const NOT: OpSym = OpSym::from_name_const("logical_not");
    pub const IS: OpSym = OpSym::from_name_const("is_");
    pub const IS_NOT: OpSym = OpSym::from_name_const("is_not");

    /// In-place tensor variants selected by augmented assignment.
    pub const ADD_: OpSym = OpSym::from_name_const("add_");
    pub const SUB_: OpSym = OpSym::from_name_const("sub_");
    pub const MUL_: OpSym = OpSym::from_name_const("mul_");
    pub const DIV_: OpSym = OpSym::from_name_const("div_");

    /// Subscript desugaring primitives.
    pub const SELECT: OpSym = OpSym::from_name_const("select");
    pub const SLICE: OpSym = OpSym::from_name_const("slice");
    pub const INDEX: OpSym = OpSym::from_name_const("index");
    pub const SET_ITEM: OpSym = OpSym::from_name_const("set_item");
    pub const INDEX_PUT_: OpSym = OpSym::from_name_const("index_put_");
    pub const COPY_: OpSym = OpSym::from_name_const("copy_");

    /// Cast built-ins.
    pub const CAST_INT: OpSym = OpSym::from_name_const("cast_int");
    pub const CAST_FLOAT: OpSym = OpSym::from_name_const("cast_float");
    pub const CAST_BOOL: OpSym = OpSym::from_name_const("cast_bool");
    pub const NUM_TO_TENSOR: OpSym = OpSym::from_name_const("num_to_tensor");
    pub const TENSOR_TO_NUM: OpSym = OpSym::from_name_const("tensor_to_num");

    pub const PRINT: OpSym = OpSym::from_name_const("print");
    pub const DEVICE: OpSym = OpSym::from_name_const("device");
    pub const RAISE_EXCEPTION: OpSym = OpSym::from_name_const("raise_exception");
}
