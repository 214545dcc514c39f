//! Node, value and block definitions for the graph IR.

use tracelang_core::{Constant, OpSym, Span, Type};

use crate::graph::Graph;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_id!(
    /// Index of a value in its owning graph.
    ValueId
);
define_id!(
    /// Index of a node in its owning graph.
    NodeId
);
define_id!(
    /// Index of a block in its owning graph.
    BlockId
);

/// What kind of computation a node performs.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A literal; the payload lives in [`Node::constant`].
    Constant,
    /// Two sub-blocks selected by a boolean input.
    If,
    /// `(max_trip_count, start_cond, carried...)` driving one body block.
    Loop,
    TupleConstruct,
    TupleUnpack,
    TupleIndex(usize),
    TupleSlice { start: usize, end: usize },
    ListConstruct,
    /// Asynchronous call of [`Node::subgraph`]; produces a `Future`.
    Fork,
    /// A resolved builtin operator call.
    Op(OpSym),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub inputs: Vec<ValueId>,
    pub outputs: Vec<ValueId>,
    pub blocks: Vec<BlockId>,
    pub constant: Option<Constant>,
    pub subgraph: Option<Box<Graph>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Value {
    pub ty: Type,
    /// The producing node; `None` for block inputs.
    pub node: Option<NodeId>,
    /// A meaningful source-level name, when one exists.
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub inputs: Vec<ValueId>,
    pub outputs: Vec<ValueId>,
    /// Nodes in execution order.
    pub nodes: Vec<NodeId>,
}
