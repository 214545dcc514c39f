//! Block-structured graph IR produced by the tracelang frontend.
//!
//! A [`Graph`] owns arenas of values, nodes and blocks. Control flow is
//! structured: `If` nodes carry two sub-blocks, `Loop` nodes carry one body
//! block plus explicit loop-carried inputs and outputs, and `Fork` nodes
//! hold an isolated subgraph.

pub mod graph;
pub mod node;
mod printer;

pub use graph::Graph;
pub use node::{Block, BlockId, Node, NodeId, NodeKind, Value, ValueId};
