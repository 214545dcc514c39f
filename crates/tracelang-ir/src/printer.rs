//! A textual dump of graphs for debugging and test assertions.
//!
//! Output looks like:
//!
//! ```text
//! graph(%x : Tensor, %y : Tensor):
//!   %2 : Tensor = add(%x, %y)
//!   return (%2)
//! ```

use std::fmt;
use std::fmt::Write as _;

use crate::graph::Graph;
use crate::node::{BlockId, NodeKind, ValueId};

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        write!(out, "graph(").map_err(|_| fmt::Error)?;
        write_inputs(self, self.root(), &mut out)?;
        out.push_str("):\n");
        write_block_body(self, self.root(), 1, &mut out)?;
        f.write_str(&out)
    }
}

fn value_ref(graph: &Graph, id: ValueId) -> String {
    match &graph.value(id).name {
        Some(name) => format!("%{name}"),
        None => format!("%{}", id.0),
    }
}

fn write_inputs(graph: &Graph, block: BlockId, out: &mut String) -> fmt::Result {
    for (i, input) in graph.block(block).inputs.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write!(out, "{} : {}", value_ref(graph, *input), graph.value_type(*input))
            .map_err(|_| fmt::Error)?;
    }
    Ok(())
}

fn write_block_body(graph: &Graph, block: BlockId, depth: usize, out: &mut String) -> fmt::Result {
    let indent = "  ".repeat(depth);
    for node_id in &graph.block(block).nodes {
        let node = graph.node(*node_id);
        out.push_str(&indent);
        for (i, output) in node.outputs.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            write!(out, "{} : {}", value_ref(graph, *output), graph.value_type(*output))
                .map_err(|_| fmt::Error)?;
        }
        if !node.outputs.is_empty() {
            out.push_str(" = ");
        }
        match &node.kind {
            NodeKind::Constant => {
                match &node.constant {
                    Some(c) => write!(out, "constant[{c}]").map_err(|_| fmt::Error)?,
                    None => out.push_str("constant[?]"),
                }
            }
            NodeKind::If => out.push_str("if"),
            NodeKind::Loop => out.push_str("loop"),
            NodeKind::TupleConstruct => out.push_str("tuple"),
            NodeKind::TupleUnpack => out.push_str("tuple_unpack"),
            NodeKind::TupleIndex(i) => {
                write!(out, "tuple_index[{i}]").map_err(|_| fmt::Error)?
            }
            NodeKind::TupleSlice { start, end } => {
                write!(out, "tuple_slice[{start}:{end}]").map_err(|_| fmt::Error)?
            }
            NodeKind::ListConstruct => out.push_str("list"),
            NodeKind::Fork => out.push_str("fork"),
            NodeKind::Op(sym) => write!(out, "op[{sym}]").map_err(|_| fmt::Error)?,
        }
        out.push('(');
        for (i, input) in node.inputs.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&value_ref(graph, *input));
        }
        out.push(')');
        out.push('\n');
        for sub in &node.blocks {
            write!(out, "{indent}  block(").map_err(|_| fmt::Error)?;
            write_inputs(graph, *sub, out)?;
            out.push_str("):\n");
            write_block_body(graph, *sub, depth + 2, out)?;
        }
    }
    out.push_str(&indent);
    out.push_str("return (");
    for (i, output) in graph.block(block).outputs.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&value_ref(graph, *output));
    }
    out.push_str(")\n");
    Ok(())
}
