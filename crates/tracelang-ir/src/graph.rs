//! The graph arena and its mutation primitives.
//!
//! Nodes, values and blocks live in per-graph index arenas; ids are plain
//! indices and never dangle, though values can become unreferenced after
//! pruning. Identity comparisons on [`ValueId`] are the basis for
//! loop-carried-input pruning: an unmodified carried value reaches the block
//! output as the same id it entered with.

use rustc_hash::FxHashMap;
use tracelang_core::{CompileError, CompileResult, Constant, Span, Type};

use crate::node::{Block, BlockId, Node, NodeId, NodeKind, Value, ValueId};

#[derive(Debug, Clone)]
pub struct Graph {
    values: Vec<Value>,
    nodes: Vec<Node>,
    blocks: Vec<Block>,
    root: BlockId,
}

impl Default for Graph {
    fn default() -> Self {
        Graph::new()
    }
}

impl Graph {
    pub fn new() -> Graph {
        Graph {
            values: Vec::new(),
            nodes: Vec::new(),
            blocks: vec![Block::default()],
            root: BlockId(0),
        }
    }

    pub fn root(&self) -> BlockId {
        self.root
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.index()]
    }

    pub fn value_mut(&mut self, id: ValueId) -> &mut Value {
        &mut self.values[id.index()]
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    pub fn value_type(&self, id: ValueId) -> &Type {
        &self.value(id).ty
    }

    pub fn set_value_type(&mut self, id: ValueId, ty: Type) {
        self.value_mut(id).ty = ty;
    }

    pub fn set_value_name(&mut self, id: ValueId, name: impl Into<String>) {
        self.value_mut(id).name = Some(name.into());
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    fn alloc_value(&mut self, ty: Type, node: Option<NodeId>) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(Value {
            ty,
            node,
            name: None,
        });
        id
    }

    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::default());
        id
    }

    /// Append a fresh input value to a block.
    pub fn add_input(&mut self, block: BlockId, ty: Type) -> ValueId {
        let v = self.alloc_value(ty, None);
        self.block_mut(block).inputs.push(v);
        v
    }

    /// Insert a fresh input value at `idx`, shifting later inputs.
    pub fn insert_input(&mut self, block: BlockId, idx: usize, ty: Type) -> ValueId {
        let v = self.alloc_value(ty, None);
        self.block_mut(block).inputs.insert(idx, v);
        v
    }

    pub fn erase_input(&mut self, block: BlockId, idx: usize) {
        self.block_mut(block).inputs.remove(idx);
    }

    pub fn register_output(&mut self, block: BlockId, value: ValueId) {
        self.block_mut(block).outputs.push(value);
    }

    pub fn erase_output(&mut self, block: BlockId, idx: usize) {
        self.block_mut(block).outputs.remove(idx);
    }

    /// Create a node without attaching it to a block.
    pub fn create_node(&mut self, kind: NodeKind, inputs: Vec<ValueId>, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            inputs,
            outputs: Vec::new(),
            blocks: Vec::new(),
            constant: None,
            subgraph: None,
            span,
        });
        id
    }

    pub fn add_node_output(&mut self, node: NodeId, ty: Type) -> ValueId {
        let v = self.alloc_value(ty, Some(node));
        self.node_mut(node).outputs.push(v);
        v
    }

    pub fn add_node_block(&mut self, node: NodeId) -> BlockId {
        let b = self.add_block();
        self.node_mut(node).blocks.push(b);
        b
    }

    pub fn append_node(&mut self, block: BlockId, node: NodeId) {
        self.block_mut(block).nodes.push(node);
    }

    /// Insert a node at the front of a block, ahead of everything already
    /// emitted. Used for the per-graph constant caches.
    pub fn prepend_node(&mut self, block: BlockId, node: NodeId) {
        self.block_mut(block).nodes.insert(0, node);
    }

    /// Append a constant node carrying `value` to `block`.
    pub fn insert_constant(&mut self, block: BlockId, value: Constant, span: Span) -> ValueId {
        let ty = value.ty();
        let node = self.create_node(NodeKind::Constant, Vec::new(), span);
        self.node_mut(node).constant = Some(value);
        let out = self.add_node_output(node, ty);
        self.append_node(block, node);
        out
    }

    // ------------------------------------------------------------------
    // Queries and rewrites
    // ------------------------------------------------------------------

    /// If `id` is the output of a constant node, its payload.
    pub fn as_constant(&self, id: ValueId) -> Option<&Constant> {
        let node = self.value(id).node?;
        self.node(node).constant.as_ref()
    }

    /// Replace every use of `old` with `new`, across node inputs and block
    /// outputs of the whole graph. Nested subgraphs are self-contained and
    /// not visited.
    pub fn replace_all_uses(&mut self, old: ValueId, new: ValueId) {
        for node in &mut self.nodes {
            for input in &mut node.inputs {
                if *input == old {
                    *input = new;
                }
            }
        }
        for block in &mut self.blocks {
            for output in &mut block.outputs {
                if *output == old {
                    *output = new;
                }
            }
        }
    }

    /// Whether any node input or block output reads `id`.
    pub fn has_uses(&self, id: ValueId) -> bool {
        self.nodes.iter().any(|n| n.inputs.contains(&id))
            || self.blocks.iter().any(|b| b.outputs.contains(&id))
    }

    /// Drop all nodes from a detached scratch block. The arena entries stay
    /// allocated but become unreachable from the root.
    pub fn discard_block(&mut self, block: BlockId) {
        self.block_mut(block).nodes.clear();
        self.block_mut(block).inputs.clear();
        self.block_mut(block).outputs.clear();
    }

    // ------------------------------------------------------------------
    // Cross-graph cloning
    // ------------------------------------------------------------------

    /// Clone the body of `callee` into `block`, substituting `args` for the
    /// callee's formal inputs. Returns the values corresponding to the
    /// callee's outputs.
    pub fn inline_graph(
        &mut self,
        block: BlockId,
        callee: &Graph,
        args: &[ValueId],
        span: Span,
    ) -> CompileResult<Vec<ValueId>> {
        let callee_root = callee.block(callee.root());
        if callee_root.inputs.len() != args.len() {
            return Err(CompileError::internal(format!(
                "inlining a graph with {} inputs given {} arguments",
                callee_root.inputs.len(),
                args.len()
            )));
        }
        let mut map = FxHashMap::default();
        for (formal, actual) in callee_root.inputs.iter().zip(args) {
            map.insert(*formal, *actual);
        }
        clone_nodes(callee, callee.root(), self, block, &mut map, &mut None, span)?;
        callee_root
            .outputs
            .iter()
            .map(|out| {
                map.get(out).copied().ok_or_else(|| {
                    CompileError::internal("graph output not defined by its own body".to_string())
                })
            })
            .collect()
    }

    /// Lift a scratch block into a standalone graph. Values the block reads
    /// but does not define become inputs of the new graph; their identities
    /// in `self` are returned alongside, in first-use order.
    pub fn lift_block(
        &self,
        block: BlockId,
        span: Span,
    ) -> CompileResult<(Graph, Vec<ValueId>)> {
        let mut lifted = Graph::new();
        let mut map = FxHashMap::default();
        let mut captures = Some(Vec::new());
        let root = lifted.root();
        clone_nodes(self, block, &mut lifted, root, &mut map, &mut captures, span)?;
        for out in &self.block(block).outputs {
            let mapped = resolve_or_capture(self, &mut lifted, *out, &mut map, &mut captures)?;
            lifted.register_output(root, mapped);
        }
        let captured = captures.unwrap_or_default();
        Ok((lifted, captured))
    }
}

/// Map a source value to its clone, capturing it as a new graph input when
/// it was defined outside the cloned region and capturing is allowed.
fn resolve_or_capture(
    src: &Graph,
    dst: &mut Graph,
    value: ValueId,
    map: &mut FxHashMap<ValueId, ValueId>,
    captures: &mut Option<Vec<ValueId>>,
) -> CompileResult<ValueId> {
    if let Some(mapped) = map.get(&value) {
        return Ok(*mapped);
    }
    match captures {
        Some(outer) => {
            let root = dst.root();
            let input = dst.add_input(root, src.value_type(value).clone());
            if let Some(name) = &src.value(value).name {
                dst.set_value_name(input, name.clone());
            }
            map.insert(value, input);
            outer.push(value);
            Ok(input)
        }
        None => Err(CompileError::internal(
            "encountered a free value while cloning a closed graph".to_string(),
        )),
    }
}

fn clone_nodes(
    src: &Graph,
    src_block: BlockId,
    dst: &mut Graph,
    dst_block: BlockId,
    map: &mut FxHashMap<ValueId, ValueId>,
    captures: &mut Option<Vec<ValueId>>,
    span: Span,
) -> CompileResult<()> {
    for node_id in src.block(src_block).nodes.clone() {
        let src_node = src.node(node_id);
        let mut inputs = Vec::with_capacity(src_node.inputs.len());
        for input in &src_node.inputs {
            inputs.push(resolve_or_capture(src, dst, *input, map, captures)?);
        }
        let new_node = dst.create_node(src_node.kind.clone(), inputs, span);
        dst.node_mut(new_node).constant = src.node(node_id).constant.clone();
        dst.node_mut(new_node).subgraph = src.node(node_id).subgraph.clone();
        for output in &src.node(node_id).outputs {
            let new_out = dst.add_node_output(new_node, src.value_type(*output).clone());
            if let Some(name) = &src.value(*output).name {
                dst.set_value_name(new_out, name.clone());
            }
            map.insert(*output, new_out);
        }
        for sub in src.node(node_id).blocks.clone() {
            let new_block = dst.add_node_block(new_node);
            for input in src.block(sub).inputs.clone() {
                let new_in = dst.add_input(new_block, src.value_type(input).clone());
                map.insert(input, new_in);
            }
            clone_nodes(src, sub, dst, new_block, map, captures, span)?;
            for output in src.block(sub).outputs.clone() {
                let mapped = resolve_or_capture(src, dst, output, map, captures)?;
                dst.register_output(new_block, mapped);
            }
        }
        dst.append_node(dst_block, new_node);
    }
    Ok(())
}
