//! Lexical scoping over nested control-flow blocks.
//!
//! The compiler keeps a stack of [`Frame`]s, one per block currently being
//! emitted. Reading a name that lives outside a loop body inserts a
//! loop-carried input into every intervening loop frame (capture on read);
//! writing such a name does the same so the loop has a carried slot to
//! update (capture on write). After a loop body is finished,
//! [`ScopeChain::prune_unchanged`] deletes the carried slots the body never
//! actually rebound.
//!
//! Deferred type errors, recorded when an `if` assigns incompatible types
//! to a variable new to the scope, live on the chain itself and surface
//! only if the variable is read afterwards.

use rustc_hash::FxHashMap;
use tracelang_core::{CompileError, CompileResult, Span, Type};
use tracelang_ir::{BlockId, Graph, ValueId};

use crate::binding::Binding;

/// Names like `_4` are compiler temporaries; giving graph values those
/// names would only add noise to dumps.
pub(crate) fn meaningful_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        None => false,
        Some('_') => name.len() > 1 && chars.any(|c| !c.is_ascii_digit()),
        Some(_) => true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// The function body itself.
    Root,
    /// A branch of an `if` or the body of a conditional expression.
    Conditional,
    /// The body block of a loop node; reads and writes of outer names
    /// create loop-carried slots.
    Loop,
    /// A frame sharing its parent's block, used for statically unrolled
    /// iteration.
    Inline,
}

/// Loop body block layout:
///   inputs:  iteration counter, carried values...
///   outputs: continue condition, carried values...
const LOOP_CARRIED_INPUT_OFFSET: usize = 1;

#[derive(Debug)]
pub struct Frame {
    pub kind: FrameKind,
    pub block: BlockId,
    bindings: FxHashMap<String, Binding>,
    /// Names with a carried slot in this loop frame, kept sorted so the
    /// order of loop-carried dependencies does not depend on use order.
    pub captured: Vec<String>,
}

impl Frame {
    fn new(kind: FrameKind, block: BlockId) -> Frame {
        Frame {
            kind,
            block,
            bindings: FxHashMap::default(),
            captured: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Names bound directly in this frame, sorted for deterministic
    /// iteration.
    pub fn defined_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.bindings.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[derive(Debug)]
pub struct ScopeChain {
    frames: Vec<Frame>,
    /// Deferred branch-unification errors, keyed by variable name. Scoped
    /// to the whole function, so kept on the chain rather than any frame.
    type_errors: FxHashMap<String, String>,
}

impl ScopeChain {
    pub fn new(root_block: BlockId) -> ScopeChain {
        ScopeChain {
            frames: vec![Frame::new(FrameKind::Root, root_block)],
            type_errors: FxHashMap::default(),
        }
    }

    pub fn push(&mut self, kind: FrameKind, block: BlockId) {
        self.frames.push(Frame::new(kind, block));
    }

    pub fn pop(&mut self) -> Frame {
        debug_assert!(self.frames.len() > 1, "cannot pop the root frame");
        self.frames.pop().unwrap_or_else(|| Frame::new(FrameKind::Root, BlockId(0)))
    }

    pub fn top(&self) -> &Frame {
        self.frames.last().unwrap_or_else(|| unreachable!("scope chain is never empty"))
    }

    /// Find a binding anywhere in the chain without creating captures.
    pub fn find_in_any_frame(&self, name: &str) -> Option<&Binding> {
        self.frames.iter().rev().find_map(|f| f.get(name))
    }

    /// Find a binding in any frame but the innermost.
    pub fn find_in_parent_frame(&self, name: &str) -> Option<&Binding> {
        let end = self.frames.len().saturating_sub(1);
        self.frames[..end].iter().rev().find_map(|f| f.get(name))
    }

    /// Look a name up, inserting a loop-carried input into every loop frame
    /// between its definition and the top of the chain. Returns the binding
    /// as seen from the innermost frame.
    pub fn capture_or_find(&mut self, graph: &mut Graph, name: &str) -> Option<Binding> {
        let defined_at = (0..self.frames.len())
            .rev()
            .find(|&i| self.frames[i].contains(name))?;
        let mut binding = self.frames[defined_at]
            .get(name)
            .cloned()
            .unwrap_or(Binding::None);
        for j in defined_at + 1..self.frames.len() {
            if self.frames[j].kind != FrameKind::Loop {
                continue;
            }
            // only first-class values can become loop-carried; anything
            // else passes through unchanged
            if let Binding::Value(orig) = binding {
                let new_input = create_captured_input(graph, &mut self.frames[j], name, {
                    graph.value_type(orig).clone()
                });
                self.frames[j]
                    .bindings
                    .insert(name.to_string(), Binding::Value(new_input));
                binding = Binding::Value(new_input);
            }
        }
        Some(binding)
    }

    /// Bind `name` in the innermost frame, enforcing the reassignment
    /// rules: a name visible in an enclosing frame can only be rebound to a
    /// first-class value whose type is a subtype of what it had before.
    pub fn set_binding(
        &mut self,
        graph: &mut Graph,
        name: &str,
        binding: Binding,
        span: Span,
    ) -> CompileResult<()> {
        if let Binding::Value(v) = binding
            && graph.value(v).name.is_none()
            && meaningful_name(name)
            && defined_in_block(graph, self.top().block, v)
        {
            graph.set_value_name(v, name);
        }
        if let Some(parent) = self.find_in_parent_frame(name) {
            let Binding::Value(new_value) = binding else {
                return Err(CompileError::type_mismatch(
                    format!(
                        "cannot re-assign '{name}' to a value of kind {} because {name} is not a \
                         first-class value; only reassignments to first-class values are allowed",
                        binding.kind()
                    ),
                    span,
                ));
            };
            let Binding::Value(parent_value) = parent else {
                return Err(CompileError::type_mismatch(
                    format!(
                        "cannot re-assign '{name}' because {name} is not a first-class value; \
                         only reassignments to first-class values are allowed"
                    ),
                    span,
                ));
            };
            let parent_ty = graph.value_type(*parent_value).clone();
            let new_ty = graph.value_type(new_value).clone();
            if !new_ty.is_subtype_of(&parent_ty) {
                let mut message = format!(
                    "variable '{name}' previously has type {parent_ty} but is now being assigned \
                     to a value of type {new_ty}"
                );
                if matches!((&parent_ty, &new_ty), (Type::List(_), Type::List(_))) {
                    message.push_str(
                        "; empty lists default to List[Tensor], use annotate(List[T], []) to \
                         construct an empty list of another type",
                    );
                }
                return Err(CompileError::type_mismatch(message, span));
            }
        }
        // capture on write: rebinding a name defined outside a loop needs a
        // carried slot in that loop
        if matches!(binding, Binding::Value(_)) {
            self.capture_or_find(graph, name);
        }
        if let Some(top) = self.frames.last_mut() {
            top.bindings.insert(name.to_string(), binding);
        }
        Ok(())
    }

    /// Read a variable out of a frame that was just popped (an `if`
    /// branch): its own bindings first, then the live chain with normal
    /// capture behavior.
    pub fn branch_binding(
        &mut self,
        graph: &mut Graph,
        frame: &Frame,
        name: &str,
    ) -> Option<Binding> {
        match frame.get(name) {
            Some(binding) => Some(binding.clone()),
            None => self.capture_or_find(graph, name),
        }
    }

    /// Whether `name` is visible in a popped branch frame or anywhere in
    /// the live chain.
    pub fn visible_from_branch(&self, frame: &Frame, name: &str) -> bool {
        frame.contains(name) || self.find_in_any_frame(name).is_some()
    }

    pub fn set_type_error(&mut self, name: &str, message: String) {
        self.type_errors.insert(name.to_string(), message);
    }

    pub fn find_type_error(&self, name: &str) -> Option<&str> {
        self.type_errors.get(name).map(String::as_str)
    }

    /// Delete loop-carried slots for values the body only read.
    ///
    /// A carried value the body never rebound reaches the block output as
    /// the very value it entered with; replace its uses with the enclosing
    /// definition and delete the slot. Must run before the loop node's own
    /// carried inputs and outputs are added.
    pub fn prune_unchanged(
        &mut self,
        graph: &mut Graph,
        frame: &mut Frame,
        span: Span,
    ) -> CompileResult<()> {
        debug_assert_eq!(frame.kind, FrameKind::Loop);
        for i in (0..frame.captured.len()).rev() {
            let input_idx = LOOP_CARRIED_INPUT_OFFSET + i;
            let output_idx = LOOP_CARRIED_INPUT_OFFSET + i;
            let v_in = graph.block(frame.block).inputs[input_idx];
            let v_out = graph.block(frame.block).outputs[output_idx];
            if v_in != v_out {
                continue;
            }
            let name = frame.captured[i].clone();
            let orig = match self.find_in_any_frame(&name) {
                Some(Binding::Value(v)) => *v,
                _ => {
                    return Err(CompileError::internal(format!(
                        "loop captured '{name}' which is not a value in any enclosing scope \
                         (at {span})"
                    )));
                }
            };
            graph.replace_all_uses(v_in, orig);
            graph.erase_input(frame.block, input_idx);
            graph.erase_output(frame.block, output_idx);
            frame.captured.remove(i);
        }
        Ok(())
    }
}

/// Whether `value` is defined inside `block`: either as one of the block's
/// inputs or by a node the block owns. Only such values take on the name
/// they are bound to; a binding to an outer definition leaves its name
/// alone.
fn defined_in_block(graph: &Graph, block: BlockId, value: ValueId) -> bool {
    match graph.value(value).node {
        Some(node) => graph.block(block).nodes.contains(&node),
        None => graph.block(block).inputs.contains(&value),
    }
}

/// Insert a carried input for `name` into a loop frame, keeping the capture
/// list alphabetical.
fn create_captured_input(
    graph: &mut Graph,
    frame: &mut Frame,
    name: &str,
    ty: Type,
) -> ValueId {
    let pos = frame
        .captured
        .iter()
        .position(|c| name < c.as_str())
        .unwrap_or(frame.captured.len());
    frame.captured.insert(pos, name.to_string());
    let input = graph.insert_input(frame.block, LOOP_CARRIED_INPUT_OFFSET + pos, ty);
    if meaningful_name(name) {
        graph.set_value_name(input, name);
    }
    input
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracelang_core::Type;

    fn chain_with_graph() -> (Graph, ScopeChain) {
        let g = Graph::new();
        let root = g.root();
        (g, ScopeChain::new(root))
    }

    #[test]
    fn meaningful_names() {
        assert!(meaningful_name("x"));
        assert!(meaningful_name("_hidden"));
        assert!(!meaningful_name("_4"));
        assert!(!meaningful_name("_"));
        assert!(!meaningful_name(""));
    }

    #[test]
    fn shadowing_in_inner_frame_does_not_leak() {
        let (mut g, mut scopes) = chain_with_graph();
        let root = g.root();
        let v = g.add_input(root, Type::Int);
        scopes
            .set_binding(&mut g, "x", Binding::Value(v), Span::default())
            .unwrap();

        let cond_block = g.add_block();
        scopes.push(FrameKind::Conditional, cond_block);
        let v2 = g.add_input(root, Type::Int);
        scopes
            .set_binding(&mut g, "x", Binding::Value(v2), Span::default())
            .unwrap();
        let frame = scopes.pop();
        assert_eq!(frame.get("x").and_then(Binding::as_simple), Some(v2));
        assert_eq!(
            scopes.find_in_any_frame("x").and_then(Binding::as_simple),
            Some(v)
        );
    }

    #[test]
    fn only_values_defined_in_the_current_block_take_names() {
        let (mut g, mut scopes) = chain_with_graph();
        let root = g.root();
        let param = g.add_input(root, Type::Int);
        scopes
            .set_binding(&mut g, "x", Binding::Value(param), Span::default())
            .unwrap();
        assert_eq!(g.value(param).name.as_deref(), Some("x"));

        // an alias to an outer definition keeps the value anonymous
        let cond_block = g.add_block();
        scopes.push(FrameKind::Conditional, cond_block);
        let outer = g.add_input(root, Type::Int);
        scopes
            .set_binding(&mut g, "y", Binding::Value(outer), Span::default())
            .unwrap();
        assert_eq!(g.value(outer).name, None);

        // a value the branch itself defines is named as usual
        let local = g.add_input(cond_block, Type::Int);
        scopes
            .set_binding(&mut g, "z", Binding::Value(local), Span::default())
            .unwrap();
        assert_eq!(g.value(local).name.as_deref(), Some("z"));
    }

    #[test]
    fn reassignment_type_widening_is_rejected() {
        let (mut g, mut scopes) = chain_with_graph();
        let root = g.root();
        let v = g.add_input(root, Type::Int);
        scopes
            .set_binding(&mut g, "x", Binding::Value(v), Span::default())
            .unwrap();

        scopes.push(FrameKind::Conditional, g.add_block());
        let f = g.add_input(root, Type::Float);
        let err = scopes
            .set_binding(&mut g, "x", Binding::Value(f), Span::default())
            .unwrap_err();
        assert!(err.to_string().contains("previously has type int"), "{err}");
    }

    #[test]
    fn reading_through_a_loop_frame_creates_a_carried_input() {
        let (mut g, mut scopes) = chain_with_graph();
        let root = g.root();
        let v = g.add_input(root, Type::Tensor);
        scopes
            .set_binding(&mut g, "w", Binding::Value(v), Span::default())
            .unwrap();

        let body = g.add_block();
        g.add_input(body, Type::Int); // iteration counter
        scopes.push(FrameKind::Loop, body);
        let binding = scopes.capture_or_find(&mut g, "w").unwrap();
        let captured = binding.as_simple().unwrap();
        assert_ne!(captured, v);
        assert_eq!(g.block(body).inputs[1], captured);
        assert_eq!(scopes.top().captured, vec!["w".to_string()]);
        // a second read reuses the slot
        let again = scopes.capture_or_find(&mut g, "w").unwrap();
        assert_eq!(again.as_simple(), Some(captured));
    }

    #[test]
    fn captures_stay_alphabetical() {
        let (mut g, mut scopes) = chain_with_graph();
        let root = g.root();
        for name in ["b", "a", "c"] {
            let v = g.add_input(root, Type::Int);
            scopes
                .set_binding(&mut g, name, Binding::Value(v), Span::default())
                .unwrap();
        }
        let body = g.add_block();
        g.add_input(body, Type::Int);
        scopes.push(FrameKind::Loop, body);
        for name in ["b", "a", "c"] {
            scopes.capture_or_find(&mut g, name);
        }
        assert_eq!(scopes.top().captured, vec!["a", "b", "c"]);
    }

    #[test]
    fn prune_unchanged_drops_read_only_captures() {
        let (mut g, mut scopes) = chain_with_graph();
        let root = g.root();
        let v = g.add_input(root, Type::Tensor);
        scopes
            .set_binding(&mut g, "w", Binding::Value(v), Span::default())
            .unwrap();

        let body = g.add_block();
        let _cond_placeholder = g.add_input(body, Type::Int);
        scopes.push(FrameKind::Loop, body);
        let captured = scopes
            .capture_or_find(&mut g, "w")
            .and_then(|b| b.as_simple())
            .unwrap();

        // body: continue condition plus the untouched carried value
        let cond = g.add_input(root, Type::Bool);
        g.register_output(body, cond);
        g.register_output(body, captured);

        let mut frame = scopes.pop();
        scopes
            .prune_unchanged(&mut g, &mut frame, Span::default())
            .unwrap();
        assert!(frame.captured.is_empty());
        assert_eq!(g.block(body).inputs.len(), 1);
        assert_eq!(g.block(body).outputs.len(), 1);
    }
}
