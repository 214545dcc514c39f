//! Subscript desugaring: `x[i]`, `x[a:b]`, `x[i, :, t]` and the
//! corresponding assignment forms.
//!
//! Tensors lower to the `select`/`slice`/`index` operator family, with
//! tensor-valued indices gathered into an index list whose unindexed
//! dimensions stay as undefined-tensor holes. Lists lower to
//! `select`/`set_item`/`slice`. Tuples are resolved statically: indices
//! and slice bounds must be integer constants and produce `TupleIndex` /
//! `TupleSlice` nodes with precise types.

use tracelang_ast::{Expr, SubscriptEntry};
use tracelang_core::op_sym::ops;
use tracelang_core::{CompileError, CompileResult, Constant, Span, Type};
use tracelang_ir::{NodeKind, ValueId};

use crate::function_compiler::FunctionCompiler;
use crate::matcher::NamedArg;

impl FunctionCompiler<'_> {
    pub(crate) fn emit_subscript(
        &mut self,
        obj: &Expr,
        indices: &[SubscriptEntry],
        span: Span,
    ) -> CompileResult<ValueId> {
        let value = self.emit_expr(obj, None)?;
        if indices.len() != 1 {
            return self.emit_multidim(value, indices, span);
        }
        match &indices[0] {
            SubscriptEntry::Slice { start, end, span } => {
                self.emit_basic_slice(value, start, end, *span)
            }
            SubscriptEntry::Index(index) => {
                let ty = self.graph.value_type(value).clone();
                match ty {
                    Type::List(_) => {
                        let idx = self.emit_expr(index, None)?;
                        self.emit_builtin(ops::SELECT, span, &[value, idx])
                    }
                    Type::Tensor => self.emit_multidim(value, indices, span),
                    Type::Tuple(elems) => self.emit_tuple_index(value, &elems, index, span),
                    other => Err(CompileError::type_mismatch(
                        format!(
                            "indexing only supported on lists, tensors, and tuples, but found \
                             {other}"
                        ),
                        span,
                    )),
                }
            }
        }
    }

    fn emit_basic_slice(
        &mut self,
        value: ValueId,
        start: &Option<Expr>,
        end: &Option<Expr>,
        span: Span,
    ) -> CompileResult<ValueId> {
        let ty = self.graph.value_type(value).clone();
        match ty {
            Type::Tensor => self.emit_slice(value, Some(0), start, end, span),
            Type::List(_) => self.emit_slice(value, None, start, end, span),
            Type::Tuple(elems) => self.emit_tuple_slice(value, &elems, start, end, span),
            other => Err(CompileError::type_mismatch(
                format!(
                    "slicing only supported on lists, tensors, and tuples, but found {other}"
                ),
                span,
            )),
        }
    }

    /// One `slice` call; tensors pass the dimension, lists do not. An
    /// omitted end bound falls back to the schema default.
    fn emit_slice(
        &mut self,
        value: ValueId,
        dim: Option<i64>,
        start: &Option<Expr>,
        end: &Option<Expr>,
        span: Span,
    ) -> CompileResult<ValueId> {
        let mut args = vec![NamedArg::positional(value, span)];
        if let Some(dim) = dim {
            let dim = self.materialize_constant(Constant::Int(dim), span);
            args.push(NamedArg::positional(dim, span));
        }
        let begin = match start {
            Some(e) => self.emit_expr(e, None)?,
            None => self.materialize_constant(Constant::Int(0), span),
        };
        args.push(NamedArg::positional(begin, span));
        if let Some(e) = end {
            let end = self.emit_expr(e, None)?;
            args.push(NamedArg::positional(end, span));
        }
        let step = self.materialize_constant(Constant::Int(1), span);
        let kwargs = [NamedArg::keyword("step", step, span)];
        self.required_builtin(ops::SLICE, span, None, &args, &kwargs)
    }

    /// Mixed int/slice/tensor indexing on a tensor. Returns the sliced
    /// value plus the tensor indices collected per dimension, with `None`
    /// holes for dimensions indexed some other way.
    fn emit_int_and_slice_indexing(
        &mut self,
        mut value: ValueId,
        entries: &[SubscriptEntry],
        span: Span,
    ) -> CompileResult<(ValueId, Vec<Option<ValueId>>)> {
        let mut dim: i64 = 0;
        let mut tensor_indices: Vec<Option<ValueId>> = Vec::new();
        for entry in entries {
            match entry {
                SubscriptEntry::Slice { start, end, span } => {
                    value = self.emit_slice(value, Some(dim), start, end, *span)?;
                    dim += 1;
                }
                SubscriptEntry::Index(index) => {
                    let idx = self.emit_expr(index, None)?;
                    match self.graph.value_type(idx).clone() {
                        Type::Int => {
                            // selecting removes the dimension, so the next
                            // entry indexes the same dim
                            let dim_v = self.materialize_constant(Constant::Int(dim), span);
                            value = self.emit_builtin(ops::SELECT, span, &[value, dim_v, idx])?;
                        }
                        Type::Tensor => {
                            let slot = dim as usize;
                            if tensor_indices.len() <= slot {
                                tensor_indices.resize(slot + 1, None);
                            }
                            tensor_indices[slot] = Some(idx);
                            dim += 1;
                        }
                        other => {
                            return Err(CompileError::type_mismatch(
                                format!(
                                    "unsupported operation: indexing tensor with unsupported \
                                     index type {other}; only ints, slices, and tensors are \
                                     supported"
                                ),
                                index.span(),
                            ));
                        }
                    }
                }
            }
        }
        Ok((value, tensor_indices))
    }

    fn emit_multidim(
        &mut self,
        value: ValueId,
        entries: &[SubscriptEntry],
        span: Span,
    ) -> CompileResult<ValueId> {
        if *self.graph.value_type(value) != Type::Tensor {
            return Err(CompileError::type_mismatch(
                "unsupported operation: attempted to use multidimensional indexing on a \
                 non-tensor type"
                    .to_string(),
                span,
            ));
        }
        let (sliced, tensor_indices) = self.emit_int_and_slice_indexing(value, entries, span)?;
        if tensor_indices.is_empty() {
            return Ok(sliced);
        }
        let list = self.emit_tensor_index_list(tensor_indices, span);
        self.emit_builtin(ops::INDEX, span, &[sliced, list])
    }

    /// Pack per-dimension tensor indices into a `List[Tensor]`, filling
    /// holes with the undefined tensor.
    fn emit_tensor_index_list(
        &mut self,
        tensor_indices: Vec<Option<ValueId>>,
        span: Span,
    ) -> ValueId {
        let items: Vec<ValueId> = tensor_indices
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| self.undefined_tensor(span)))
            .collect();
        let node = self.graph.create_node(NodeKind::ListConstruct, items, span);
        let out = self.graph.add_node_output(node, Type::list(Type::Tensor));
        self.graph.append_node(self.block, node);
        out
    }

    fn undefined_tensor(&mut self, span: Span) -> ValueId {
        let v = self.graph.insert_constant(self.block, Constant::None, span);
        self.graph.set_value_type(v, Type::Tensor);
        v
    }

    fn emit_tuple_index(
        &mut self,
        value: ValueId,
        elems: &[Type],
        index: &Expr,
        span: Span,
    ) -> CompileResult<ValueId> {
        let idx = self.emit_expr(index, None)?;
        let Some(&Constant::Int(i)) = self.graph.as_constant(idx) else {
            return Err(CompileError::type_mismatch(
                "tuple indices must be integer constants".to_string(),
                index.span(),
            ));
        };
        let len = elems.len() as i64;
        let adjusted = if i < 0 { i + len } else { i };
        if adjusted < 0 || adjusted >= len {
            return Err(CompileError::type_mismatch(
                format!("tuple index out of range; tuple is length {len} and index is {i}"),
                span,
            ));
        }
        let slot = adjusted as usize;
        let node = self
            .graph
            .create_node(NodeKind::TupleIndex(slot), vec![value], span);
        let out = self.graph.add_node_output(node, elems[slot].clone());
        self.graph.append_node(self.block, node);
        Ok(out)
    }

    fn emit_tuple_slice(
        &mut self,
        value: ValueId,
        elems: &[Type],
        start: &Option<Expr>,
        end: &Option<Expr>,
        span: Span,
    ) -> CompileResult<ValueId> {
        let len = elems.len() as i64;
        let beg = self.tuple_slice_bound(start, 0, len)?;
        let end = self.tuple_slice_bound(end, len, len)?;
        let end = end.max(beg);
        let node = self.graph.create_node(
            NodeKind::TupleSlice {
                start: beg,
                end,
            },
            vec![value],
            span,
        );
        let out = self
            .graph
            .add_node_output(node, Type::Tuple(elems[beg..end].to_vec()));
        self.graph.append_node(self.block, node);
        Ok(out)
    }

    /// A tuple slice bound: a constant integer, adjusted for negative
    /// indexing and clamped to the tuple length.
    fn tuple_slice_bound(
        &mut self,
        bound: &Option<Expr>,
        default: i64,
        len: i64,
    ) -> CompileResult<usize> {
        let raw = match bound {
            None => default,
            Some(e) => {
                let v = self.emit_expr(e, None)?;
                let Some(&Constant::Int(i)) = self.graph.as_constant(v) else {
                    return Err(CompileError::type_mismatch(
                        "tuple slice indices must be integer constants".to_string(),
                        e.span(),
                    ));
                };
                i
            }
        };
        let adjusted = if raw < 0 { raw + len } else { raw };
        Ok(adjusted.clamp(0, len) as usize)
    }

    // ------------------------------------------------------------------
    // Assignment forms
    // ------------------------------------------------------------------

    pub(crate) fn emit_subscript_assign(
        &mut self,
        obj: &Expr,
        indices: &[SubscriptEntry],
        rhs: ValueId,
        span: Span,
    ) -> CompileResult<()> {
        let value = self.emit_expr(obj, None)?;
        let ty = self.graph.value_type(value).clone();
        match ty {
            Type::Tensor => {
                let (sliced, tensor_indices) =
                    self.emit_int_and_slice_indexing(value, indices, span)?;
                if tensor_indices.is_empty() {
                    self.emit_builtin(ops::COPY_, span, &[sliced, rhs])?;
                } else {
                    let list = self.emit_tensor_index_list(tensor_indices, span);
                    self.emit_builtin(ops::INDEX_PUT_, span, &[sliced, list, rhs])?;
                }
                Ok(())
            }
            Type::List(_) => {
                let [SubscriptEntry::Index(index)] = indices else {
                    return Err(CompileError::invalid_syntax(
                        "sliced expression not yet supported for subscripted list assignment"
                            .to_string(),
                        span,
                    ));
                };
                let idx = self.emit_expr(index, None)?;
                self.emit_builtin(ops::SET_ITEM, span, &[value, idx, rhs])?;
                Ok(())
            }
            other => Err(CompileError::type_mismatch(
                format!("subscript assignment is only supported for tensors and lists, but \
                         found {other}"),
                span,
            )),
        }
    }

    pub(crate) fn emit_subscript_aug_assign(
        &mut self,
        obj: &Expr,
        indices: &[SubscriptEntry],
        op: tracelang_ast::AugOp,
        rhs_expr: &Expr,
        span: Span,
    ) -> CompileResult<()> {
        let value = self.emit_expr(obj, None)?;
        let rhs = self.emit_expr(rhs_expr, None)?;
        let ty = self.graph.value_type(value).clone();
        match ty {
            Type::Tensor => {
                let (sliced, tensor_indices) =
                    self.emit_int_and_slice_indexing(value, indices, span)?;
                if tensor_indices.is_empty() {
                    let receiver = NamedArg::positional(sliced, span);
                    let args = [NamedArg::positional(rhs, rhs_expr.span())];
                    self.required_builtin(op.in_place_sym(), span, Some(&receiver), &args, &[])?;
                } else {
                    // read the advanced-indexed region, update it in place,
                    // and scatter it back
                    let list = self.emit_tensor_index_list(tensor_indices, span);
                    let indexed = self.emit_builtin(ops::INDEX, span, &[sliced, list])?;
                    let receiver = NamedArg::positional(indexed, span);
                    let args = [NamedArg::positional(rhs, rhs_expr.span())];
                    let augmented =
                        self.required_builtin(op.in_place_sym(), span, Some(&receiver), &args, &[])?;
                    self.emit_builtin(ops::INDEX_PUT_, span, &[sliced, list, augmented])?;
                }
                Ok(())
            }
            Type::List(elem) => {
                let [SubscriptEntry::Index(index)] = indices else {
                    return Err(CompileError::invalid_syntax(
                        "sliced expression not yet supported for subscripted list augmented \
                         assignment"
                            .to_string(),
                        span,
                    ));
                };
                let idx = self.emit_expr(index, None)?;
                let current = self.emit_builtin(ops::SELECT, span, &[value, idx])?;
                let result = if *elem == Type::Tensor {
                    let receiver = NamedArg::positional(current, span);
                    let args = [NamedArg::positional(rhs, rhs_expr.span())];
                    self.required_builtin(op.in_place_sym(), span, Some(&receiver), &args, &[])?
                } else {
                    self.emit_builtin(op.binary().op_sym(), span, &[current, rhs])?
                };
                self.emit_builtin(ops::SET_ITEM, span, &[value, idx, result])?;
                Ok(())
            }
            other => Err(CompileError::type_mismatch(
                format!(
                    "augmented assignment is only supported on tensor and list subscripts, but \
                     found {other}"
                ),
                span,
            )),
        }
    }
}
