//! Expression emission.
//!
//! Expressions evaluate to a [`Binding`] rather than a raw value: a name
//! can resolve to an operator or a compiled function, which only becomes
//! meaningful once called. `emit_expr` is the value-position entry point
//! and rejects bindings with no first-class representation.

use tracelang_ast::{Expr, Ident, Kwarg, UnaryOp};
use tracelang_core::op_sym::ops;
use tracelang_core::{CompileError, CompileResult, Constant, OpSym, Span, Type, unify};
use tracelang_ir::{NodeKind, ValueId};

use crate::binding::{Binding, Callable};
use crate::conversion::{try_convert_to_type, tuple_elements};
use crate::function_compiler::FunctionCompiler;
use crate::matcher::{NamedArg, call_function, emit_builtin_call};
use crate::type_resolver::{base_type_name, expr_to_type_expr, parse_type};

impl FunctionCompiler<'_> {
    /// Emit an expression in value position.
    pub(crate) fn emit_expr(&mut self, expr: &Expr, hint: Option<&Type>) -> CompileResult<ValueId> {
        match self.emit_sugared_expr(expr, hint)? {
            Binding::Value(v) => Ok(v),
            other => Err(CompileError::NotFirstClass {
                name: match expr {
                    Expr::Var(ident) => ident.name.clone(),
                    _ => other.kind().to_string(),
                },
                span: expr.span(),
            }),
        }
    }

    /// Emit an expression, retaining callables instead of forcing them into
    /// values.
    pub(crate) fn emit_sugared_expr(
        &mut self,
        expr: &Expr,
        hint: Option<&Type>,
    ) -> CompileResult<Binding> {
        let span = expr.span();
        match expr {
            Expr::Var(ident) => self.get_binding(&ident.name, ident.span),
            Expr::Attribute { value, attr, .. } => {
                let receiver = self.emit_sugared_expr(value, None)?;
                self.attribute_binding(receiver, attr, span)
            }
            Expr::Call {
                callee,
                args,
                kwargs,
                ..
            } => self.emit_apply(callee, args, kwargs, span),

            Expr::IntLit { value, .. } => {
                Ok(Binding::value(self.materialize_constant(Constant::Int(*value), span)))
            }
            Expr::FloatLit { value, .. } => {
                Ok(Binding::value(self.materialize_constant(Constant::Float(*value), span)))
            }
            Expr::BoolLit { value, .. } => {
                Ok(Binding::value(self.materialize_constant(Constant::Bool(*value), span)))
            }
            Expr::StrLit { value, .. } => Ok(Binding::value(
                self.materialize_constant(Constant::Str(value.clone()), span),
            )),
            Expr::NoneLit { .. } => {
                Ok(Binding::value(self.materialize_constant(Constant::None, span)))
            }

            Expr::Binary { op, lhs, rhs, .. } => {
                let lhs = self.emit_expr(lhs, None)?;
                let rhs = self.emit_expr(rhs, None)?;
                let v = self.emit_builtin(op.op_sym(), span, &[lhs, rhs])?;
                Ok(Binding::value(v))
            }
            Expr::Unary { op, operand, .. } => match op {
                UnaryOp::Neg => Ok(Binding::value(self.emit_negate(operand, span)?)),
                UnaryOp::Not => {
                    let cond = self.emit_cond(operand)?;
                    Ok(Binding::value(self.emit_builtin(ops::NOT, span, &[cond])?))
                }
            },
            Expr::BoolOp { op, lhs, rhs, .. } => {
                Ok(Binding::value(self.emit_short_circuit(*op, lhs, rhs, span)?))
            }
            Expr::Ternary {
                cond,
                true_expr,
                false_expr,
                ..
            } => {
                let cond = self.emit_cond(cond)?;
                let v = self.emit_if_expr(
                    span,
                    cond,
                    |c| c.emit_expr(true_expr, None),
                    |c| c.emit_expr(false_expr, None),
                )?;
                Ok(Binding::value(v))
            }

            Expr::TupleLit { elems, .. } => {
                let values = self.emit_exprs(elems)?;
                let types = values
                    .iter()
                    .map(|v| self.graph.value_type(*v).clone())
                    .collect();
                let node = self.graph.create_node(NodeKind::TupleConstruct, values, span);
                let out = self.graph.add_node_output(node, Type::Tuple(types));
                self.graph.append_node(self.block, node);
                Ok(Binding::value(out))
            }
            Expr::ListLit { elems, .. } => Ok(Binding::value(self.emit_list_literal(elems, hint, span)?)),

            Expr::Subscript { value, indices, .. } => {
                Ok(Binding::value(self.emit_subscript(value, indices, span)?))
            }
            Expr::Starred { .. } => Err(CompileError::invalid_syntax(
                "a starred expression is only allowed as an assignment target or call argument"
                    .to_string(),
                span,
            )),
        }
    }

    /// Emit a list of value expressions, expanding `*tuple` arguments
    /// in place.
    pub(crate) fn emit_exprs(&mut self, exprs: &[Expr]) -> CompileResult<Vec<ValueId>> {
        let mut values = Vec::with_capacity(exprs.len());
        for expr in exprs {
            if let Expr::Starred { value, span } = expr {
                let v = self.emit_expr(value, None)?;
                if !matches!(self.graph.value_type(v), Type::Tuple(_)) {
                    return Err(CompileError::type_mismatch(
                        format!(
                            "cannot statically unpack a value of type {}; only tuples can be \
                             star-expanded",
                            self.graph.value_type(v)
                        ),
                        *span,
                    ));
                }
                values.extend(tuple_elements(&mut self.graph, self.block, v, *span));
            } else {
                values.push(self.emit_expr(expr, None)?);
            }
        }
        Ok(values)
    }

    /// Emit an expression required to be `bool`.
    pub(crate) fn emit_cond(&mut self, expr: &Expr) -> CompileResult<ValueId> {
        let v = self.emit_expr(expr, None)?;
        let ty = self.graph.value_type(v).clone();
        if ty != Type::Bool {
            let mut message =
                format!("expected a boolean expression for condition but found {ty}");
            if ty == Type::Tensor {
                message.push_str(
                    ", to use a tensor in a boolean expression, explicitly cast it with `bool()`",
                );
            }
            return Err(CompileError::type_mismatch(message, expr.span()));
        }
        Ok(v)
    }

    /// A conditional expression: one `If` node whose branches each produce
    /// a single value. The branch types are unified and each branch output
    /// is converted toward the unified type, so `x if c else None` joins to
    /// `Optional[...]` just like the statement form.
    pub(crate) fn emit_if_expr<T, F>(
        &mut self,
        span: Span,
        cond: ValueId,
        true_fn: T,
        false_fn: F,
    ) -> CompileResult<ValueId>
    where
        T: FnOnce(&mut Self) -> CompileResult<ValueId>,
        F: FnOnce(&mut Self) -> CompileResult<ValueId>,
    {
        let node = self.graph.create_node(NodeKind::If, vec![cond], span);
        let true_block = self.graph.add_node_block(node);
        let false_block = self.graph.add_node_block(node);

        let true_value = self.emit_single_output_block(true_block, true_fn)?;
        let false_value = self.emit_single_output_block(false_block, false_fn)?;

        let true_ty = self.graph.value_type(true_value).clone();
        let false_ty = self.graph.value_type(false_value).clone();
        let Some(unified) = unify(&true_ty, &false_ty) else {
            return Err(CompileError::type_mismatch(
                format!(
                    "if-expression's true branch has type {true_ty} but false branch has type \
                     {false_ty}"
                ),
                span,
            ));
        };
        let true_value =
            try_convert_to_type(&mut self.graph, true_block, span, &unified, true_value, false);
        let false_value =
            try_convert_to_type(&mut self.graph, false_block, span, &unified, false_value, false);
        self.graph.register_output(true_block, true_value);
        self.graph.register_output(false_block, false_value);
        self.graph.append_node(self.block, node);
        Ok(self.graph.add_node_output(node, unified))
    }

    fn emit_single_output_block<F>(
        &mut self,
        block: tracelang_ir::BlockId,
        body: F,
    ) -> CompileResult<ValueId>
    where
        F: FnOnce(&mut Self) -> CompileResult<ValueId>,
    {
        self.scopes.push(crate::scope::FrameKind::Conditional, block);
        let result = self.in_block(block, body);
        self.scopes.pop();
        result
    }

    pub(crate) fn in_block<T>(
        &mut self,
        block: tracelang_ir::BlockId,
        f: impl FnOnce(&mut Self) -> CompileResult<T>,
    ) -> CompileResult<T> {
        let saved = self.block;
        self.block = block;
        let out = f(self);
        self.block = saved;
        out
    }

    /// `a or b` is `a if a else b`; `a and b` is `b if a else a`. The
    /// branch re-evaluating nothing returns the already-emitted condition.
    fn emit_short_circuit(
        &mut self,
        op: tracelang_ast::BoolOpKind,
        lhs: &Expr,
        rhs: &Expr,
        span: Span,
    ) -> CompileResult<ValueId> {
        let first = self.emit_cond(lhs)?;
        match op {
            tracelang_ast::BoolOpKind::Or => {
                self.emit_if_expr(span, first, |_| Ok(first), |c| c.emit_cond(rhs))
            }
            tracelang_ast::BoolOpKind::And => {
                self.emit_if_expr(span, first, |c| c.emit_cond(rhs), |_| Ok(first))
            }
        }
    }

    /// Unary minus, folding numeric constants instead of emitting a node.
    fn emit_negate(&mut self, operand: &Expr, span: Span) -> CompileResult<ValueId> {
        let v = self.emit_expr(operand, None)?;
        match self.graph.as_constant(v) {
            Some(Constant::Int(i)) => {
                let folded = -*i;
                Ok(self.materialize_constant(Constant::Int(folded), span))
            }
            Some(Constant::Float(f)) => {
                let folded = -*f;
                Ok(self.materialize_constant(Constant::Float(folded), span))
            }
            _ => self.emit_builtin(ops::NEG, span, &[v]),
        }
    }

    fn emit_list_literal(
        &mut self,
        elems: &[Expr],
        hint: Option<&Type>,
        span: Span,
    ) -> CompileResult<ValueId> {
        let values = self.emit_exprs(elems)?;
        let elem_ty = match hint {
            Some(Type::List(elem)) => (**elem).clone(),
            _ => match values.first() {
                Some(v) => self.graph.value_type(*v).clone(),
                None => Type::Tensor,
            },
        };
        for v in &values {
            let ty = self.graph.value_type(*v);
            if *ty != elem_ty {
                return Err(CompileError::type_mismatch(
                    format!(
                        "lists must contain only a single type, expected: {elem_ty} but found \
                         {ty} instead"
                    ),
                    span,
                ));
            }
        }
        let node = self.graph.create_node(NodeKind::ListConstruct, values, span);
        let out = self.graph.add_node_output(node, Type::list(elem_ty));
        self.graph.append_node(self.block, node);
        Ok(out)
    }

    /// `x.foo` resolves to a method callable with `x` bound as `self`.
    fn attribute_binding(
        &mut self,
        receiver: Binding,
        attr: &Ident,
        span: Span,
    ) -> CompileResult<Binding> {
        let value = match receiver {
            Binding::Value(v) => v,
            other => {
                return Err(CompileError::invalid_syntax(
                    format!("cannot access attribute {} on a {}", attr.name, other.kind()),
                    span,
                ));
            }
        };
        let ty = self.graph.value_type(value);
        if matches!(ty, Type::Int | Type::Float | Type::Number) {
            return Err(CompileError::invalid_syntax(
                "cannot call methods on numbers".to_string(),
                span,
            ));
        }
        Ok(Binding::Callable(Callable::Method {
            sym: OpSym::from_name(&attr.name),
            receiver: value,
        }))
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    fn emit_apply(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        kwargs: &[Kwarg],
        span: Span,
    ) -> CompileResult<Binding> {
        let binding = self.emit_sugared_expr(callee, None)?;
        let callable = match binding {
            Binding::Callable(c) => c,
            other => {
                return Err(CompileError::invalid_syntax(
                    format!("cannot call a {}", other.kind()),
                    span,
                ));
            }
        };
        // callables operating on the argument expressions themselves
        match callable {
            Callable::Annotate => return self.emit_annotate(args, kwargs, span).map(Binding::value),
            Callable::GetAttr => return self.emit_getattr(args, kwargs, span),
            Callable::IsInstance => {
                return self.emit_isinstance(args, kwargs, span).map(Binding::value);
            }
            Callable::Fork => return self.emit_fork(args, kwargs, span).map(Binding::value),
            _ => {}
        }
        let (named_args, named_kwargs) = self.emit_call_args(args, kwargs)?;
        self.apply_callable(callable, &named_args, &named_kwargs, span)
    }

    /// Call a callable with already-evaluated arguments. Shared by direct
    /// calls and by `fork`, which evaluates the call in a scratch block.
    pub(crate) fn apply_callable(
        &mut self,
        callable: Callable,
        args: &[NamedArg],
        kwargs: &[NamedArg],
        span: Span,
    ) -> CompileResult<Binding> {
        match callable {
            Callable::Op(sym) => self.builtin_binding(sym, span, None, args, kwargs),
            Callable::Method { sym, receiver } => {
                let receiver = NamedArg::positional(receiver, span);
                self.builtin_binding(sym, span, Some(&receiver), args, kwargs)
            }
            Callable::Function(function) => {
                let result = call_function(
                    &mut self.graph,
                    self.block,
                    &function,
                    span,
                    args,
                    kwargs,
                )?;
                Ok(result.map_or(Binding::None, Binding::Value))
            }
            Callable::Cast { ty, sym } => {
                if args.len() != 1 || !kwargs.is_empty() {
                    return Err(CompileError::invalid_syntax(
                        format!("expected exactly one argument when casting to {ty}"),
                        span,
                    ));
                }
                let value = args[0].value;
                if self.graph.value_type(value).is_subtype_of(&ty) {
                    return Ok(Binding::value(value));
                }
                Ok(Binding::value(self.required_builtin(sym, span, None, args, &[])?))
            }
            Callable::Print => {
                if !kwargs.is_empty() {
                    return Err(CompileError::invalid_syntax(
                        "print doesn't accept any keyword arguments".to_string(),
                        span,
                    ));
                }
                let inputs = args.iter().map(|a| a.value).collect();
                let node = self.graph.create_node(NodeKind::Op(ops::PRINT), inputs, span);
                self.graph.append_node(self.block, node);
                Ok(Binding::None)
            }
            other => Err(CompileError::invalid_syntax(
                format!("cannot call a {} here", other.kind()),
                span,
            )),
        }
    }

    /// Resolve a builtin call into a binding: `Binding::None` when the
    /// matched call produces no value.
    pub(crate) fn builtin_binding(
        &mut self,
        sym: OpSym,
        span: Span,
        self_arg: Option<&NamedArg>,
        args: &[NamedArg],
        kwargs: &[NamedArg],
    ) -> CompileResult<Binding> {
        let result = emit_builtin_call(
            &mut self.graph,
            self.block,
            self.registry,
            sym,
            span,
            self_arg,
            args,
            kwargs,
        )?;
        Ok(result.map_or(Binding::None, Binding::Value))
    }

    /// A builtin call in value position; only for symbols whose every
    /// candidate returns a value.
    pub(crate) fn required_builtin(
        &mut self,
        sym: OpSym,
        span: Span,
        self_arg: Option<&NamedArg>,
        args: &[NamedArg],
        kwargs: &[NamedArg],
    ) -> CompileResult<ValueId> {
        match self.builtin_binding(sym, span, self_arg, args, kwargs)? {
            Binding::Value(v) => Ok(v),
            _ => Err(CompileError::internal(
                "required builtin call produced no value".to_string(),
            )),
        }
    }

    /// A convenience wrapper for positional-only builtin calls.
    pub(crate) fn emit_builtin(
        &mut self,
        sym: OpSym,
        span: Span,
        values: &[ValueId],
    ) -> CompileResult<ValueId> {
        let args: Vec<NamedArg> = values
            .iter()
            .map(|v| NamedArg::positional(*v, span))
            .collect();
        self.required_builtin(sym, span, None, &args, &[])
    }

    fn emit_call_args(
        &mut self,
        args: &[Expr],
        kwargs: &[Kwarg],
    ) -> CompileResult<(Vec<NamedArg>, Vec<NamedArg>)> {
        let mut named_args = Vec::with_capacity(args.len());
        for arg in args {
            if let Expr::Starred { value, span } = arg {
                let v = self.emit_expr(value, None)?;
                if !matches!(self.graph.value_type(v), Type::Tuple(_)) {
                    return Err(CompileError::type_mismatch(
                        format!(
                            "cannot statically unpack a value of type {}; only tuples can be \
                             star-expanded",
                            self.graph.value_type(v)
                        ),
                        *span,
                    ));
                }
                for elem in tuple_elements(&mut self.graph, self.block, v, *span) {
                    named_args.push(NamedArg::positional(elem, *span));
                }
            } else {
                let v = self.emit_expr(arg, None)?;
                named_args.push(NamedArg::positional(v, arg.span()));
            }
        }
        let named_kwargs = kwargs
            .iter()
            .map(|kw| {
                let v = self.emit_expr(&kw.value, None)?;
                Ok(NamedArg::keyword(kw.name.name.clone(), v, kw.name.span))
            })
            .collect::<CompileResult<Vec<_>>>()?;
        Ok((named_args, named_kwargs))
    }

    fn check_apply(
        &self,
        name: &str,
        args: &[Expr],
        kwargs: &[Kwarg],
        expected: usize,
        span: Span,
    ) -> CompileResult<()> {
        if args.len() != expected {
            return Err(CompileError::invalid_syntax(
                format!(
                    "{name} expected exactly {expected} arguments but found {}",
                    args.len()
                ),
                span,
            ));
        }
        if !kwargs.is_empty() {
            return Err(CompileError::invalid_syntax(
                format!("{name} takes no keyword arguments"),
                span,
            ));
        }
        Ok(())
    }

    /// `annotate(T, e)`: emit `e` with `T` as the hint and require the
    /// result to fit `T`.
    fn emit_annotate(
        &mut self,
        args: &[Expr],
        kwargs: &[Kwarg],
        span: Span,
    ) -> CompileResult<ValueId> {
        self.check_apply("annotate", args, kwargs, 2, span)?;
        let ty = parse_type(&expr_to_type_expr(&args[0])?)?;
        let value = self.emit_expr(&args[1], Some(&ty))?;
        let value = try_convert_to_type(&mut self.graph, self.block, span, &ty, value, true);
        let actual = self.graph.value_type(value).clone();
        if !actual.is_subtype_of(&ty) {
            return Err(CompileError::type_mismatch(
                format!("expected an expression of type {ty} but found {actual}"),
                span,
            ));
        }
        Ok(value)
    }

    /// `getattr(x, "name")` with a string-literal name is the same as
    /// `x.name`.
    fn emit_getattr(
        &mut self,
        args: &[Expr],
        kwargs: &[Kwarg],
        span: Span,
    ) -> CompileResult<Binding> {
        self.check_apply("getattr", args, kwargs, 2, span)?;
        let Expr::StrLit { value: name, span: name_span } = &args[1] else {
            return Err(CompileError::invalid_syntax(
                "getattr's second argument must be a string literal".to_string(),
                args[1].span(),
            ));
        };
        let receiver = self.emit_sugared_expr(&args[0], None)?;
        self.attribute_binding(receiver, &Ident::new(name.clone(), *name_span), span)
    }

    /// `isinstance` is fully static; the result is a `bool` constant.
    fn emit_isinstance(
        &mut self,
        args: &[Expr],
        kwargs: &[Kwarg],
        span: Span,
    ) -> CompileResult<ValueId> {
        self.check_apply("isinstance", args, kwargs, 2, span)?;
        let value = self.emit_expr(&args[0], None)?;
        let actual = self.graph.value_type(value).clone();
        if matches!(actual, Type::Optional(_)) {
            return Err(CompileError::type_mismatch(
                "Optional isinstance check is not supported, consider use is/isnot None instead"
                    .to_string(),
                span,
            ));
        }
        let result = match &args[1] {
            Expr::TupleLit { elems, .. } => {
                let mut any = false;
                for class in elems {
                    any = any || isinstance_matches(&actual, class)?;
                }
                any
            }
            class => isinstance_matches(&actual, class)?,
        };
        Ok(self.materialize_constant(Constant::Bool(result), span))
    }

    /// `fork(f, args...)`: the call is compiled into a scratch block, the
    /// block is lifted into a standalone graph, and a `Fork` node taking
    /// the lifted graph's captures produces a `Future` of the result.
    fn emit_fork(&mut self, args: &[Expr], kwargs: &[Kwarg], span: Span) -> CompileResult<ValueId> {
        let Some((callee, rest)) = args.split_first() else {
            return Err(CompileError::invalid_syntax(
                "expected at least one argument to fork()".to_string(),
                span,
            ));
        };
        let scratch = self.graph.add_block();
        let result = self.in_block(scratch, |c| {
            let forked = c.emit_sugared_expr(callee, None)?;
            let callable = match forked {
                Binding::Callable(callable) => callable,
                other => {
                    return Err(CompileError::invalid_syntax(
                        format!("cannot call a {}", other.kind()),
                        span,
                    ));
                }
            };
            let (named_args, named_kwargs) = c.emit_call_args(rest, kwargs)?;
            let result = c.apply_callable(callable, &named_args, &named_kwargs, span)?;
            result.as_value("fork", span)
        })?;
        self.graph.register_output(scratch, result);
        let result_ty = self.graph.value_type(result).clone();

        let (subgraph, captured) = self.graph.lift_block(scratch, span)?;
        self.graph.discard_block(scratch);

        let node = self.graph.create_node(NodeKind::Fork, captured, span);
        self.graph.node_mut(node).subgraph = Some(Box::new(subgraph));
        let out = self.graph.add_node_output(node, Type::future(result_ty));
        self.graph.append_node(self.block, node);
        Ok(out)
    }
}

/// Whether `actual` satisfies one `isinstance` class expression. `list`
/// and `tuple` are accepted bare, without element types.
fn isinstance_matches(actual: &Type, class: &Expr) -> CompileResult<bool> {
    match base_type_name(class) {
        Some("list") => return Ok(matches!(actual, Type::List(_))),
        Some("tuple") => return Ok(matches!(actual, Type::Tuple(_))),
        _ => {}
    }
    let target = parse_type(&expr_to_type_expr(class)?)?;
    Ok(actual.is_subtype_of(&target))
}
