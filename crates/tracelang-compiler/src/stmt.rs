//! Statement emission: assignments, conditionals, loops.
//!
//! Control flow lowers to block-structured `If` and `Loop` nodes. Both
//! loop forms share one emitter; `while` supplies a condition and an
//! unbounded trip count, `for ... in range(n)` supplies a trip count and a
//! constant-true condition. Values crossing a loop boundary become carried
//! inputs through the scope chain's capture machinery, and carried slots
//! the body never rebinds are pruned again before the node is finished.
//!
//! `if` joins the two branch environments afterwards: every variable
//! assigned in one branch and visible from the other becomes a node
//! output with the unified type. A unification failure for a variable
//! unknown to the enclosing scope is deferred and only reported if the
//! variable is actually read later.

use tracelang_ast::{BinaryOp, Expr, Ident, Stmt};
use tracelang_core::{CompileError, CompileResult, Constant, Span, Type};
use tracelang_ir::{BlockId, NodeKind, ValueId};

use crate::binding::{Binding, NoneStatus};
use crate::conversion::tuple_elements;
use crate::function_compiler::FunctionCompiler;
use crate::matcher::NamedArg;
use crate::scope::{Frame, FrameKind};

impl FunctionCompiler<'_> {
    pub(crate) fn emit_statements(&mut self, stmts: &[Stmt]) -> CompileResult<()> {
        for stmt in stmts {
            self.emit_statement(stmt)?;
        }
        Ok(())
    }

    fn emit_statement(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match stmt {
            Stmt::ExprStmt { expr, .. } => {
                self.emit_sugared_expr(expr, None)?;
                Ok(())
            }
            Stmt::Assign {
                targets,
                value,
                span,
            } => self.emit_assignment(targets, value, *span),
            Stmt::AugAssign {
                target,
                op,
                value,
                span,
            } => self.emit_aug_assignment(target, *op, value, *span),
            Stmt::If {
                cond,
                then_body,
                else_body,
                span,
            } => self.emit_if(cond, then_body, else_body, *span),
            Stmt::While { cond, body, span } => {
                self.emit_loop_common(*span, None, Some(cond), body, None)
            }
            Stmt::For {
                targets,
                iters,
                body,
                span,
            } => self.emit_for(targets, iters, body, *span),
            Stmt::Return { span, .. } => Err(CompileError::invalid_syntax(
                "return statements can appear only at the end of the function body".to_string(),
                *span,
            )),
            Stmt::Raise { span, .. } => self.emit_raise(*span),
            Stmt::Assert {
                cond,
                message: _,
                span,
            } => self.emit_assert(cond, *span),
            Stmt::Pass { .. } => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Conditionals
    // ------------------------------------------------------------------

    fn emit_if(
        &mut self,
        cond: &Expr,
        then_body: &[Stmt],
        else_body: &[Stmt],
        span: Span,
    ) -> CompileResult<()> {
        // `x is None` against a statically known operand picks a branch at
        // compile time instead of emitting an `If` node
        if let Expr::Binary {
            op: op @ (BinaryOp::Is | BinaryOp::IsNot),
            lhs,
            rhs,
            ..
        } = cond
        {
            let lv = self.emit_expr(lhs, None)?;
            let rv = self.emit_expr(rhs, None)?;
            let statically_is = match (self.none_status(lv), self.none_status(rv)) {
                (NoneStatus::Always, NoneStatus::Always) => Some(true),
                (NoneStatus::Always, NoneStatus::Never)
                | (NoneStatus::Never, NoneStatus::Always) => Some(false),
                _ => None,
            };
            if let Some(is_none) = statically_is {
                let take_then = is_none == matches!(op, BinaryOp::Is);
                let taken = if take_then { then_body } else { else_body };
                return self.emit_statements(taken);
            }
            let cond_value = self.emit_builtin(op.op_sym(), span, &[lv, rv])?;
            return self.emit_if_else_blocks(cond_value, then_body, else_body, span);
        }
        let cond_value = self.emit_cond(cond)?;
        self.emit_if_else_blocks(cond_value, then_body, else_body, span)
    }

    fn emit_branch(&mut self, block: BlockId, body: &[Stmt]) -> CompileResult<Frame> {
        self.scopes.push(FrameKind::Conditional, block);
        let result = self.in_block(block, |c| c.emit_statements(body));
        let frame = self.scopes.pop();
        result?;
        Ok(frame)
    }

    fn emit_if_else_blocks(
        &mut self,
        cond: ValueId,
        then_body: &[Stmt],
        else_body: &[Stmt],
        span: Span,
    ) -> CompileResult<()> {
        let node = self.graph.create_node(NodeKind::If, vec![cond], span);
        self.graph.append_node(self.block, node);
        let true_block = self.graph.add_node_block(node);
        let false_block = self.graph.add_node_block(node);

        let true_frame = self.emit_branch(true_block, then_body)?;
        let false_frame = self.emit_branch(false_block, else_body)?;

        // variables assigned in one branch and visible from the other need
        // a unified value after the node
        let mut mutated: Vec<String> = Vec::new();
        for name in true_frame.defined_names() {
            if self.scopes.visible_from_branch(&false_frame, name) {
                mutated.push(name.to_string());
            }
        }
        for name in false_frame.defined_names() {
            if !mutated.iter().any(|m| m == name)
                && self.scopes.visible_from_branch(&true_frame, name)
            {
                mutated.push(name.to_string());
            }
        }

        for name in mutated {
            let tv = self
                .scopes
                .branch_binding(&mut self.graph, &true_frame, &name)
                .unwrap_or(Binding::None)
                .as_value(&name, span)?;
            let fv = self
                .scopes
                .branch_binding(&mut self.graph, &false_frame, &name)
                .unwrap_or(Binding::None)
                .as_value(&name, span)?;
            let t_ty = self.graph.value_type(tv).clone();
            let f_ty = self.graph.value_type(fv).clone();
            match tracelang_core::unify(&t_ty, &f_ty) {
                Some(unified) => {
                    self.graph.register_output(true_block, tv);
                    self.graph.register_output(false_block, fv);
                    let out = self.graph.add_node_output(node, unified);
                    self.scopes
                        .set_binding(&mut self.graph, &name, Binding::value(out), span)?;
                }
                None => {
                    let message = format!(
                        "type mismatch: {name} is set to type {t_ty} in the true branch and \
                         type {f_ty} in the false branch"
                    );
                    if self.scopes.find_in_any_frame(&name).is_some() {
                        return Err(CompileError::type_mismatch(message, span));
                    }
                    // the variable is new to this scope; the error only
                    // matters if something reads it afterwards
                    self.scopes.set_type_error(&name, message);
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Loops
    // ------------------------------------------------------------------

    /// Shared lowering for `while` and `for ... in range(n)`.
    ///
    /// Node inputs are the maximum trip count and the entry condition,
    /// then one slot per carried value; the body block takes the trip
    /// counter plus the carried values and yields the continue condition
    /// plus their updated values.
    fn emit_loop_common(
        &mut self,
        span: Span,
        max_trip_expr: Option<&Expr>,
        cond_expr: Option<&Expr>,
        body: &[Stmt],
        trip_var: Option<&Ident>,
    ) -> CompileResult<()> {
        let max_trip = match max_trip_expr {
            Some(e) => {
                let v = self.emit_expr(e, None)?;
                let ty = self.graph.value_type(v).clone();
                if ty != Type::Int {
                    return Err(CompileError::type_mismatch(
                        format!("expected a int but found a {ty}"),
                        e.span(),
                    ));
                }
                v
            }
            None => self.materialize_constant(Constant::Int(i64::MAX), span),
        };
        let entry_cond = match cond_expr {
            Some(e) => self.emit_cond(e)?,
            None => self.materialize_constant(Constant::Bool(true), span),
        };

        let node = self
            .graph
            .create_node(NodeKind::Loop, vec![max_trip, entry_cond], span);
        self.graph.append_node(self.block, node);
        let body_block = self.graph.add_node_block(node);
        let trip = self.graph.add_input(body_block, Type::Int);

        self.scopes.push(FrameKind::Loop, body_block);
        let result = self.in_block(body_block, |c| {
            if let Some(ident) = trip_var {
                c.scopes
                    .set_binding(&mut c.graph, &ident.name, Binding::value(trip), ident.span)?;
            }
            c.emit_statements(body)?;
            match cond_expr {
                Some(e) => c.emit_cond(e),
                None => Ok(c.materialize_constant(Constant::Bool(true), span)),
            }
        });
        let mut frame = self.scopes.pop();
        let continue_cond = result?;
        self.graph.register_output(body_block, continue_cond);

        // block outputs mirror the carried inputs, in capture order
        for name in frame.captured.clone() {
            let v = frame
                .get(&name)
                .and_then(Binding::as_simple)
                .ok_or_else(|| {
                    CompileError::internal(format!(
                        "loop-carried variable '{name}' lost its value binding"
                    ))
                })?;
            self.graph.register_output(body_block, v);
        }
        self.scopes.prune_unchanged(&mut self.graph, &mut frame, span)?;

        // surviving captures become carried node inputs and outputs,
        // rebinding the names in the enclosing scope
        for (i, name) in frame.captured.clone().into_iter().enumerate() {
            let outer = match self.scopes.capture_or_find(&mut self.graph, &name) {
                Some(Binding::Value(v)) => v,
                _ => {
                    return Err(CompileError::internal(format!(
                        "loop captured '{name}' which is not a value in any enclosing scope \
                         (at {span})"
                    )));
                }
            };
            let carried_in = self.graph.block(body_block).inputs[1 + i];
            let ty = self.graph.value_type(carried_in).clone();
            self.graph.node_mut(node).inputs.push(outer);
            let out = self.graph.add_node_output(node, ty);
            self.scopes
                .set_binding(&mut self.graph, &name, Binding::value(out), span)?;
        }
        Ok(())
    }

    fn emit_for(
        &mut self,
        targets: &[Expr],
        iters: &[Expr],
        body: &[Stmt],
        span: Span,
    ) -> CompileResult<()> {
        if iters.len() != 1 {
            return Err(CompileError::invalid_syntax(
                "list of iterables is not supported currently".to_string(),
                span,
            ));
        }
        if targets.len() != 1 {
            return Err(CompileError::invalid_syntax(
                "iteration variable unpacking is not supported".to_string(),
                span,
            ));
        }
        let Expr::Var(target) = &targets[0] else {
            return Err(CompileError::invalid_syntax(
                "unexpected expression in variable initialization of for loop".to_string(),
                targets[0].span(),
            ));
        };

        if let Expr::Call {
            callee,
            args,
            kwargs,
            ..
        } = &iters[0]
            && matches!(callee.as_ref(), Expr::Var(ident) if ident.name == "range")
            && kwargs.is_empty()
        {
            if args.len() != 1 {
                return Err(CompileError::invalid_syntax(
                    format!("range() expects 1 argument but got {}", args.len()),
                    span,
                ));
            }
            return self.emit_loop_common(span, Some(&args[0]), None, body, Some(target));
        }

        // anything else iterates a statically sized tuple, unrolled
        let iterable = self.emit_expr(&iters[0], None)?;
        let ty = self.graph.value_type(iterable).clone();
        if !matches!(ty, Type::Tuple(_)) {
            return Err(CompileError::type_mismatch(
                format!("a value of type {ty} cannot be used as a tuple"),
                iters[0].span(),
            ));
        }
        let instances = tuple_elements(&mut self.graph, self.block, iterable, span);

        self.scopes.push(FrameKind::Inline, self.block);
        let result = (|| -> CompileResult<()> {
            for instance in instances {
                self.scopes.set_binding(
                    &mut self.graph,
                    &target.name,
                    Binding::value(instance),
                    target.span,
                )?;
                self.emit_statements(body)?;
            }
            Ok(())
        })();
        let frame = self.scopes.pop();
        result?;

        // assignments to names the enclosing scope knows persist past the
        // unrolled body
        for name in frame.defined_names() {
            if self.scopes.find_in_any_frame(name).is_none() {
                continue;
            }
            if let Some(binding) = frame.get(name).cloned() {
                let name = name.to_string();
                self.scopes.set_binding(&mut self.graph, &name, binding, span)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Assignments
    // ------------------------------------------------------------------

    fn emit_assignment(
        &mut self,
        targets: &[Expr],
        value: &Expr,
        span: Span,
    ) -> CompileResult<()> {
        if let [target] = targets {
            match target {
                Expr::Var(ident) => {
                    let binding = self.emit_sugared_expr(value, None)?;
                    return self.scopes.set_binding(&mut self.graph, &ident.name, binding, span);
                }
                Expr::Subscript {
                    value: obj,
                    indices,
                    ..
                } => {
                    let rhs = self.emit_expr(value, None)?;
                    return self.emit_subscript_assign(obj, indices, rhs, span);
                }
                Expr::TupleLit { elems, .. } => {
                    return self.emit_tuple_assign(elems, value, span);
                }
                _ => {}
            }
        }
        self.emit_tuple_assign(targets, value, span)
    }

    fn emit_tuple_assign(
        &mut self,
        targets: &[Expr],
        value: &Expr,
        span: Span,
    ) -> CompileResult<()> {
        let n_starred = calc_num_starred_unpack(targets, span)?;
        let rhs = self.emit_expr(value, None)?;
        let rhs_ty = self.graph.value_type(rhs).clone();
        if !matches!(rhs_ty, Type::Tuple(_)) {
            return Err(CompileError::type_mismatch(
                format!("a value of type {rhs_ty} cannot be used as a tuple"),
                value.span(),
            ));
        }
        let elems = tuple_elements(&mut self.graph, self.block, rhs, span);
        let n_regular = targets.len() - n_starred;
        if n_starred > 0 {
            if elems.len() < n_regular {
                return Err(CompileError::type_mismatch(
                    format!(
                        "need at least {n_regular} values to unpack but found only {}",
                        elems.len()
                    ),
                    span,
                ));
            }
        } else if elems.len() < targets.len() {
            return Err(CompileError::type_mismatch(
                format!(
                    "need {} values to unpack but found only {}",
                    targets.len(),
                    elems.len()
                ),
                span,
            ));
        } else if elems.len() > targets.len() {
            return Err(CompileError::type_mismatch(
                format!(
                    "too many values to unpack: need {} but found {}",
                    targets.len(),
                    elems.len()
                ),
                span,
            ));
        }

        let surplus = elems.len() - n_regular;
        let mut i = 0usize;
        for target in targets {
            match target {
                Expr::Starred { value: inner, span: star_span } => {
                    let Expr::Var(ident) = inner.as_ref() else {
                        return Err(CompileError::invalid_syntax(
                            "cannot pack a tuple into a non-variable".to_string(),
                            *star_span,
                        ));
                    };
                    let slice = elems[i..i + surplus].to_vec();
                    let types = slice
                        .iter()
                        .map(|v| self.graph.value_type(*v).clone())
                        .collect();
                    let node =
                        self.graph
                            .create_node(NodeKind::TupleConstruct, slice, *star_span);
                    let packed = self.graph.add_node_output(node, Type::Tuple(types));
                    self.graph.append_node(self.block, node);
                    self.scopes.set_binding(
                        &mut self.graph,
                        &ident.name,
                        Binding::value(packed),
                        *star_span,
                    )?;
                    i += surplus;
                }
                Expr::Var(ident) => {
                    self.scopes.set_binding(
                        &mut self.graph,
                        &ident.name,
                        Binding::value(elems[i]),
                        ident.span,
                    )?;
                    i += 1;
                }
                Expr::Subscript {
                    value: obj,
                    indices,
                    span: sub_span,
                } => {
                    self.emit_subscript_assign(obj, indices, elems[i], *sub_span)?;
                    i += 1;
                }
                other => {
                    return Err(CompileError::invalid_syntax(
                        "lhs of assignment must be a variable, subscript, or starred expression"
                            .to_string(),
                        other.span(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn emit_aug_assignment(
        &mut self,
        target: &Expr,
        op: tracelang_ast::AugOp,
        value: &Expr,
        span: Span,
    ) -> CompileResult<()> {
        match target {
            Expr::Var(ident) => {
                let lhs = self.get_binding(&ident.name, ident.span)?.as_value(&ident.name, ident.span)?;
                let rhs = self.emit_expr(value, None)?;
                let result = if *self.graph.value_type(lhs) == Type::Tensor {
                    // tensors update in place through the mutating overload
                    let receiver = NamedArg::positional(lhs, span);
                    let args = [NamedArg::positional(rhs, value.span())];
                    self.required_builtin(op.in_place_sym(), span, Some(&receiver), &args, &[])?
                } else {
                    self.emit_builtin(op.binary().op_sym(), span, &[lhs, rhs])?
                };
                self.scopes
                    .set_binding(&mut self.graph, &ident.name, Binding::value(result), span)
            }
            Expr::Subscript {
                value: obj,
                indices,
                ..
            } => self.emit_subscript_aug_assign(obj, indices, op, value, span),
            other => Err(CompileError::invalid_syntax(
                "left-hand side of augmented assignment must be a variable or subscript"
                    .to_string(),
                other.span(),
            )),
        }
    }

    // ------------------------------------------------------------------
    // Raise and assert
    // ------------------------------------------------------------------

    /// The exception expression carries no runtime payload; raising always
    /// throws a generic exception.
    fn emit_raise(&mut self, span: Span) -> CompileResult<()> {
        let message = self.materialize_constant(Constant::Str("Exception".to_string()), span);
        let args = [NamedArg::positional(message, span)];
        self.builtin_binding(
            tracelang_core::op_sym::ops::RAISE_EXCEPTION,
            span,
            None,
            &args,
            &[],
        )?;
        Ok(())
    }

    fn emit_assert(&mut self, cond: &Expr, span: Span) -> CompileResult<()> {
        let cond_value = self.emit_cond(cond)?;
        let node = self.graph.create_node(NodeKind::If, vec![cond_value], span);
        self.graph.append_node(self.block, node);
        // the true block stays empty
        self.graph.add_node_block(node);
        let false_block = self.graph.add_node_block(node);

        self.scopes.push(FrameKind::Conditional, false_block);
        let result = self.in_block(false_block, |c| c.emit_raise(span));
        self.scopes.pop();
        result
    }
}

/// Validate assignment targets and count starred expressions.
fn calc_num_starred_unpack(targets: &[Expr], span: Span) -> CompileResult<usize> {
    let mut n_starred = 0usize;
    for target in targets {
        match target {
            Expr::Var(_) | Expr::Subscript { .. } => {}
            Expr::Starred { .. } => n_starred += 1,
            other => {
                return Err(CompileError::invalid_syntax(
                    "lhs of assignment must be a variable, subscript, or starred expression"
                        .to_string(),
                    other.span(),
                ));
            }
        }
    }
    if n_starred > 1 {
        return Err(CompileError::invalid_syntax(
            "only one starred expression is allowed on the lhs".to_string(),
            span,
        ));
    }
    if n_starred == 1 && targets.len() == 1 {
        return Err(CompileError::invalid_syntax(
            "a starred expression may only appear on the lhs within the presence of another \
             non-starred expression"
                .to_string(),
            span,
        ));
    }
    Ok(n_starred)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function_compiler::compile_function;
    use crate::resolver::EmptyResolver;
    use tracelang_ast::{AugOp, FunctionDef, Param, TypeExpr};
    use tracelang_core::op_sym::ops;
    use tracelang_ir::Graph;
    use tracelang_registry::OpRegistry;

    fn ident(name: &str) -> Ident {
        Ident::new(name, Span::default())
    }

    fn var(name: &str) -> Expr {
        Expr::Var(ident(name))
    }

    fn int_lit(value: i64) -> Expr {
        Expr::IntLit {
            value,
            span: Span::default(),
        }
    }

    fn typed_param(name: &str, ty: &str) -> Param {
        Param::new(ident(name)).with_type(TypeExpr::Named(ident(ty)))
    }

    fn assign(name: &str, value: Expr) -> Stmt {
        Stmt::Assign {
            targets: vec![var(name)],
            value,
            span: Span::default(),
        }
    }

    fn ret(values: Vec<Expr>) -> Stmt {
        Stmt::Return {
            values,
            span: Span::default(),
        }
    }

    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            span: Span::default(),
        }
    }

    fn function(params: Vec<Param>, body: Vec<Stmt>) -> FunctionDef {
        FunctionDef {
            name: ident("f"),
            params,
            return_ty: None,
            body,
            span: Span::default(),
        }
    }

    fn compile(def: &FunctionDef) -> CompileResult<std::sync::Arc<tracelang_registry::CompiledFunction>> {
        compile_function(def, &OpRegistry::with_prelude(), &EmptyResolver)
    }

    fn loop_node(g: &Graph) -> tracelang_ir::NodeId {
        *g.block(g.root())
            .nodes
            .iter()
            .find(|n| g.node(**n).kind == NodeKind::Loop)
            .unwrap()
    }

    #[test]
    fn while_loop_carries_mutated_variables() {
        // x = 0; while c: x = x + 1; return x
        let def = function(
            vec![typed_param("c", "bool")],
            vec![
                assign("x", int_lit(0)),
                Stmt::While {
                    cond: var("c"),
                    body: vec![assign("x", binary(BinaryOp::Add, var("x"), int_lit(1)))],
                    span: Span::default(),
                },
                ret(vec![var("x")]),
            ],
        );
        let f = compile(&def).unwrap();
        let g = &f.graph;
        let node = loop_node(g);
        // max trip count, condition, one carried value
        assert_eq!(g.node(node).inputs.len(), 3);
        assert_eq!(g.node(node).outputs.len(), 1);
        let body = g.node(node).blocks[0];
        assert_eq!(g.block(body).inputs.len(), 2);
        assert_eq!(g.block(body).outputs.len(), 2);
        // the function returns the loop's carried output
        assert_eq!(g.block(g.root()).outputs[0], g.node(node).outputs[0]);
    }

    #[test]
    fn read_only_loop_captures_are_pruned() {
        // while c: y = x + x   (x never rebound, y local)
        let def = function(
            vec![typed_param("c", "bool"), Param::new(ident("x"))],
            vec![Stmt::While {
                cond: var("c"),
                body: vec![assign("y", binary(BinaryOp::Add, var("x"), var("x")))],
                span: Span::default(),
            }],
        );
        let f = compile(&def).unwrap();
        let g = &f.graph;
        let node = loop_node(g);
        assert_eq!(g.node(node).inputs.len(), 2);
        assert_eq!(g.node(node).outputs.len(), 0);
        let body = g.node(node).blocks[0];
        // only the trip counter remains
        assert_eq!(g.block(body).inputs.len(), 1);
        // the body reads the enclosing x directly
        let x = g.block(g.root()).inputs[1];
        let add = g.block(body).nodes.iter().copied().find(|n| {
            matches!(g.node(*n).kind, NodeKind::Op(sym) if sym == ops::ADD)
        });
        assert_eq!(g.node(add.unwrap()).inputs[0], x);
    }

    #[test]
    fn for_range_binds_the_trip_counter() {
        // s = 0; for i in range(n): s = s + i; return s
        let def = function(
            vec![typed_param("n", "int")],
            vec![
                assign("s", int_lit(0)),
                Stmt::For {
                    targets: vec![var("i")],
                    iters: vec![Expr::Call {
                        callee: Box::new(var("range")),
                        args: vec![var("n")],
                        kwargs: vec![],
                        span: Span::default(),
                    }],
                    body: vec![assign("s", binary(BinaryOp::Add, var("s"), var("i")))],
                    span: Span::default(),
                },
                ret(vec![var("s")]),
            ],
        );
        let f = compile(&def).unwrap();
        let g = &f.graph;
        let node = loop_node(g);
        // the trip count comes straight from n
        assert_eq!(g.node(node).inputs[0], g.block(g.root()).inputs[0]);
        let body = g.node(node).blocks[0];
        let trip = g.block(body).inputs[0];
        assert_eq!(g.value(trip).name.as_deref(), Some("i"));
        assert_eq!(g.value_type(trip), &Type::Int);
    }

    #[test]
    fn tuple_iteration_unrolls() {
        // for t in (x, y): s = s + t
        let def = function(
            vec![
                typed_param("s", "int"),
                typed_param("x", "int"),
                typed_param("y", "int"),
            ],
            vec![
                Stmt::For {
                    targets: vec![var("t")],
                    iters: vec![Expr::TupleLit {
                        elems: vec![var("x"), var("y")],
                        span: Span::default(),
                    }],
                    body: vec![assign("s", binary(BinaryOp::Add, var("s"), var("t")))],
                    span: Span::default(),
                },
                ret(vec![var("s")]),
            ],
        );
        let f = compile(&def).unwrap();
        let g = &f.graph;
        let adds: Vec<_> = g
            .block(g.root())
            .nodes
            .iter()
            .filter(|n| matches!(g.node(**n).kind, NodeKind::Op(sym) if sym == ops::ADD))
            .collect();
        assert_eq!(adds.len(), 2);
        // the unrolled rebinding of s reaches the return
        assert_eq!(g.block(g.root()).outputs[0], g.node(*adds[1]).outputs[0]);
    }

    #[test]
    fn branches_join_with_a_unified_type() {
        // if c: x = 1 else: x = 2; return x
        let def = function(
            vec![typed_param("c", "bool")],
            vec![
                Stmt::If {
                    cond: var("c"),
                    then_body: vec![assign("x", int_lit(1))],
                    else_body: vec![assign("x", int_lit(2))],
                    span: Span::default(),
                },
                ret(vec![var("x")]),
            ],
        );
        let f = compile(&def).unwrap();
        let g = &f.graph;
        let node = *g
            .block(g.root())
            .nodes
            .iter()
            .find(|n| g.node(**n).kind == NodeKind::If)
            .unwrap();
        assert_eq!(g.node(node).outputs.len(), 1);
        assert_eq!(g.value_type(g.node(node).outputs[0]), &Type::Int);
        assert_eq!(g.block(g.root()).outputs[0], g.node(node).outputs[0]);
    }

    #[test]
    fn branch_type_mismatch_is_deferred_until_use() {
        let mismatch = Stmt::If {
            cond: var("c"),
            then_body: vec![assign("x", int_lit(1))],
            else_body: vec![assign(
                "x",
                Expr::FloatLit {
                    value: 2.0,
                    span: Span::default(),
                },
            )],
            span: Span::default(),
        };
        // never reading x afterwards compiles fine
        let unused = function(vec![typed_param("c", "bool")], vec![mismatch.clone()]);
        assert!(compile(&unused).is_ok());

        // reading x surfaces the deferred error
        let used = function(
            vec![typed_param("c", "bool")],
            vec![mismatch, ret(vec![var("x")])],
        );
        let err = compile(&used).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("true branch"), "{text}");
        assert!(text.contains("and was used here"), "{text}");
    }

    #[test]
    fn branch_mismatch_on_an_outer_variable_fails_immediately() {
        let def = function(
            vec![typed_param("c", "bool")],
            vec![
                assign("x", int_lit(0)),
                Stmt::If {
                    cond: var("c"),
                    then_body: vec![assign(
                        "x",
                        Expr::FloatLit {
                            value: 1.0,
                            span: Span::default(),
                        },
                    )],
                    else_body: vec![],
                    span: Span::default(),
                },
            ],
        );
        assert!(compile(&def).is_err());
    }

    #[test]
    fn is_none_check_on_optional_narrows_statically_when_known() {
        // x is statically never None, so the else branch is taken inline
        let def = function(
            vec![typed_param("x", "int")],
            vec![
                Stmt::If {
                    cond: binary(BinaryOp::Is, var("x"), Expr::NoneLit { span: Span::default() }),
                    then_body: vec![assign("y", int_lit(1))],
                    else_body: vec![assign("y", int_lit(2))],
                    span: Span::default(),
                },
                ret(vec![var("y")]),
            ],
        );
        let f = compile(&def).unwrap();
        // no If node was emitted
        assert!(
            f.graph
                .block(f.graph.root())
                .nodes
                .iter()
                .all(|n| f.graph.node(*n).kind != NodeKind::If)
        );
        let out = f.graph.block(f.graph.root()).outputs[0];
        assert_eq!(f.graph.as_constant(out), Some(&Constant::Int(2)));
    }

    #[test]
    fn starred_unpacking_packs_the_surplus() {
        // a, *b = t  where t is (int, int, int)
        let def = function(
            vec![Param::new(ident("t")).with_type(TypeExpr::Subscript {
                base: ident("Tuple"),
                args: vec![
                    TypeExpr::Named(ident("int")),
                    TypeExpr::Named(ident("int")),
                    TypeExpr::Named(ident("int")),
                ],
                span: Span::default(),
            })],
            vec![
                Stmt::Assign {
                    targets: vec![
                        var("a"),
                        Expr::Starred {
                            value: Box::new(var("b")),
                            span: Span::default(),
                        },
                    ],
                    value: var("t"),
                    span: Span::default(),
                },
                ret(vec![var("b")]),
            ],
        );
        let f = compile(&def).unwrap();
        assert_eq!(
            f.schema.returns,
            vec![Type::Tuple(vec![Type::Int, Type::Int])]
        );
    }

    #[test]
    fn unpack_count_mismatch_is_reported() {
        let def = function(
            vec![Param::new(ident("t")).with_type(TypeExpr::Subscript {
                base: ident("Tuple"),
                args: vec![TypeExpr::Named(ident("int")), TypeExpr::Named(ident("int"))],
                span: Span::default(),
            })],
            vec![Stmt::Assign {
                targets: vec![var("a"), var("b"), var("c")],
                value: var("t"),
                span: Span::default(),
            }],
        );
        let err = compile(&def).unwrap_err();
        assert!(
            err.to_string().contains("need 3 values to unpack but found only 2"),
            "{err}"
        );
    }

    #[test]
    fn augmented_assignment_desugars_for_primitives() {
        let def = function(
            vec![typed_param("x", "int")],
            vec![
                Stmt::AugAssign {
                    target: var("x"),
                    op: AugOp::Add,
                    value: int_lit(1),
                    span: Span::default(),
                },
                ret(vec![var("x")]),
            ],
        );
        let f = compile(&def).unwrap();
        let out = f.graph.block(f.graph.root()).outputs[0];
        let node = f.graph.value(out).node.unwrap();
        assert_eq!(f.graph.node(node).kind, NodeKind::Op(ops::ADD));
    }

    #[test]
    fn augmented_assignment_mutates_tensors_in_place() {
        let def = function(
            vec![Param::new(ident("x")), Param::new(ident("y"))],
            vec![
                Stmt::AugAssign {
                    target: var("x"),
                    op: AugOp::Add,
                    value: var("y"),
                    span: Span::default(),
                },
                ret(vec![var("x")]),
            ],
        );
        let f = compile(&def).unwrap();
        let out = f.graph.block(f.graph.root()).outputs[0];
        let node = f.graph.value(out).node.unwrap();
        assert_eq!(f.graph.node(node).kind, NodeKind::Op(ops::ADD_));
    }

    #[test]
    fn assert_lowers_to_a_conditional_raise() {
        let def = function(
            vec![typed_param("c", "bool")],
            vec![Stmt::Assert {
                cond: var("c"),
                message: None,
                span: Span::default(),
            }],
        );
        let f = compile(&def).unwrap();
        let g = &f.graph;
        let node = *g
            .block(g.root())
            .nodes
            .iter()
            .find(|n| g.node(**n).kind == NodeKind::If)
            .unwrap();
        let false_block = g.node(node).blocks[1];
        let raised = g.block(false_block).nodes.iter().any(|n| {
            matches!(g.node(*n).kind, NodeKind::Op(sym) if sym == ops::RAISE_EXCEPTION)
        });
        assert!(raised);
        // the raise produces no value, so nothing gets packed around it
        let packed = g
            .block(false_block)
            .nodes
            .iter()
            .any(|n| g.node(*n).kind == NodeKind::TupleConstruct);
        assert!(!packed);
    }

    #[test]
    fn return_must_be_last() {
        let def = function(
            vec![typed_param("x", "int")],
            vec![ret(vec![var("x")]), assign("y", int_lit(1))],
        );
        let err = compile(&def).unwrap_err();
        assert!(
            err.to_string().contains("only at the end of the function body"),
            "{err}"
        );
    }
}
