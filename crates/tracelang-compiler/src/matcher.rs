//! Schema resolution: binding call-site arguments to operator overloads.
//!
//! Resolution runs in two passes over every candidate for a symbol, both
//! its registered operator overloads and its builtin-library functions.
//! The first pass disallows lossy conversions; only if no candidate
//! matches does the second pass retry with tensor-to-number and
//! string-to-device conversions enabled. Failure messages from the final
//! pass are aggregated into one diagnostic.

use tracelang_core::{
    Argument, CompileError, CompileResult, Constant, FunctionSchema, OpSym, Span, Type, TypeEnv,
    eval_type_variables, match_type_variables,
};
use tracelang_ir::{BlockId, Graph, NodeKind, ValueId};
use tracelang_registry::{CompiledFunction, OpRegistry};

use crate::conversion::{convertible_to_list, try_convert_to_type};

/// A call-site argument: positional when `name` is `None`, keyword
/// otherwise.
#[derive(Debug, Clone)]
pub struct NamedArg {
    pub name: Option<String>,
    pub value: ValueId,
    pub span: Span,
}

impl NamedArg {
    pub fn positional(value: ValueId, span: Span) -> NamedArg {
        NamedArg {
            name: None,
            value,
            span,
        }
    }

    pub fn keyword(name: impl Into<String>, value: ValueId, span: Span) -> NamedArg {
        NamedArg {
            name: Some(name.into()),
            value,
            span,
        }
    }
}

#[derive(Debug)]
pub struct MatchedSchema {
    pub inputs: Vec<ValueId>,
    pub return_types: Vec<Type>,
}

fn is_scalar_used_as_list(value_ty: &Type, arg: &Argument) -> bool {
    if arg.n.is_none() || !matches!(value_ty, Type::Int | Type::Float) {
        return false;
    }
    matches!(&arg.ty, Type::List(elem) if **elem == *value_ty)
}

/// Bind one argument, applying scalar broadcast, type-variable matching and
/// implicit conversions. On failure a reason is appended to `failures`.
fn try_match_argument(
    arg: &Argument,
    g: &mut Graph,
    block: BlockId,
    value: ValueId,
    span: Span,
    failures: &mut String,
    allow_conversions: bool,
    type_env: &mut TypeEnv,
) -> Option<ValueId> {
    let mut value = value;

    // fixed-size list arguments accept a bare scalar, repeated to length
    if is_scalar_used_as_list(&g.value_type(value).clone(), arg) {
        let n = arg.n.unwrap_or(1);
        let elem_ty = g.value_type(value).clone();
        let node = g.create_node(NodeKind::ListConstruct, vec![value; n], span);
        value = g.add_node_output(node, Type::list(elem_ty));
        g.append_node(block, node);
    }

    let value_ty = g.value_type(value).clone();
    let concrete = match match_type_variables(&arg.ty, &value_ty, type_env) {
        Ok(ty) => ty,
        Err(msg) => {
            failures.push_str(&format!(
                "could not match type {value_ty} to {} in argument '{}': {msg}\n",
                arg.ty, arg.name
            ));
            return None;
        }
    };

    value = try_convert_to_type(g, block, span, &concrete, value, allow_conversions);

    let final_ty = g.value_type(value).clone();
    if !final_ty.is_subtype_of(&concrete) {
        failures.push_str(&format!(
            "expected a value of type {concrete} for argument '{}' but found {final_ty}\n",
            arg.name
        ));
        return None;
    }
    Some(value)
}

/// Pack trailing positional arguments into one list value for an unsized
/// list formal, so `zeros(2, 3)` works against `zeros(List[int] size)`.
fn try_create_list(
    elem_ty: &Type,
    g: &mut Graph,
    block: BlockId,
    varargs: &[NamedArg],
    span: Span,
    failures: &mut String,
    allow_conversions: bool,
    type_env: &mut TypeEnv,
) -> Option<ValueId> {
    let elem_arg = Argument::new("<varargs>", elem_ty.clone());
    let mut items = Vec::with_capacity(varargs.len());
    for arg in varargs {
        let item = try_match_argument(
            &elem_arg,
            g,
            block,
            arg.value,
            arg.span,
            failures,
            allow_conversions,
            type_env,
        )?;
        items.push(item);
    }
    let node = g.create_node(NodeKind::ListConstruct, items, span);
    let out = g.add_node_output(node, Type::list(elem_ty.clone()));
    g.append_node(block, node);
    Some(out)
}

/// Try to bind `args`/`kwargs` (plus an optional method receiver) against
/// one schema. Returns the finished input list and resolved return types,
/// or appends why the schema did not fit to `failures`.
pub fn try_match_schema(
    schema: &FunctionSchema,
    g: &mut Graph,
    block: BlockId,
    span: Span,
    self_arg: Option<&NamedArg>,
    args: &[NamedArg],
    kwargs: &[NamedArg],
    failures: &mut String,
    allow_conversions: bool,
) -> Option<MatchedSchema> {
    let header = format!("\nfor operator {schema}:\n");
    let mut local_failures = String::new();

    let mut type_env = TypeEnv::default();
    let mut inputs = Vec::with_capacity(schema.arguments.len());
    let mut used_kwarg = vec![false; kwargs.len()];
    let mut self_arg = self_arg;
    let mut used_args = 0usize;

    let fail = |failures: &mut String, local: String| {
        failures.push_str(&header);
        failures.push_str(&local);
    };

    for (schema_i, arg) in schema.arguments.iter().enumerate() {
        let bound: (ValueId, Span);
        if arg.name == "self"
            && let Some(s) = self_arg.take()
        {
            bound = (s.value, s.span);
        } else if !arg.kwarg_only && used_args < args.len() {
            // an unsized list formal in final positional position absorbs
            // the remaining positional arguments
            let is_packing_slot = matches!(&arg.ty, Type::List(_))
                && arg.n.is_none()
                && (schema_i + 1 == schema.arguments.len()
                    || schema.arguments[schema_i + 1].kwarg_only);
            if is_packing_slot {
                let actual_ty = g.value_type(args[used_args].value).clone();
                let already_list = matches!(actual_ty, Type::List(_))
                    || convertible_to_list(&actual_ty, arg.ty.unwrap_optional());
                if !already_list {
                    let Type::List(elem) = arg.ty.unwrap_optional().clone() else {
                        unreachable!("packing slot is always a list");
                    };
                    match try_create_list(
                        &elem,
                        g,
                        block,
                        &args[used_args..],
                        span,
                        &mut local_failures,
                        allow_conversions,
                        &mut type_env,
                    ) {
                        Some(list) => {
                            used_args = args.len();
                            inputs.push(list);
                            continue;
                        }
                        None => {
                            fail(failures, local_failures);
                            return None;
                        }
                    }
                }
            }
            bound = (args[used_args].value, args[used_args].span);
            used_args += 1;
        } else if let Some(idx) = kwargs
            .iter()
            .position(|k| k.name.as_deref() == Some(arg.name.as_str()))
        {
            if used_kwarg[idx] {
                fail(
                    failures,
                    format!("argument {} specified twice in call\n", arg.name),
                );
                return None;
            }
            used_kwarg[idx] = true;
            bound = (kwargs[idx].value, kwargs[idx].span);
        } else if let Some(default) = &arg.default {
            let v = insert_default(g, block, default, span);
            bound = (v, span);
        } else {
            fail(failures, format!("argument {} not provided\n", arg.name));
            return None;
        }

        match try_match_argument(
            arg,
            g,
            block,
            bound.0,
            bound.1,
            &mut local_failures,
            allow_conversions,
            &mut type_env,
        ) {
            Some(v) => inputs.push(v),
            None => {
                fail(failures, local_failures);
                return None;
            }
        }
    }

    // a receiver that bound to no formal is a failed match
    if self_arg.is_some() {
        fail(
            failures,
            "provided self argument not used in schema\n".to_string(),
        );
        return None;
    }

    if schema.is_vararg {
        while used_args < args.len() {
            inputs.push(args[used_args].value);
            used_args += 1;
        }
    }

    if used_args < args.len() {
        let max_positional = schema.arguments.iter().filter(|a| !a.kwarg_only).count();
        fail(
            failures,
            format!(
                "expected at most {max_positional} arguments but found {} positional arguments\n",
                args.len()
            ),
        );
        return None;
    }

    for (i, kwarg) in kwargs.iter().enumerate() {
        if used_kwarg[i] {
            continue;
        }
        let name = kwarg.name.as_deref().unwrap_or("<positional>");
        if schema.argument(name).is_none() {
            fail(failures, format!("keyword argument {name} unknown\n"));
        } else {
            fail(failures, format!("keyword argument {name} specified twice\n"));
        }
        return None;
    }

    let return_types = schema
        .returns
        .iter()
        .map(|t| eval_type_variables(t, &type_env))
        .collect();
    Some(MatchedSchema {
        inputs,
        return_types,
    })
}

fn insert_default(g: &mut Graph, block: BlockId, default: &Constant, span: Span) -> ValueId {
    g.insert_constant(block, default.clone(), span)
}

/// One value out of a node's outputs: the single output as-is, several
/// packed into a tuple, and none at all (a call made purely for its
/// effect, like `raise_exception`) produces no value.
pub fn pack_outputs(
    g: &mut Graph,
    block: BlockId,
    outputs: &[ValueId],
    span: Span,
) -> Option<ValueId> {
    match outputs {
        [] => None,
        [single] => Some(*single),
        _ => {
            let types = outputs.iter().map(|v| g.value_type(*v).clone()).collect();
            let node = g.create_node(NodeKind::TupleConstruct, outputs.to_vec(), span);
            let out = g.add_node_output(node, Type::Tuple(types));
            g.append_node(block, node);
            Some(out)
        }
    }
}

fn prefix_lines(text: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_line_start = true;
    for c in text.chars() {
        if at_line_start && c != '\n' {
            out.push_str(prefix);
        }
        out.push(c);
        at_line_start = c == '\n';
    }
    out
}

/// Resolve and emit a builtin call.
///
/// Each pass spans the symbol's registered operator overloads and its
/// builtin-library functions, in registration order: first without
/// conversions, then with conversions enabled. A matched operator becomes
/// an op node; a matched library function is inlined at the call site.
/// Returns `Ok(None)` when the matched call produces no value.
#[allow(clippy::too_many_arguments)]
pub fn emit_builtin_call(
    g: &mut Graph,
    block: BlockId,
    registry: &OpRegistry,
    sym: OpSym,
    span: Span,
    self_arg: Option<&NamedArg>,
    args: &[NamedArg],
    kwargs: &[NamedArg],
) -> CompileResult<Option<ValueId>> {
    let variants = registry.lookup(sym);
    let functions = registry.library_functions(sym);

    let mut failures = String::new();
    for allow_conversions in [false, true] {
        failures.clear();
        for schema in variants {
            if let Some(matched) = try_match_schema(
                schema,
                g,
                block,
                span,
                self_arg,
                args,
                kwargs,
                &mut failures,
                allow_conversions,
            ) {
                let node = g.create_node(NodeKind::Op(sym), matched.inputs, span);
                let outputs: Vec<ValueId> = matched
                    .return_types
                    .into_iter()
                    .map(|t| g.add_node_output(node, t))
                    .collect();
                g.append_node(block, node);
                return Ok(pack_outputs(g, block, &outputs, span));
            }
        }
        for function in functions {
            if let Some(matched) = try_match_schema(
                &function.schema,
                g,
                block,
                span,
                self_arg,
                args,
                kwargs,
                &mut failures,
                allow_conversions,
            ) {
                let outputs = g.inline_graph(block, &function.graph, &matched.inputs, span)?;
                return Ok(pack_outputs(g, block, &outputs, span));
            }
        }
    }

    let name = registry
        .name_of(sym)
        .map(str::to_string)
        .unwrap_or_else(|| sym.to_string());
    if variants.is_empty() && functions.is_empty() {
        return Err(CompileError::UnknownBuiltinOp { name, span });
    }
    Err(CompileError::NoMatchingSchemas {
        name,
        failures: prefix_lines(&failures, "  "),
        span,
    })
}

/// Call a compiled script function: bind the arguments against its schema
/// and inline its graph at the call site.
pub fn call_function(
    g: &mut Graph,
    block: BlockId,
    function: &CompiledFunction,
    span: Span,
    args: &[NamedArg],
    kwargs: &[NamedArg],
) -> CompileResult<Option<ValueId>> {
    let mut failures = String::new();
    for allow_conversions in [false, true] {
        failures.clear();
        if let Some(matched) = try_match_schema(
            &function.schema,
            g,
            block,
            span,
            None,
            args,
            kwargs,
            &mut failures,
            allow_conversions,
        ) {
            let outputs = g.inline_graph(block, &function.graph, &matched.inputs, span)?;
            return Ok(pack_outputs(g, block, &outputs, span));
        }
    }
    Err(CompileError::NoMatchingSchemas {
        name: function.name.clone(),
        failures: prefix_lines(&failures, "  "),
        span,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracelang_core::op_sym::ops;

    fn graph_with_tensors(n: usize) -> (Graph, Vec<ValueId>) {
        let mut g = Graph::new();
        let root = g.root();
        let vs = (0..n).map(|_| g.add_input(root, Type::Tensor)).collect();
        (g, vs)
    }

    #[test]
    fn first_pass_prefers_exact_overloads() {
        let registry = OpRegistry::with_prelude();
        let mut g = Graph::new();
        let root = g.root();
        let a = g.add_input(root, Type::Int);
        let b = g.add_input(root, Type::Int);
        let args = [
            NamedArg::positional(a, Span::default()),
            NamedArg::positional(b, Span::default()),
        ];
        let out = emit_builtin_call(
            &mut g, root, &registry, ops::ADD, Span::default(), None, &args, &[],
        )
        .unwrap()
        .unwrap();
        // int+int binds the int overload, not tensor+tensor via conversion
        assert_eq!(g.value_type(out), &Type::Int);
    }

    #[test]
    fn defaults_fill_missing_arguments() {
        let registry = OpRegistry::with_prelude();
        let (mut g, vs) = graph_with_tensors(2);
        let root = g.root();
        let args = [
            NamedArg::positional(vs[0], Span::default()),
            NamedArg::positional(vs[1], Span::default()),
        ];
        let out = emit_builtin_call(
            &mut g, root, &registry, ops::ADD, Span::default(), None, &args, &[],
        )
        .unwrap()
        .unwrap();
        let node = g.value(out).node.unwrap();
        // self, other, alpha
        assert_eq!(g.node(node).inputs.len(), 3);
        let alpha = g.node(node).inputs[2];
        assert_eq!(g.as_constant(alpha), Some(&Constant::Int(1)));
    }

    #[test]
    fn trailing_list_packs_varargs() {
        let registry = OpRegistry::with_prelude();
        let mut g = Graph::new();
        let root = g.root();
        let a = g.add_input(root, Type::Int);
        let b = g.add_input(root, Type::Int);
        let args = [
            NamedArg::positional(a, Span::default()),
            NamedArg::positional(b, Span::default()),
        ];
        let sym = tracelang_core::OpSym::from_name("zeros");
        let out = emit_builtin_call(
            &mut g, root, &registry, sym, Span::default(), None, &args, &[],
        )
        .unwrap()
        .unwrap();
        assert_eq!(g.value_type(out), &Type::Tensor);
        let zeros = g.value(out).node.unwrap();
        let size = g.node(zeros).inputs[0];
        assert_eq!(g.value_type(size), &Type::list(Type::Int));
    }

    #[test]
    fn unknown_kwarg_is_reported() {
        let registry = OpRegistry::with_prelude();
        let (mut g, vs) = graph_with_tensors(2);
        let root = g.root();
        let args = [NamedArg::positional(vs[0], Span::default())];
        let kwargs = [NamedArg::keyword("gamma", vs[1], Span::default())];
        let err = emit_builtin_call(
            &mut g, root, &registry, ops::ADD, Span::default(), None, &args, &kwargs,
        )
        .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("keyword argument gamma unknown"), "{text}");
    }

    #[test]
    fn no_variants_is_unknown_builtin() {
        let registry = OpRegistry::new();
        let (mut g, vs) = graph_with_tensors(1);
        let root = g.root();
        let args = [NamedArg::positional(vs[0], Span::default())];
        let err = emit_builtin_call(
            &mut g, root, &registry, ops::NEG, Span::default(), None, &args, &[],
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::UnknownBuiltinOp { .. }));
    }

    #[test]
    fn library_functions_join_the_candidate_set() {
        use std::sync::Arc;
        let mut registry = OpRegistry::new();
        registry.register(
            "halve",
            FunctionSchema::new(
                "halve",
                vec![Argument::new("self", Type::Tensor)],
                vec![Type::Tensor],
            ),
        );
        let mut body = Graph::new();
        let body_root = body.root();
        let n = body.add_input(body_root, Type::Int);
        body.register_output(body_root, n);
        registry.register_function(Arc::new(CompiledFunction {
            name: "halve".to_string(),
            graph: body,
            schema: FunctionSchema::new(
                "halve",
                vec![Argument::new("n", Type::Int)],
                vec![Type::Int],
            ),
        }));

        let mut g = Graph::new();
        let root = g.root();
        let a = g.add_input(root, Type::Int);
        let sym = tracelang_core::OpSym::from_name("halve");
        let args = [NamedArg::positional(a, Span::default())];
        let out = emit_builtin_call(
            &mut g, root, &registry, sym, Span::default(), None, &args, &[],
        )
        .unwrap()
        .unwrap();
        // the int argument skips the tensor overload and binds the library
        // function, which is inlined rather than emitted as an op node
        assert_eq!(out, a);

        // a mismatch reports both candidate signatures
        let s = g.add_input(root, Type::Str);
        let args = [NamedArg::positional(s, Span::default())];
        let err = emit_builtin_call(
            &mut g, root, &registry, sym, Span::default(), None, &args, &[],
        )
        .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("halve(Tensor self)"), "{text}");
        assert!(text.contains("halve(int n)"), "{text}");
    }

    #[test]
    fn scalar_broadcasts_to_fixed_size_list() {
        let mut registry = OpRegistry::new();
        registry.register(
            "expand2",
            FunctionSchema::new(
                "expand2",
                vec![
                    Argument::new("self", Type::Tensor),
                    Argument::new("size", Type::list(Type::Int)).with_len(2),
                ],
                vec![Type::Tensor],
            ),
        );
        let mut g = Graph::new();
        let root = g.root();
        let t = g.add_input(root, Type::Tensor);
        let n = g.add_input(root, Type::Int);
        let args = [
            NamedArg::positional(t, Span::default()),
            NamedArg::positional(n, Span::default()),
        ];
        let sym = tracelang_core::OpSym::from_name("expand2");
        let out = emit_builtin_call(
            &mut g, root, &registry, sym, Span::default(), None, &args, &[],
        )
        .unwrap()
        .unwrap();
        let node = g.value(out).node.unwrap();
        let size = g.node(node).inputs[1];
        let list_node = g.value(size).node.unwrap();
        assert_eq!(g.node(list_node).kind, NodeKind::ListConstruct);
        assert_eq!(g.node(list_node).inputs, vec![n, n]);
    }
}
