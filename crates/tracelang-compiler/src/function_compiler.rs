//! Driving a single function definition through graph emission.
//!
//! [`compile_function`] extracts the schema from the signature (evaluating
//! default expressions by compiling a synthesized helper function), binds
//! the formal parameters as graph inputs, emits the body and registers the
//! return value. The entry point is re-entrant: default evaluation and
//! script-function inlining both recurse through it.

use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use tracelang_ast::{FunctionDef, Stmt};
use tracelang_core::op_sym::ops;
use tracelang_core::{
    Argument, CompileError, CompileResult, Constant, FunctionSchema, OpSym, Span, Type,
};
use tracelang_ir::{BlockId, Graph, NodeKind, ValueId};
use tracelang_registry::{CompiledFunction, OpRegistry};

use crate::binding::{Binding, Callable, NoneStatus};
use crate::conversion::try_convert_to_type;
use crate::resolver::Resolver;
use crate::scope::ScopeChain;
use crate::type_resolver::{parse_arg_type, parse_type};

pub(crate) struct FunctionCompiler<'a> {
    pub(crate) graph: Graph,
    pub(crate) scopes: ScopeChain,
    pub(crate) registry: &'a OpRegistry,
    pub(crate) resolver: &'a dyn Resolver,
    /// Insertion point for emitted nodes.
    pub(crate) block: BlockId,
    int_constants: FxHashMap<i64, ValueId>,
    fp_constants: FxHashMap<OrderedFloat<f64>, ValueId>,
}

/// Compile one function definition into a graph.
pub fn compile_function(
    def: &FunctionDef,
    registry: &OpRegistry,
    resolver: &dyn Resolver,
) -> CompileResult<Arc<CompiledFunction>> {
    let defaults = evaluate_defaults(def, registry, resolver)?;

    let mut c = FunctionCompiler::new(registry, resolver);
    let root = c.graph.root();

    let mut arguments = Vec::with_capacity(def.params.len());
    for (param, default) in def.params.iter().zip(defaults) {
        let (ty, n) = match &param.ty {
            Some(ann) => parse_arg_type(ann)?,
            None => (Type::Tensor, None),
        };
        let input = c.graph.add_input(root, ty.clone());
        c.scopes
            .set_binding(&mut c.graph, &param.name.name, Binding::value(input), param.name.span)?;
        let mut arg = Argument::new(param.name.name.clone(), ty);
        if let Some(n) = n {
            arg = arg.with_len(n);
        }
        if let Some(default) = default {
            arg = arg.with_default(default);
        }
        arguments.push(arg);
    }

    let declared = def.return_ty.as_ref().map(parse_type).transpose()?;

    let (body, trailing_return) = split_trailing_return(&def.body);
    c.emit_statements(body)?;
    match trailing_return {
        Some(Stmt::Return { values, span }) => c.emit_return(values, declared.as_ref(), *span)?,
        Some(_) => unreachable!("split_trailing_return only yields return statements"),
        None => {
            // an untyped function without a return statement produces no
            // outputs; an annotated one must return
            if let Some(decl) = &declared
                && *decl != Type::None
            {
                return Err(CompileError::type_mismatch(
                    format!(
                        "function was annotated to return a value of type {decl} but does not \
                         end in a return statement"
                    ),
                    def.span,
                ));
            }
        }
    }

    let returns = c
        .graph
        .block(root)
        .outputs
        .iter()
        .map(|v| c.graph.value_type(*v).clone())
        .collect();
    let schema = FunctionSchema::new(def.name.name.clone(), arguments, returns);
    Ok(Arc::new(CompiledFunction {
        name: def.name.name.clone(),
        graph: c.graph,
        schema,
    }))
}

/// Peel a trailing `return` off a statement list. Any other `return` is
/// rejected later by `emit_statements`.
fn split_trailing_return(body: &[Stmt]) -> (&[Stmt], Option<&Stmt>) {
    match body.split_last() {
        Some((last @ Stmt::Return { .. }, rest)) => (rest, Some(last)),
        _ => (body, None),
    }
}

/// Evaluate the default expressions of a signature by compiling a
/// synthesized zero-parameter function returning all of them, then reading
/// the constants back out of its graph.
fn evaluate_defaults(
    def: &FunctionDef,
    registry: &OpRegistry,
    resolver: &dyn Resolver,
) -> CompileResult<Vec<Option<Constant>>> {
    let with_default: Vec<usize> = def
        .params
        .iter()
        .enumerate()
        .filter_map(|(i, p)| p.default.is_some().then_some(i))
        .collect();
    if with_default.is_empty() {
        return Ok(vec![None; def.params.len()]);
    }

    let values: Vec<_> = with_default
        .iter()
        .filter_map(|&i| def.params[i].default.clone())
        .collect();
    let helper = FunctionDef {
        name: tracelang_ast::Ident::new("defaults", def.span),
        params: Vec::new(),
        return_ty: None,
        body: vec![Stmt::Return {
            values,
            span: def.span,
        }],
        span: def.span,
    };
    let compiled = compile_function(&helper, registry, resolver)?;

    let g = &compiled.graph;
    let root = g.block(g.root());
    let result = root.outputs[0];
    let flattened: Vec<ValueId> = if with_default.len() == 1 {
        vec![result]
    } else {
        let node = g.value(result).node.ok_or_else(|| {
            CompileError::internal("default tuple has no defining node".to_string())
        })?;
        g.node(node).inputs.clone()
    };

    let mut defaults = vec![None; def.params.len()];
    for (&param_idx, value) in with_default.iter().zip(&flattened) {
        let span = def.params[param_idx]
            .default
            .as_ref()
            .map_or(def.span, |e| e.span());
        defaults[param_idx] = Some(constant_from_value(g, *value, span)?);
    }
    Ok(defaults)
}

fn constant_from_value(g: &Graph, value: ValueId, span: Span) -> CompileResult<Constant> {
    if let Some(c) = g.as_constant(value) {
        return Ok(c.clone());
    }
    // a list of constant ints folds to a single list constant
    if let Some(node) = g.value(value).node
        && g.node(node).kind == NodeKind::ListConstruct
    {
        let ints = g
            .node(node)
            .inputs
            .iter()
            .map(|v| match g.as_constant(*v) {
                Some(Constant::Int(i)) => Some(*i),
                _ => None,
            })
            .collect::<Option<Vec<i64>>>();
        if let Some(ints) = ints {
            return Ok(Constant::IntList(ints));
        }
    }
    Err(CompileError::invalid_syntax(
        "default argument expressions must be constants".to_string(),
        span,
    ))
}

impl<'a> FunctionCompiler<'a> {
    fn new(registry: &'a OpRegistry, resolver: &'a dyn Resolver) -> FunctionCompiler<'a> {
        let graph = Graph::new();
        let root = graph.root();
        FunctionCompiler {
            graph,
            scopes: ScopeChain::new(root),
            registry,
            resolver,
            block: root,
            int_constants: FxHashMap::default(),
            fp_constants: FxHashMap::default(),
        }
    }

    fn emit_return(
        &mut self,
        values: &[tracelang_ast::Expr],
        declared: Option<&Type>,
        span: Span,
    ) -> CompileResult<()> {
        let result = match values {
            [] => self.materialize_constant(Constant::None, span),
            [single] => self.emit_expr(single, declared)?,
            many => {
                let elems = many
                    .iter()
                    .map(|e| self.emit_expr(e, None))
                    .collect::<CompileResult<Vec<_>>>()?;
                let types = elems
                    .iter()
                    .map(|v| self.graph.value_type(*v).clone())
                    .collect();
                let node = self
                    .graph
                    .create_node(NodeKind::TupleConstruct, elems, span);
                let out = self.graph.add_node_output(node, Type::Tuple(types));
                self.graph.append_node(self.block, node);
                out
            }
        };
        let result_ty = match declared {
            Some(ty) => ty.clone(),
            None => self.graph.value_type(result).clone(),
        };
        let result = try_convert_to_type(&mut self.graph, self.block, span, &result_ty, result, true);
        let actual = self.graph.value_type(result).clone();
        if !actual.is_subtype_of(&result_ty) {
            return Err(CompileError::type_mismatch(
                format!(
                    "return value was annotated as having type {result_ty} but is actually of \
                     type {actual}"
                ),
                span,
            ));
        }
        let root = self.graph.root();
        self.graph.register_output(root, result);
        Ok(())
    }

    /// Resolve a name: lexical scope first, then the compiler globals, the
    /// operator registry, and finally the external resolver. A deferred
    /// branch-unification error surfaces here, on first use.
    pub(crate) fn get_binding(&mut self, name: &str, span: Span) -> CompileResult<Binding> {
        if let Some(binding) = self.scopes.capture_or_find(&mut self.graph, name) {
            return Ok(binding);
        }
        if let Some(binding) = global_binding(name) {
            return Ok(binding);
        }
        let sym = OpSym::from_name(name);
        if self.registry.contains(sym) {
            return Ok(Binding::Callable(Callable::Op(sym)));
        }
        if let Some(binding) = self.resolver.resolve(name, span) {
            return Ok(binding);
        }
        if let Some(message) = self.scopes.find_type_error(name) {
            return Err(CompileError::type_mismatch(
                format!("{message} and was used here"),
                span,
            ));
        }
        Err(CompileError::UndefinedValue {
            name: name.to_string(),
            span,
        })
    }

    /// Insert a constant, deduplicating ints and floats per graph. The
    /// cached constants are hoisted to the front of the root block so every
    /// nested block can reach them.
    pub(crate) fn materialize_constant(&mut self, value: Constant, span: Span) -> ValueId {
        match value {
            Constant::Int(i) => {
                if let Some(&cached) = self.int_constants.get(&i) {
                    return cached;
                }
                let v = self.prepend_constant(Constant::Int(i), span);
                self.int_constants.insert(i, v);
                v
            }
            Constant::Float(f) => {
                let key = OrderedFloat(f);
                if let Some(&cached) = self.fp_constants.get(&key) {
                    return cached;
                }
                let v = self.prepend_constant(Constant::Float(f), span);
                self.fp_constants.insert(key, v);
                v
            }
            other => self.graph.insert_constant(self.block, other, span),
        }
    }

    fn prepend_constant(&mut self, value: Constant, span: Span) -> ValueId {
        let ty = value.ty();
        let node = self.graph.create_node(NodeKind::Constant, Vec::new(), span);
        self.graph.node_mut(node).constant = Some(value);
        let out = self.graph.add_node_output(node, ty);
        let root = self.graph.root();
        self.graph.prepend_node(root, node);
        out
    }

    pub(crate) fn none_status(&self, value: ValueId) -> NoneStatus {
        match self.graph.value_type(value) {
            Type::None => NoneStatus::Always,
            Type::Optional(_) => NoneStatus::Maybe,
            _ => NoneStatus::Never,
        }
    }
}

/// Names the compiler itself defines, consulted after lexical scope and
/// before the operator registry, so script variables can shadow them.
fn global_binding(name: &str) -> Option<Binding> {
    let callable = match name {
        "print" => Callable::Print,
        "getattr" => Callable::GetAttr,
        "isinstance" => Callable::IsInstance,
        "annotate" => Callable::Annotate,
        "fork" => Callable::Fork,
        "int" => Callable::Cast {
            ty: Type::Int,
            sym: ops::CAST_INT,
        },
        "float" => Callable::Cast {
            ty: Type::Float,
            sym: ops::CAST_FLOAT,
        },
        "bool" => Callable::Cast {
            ty: Type::Bool,
            sym: ops::CAST_BOOL,
        },
        "_to_tensor" => Callable::Cast {
            ty: Type::Tensor,
            sym: ops::NUM_TO_TENSOR,
        },
        _ => return None,
    };
    Some(Binding::Callable(callable))
}
