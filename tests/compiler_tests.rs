//! End-to-end compilation tests driving the public API: build a function
//! AST, compile it against the prelude registry, and inspect the emitted
//! graph.

use std::sync::Arc;

use tracelang::ast::{
    BinaryOp, Expr, FunctionDef, Ident, Kwarg, Param, Stmt, SubscriptEntry, TypeExpr,
};
use tracelang::core::op_sym::ops;
use tracelang::core::{OpSym, Span, Type};
use tracelang::ir::{Graph, NodeKind};
use tracelang::{CompiledFunction, EmptyResolver, FunctionResolver, OpRegistry, Resolver};

// ----------------------------------------------------------------------
// AST builders
// ----------------------------------------------------------------------

fn sp() -> Span {
    Span::default()
}

fn ident(name: &str) -> Ident {
    Ident::new(name, sp())
}

fn var(name: &str) -> Expr {
    Expr::Var(ident(name))
}

fn int_lit(value: i64) -> Expr {
    Expr::IntLit { value, span: sp() }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        span: sp(),
    }
}

fn call(callee: Expr, args: Vec<Expr>) -> Expr {
    Expr::Call {
        callee: Box::new(callee),
        args,
        kwargs: vec![],
        span: sp(),
    }
}

fn call_kw(callee: Expr, args: Vec<Expr>, kwargs: Vec<(&str, Expr)>) -> Expr {
    Expr::Call {
        callee: Box::new(callee),
        args,
        kwargs: kwargs
            .into_iter()
            .map(|(name, value)| Kwarg {
                name: ident(name),
                value,
            })
            .collect(),
        span: sp(),
    }
}

fn assign(name: &str, value: Expr) -> Stmt {
    Stmt::Assign {
        targets: vec![var(name)],
        value,
        span: sp(),
    }
}

fn ret(values: Vec<Expr>) -> Stmt {
    Stmt::Return { values, span: sp() }
}

fn int_param(name: &str) -> Param {
    Param::new(ident(name)).with_type(TypeExpr::Named(ident("int")))
}

fn func(params: Vec<Param>, body: Vec<Stmt>) -> FunctionDef {
    FunctionDef {
        name: ident("f"),
        params,
        return_ty: None,
        body,
        span: sp(),
    }
}

fn compile(def: &FunctionDef) -> Arc<CompiledFunction> {
    tracelang::compile_function(def, &OpRegistry::with_prelude(), &EmptyResolver)
        .unwrap_or_else(|e| panic!("{e}"))
}

fn compile_with(def: &FunctionDef, resolver: &dyn Resolver) -> Arc<CompiledFunction> {
    tracelang::compile_function(def, &OpRegistry::with_prelude(), resolver)
        .unwrap_or_else(|e| panic!("{e}"))
}

// ----------------------------------------------------------------------
// Graph inspection
// ----------------------------------------------------------------------

fn collect_kinds(g: &Graph, block: tracelang::ir::BlockId, out: &mut Vec<NodeKind>) {
    for node in &g.block(block).nodes {
        let node = g.node(*node);
        out.push(node.kind.clone());
        for sub in &node.blocks {
            collect_kinds(g, *sub, out);
        }
    }
}

fn all_kinds(g: &Graph) -> Vec<NodeKind> {
    let mut out = Vec::new();
    collect_kinds(g, g.root(), &mut out);
    out
}

fn count_op(g: &Graph, sym: OpSym) -> usize {
    all_kinds(g)
        .iter()
        .filter(|k| matches!(k, NodeKind::Op(s) if *s == sym))
        .count()
}

fn find_node(g: &Graph, kind: &NodeKind) -> Option<tracelang::ir::NodeId> {
    fn walk(
        g: &Graph,
        block: tracelang::ir::BlockId,
        kind: &NodeKind,
    ) -> Option<tracelang::ir::NodeId> {
        for node in &g.block(block).nodes {
            if &g.node(*node).kind == kind {
                return Some(*node);
            }
            for sub in &g.node(*node).blocks {
                if let Some(found) = walk(g, *sub, kind) {
                    return Some(found);
                }
            }
        }
        None
    }
    walk(g, g.root(), kind)
}

// ----------------------------------------------------------------------
// Loops
// ----------------------------------------------------------------------

#[test]
fn while_loop_carries_only_mutated_variables() {
    // i = 0
    // while i < n:
    //     i = i + 1
    // return i
    let def = func(
        vec![int_param("n")],
        vec![
            assign("i", int_lit(0)),
            Stmt::While {
                cond: binary(BinaryOp::Lt, var("i"), var("n")),
                body: vec![assign("i", binary(BinaryOp::Add, var("i"), int_lit(1)))],
                span: sp(),
            },
            ret(vec![var("i")]),
        ],
    );
    let f = compile(&def);
    let loop_id = find_node(&f.graph, &NodeKind::Loop).unwrap();
    let node = f.graph.node(loop_id);
    // max_trip_count, start condition, and the single carried variable `i`;
    // the read-only capture of `n` is pruned
    assert_eq!(node.inputs.len(), 3);
    assert_eq!(node.outputs.len(), 1);
    let body = node.blocks[0];
    // trip counter plus carried `i`
    assert_eq!(f.graph.block(body).inputs.len(), 2);
    assert_eq!(f.schema.returns, vec![Type::Int]);
}

#[test]
fn for_range_sums_with_the_trip_counter() {
    // s = 0
    // for i in range(n):
    //     s = s + i
    // return s
    let def = func(
        vec![int_param("n")],
        vec![
            assign("s", int_lit(0)),
            Stmt::For {
                targets: vec![var("i")],
                iters: vec![call(var("range"), vec![var("n")])],
                body: vec![assign("s", binary(BinaryOp::Add, var("s"), var("i")))],
                span: sp(),
            },
            ret(vec![var("s")]),
        ],
    );
    let f = compile(&def);
    let loop_id = find_node(&f.graph, &NodeKind::Loop).unwrap();
    let node = f.graph.node(loop_id);
    // `n` feeds the trip count input, not a carried variable
    assert_eq!(node.inputs[0], f.graph.block(f.graph.root()).inputs[0]);
    assert_eq!(f.schema.returns, vec![Type::Int]);
}

#[test]
fn for_over_a_tuple_literal_unrolls() {
    // for x in (1, 2):
    //     print(x)
    let def = func(
        vec![],
        vec![Stmt::For {
            targets: vec![var("x")],
            iters: vec![Expr::TupleLit {
                elems: vec![int_lit(1), int_lit(2)],
                span: sp(),
            }],
            body: vec![Stmt::ExprStmt {
                expr: call(var("print"), vec![var("x")]),
                span: sp(),
            }],
            span: sp(),
        }],
    );
    let f = compile(&def);
    assert!(find_node(&f.graph, &NodeKind::Loop).is_none());
    assert_eq!(count_op(&f.graph, ops::PRINT), 2);
}

// ----------------------------------------------------------------------
// Conditionals
// ----------------------------------------------------------------------

#[test]
fn branch_assignments_join_to_the_wider_type() {
    // if c: x = None
    // else: x = y        # y: Optional[int]
    // return x
    let def = func(
        vec![
            Param::new(ident("c")).with_type(TypeExpr::Named(ident("bool"))),
            Param::new(ident("y")).with_type(TypeExpr::Subscript {
                base: ident("Optional"),
                args: vec![TypeExpr::Named(ident("int"))],
                span: sp(),
            }),
        ],
        vec![
            Stmt::If {
                cond: var("c"),
                then_body: vec![assign("x", Expr::NoneLit { span: sp() })],
                else_body: vec![assign("x", var("y"))],
                span: sp(),
            },
            ret(vec![var("x")]),
        ],
    );
    let f = compile(&def);
    assert_eq!(f.schema.returns, vec![Type::optional(Type::Int)]);
}

#[test]
fn branch_type_mismatch_reports_where_the_variable_was_used() {
    let def = func(
        vec![Param::new(ident("c")).with_type(TypeExpr::Named(ident("bool")))],
        vec![
            Stmt::If {
                cond: var("c"),
                then_body: vec![assign("x", int_lit(1))],
                else_body: vec![assign(
                    "x",
                    Expr::FloatLit {
                        value: 1.0,
                        span: sp(),
                    },
                )],
                span: sp(),
            },
            ret(vec![var("x")]),
        ],
    );
    let err =
        tracelang::compile_function(&def, &OpRegistry::with_prelude(), &EmptyResolver).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("true branch"), "{msg}");
    assert!(msg.contains("and was used here"), "{msg}");
}

#[test]
fn statically_known_is_none_folds_the_conditional() {
    // x = None
    // if x is None: y = 1
    // else: y = 2
    // return y
    let def = func(
        vec![],
        vec![
            assign("x", Expr::NoneLit { span: sp() }),
            Stmt::If {
                cond: binary(BinaryOp::Is, var("x"), Expr::NoneLit { span: sp() }),
                then_body: vec![assign("y", int_lit(1))],
                else_body: vec![assign("y", int_lit(2))],
                span: sp(),
            },
            ret(vec![var("y")]),
        ],
    );
    let f = compile(&def);
    assert!(find_node(&f.graph, &NodeKind::If).is_none());
    let out = f.graph.block(f.graph.root()).outputs[0];
    assert_eq!(
        f.graph.as_constant(out),
        Some(&tracelang::core::Constant::Int(1))
    );
}

#[test]
fn dynamic_is_none_emits_an_identity_test() {
    let def = func(
        vec![Param::new(ident("x")).with_type(TypeExpr::Subscript {
            base: ident("Optional"),
            args: vec![TypeExpr::Named(ident("int"))],
            span: sp(),
        })],
        vec![
            Stmt::If {
                cond: binary(BinaryOp::Is, var("x"), Expr::NoneLit { span: sp() }),
                then_body: vec![assign("y", int_lit(0))],
                else_body: vec![assign("y", int_lit(1))],
                span: sp(),
            },
            ret(vec![var("y")]),
        ],
    );
    let f = compile(&def);
    assert!(find_node(&f.graph, &NodeKind::If).is_some());
    assert_eq!(count_op(&f.graph, ops::IS), 1);
}

#[test]
fn boolean_and_short_circuits_through_an_if() {
    let def = func(
        vec![
            Param::new(ident("a")).with_type(TypeExpr::Named(ident("bool"))),
            Param::new(ident("b")).with_type(TypeExpr::Named(ident("bool"))),
        ],
        vec![ret(vec![Expr::BoolOp {
            op: tracelang::ast::BoolOpKind::And,
            lhs: Box::new(var("a")),
            rhs: Box::new(var("b")),
            span: sp(),
        }])],
    );
    let f = compile(&def);
    let if_id = find_node(&f.graph, &NodeKind::If).unwrap();
    assert_eq!(f.graph.node(if_id).outputs.len(), 1);
    assert_eq!(f.schema.returns, vec![Type::Bool]);
}

// ----------------------------------------------------------------------
// Overload resolution
// ----------------------------------------------------------------------

#[test]
fn conversions_only_apply_on_the_second_pass() {
    // add(x, y, alpha=t): alpha wants a Number, t is a Tensor, so the
    // match succeeds only once tensor-to-number conversion is allowed
    let def = func(
        vec![
            Param::new(ident("x")),
            Param::new(ident("y")),
            Param::new(ident("t")),
        ],
        vec![ret(vec![call_kw(
            var("add"),
            vec![var("x"), var("y")],
            vec![("alpha", var("t"))],
        )])],
    );
    let f = compile(&def);
    assert_eq!(count_op(&f.graph, ops::TENSOR_TO_NUM), 1);
    assert_eq!(f.schema.returns, vec![Type::Tensor]);
}

#[test]
fn bare_integers_pack_into_a_trailing_size_list() {
    // zeros(2, 3)
    let def = func(
        vec![],
        vec![ret(vec![call(var("zeros"), vec![int_lit(2), int_lit(3)])])],
    );
    let f = compile(&def);
    let list = find_node(&f.graph, &NodeKind::ListConstruct).unwrap();
    assert_eq!(f.graph.node(list).inputs.len(), 2);
    assert_eq!(f.schema.returns, vec![Type::Tensor]);
}

#[test]
fn no_matching_overload_lists_every_failure() {
    // add(x) has too few arguments for every overload
    let def = func(
        vec![Param::new(ident("x"))],
        vec![ret(vec![call(var("add"), vec![var("x")])])],
    );
    let err =
        tracelang::compile_function(&def, &OpRegistry::with_prelude(), &EmptyResolver).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("arguments for call to add are not valid"), "{msg}");
    assert!(msg.contains("for operator"), "{msg}");
}

// ----------------------------------------------------------------------
// Assignment forms
// ----------------------------------------------------------------------

#[test]
fn starred_target_packs_the_surplus() {
    // a, *b = t          # t: Tuple[int, int, int]
    // return b
    let def = func(
        vec![Param::new(ident("t")).with_type(TypeExpr::Subscript {
            base: ident("Tuple"),
            args: vec![
                TypeExpr::Named(ident("int")),
                TypeExpr::Named(ident("int")),
                TypeExpr::Named(ident("int")),
            ],
            span: sp(),
        })],
        vec![
            Stmt::Assign {
                targets: vec![Expr::TupleLit {
                    elems: vec![
                        var("a"),
                        Expr::Starred {
                            value: Box::new(var("b")),
                            span: sp(),
                        },
                    ],
                    span: sp(),
                }],
                value: var("t"),
                span: sp(),
            },
            ret(vec![var("b")]),
        ],
    );
    let f = compile(&def);
    assert_eq!(f.schema.returns, vec![Type::Tuple(vec![Type::Int, Type::Int])]);
}

#[test]
fn tensor_element_subscript_combines_select_and_slice() {
    // return x[0, 1:3]
    let def = func(
        vec![Param::new(ident("x"))],
        vec![ret(vec![Expr::Subscript {
            value: Box::new(var("x")),
            indices: vec![
                SubscriptEntry::Index(int_lit(0)),
                SubscriptEntry::Slice {
                    start: Some(int_lit(1)),
                    end: Some(int_lit(3)),
                    span: sp(),
                },
            ],
            span: sp(),
        }])],
    );
    let f = compile(&def);
    assert_eq!(count_op(&f.graph, ops::SELECT), 1);
    assert_eq!(count_op(&f.graph, ops::SLICE), 1);
    assert_eq!(f.schema.returns, vec![Type::Tensor]);
}

// ----------------------------------------------------------------------
// Functions calling functions
// ----------------------------------------------------------------------

#[test]
fn script_calls_inline_and_fill_defaults() {
    // def g(a: int, b: int = 2): return a + b
    // def f(): return g(1)
    let g_def = FunctionDef {
        name: ident("g"),
        params: vec![
            int_param("a"),
            int_param("b").with_default(int_lit(2)),
        ],
        return_ty: None,
        body: vec![ret(vec![binary(BinaryOp::Add, var("a"), var("b"))])],
        span: sp(),
    };
    let g = compile(&g_def);
    assert_eq!(g.schema.arguments[1].default, Some(tracelang::core::Constant::Int(2)));

    let mut resolver = FunctionResolver::new();
    resolver.insert(g);

    let def = func(vec![], vec![ret(vec![call(var("g"), vec![int_lit(1)])])]);
    let f = compile_with(&def, &resolver);
    // inlined: the callee's add lands in the caller's graph
    assert_eq!(count_op(&f.graph, ops::ADD), 1);
    assert_eq!(f.schema.returns, vec![Type::Int]);
}

#[test]
fn fork_wraps_the_callee_result_in_a_future() {
    // def g(y): return y
    // def f(x): return fork(g, x)
    let g_def = FunctionDef {
        name: ident("g"),
        params: vec![Param::new(ident("y"))],
        return_ty: None,
        body: vec![ret(vec![var("y")])],
        span: sp(),
    };
    let mut resolver = FunctionResolver::new();
    resolver.insert(compile(&g_def));

    let def = func(
        vec![Param::new(ident("x"))],
        vec![ret(vec![call(var("fork"), vec![var("g"), var("x")])])],
    );
    let f = compile_with(&def, &resolver);
    let fork = find_node(&f.graph, &NodeKind::Fork).unwrap();
    assert!(f.graph.node(fork).subgraph.is_some());
    assert_eq!(f.schema.returns, vec![Type::future(Type::Tensor)]);
}

// ----------------------------------------------------------------------
// Returns
// ----------------------------------------------------------------------

#[test]
fn function_without_a_return_has_no_outputs() {
    let def = func(
        vec![Param::new(ident("x"))],
        vec![Stmt::ExprStmt {
            expr: call(var("print"), vec![var("x")]),
            span: sp(),
        }],
    );
    let f = compile(&def);
    assert_eq!(f.num_outputs(), 0);
    assert!(f.graph.block(f.graph.root()).outputs.is_empty());
}

#[test]
fn return_annotation_mismatch_is_reported() {
    let def = FunctionDef {
        name: ident("f"),
        params: vec![],
        return_ty: Some(TypeExpr::Named(ident("int"))),
        body: vec![ret(vec![Expr::FloatLit {
            value: 1.0,
            span: sp(),
        }])],
        span: sp(),
    };
    let err =
        tracelang::compile_function(&def, &OpRegistry::with_prelude(), &EmptyResolver).unwrap_err();
    assert!(
        err.to_string().contains("annotated as having type int"),
        "{err}"
    );
}

// ----------------------------------------------------------------------
// Printer
// ----------------------------------------------------------------------

#[test]
fn graphs_print_with_nested_blocks() {
    let def = func(
        vec![int_param("n")],
        vec![
            assign("i", int_lit(0)),
            Stmt::While {
                cond: binary(BinaryOp::Lt, var("i"), var("n")),
                body: vec![assign("i", binary(BinaryOp::Add, var("i"), int_lit(1)))],
                span: sp(),
            },
            ret(vec![var("i")]),
        ],
    );
    let f = compile(&def);
    let text = f.graph.to_string();
    assert!(text.starts_with("graph(%n : int):"), "{text}");
    assert!(text.contains("loop("), "{text}");
    assert!(text.contains("block("), "{text}");
}
