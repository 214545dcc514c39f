//! Resolution of source-level type annotations to frontend types.

use tracelang_ast::{Expr, Ident, SubscriptEntry, TypeExpr};
use tracelang_core::{CompileError, CompileResult, Type};

fn base_type(name: &str) -> Option<Type> {
    match name {
        "Tensor" => Some(Type::Tensor),
        "int" => Some(Type::Int),
        "float" => Some(Type::Float),
        "bool" => Some(Type::Bool),
        "str" => Some(Type::Str),
        "None" => Some(Type::None),
        "Number" => Some(Type::Number),
        "Device" => Some(Type::Device),
        "Generator" => Some(Type::Generator),
        _ => None,
    }
}

/// `BroadcastingListN[T]` annotations: a list of fixed length `N` that also
/// accepts a bare scalar, broadcast `N` times.
fn broadcasting_list_len(name: &str) -> Option<usize> {
    let rest = name.strip_prefix("BroadcastingList")?;
    rest.parse().ok()
}

/// Resolve an annotation in argument position, where `BroadcastingListN` is
/// allowed. Returns the type and the fixed list length, if any.
pub fn parse_arg_type(expr: &TypeExpr) -> CompileResult<(Type, Option<usize>)> {
    if let TypeExpr::Subscript { base, args, span } = expr
        && let Some(n) = broadcasting_list_len(&base.name)
    {
        if args.len() != 1 {
            return Err(CompileError::invalid_syntax(
                format!("{} expects exactly one element type", base.name),
                *span,
            ));
        }
        let elem = parse_type(&args[0])?;
        if !matches!(elem, Type::Int | Type::Float) {
            return Err(CompileError::invalid_syntax(
                "broadcastable lists only support int and float element types".to_string(),
                *span,
            ));
        }
        return Ok((Type::list(elem), Some(n)));
    }
    Ok((parse_type(expr)?, None))
}

/// Resolve an annotation anywhere else; `BroadcastingListN` is rejected.
pub fn parse_type(expr: &TypeExpr) -> CompileResult<Type> {
    match expr {
        TypeExpr::Named(ident) => base_type(&ident.name).ok_or_else(|| {
            CompileError::invalid_syntax(
                format!("unknown type name {}", ident.name),
                ident.span,
            )
        }),
        TypeExpr::Subscript { base, args, span } => {
            if broadcasting_list_len(&base.name).is_some() {
                return Err(CompileError::invalid_syntax(
                    "broadcastable lists can only appear as argument types".to_string(),
                    *span,
                ));
            }
            let one_arg = || -> CompileResult<Type> {
                if args.len() != 1 {
                    return Err(CompileError::invalid_syntax(
                        format!("{} expects exactly one element type", base.name),
                        *span,
                    ));
                }
                parse_type(&args[0])
            };
            match base.name.as_str() {
                "List" => Ok(Type::list(one_arg()?)),
                "Optional" => Ok(Type::optional(one_arg()?)),
                "Future" => Ok(Type::future(one_arg()?)),
                "Tuple" => {
                    let elems = args.iter().map(parse_type).collect::<CompileResult<_>>()?;
                    Ok(Type::Tuple(elems))
                }
                other => Err(CompileError::invalid_syntax(
                    format!("unknown type constructor {other}"),
                    *span,
                )),
            }
        }
    }
}

/// Reinterpret an expression as a type annotation, for `annotate(T, e)` and
/// `isinstance(e, T)` where the type arrives through the expression
/// grammar.
pub fn expr_to_type_expr(expr: &Expr) -> CompileResult<TypeExpr> {
    match expr {
        Expr::Var(ident) => Ok(TypeExpr::Named(ident.clone())),
        Expr::NoneLit { span } => Ok(TypeExpr::Named(Ident::new("None", *span))),
        Expr::Subscript {
            value,
            indices,
            span,
        } => {
            let base = match value.as_ref() {
                Expr::Var(ident) => ident.clone(),
                other => {
                    return Err(CompileError::invalid_syntax(
                        "type must be a type identifier".to_string(),
                        other.span(),
                    ));
                }
            };
            let args = indices
                .iter()
                .map(|entry| match entry {
                    SubscriptEntry::Index(e) => expr_to_type_expr(e),
                    SubscriptEntry::Slice { span, .. } => Err(CompileError::invalid_syntax(
                        "unexpected slice in type expression".to_string(),
                        *span,
                    )),
                })
                .collect::<CompileResult<_>>()?;
            Ok(TypeExpr::Subscript { base, args, span: *span })
        }
        other => Err(CompileError::invalid_syntax(
            "type must be a type identifier".to_string(),
            other.span(),
        )),
    }
}

/// The bare head name of a type expression, used by `isinstance` where
/// `list` and `tuple` are accepted without element types.
pub fn base_type_name(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Var(ident) => Some(&ident.name),
        Expr::NoneLit { .. } => Some("None"),
        _ => None,
    }
}
