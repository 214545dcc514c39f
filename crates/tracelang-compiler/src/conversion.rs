//! Implicit conversions applied while binding arguments to schemas.
//!
//! Two tiers exist. Structural conversions (tuple to list, tuple to tuple,
//! `None` to optional sentinels) always apply. Lossy conversions (tensor to
//! number, string to device) apply only on the second resolution pass, when
//! `allow_conversions` is set.

use tracelang_core::{Constant, OpSym, Span, Type, op_sym::ops};
use tracelang_ir::{BlockId, Graph, NodeKind, ValueId};

/// Whether a value of `ty` can become the list type `list_ty`: either it
/// already is one, or it is a tuple whose elements all fit the element
/// type.
pub fn convertible_to_list(ty: &Type, list_ty: &Type) -> bool {
    let Type::List(elem) = list_ty else {
        return false;
    };
    if ty.is_subtype_of(list_ty) {
        return true;
    }
    if let Type::Tuple(elems) = ty {
        return elems.iter().all(|t| t.is_subtype_of(elem));
    }
    false
}

/// The elements of a tuple-typed value. When the value comes straight from
/// a tuple construction the construction's inputs are reused; otherwise a
/// `TupleUnpack` node is emitted.
pub fn tuple_elements(g: &mut Graph, block: BlockId, v: ValueId, span: Span) -> Vec<ValueId> {
    if let Some(node) = g.value(v).node
        && g.node(node).kind == NodeKind::TupleConstruct
    {
        return g.node(node).inputs.clone();
    }
    let elem_types = match g.value_type(v).clone() {
        Type::Tuple(elems) => elems,
        _ => return vec![v],
    };
    let unpack = g.create_node(NodeKind::TupleUnpack, vec![v], span);
    let outputs = elem_types
        .into_iter()
        .map(|t| g.add_node_output(unpack, t))
        .collect();
    g.append_node(block, unpack);
    outputs
}

fn emit_list(g: &mut Graph, block: BlockId, elem: Type, items: Vec<ValueId>, span: Span) -> ValueId {
    let node = g.create_node(NodeKind::ListConstruct, items, span);
    let out = g.add_node_output(node, Type::list(elem));
    g.append_node(block, node);
    out
}

fn emit_tuple(g: &mut Graph, block: BlockId, items: Vec<ValueId>, span: Span) -> ValueId {
    let types = items.iter().map(|v| g.value_type(*v).clone()).collect();
    let node = g.create_node(NodeKind::TupleConstruct, items, span);
    let out = g.add_node_output(node, Type::Tuple(types));
    g.append_node(block, node);
    out
}

fn emit_op(
    g: &mut Graph,
    block: BlockId,
    sym: OpSym,
    inputs: Vec<ValueId>,
    out_ty: Type,
    span: Span,
) -> ValueId {
    let node = g.create_node(NodeKind::Op(sym), inputs, span);
    let out = g.add_node_output(node, out_ty);
    g.append_node(block, node);
    out
}

/// Rewrite `value` toward `concrete`, leaving it untouched when no
/// conversion applies; the caller re-checks subtyping and reports the
/// failure itself.
pub fn try_convert_to_type(
    g: &mut Graph,
    block: BlockId,
    span: Span,
    concrete: &Type,
    mut value: ValueId,
    allow_conversions: bool,
) -> ValueId {
    let value_ty = g.value_type(value).clone();

    if let Type::Tuple(value_elems) = &value_ty {
        let target = concrete.unwrap_optional();
        if convertible_to_list(&value_ty, target) {
            let Type::List(elem) = target.clone() else {
                unreachable!("convertible_to_list only accepts list targets");
            };
            let unpacked = tuple_elements(g, block, value, span);
            value = emit_list(g, block, *elem, unpacked, span);
        } else if let Type::Tuple(concrete_elems) = concrete
            && !value_ty.is_subtype_of(concrete)
            && concrete_elems.len() == value_elems.len()
        {
            let unpacked = tuple_elements(g, block, value, span);
            let converted = unpacked
                .into_iter()
                .zip(concrete_elems)
                .map(|(v, t)| try_convert_to_type(g, block, span, t, v, allow_conversions))
                .collect();
            value = emit_tuple(g, block, converted, span);
        }
    }

    let value_ty = g.value_type(value).clone();
    if value_ty == Type::None && *concrete != Type::None {
        match concrete {
            Type::Generator => {
                value = typed_none(g, block, Type::Generator, span);
            }
            // None passed to Optional[Tensor] becomes the undefined tensor
            Type::Optional(elem) if **elem == Type::Tensor => {
                value = typed_none(g, block, Type::Tensor, span);
            }
            Type::Optional(_) => {
                value = typed_none(g, block, concrete.clone(), span);
            }
            _ => {}
        }
    }

    if allow_conversions {
        let value_ty = g.value_type(value).clone();
        if concrete.is_subtype_of(&Type::Number) && value_ty == Type::Tensor {
            value = emit_op(
                g,
                block,
                ops::TENSOR_TO_NUM,
                vec![value],
                concrete.clone(),
                span,
            );
        } else if value_ty == Type::Str && Type::Device.is_subtype_of(concrete) {
            value = emit_op(g, block, ops::DEVICE, vec![value], Type::Device, span);
        }
    }

    value
}

/// A `None` constant reinterpreted as a sentinel of another type.
fn typed_none(g: &mut Graph, block: BlockId, ty: Type, span: Span) -> ValueId {
    let v = g.insert_constant(block, Constant::None, span);
    g.set_value_type(v, ty);
    v
}
