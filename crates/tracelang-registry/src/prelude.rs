//! The builtin operator set installed by [`OpRegistry::with_prelude`].
//!
//! Overload order matters: tensor overloads come first so tensor code
//! resolves without conversions, with primitive overloads behind them.

use tracelang_core::{Argument, Constant, FunctionSchema, Type};

use crate::registry::OpRegistry;

fn tensor(name: &str) -> Argument {
    Argument::new(name, Type::Tensor)
}

fn int(name: &str) -> Argument {
    Argument::new(name, Type::Int)
}

fn float(name: &str) -> Argument {
    Argument::new(name, Type::Float)
}

fn binary(registry: &mut OpRegistry, name: &str, args: Vec<Argument>, ret: Type) {
    let schema = FunctionSchema::new(name, args, vec![ret]);
    registry.register(name, schema);
}

/// Arithmetic ops with tensor, int and float overloads.
fn arith(registry: &mut OpRegistry, name: &str, with_alpha: bool) {
    let mut tensor_args = vec![tensor("self"), tensor("other")];
    if with_alpha {
        tensor_args.push(Argument::new("alpha", Type::Number).with_default(Constant::Int(1)));
    }
    binary(registry, name, tensor_args, Type::Tensor);
    binary(registry, name, vec![int("a"), int("b")], Type::Int);
    binary(registry, name, vec![float("a"), float("b")], Type::Float);
}

fn comparison(registry: &mut OpRegistry, name: &str) {
    binary(registry, name, vec![tensor("self"), tensor("other")], Type::Tensor);
    binary(registry, name, vec![int("a"), int("b")], Type::Bool);
    binary(registry, name, vec![float("a"), float("b")], Type::Bool);
}

pub fn install(registry: &mut OpRegistry) {
    arith(registry, "add", true);
    arith(registry, "sub", true);
    arith(registry, "mul", false);
    arith(registry, "remainder", false);
    arith(registry, "pow", false);
    binary(registry, "div", vec![tensor("self"), tensor("other")], Type::Tensor);
    binary(registry, "div", vec![float("a"), float("b")], Type::Float);
    binary(registry, "div", vec![int("a"), int("b")], Type::Float);
    binary(registry, "floordiv", vec![tensor("self"), tensor("other")], Type::Tensor);
    binary(registry, "floordiv", vec![int("a"), int("b")], Type::Int);
    binary(registry, "matmul", vec![tensor("self"), tensor("other")], Type::Tensor);

    registry.register(
        "neg",
        FunctionSchema::new("neg", vec![tensor("self")], vec![Type::Tensor]),
    );
    registry.register(
        "neg",
        FunctionSchema::new("neg", vec![int("a")], vec![Type::Int]),
    );
    registry.register(
        "neg",
        FunctionSchema::new("neg", vec![float("a")], vec![Type::Float]),
    );

    for name in ["eq", "ne", "lt", "gt", "le", "ge"] {
        comparison(registry, name);
    }
    binary(
        registry,
        "eq",
        vec![Argument::new("a", Type::Str), Argument::new("b", Type::Str)],
        Type::Bool,
    );
    binary(
        registry,
        "ne",
        vec![Argument::new("a", Type::Str), Argument::new("b", Type::Str)],
        Type::Bool,
    );

    registry.register(
        "logical_not",
        FunctionSchema::new("logical_not", vec![Argument::new("a", Type::Bool)], vec![Type::Bool]),
    );
    registry.register(
        "logical_not",
        FunctionSchema::new("logical_not", vec![tensor("self")], vec![Type::Tensor]),
    );

    // identity tests that survive static narrowing; generic over both sides
    for name in ["is_", "is_not"] {
        registry.register(
            name,
            FunctionSchema::new(
                name,
                vec![
                    Argument::new("a", Type::var("t")),
                    Argument::new("b", Type::var("s")),
                ],
                vec![Type::Bool],
            ),
        );
    }

    // indexing family
    registry.register(
        "select",
        FunctionSchema::new(
            "select",
            vec![tensor("self"), int("dim"), int("index")],
            vec![Type::Tensor],
        ),
    );
    registry.register(
        "slice",
        FunctionSchema::new(
            "slice",
            vec![
                tensor("self"),
                int("dim").with_default(Constant::Int(0)),
                int("start").with_default(Constant::Int(0)),
                int("end").with_default(Constant::Int(i64::MAX)),
                int("step").with_default(Constant::Int(1)),
            ],
            vec![Type::Tensor],
        ),
    );
    registry.register(
        "select",
        FunctionSchema::new(
            "select",
            vec![
                Argument::new("list", Type::list(Type::var("t"))),
                int("idx"),
            ],
            vec![Type::var("t")],
        ),
    );
    registry.register(
        "slice",
        FunctionSchema::new(
            "slice",
            vec![
                Argument::new("list", Type::list(Type::var("t"))),
                int("start").with_default(Constant::Int(0)),
                int("end").with_default(Constant::Int(i64::MAX)),
                int("step").with_default(Constant::Int(1)),
            ],
            vec![Type::list(Type::var("t"))],
        ),
    );
    registry.register(
        "set_item",
        FunctionSchema::new(
            "set_item",
            vec![
                Argument::new("list", Type::list(Type::var("t"))),
                int("idx"),
                Argument::new("el", Type::var("t")),
            ],
            vec![Type::list(Type::var("t"))],
        ),
    );
    registry.register(
        "index",
        FunctionSchema::new(
            "index",
            vec![
                tensor("self"),
                Argument::new("indices", Type::list(Type::Tensor)),
            ],
            vec![Type::Tensor],
        ),
    );
    registry.register(
        "index_put_",
        FunctionSchema::new(
            "index_put_",
            vec![
                tensor("self"),
                Argument::new("indices", Type::list(Type::Tensor)),
                tensor("value"),
            ],
            vec![Type::Tensor],
        ),
    );
    registry.register(
        "copy_",
        FunctionSchema::new("copy_", vec![tensor("self"), tensor("src")], vec![Type::Tensor]),
    );

    // in-place arithmetic used by augmented assignment on tensors
    for name in ["add_", "sub_"] {
        registry.register(
            name,
            FunctionSchema::new(
                name,
                vec![
                    tensor("self"),
                    tensor("other"),
                    Argument::new("alpha", Type::Number).with_default(Constant::Int(1)),
                ],
                vec![Type::Tensor],
            ),
        );
    }
    for name in ["mul_", "div_"] {
        registry.register(
            name,
            FunctionSchema::new(name, vec![tensor("self"), tensor("other")], vec![Type::Tensor]),
        );
    }

    // numeric casts backing the int()/float()/bool() callables
    for (name, ret) in [("cast_int", Type::Int), ("cast_float", Type::Float)] {
        registry.register(
            name,
            FunctionSchema::new(name, vec![int("a")], vec![ret.clone()]),
        );
        registry.register(
            name,
            FunctionSchema::new(name, vec![float("a")], vec![ret.clone()]),
        );
        registry.register(
            name,
            FunctionSchema::new(name, vec![tensor("a")], vec![ret]),
        );
    }
    for args in [vec![Argument::new("a", Type::Bool)], vec![int("a")], vec![tensor("a")]] {
        registry.register("cast_bool", FunctionSchema::new("cast_bool", args, vec![Type::Bool]));
    }
    registry.register(
        "num_to_tensor",
        FunctionSchema::new(
            "num_to_tensor",
            vec![Argument::new("a", Type::Number)],
            vec![Type::Tensor],
        ),
    );

    // factories
    for name in ["zeros", "ones"] {
        registry.register(
            name,
            FunctionSchema::new(
                name,
                vec![Argument::new("size", Type::list(Type::Int))],
                vec![Type::Tensor],
            ),
        );
    }
    registry.register(
        "size",
        FunctionSchema::new("size", vec![tensor("self"), int("dim")], vec![Type::Int]),
    );

    registry.register(
        "device",
        FunctionSchema::new("device", vec![Argument::new("s", Type::Str)], vec![Type::Device]),
    );
    registry.register(
        "raise_exception",
        FunctionSchema::new(
            "raise_exception",
            vec![Argument::new("msg", Type::Str)],
            vec![],
        ),
    );
}
