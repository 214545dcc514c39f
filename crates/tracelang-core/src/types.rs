//! The frontend type system.
//!
//! Types are structural and shape-erased: a tensor is a tensor, with no
//! size information at this level. The operations the rest of the frontend
//! relies on are:
//!
//! - [`Type::is_subtype_of`] — the compatibility check used for argument
//!   binding and variable reassignment
//! - [`unify`] — the join used to merge the two branches of a conditional
//! - [`match_type_variables`] / [`eval_type_variables`] — binding of schema
//!   type variables against actual argument types

use std::fmt;

use rustc_hash::FxHashMap;

/// A frontend type. `Var` only ever appears inside operator schemas.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// A tensor of unknown dtype and shape.
    Tensor,
    Int,
    Float,
    Bool,
    Str,
    /// The type of the `None` literal.
    None,
    /// Supertype of `Int` and `Float`, used by generic numeric schemas.
    Number,
    Device,
    Generator,
    Optional(Box<Type>),
    List(Box<Type>),
    Tuple(Vec<Type>),
    Future(Box<Type>),
    /// A schema type variable, bound during resolution.
    Var(String),
}

impl Type {
    /// Shorthand constructors for the composite forms.
    pub fn optional(elem: Type) -> Type {
        Type::Optional(Box::new(elem))
    }

    pub fn list(elem: Type) -> Type {
        Type::List(Box::new(elem))
    }

    pub fn future(elem: Type) -> Type {
        Type::Future(Box::new(elem))
    }

    pub fn var(name: impl Into<String>) -> Type {
        Type::Var(name.into())
    }

    /// If this is `Optional[T]`, the `T`; otherwise the type itself.
    pub fn unwrap_optional(&self) -> &Type {
        match self {
            Type::Optional(elem) => elem,
            other => other,
        }
    }

    /// Whether any type variable occurs in this type.
    pub fn has_type_variables(&self) -> bool {
        match self {
            Type::Var(_) => true,
            Type::Optional(t) | Type::List(t) | Type::Future(t) => t.has_type_variables(),
            Type::Tuple(elems) => elems.iter().any(Type::has_type_variables),
            _ => false,
        }
    }

    /// Structural subtyping.
    ///
    /// `Int` and `Float` are subtypes of `Number`; `T` and `None` are
    /// subtypes of `Optional[T]`; tuples are covariant element-wise; lists
    /// are invariant.
    pub fn is_subtype_of(&self, other: &Type) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (Type::Int | Type::Float, Type::Number) => true,
            (Type::None, Type::Optional(_)) => true,
            (Type::Optional(a), Type::Optional(b)) => a.is_subtype_of(b),
            (_, Type::Optional(elem)) => self.is_subtype_of(elem),
            (Type::Tuple(a), Type::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.is_subtype_of(y))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Tensor => write!(f, "Tensor"),
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::Bool => write!(f, "bool"),
            Type::Str => write!(f, "str"),
            Type::None => write!(f, "None"),
            Type::Number => write!(f, "Number"),
            Type::Device => write!(f, "Device"),
            Type::Generator => write!(f, "Generator"),
            Type::Optional(t) => write!(f, "Optional[{t}]"),
            Type::List(t) => write!(f, "List[{t}]"),
            Type::Tuple(elems) => {
                write!(f, "Tuple[")?;
                for (i, t) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, "]")
            }
            Type::Future(t) => write!(f, "Future[{t}]"),
            Type::Var(name) => write!(f, "{name}"),
        }
    }
}

/// Bindings of schema type variables to concrete types, built once per
/// call-site match attempt.
pub type TypeEnv = FxHashMap<String, Type>;

/// Attempt to merge the types a variable takes in two conditional branches.
///
/// Succeeds when one type is a subtype of the other (yielding the wider
/// type) or, for tuples of equal arity, element-wise. Returns `None` when
/// no merge exists; the caller decides whether that is a hard or deferred
/// error.
pub fn unify(a: &Type, b: &Type) -> Option<Type> {
    if a.is_subtype_of(b) {
        return Some(b.clone());
    }
    if b.is_subtype_of(a) {
        return Some(a.clone());
    }
    if let (Type::Tuple(xs), Type::Tuple(ys)) = (a, b)
        && xs.len() == ys.len()
    {
        let elems = xs
            .iter()
            .zip(ys)
            .map(|(x, y)| unify(x, y))
            .collect::<Option<Vec<_>>>()?;
        return Some(Type::Tuple(elems));
    }
    None
}

/// Match a schema's declared (possibly generic) type against an actual
/// type, recording type-variable bindings in `env`.
///
/// On success returns the resolved concrete formal type; on failure returns
/// a human-readable reason.
pub fn match_type_variables(formal: &Type, actual: &Type, env: &mut TypeEnv) -> Result<Type, String> {
    if !formal.has_type_variables() {
        return Ok(formal.clone());
    }
    match formal {
        Type::Var(name) => {
            if let Some(bound) = env.get(name) {
                // an earlier argument committed this variable; the subtype
                // check at the call site reports any disagreement
                Ok(bound.clone())
            } else {
                env.insert(name.clone(), actual.clone());
                Ok(actual.clone())
            }
        }
        Type::List(elem) => match actual {
            Type::List(actual_elem) => {
                let matched = match_type_variables(elem, actual_elem, env)?;
                Ok(Type::list(matched))
            }
            _ => Err(format!("cannot match a List to {actual}")),
        },
        Type::Optional(elem) => match actual {
            Type::Optional(actual_elem) => {
                let matched = match_type_variables(elem, actual_elem, env)?;
                Ok(Type::optional(matched))
            }
            // an Optional formal also accepts the bare element
            _ => {
                let matched = match_type_variables(elem, actual, env)?;
                Ok(Type::optional(matched))
            }
        },
        Type::Future(elem) => match actual {
            Type::Future(actual_elem) => {
                let matched = match_type_variables(elem, actual_elem, env)?;
                Ok(Type::future(matched))
            }
            _ => Err(format!("cannot match a Future to {actual}")),
        },
        Type::Tuple(elems) => match actual {
            Type::Tuple(actual_elems) if actual_elems.len() == elems.len() => {
                let matched = elems
                    .iter()
                    .zip(actual_elems)
                    .map(|(f, a)| match_type_variables(f, a, env))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Type::Tuple(matched))
            }
            _ => Err(format!("cannot match a Tuple to {actual}")),
        },
        _ => unreachable!("non-composite type reported type variables"),
    }
}

/// Substitute bound type variables in a schema return type.
///
/// Unbound variables are left in place; the resolver treats a return type
/// that still contains variables as a schema bug.
pub fn eval_type_variables(ty: &Type, env: &TypeEnv) -> Type {
    match ty {
        Type::Var(name) => env.get(name).cloned().unwrap_or_else(|| ty.clone()),
        Type::Optional(t) => Type::optional(eval_type_variables(t, env)),
        Type::List(t) => Type::list(eval_type_variables(t, env)),
        Type::Future(t) => Type::future(eval_type_variables(t, env)),
        Type::Tuple(elems) => {
            Type::Tuple(elems.iter().map(|t| eval_type_variables(t, env)).collect())
        }
        other => other.clone(),
    }
}
