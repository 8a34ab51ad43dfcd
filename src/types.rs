//! Structural type descriptors used for opt‑in annotation checks.
//!
//! Descriptors are never inferred; they only come from annotations on
//! parameters, return positions and annotated assignments.

use serde::Serialize;
use std::fmt;
use std::rc::Rc;

use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Type {
    Int,
    Str,
    Bool,
    List(Rc<Type>),
    Dict(Rc<Type>, Rc<Type>),
    Function(Vec<Rc<Type>>, Rc<Type>),
    None,
    Any,
}

impl Type {
    pub fn list(element: Type) -> Self {
        Type::List(Rc::new(element))
    }

    pub fn dict(key: Type, value: Type) -> Self {
        Type::Dict(Rc::new(key), Rc::new(value))
    }

    pub fn function(params: Vec<Type>, ret: Type) -> Self {
        Type::Function(params.into_iter().map(Rc::new).collect(), Rc::new(ret))
    }

    /// Maps a bare annotation name onto a descriptor. Anything outside the
    /// fixed vocabulary (`float`, class names, ...) is treated as `Any`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "int" => Type::Int,
            "str" => Type::Str,
            "bool" => Type::Bool,
            "None" => Type::None,
            "list" => Type::list(Type::Any),
            "dict" => Type::dict(Type::Any, Type::Any),
            _ => Type::Any,
        }
    }

    /// Structural compatibility. `Any` on either side matches.
    pub fn matches(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Any, _) | (_, Type::Any) => true,
            (Type::Int, Type::Int)
            | (Type::Str, Type::Str)
            | (Type::Bool, Type::Bool)
            | (Type::None, Type::None) => true,
            (Type::List(a), Type::List(b)) => a.matches(b),
            (Type::Dict(ka, va), Type::Dict(kb, vb)) => ka.matches(kb) && va.matches(vb),
            (Type::Function(pa, ra), Type::Function(pb, rb)) => {
                pa.len() == pb.len()
                    && pa.iter().zip(pb.iter()).all(|(a, b)| a.matches(b))
                    && ra.matches(rb)
            }
            _ => false,
        }
    }

    /// Opportunistic runtime check of a value against this descriptor.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Type::Any, _) => true,
            (Type::Int, Value::Number(n)) => n.fract() == 0.0,
            (Type::Str, Value::Text(_)) => true,
            (Type::Bool, Value::Bool(_)) => true,
            (Type::None, Value::None) => true,
            (Type::List(element), Value::List(items)) => {
                items.borrow().iter().all(|item| element.accepts(item))
            }
            (Type::Dict(key, val), Value::Dict(entries)) => entries
                .borrow()
                .iter()
                .all(|(k, v)| key_accepts(key, k) && val.accepts(v)),
            (Type::Function(params, _), Value::Function(function)) => {
                params.len() == function.arity()
            }
            (Type::Function(..), Value::Builtin(_) | Value::Method(_)) => true,
            _ => false,
        }
    }
}

/// Dict keys are stored as text; numeric keys keep their printed form.
fn key_accepts(key: &Type, stored: &str) -> bool {
    match key {
        Type::Any | Type::Str => true,
        Type::Int => stored.parse::<i64>().is_ok(),
        _ => false,
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Str => write!(f, "str"),
            Type::Bool => write!(f, "bool"),
            Type::None => write!(f, "None"),
            Type::Any => write!(f, "Any"),
            Type::List(element) => write!(f, "list[{}]", element),
            Type::Dict(key, value) => write!(f, "dict[{}, {}]", key, value),
            Type::Function(params, ret) => {
                write!(f, "(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ") -> {}", ret)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_matches_everything() {
        assert!(Type::Any.matches(&Type::Int));
        assert!(Type::list(Type::Str).matches(&Type::Any));
        assert!(Type::dict(Type::Str, Type::Any).matches(&Type::dict(Type::Str, Type::Int)));
    }

    #[test]
    fn structural_mismatch() {
        assert!(!Type::Int.matches(&Type::Str));
        assert!(!Type::list(Type::Int).matches(&Type::list(Type::Str)));
        assert!(!Type::function(vec![Type::Int], Type::Int)
            .matches(&Type::function(vec![Type::Int, Type::Int], Type::Int)));
    }

    #[test]
    fn accepts_checks_elements() {
        let ints = Value::list(vec![Value::Number(1.0), Value::Number(2.0)]);
        let mixed = Value::list(vec![Value::Number(1.0), Value::text("x")]);

        assert!(Type::list(Type::Int).accepts(&ints));
        assert!(!Type::list(Type::Int).accepts(&mixed));
        assert!(!Type::Int.accepts(&Value::Number(1.5)));
        assert!(Type::Int.accepts(&Value::Number(3.0)));
    }

    #[test]
    fn display_round_trips_vocabulary() {
        let ty = Type::dict(Type::Str, Type::list(Type::Int));
        assert_eq!(ty.to_string(), "dict[str, list[int]]");
        assert_eq!(
            Type::function(vec![Type::Int, Type::Str], Type::Bool).to_string(),
            "(int, str) -> bool"
        );
    }
}
