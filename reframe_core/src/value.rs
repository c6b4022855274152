//! Runtime values.
//!
//! Values are immutable once built. Aggregates (`Tuple`, `Dict`) and
//! callables are shared through `Arc`, so cloning a value is cheap and a
//! clone taken at one point in time can never observe later rebinding of
//! the slot it came from.

use crate::function::{FunctionObject, NativeFunction};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// Value
// =============================================================================

/// A runtime value.
#[derive(Clone, Default)]
pub enum Value {
    /// The `None` singleton.
    #[default]
    None,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// Immutable string.
    Str(Arc<str>),
    /// Immutable tuple. Also the representation of a collected `*args`.
    Tuple(Arc<[Value]>),
    /// String-keyed mapping in insertion order. Also the representation
    /// of a collected `**kwargs`.
    Dict(Arc<[(Arc<str>, Value)]>),
    /// Interpreted function.
    Function(Arc<FunctionObject>),
    /// Host-provided builtin.
    Native(Arc<NativeFunction>),
}

impl Value {
    /// Create an integer value.
    #[inline]
    pub const fn int(i: i64) -> Self {
        Value::Int(i)
    }

    /// Create a string value.
    #[inline]
    pub fn str(s: impl Into<Arc<str>>) -> Self {
        Value::Str(s.into())
    }

    /// Create a tuple from any sequence of values.
    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Tuple(items.into_iter().collect())
    }

    /// Create a dict from `(key, value)` pairs, keeping insertion order.
    ///
    /// A repeated key keeps its first position and takes the last value.
    pub fn dict<K: Into<Arc<str>>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        let mut entries: Vec<(Arc<str>, Value)> = Vec::new();
        for (key, value) in pairs {
            let key = key.into();
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => entries.push((key, value)),
            }
        }
        Value::Dict(entries.into())
    }

    /// Wrap a function object.
    #[inline]
    pub fn function(func: FunctionObject) -> Self {
        Value::Function(Arc::new(func))
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    #[inline]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    #[inline]
    pub fn as_dict(&self) -> Option<&[(Arc<str>, Value)]> {
        match self {
            Value::Dict(entries) => Some(entries),
            _ => None,
        }
    }

    #[inline]
    pub fn as_function(&self) -> Option<&Arc<FunctionObject>> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Look up a key in a dict value.
    pub fn dict_get(&self, key: &str) -> Option<&Value> {
        self.as_dict()?
            .iter()
            .find(|(k, _)| k.as_ref() == key)
            .map(|(_, v)| v)
    }

    /// Truthiness, following the usual dynamic-language rules.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(entries) => !entries.is_empty(),
            Value::Function(_) | Value::Native(_) => true,
        }
    }

    /// Name of the value's type, as reported in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Function(_) => "function",
            Value::Native(_) => "builtin_function_or_method",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| {
                        b.iter().any(|(k2, v2)| k == k2 && v == v2)
                    })
            }
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

// =============================================================================
// Formatting
// =============================================================================

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "'{}'", s),
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::Dict(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "'{}': {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Function(func) => write!(f, "<function {}>", func.qualname),
            Value::Native(native) => write!(f, "<built-in function {}>", native.name()),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dict_keeps_first_position_last_value() {
        let d = Value::dict([("a", Value::int(1)), ("b", Value::int(2)), ("a", Value::int(3))]);
        let entries = d.as_dict().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0.as_ref(), "a");
        assert_eq!(entries[0].1, Value::int(3));
        assert_eq!(d.dict_get("b"), Some(&Value::int(2)));
    }

    #[test]
    fn test_dict_equality_ignores_order() {
        let a = Value::dict([("x", Value::int(1)), ("y", Value::int(2))]);
        let b = Value::dict([("y", Value::int(2)), ("x", Value::int(1))]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_numeric_cross_equality() {
        assert_eq!(Value::int(2), Value::Float(2.0));
        assert_ne!(Value::int(2), Value::str("2"));
    }

    #[test]
    fn test_display_matches_repr_conventions() {
        assert_eq!(Value::tuple([Value::int(1)]).to_string(), "(1,)");
        assert_eq!(
            Value::tuple([Value::int(1), Value::str("a")]).to_string(),
            "(1, 'a')"
        );
        assert_eq!(Value::dict([("d", Value::int(4))]).to_string(), "{'d': 4}");
        assert_eq!(Value::Bool(true).to_string(), "True");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::int(0).is_truthy());
        assert!(Value::tuple([Value::None]).is_truthy());
        assert!(!Value::tuple([]).is_truthy());
    }
}
