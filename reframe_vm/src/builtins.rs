//! Builtin function registry.
//!
//! Builtins are native functions. They run without a frame and are
//! therefore never seen by the frame-evaluation hook.

use reframe_core::{NativeError, NativeFunction, Value};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Registry of builtin functions and values.
#[derive(Debug, Default)]
pub struct BuiltinRegistry {
    /// Name to value mappings.
    entries: FxHashMap<Arc<str>, Value>,
}

impl BuiltinRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }

    /// Create registry with the standard builtins.
    pub fn with_standard_builtins() -> Self {
        let mut registry = Self::new();

        registry.register("None", Value::None);
        registry.register("True", Value::Bool(true));
        registry.register("False", Value::Bool(false));

        registry.register_native(NativeFunction::new("len", builtin_len));
        registry.register_native(NativeFunction::new("sum", builtin_sum));
        registry.register_native(NativeFunction::new("tuple", builtin_tuple));

        registry
    }

    /// Register a builtin name.
    #[inline]
    pub fn register(&mut self, name: impl Into<Arc<str>>, value: Value) {
        self.entries.insert(name.into(), value);
    }

    /// Register a native function under its own name.
    pub fn register_native(&mut self, native: NativeFunction) {
        let name: Arc<str> = native.name().into();
        self.entries.insert(name, Value::Native(Arc::new(native)));
    }

    /// Get a builtin by name.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Standard Builtins
// =============================================================================

fn no_keywords(name: &str, kwargs: &[(Arc<str>, Value)]) -> Result<(), NativeError> {
    match kwargs.first() {
        Some((kw, _)) => Err(NativeError(format!(
            "{}() got an unexpected keyword argument '{}'",
            name, kw
        ))),
        None => Ok(()),
    }
}

fn single_arg<'a>(name: &str, args: &'a [Value]) -> Result<&'a Value, NativeError> {
    match args {
        [arg] => Ok(arg),
        _ => Err(NativeError(format!(
            "{}() takes exactly one argument ({} given)",
            name,
            args.len()
        ))),
    }
}

fn builtin_len(args: &[Value], kwargs: &[(Arc<str>, Value)]) -> Result<Value, NativeError> {
    no_keywords("len", kwargs)?;
    let len = match single_arg("len", args)? {
        Value::Str(s) => s.chars().count(),
        Value::Tuple(items) => items.len(),
        Value::Dict(entries) => entries.len(),
        other => {
            return Err(NativeError(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )))
        }
    };
    Ok(Value::int(len as i64))
}

fn builtin_sum(args: &[Value], kwargs: &[(Arc<str>, Value)]) -> Result<Value, NativeError> {
    no_keywords("sum", kwargs)?;
    let arg = single_arg("sum", args)?;
    let items = arg.as_tuple().ok_or_else(|| {
        NativeError(format!("'{}' object is not iterable", arg.type_name()))
    })?;

    let mut total = 0i64;
    let mut float_total: Option<f64> = None;
    for item in items {
        match (item, float_total.as_mut()) {
            (Value::Int(i), None) => total = total.wrapping_add(*i),
            (Value::Int(i), Some(f)) => *f += *i as f64,
            (Value::Float(x), None) => float_total = Some(total as f64 + x),
            (Value::Float(x), Some(f)) => *f += x,
            (other, _) => {
                return Err(NativeError(format!(
                    "unsupported operand type(s) for +: 'int' and '{}'",
                    other.type_name()
                )))
            }
        }
    }
    Ok(float_total.map_or(Value::int(total), Value::Float))
}

fn builtin_tuple(args: &[Value], kwargs: &[(Arc<str>, Value)]) -> Result<Value, NativeError> {
    no_keywords("tuple", kwargs)?;
    match args {
        [] => Ok(Value::tuple([])),
        [Value::Tuple(items)] => Ok(Value::Tuple(Arc::clone(items))),
        [Value::Dict(entries)] => Ok(Value::tuple(
            entries.iter().map(|(k, _)| Value::Str(Arc::clone(k))),
        )),
        [other] => Err(NativeError(format!(
            "'{}' object is not iterable",
            other.type_name()
        ))),
        _ => Err(NativeError(format!(
            "tuple expected at most 1 argument, got {}",
            args.len()
        ))),
    }
}
