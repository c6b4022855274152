//! Function and closure objects.

use crate::code::CodeObject;
use crate::signature::{DefaultTable, Signature};
use crate::value::Value;
use smallvec::SmallVec;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// Closure Environment
// =============================================================================

/// Captured variable values from an enclosing scope, keyed by name.
///
/// Name keying lets a routine rebuilt around a new code object resolve its
/// free variables even when the new code orders them differently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClosureEnv {
    cells: SmallVec<[(Arc<str>, Value); 4]>,
}

impl ClosureEnv {
    pub fn new<K: Into<Arc<str>>>(cells: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self {
            cells: cells.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Get a captured value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &Value)> {
        self.cells.iter().map(|(n, v)| (n, v))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

// =============================================================================
// Function Object
// =============================================================================

/// An interpreted function.
///
/// Represents a compiled function with its code, defaults and closure.
/// Function objects are never edited after creation; [`with_code`]
/// produces a sibling that shares everything but the code.
///
/// [`with_code`]: FunctionObject::with_code
#[derive(Debug, Clone)]
pub struct FunctionObject {
    /// Compiled code.
    pub code: Arc<CodeObject>,
    /// Function name.
    pub name: Arc<str>,
    /// Qualified name, used as the routine's identifier.
    pub qualname: Arc<str>,
    /// Defining module.
    pub module: Arc<str>,
    /// Default argument values, by parameter name.
    pub defaults: DefaultTable,
    /// Closure environment (captured variables).
    pub closure: Option<Arc<ClosureEnv>>,
}

impl FunctionObject {
    /// Create a function for `code`, taking its identity and declared
    /// defaults from the code object.
    pub fn new(code: Arc<CodeObject>) -> Self {
        Self {
            name: Arc::clone(&code.name),
            qualname: Arc::clone(&code.qualname),
            module: "__main__".into(),
            defaults: DefaultTable::from_signature(&code.signature),
            closure: None,
            code,
        }
    }

    pub fn with_closure(mut self, closure: ClosureEnv) -> Self {
        self.closure = Some(Arc::new(closure));
        self
    }

    pub fn with_module(mut self, module: impl Into<Arc<str>>) -> Self {
        self.module = module.into();
        self
    }

    pub fn with_default(mut self, name: &str, value: Value) -> Self {
        self.defaults.insert(name, value);
        self
    }

    /// A new function running `code`, inheriting this function's identity,
    /// module, default table and closure.
    pub fn with_code(&self, code: Arc<CodeObject>) -> Self {
        Self {
            code,
            name: Arc::clone(&self.name),
            qualname: Arc::clone(&self.qualname),
            module: Arc::clone(&self.module),
            defaults: self.defaults.clone(),
            closure: self.closure.clone(),
        }
    }

    /// The signature calls are bound against: the code's declared
    /// parameters with this function's default table applied.
    pub fn signature(&self) -> Cow<'_, Signature> {
        self.code.signature.with_defaults(&self.defaults)
    }

    /// Look up a captured free variable.
    pub fn free_var(&self, name: &str) -> Option<&Value> {
        self.closure.as_ref()?.get(name)
    }
}

// =============================================================================
// Native Function
// =============================================================================

/// Error raised by a native function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct NativeError(pub String);

/// Signature of a native function body.
pub type NativeFn =
    dyn Fn(&[Value], &[(Arc<str>, Value)]) -> Result<Value, NativeError> + Send + Sync;

/// A builtin provided by the host.
///
/// Native functions have no frame, so they are invisible to frame-level
/// interception.
pub struct NativeFunction {
    name: Arc<str>,
    func: Box<NativeFn>,
}

impl NativeFunction {
    pub fn new<F>(name: impl Into<Arc<str>>, func: F) -> Self
    where
        F: Fn(&[Value], &[(Arc<str>, Value)]) -> Result<Value, NativeError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn call(&self, args: &[Value], kwargs: &[(Arc<str>, Value)]) -> Result<Value, NativeError> {
        (self.func)(args, kwargs)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
