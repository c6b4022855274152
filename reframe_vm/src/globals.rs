//! Global scope management with fast hash map lookup.
//!
//! The global scope contains module-level names and provides fast
//! lookups using FxHashMap for minimal hashing overhead.

use reframe_core::Value;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Global scope containing module-level bindings.
#[derive(Debug, Default, Clone)]
pub struct GlobalScope {
    /// Name to value bindings.
    bindings: FxHashMap<Arc<str>, Value>,
}

impl GlobalScope {
    /// Create a new empty global scope.
    #[inline]
    pub fn new() -> Self {
        Self {
            bindings: FxHashMap::default(),
        }
    }

    /// Get a value by name.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    /// Set a value.
    #[inline]
    pub fn set(&mut self, name: impl Into<Arc<str>>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// Delete a name, returning the old value if present.
    #[inline]
    pub fn delete(&mut self, name: &str) -> Option<Value> {
        self.bindings.remove(name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &Value)> {
        self.bindings.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_scope_basic() {
        let mut globals = GlobalScope::new();

        globals.set("x", Value::int(42));
        assert_eq!(globals.get("x").and_then(Value::as_int), Some(42));
        assert!(globals.get("y").is_none());
    }

    #[test]
    fn test_global_scope_delete() {
        let mut globals = GlobalScope::new();

        globals.set("x", Value::int(10));
        assert!(globals.contains("x"));

        let old = globals.delete("x");
        assert_eq!(old.and_then(|v| v.as_int()), Some(10));
        assert!(!globals.contains("x"));
    }

    #[test]
    fn test_global_scope_overwrite() {
        let mut globals = GlobalScope::new();

        globals.set("x", Value::int(1));
        globals.set("x", Value::int(2));

        assert_eq!(globals.get("x").and_then(Value::as_int), Some(2));
        assert_eq!(globals.len(), 1);
    }
}
