//! Call frames.
//!
//! A `Frame` is the execution context of one routine invocation. Its slot
//! array follows the code object's `localsplus` layout: bound parameters,
//! then body locals (unbound until assigned), then free variables filled
//! from the function's closure.

use reframe_core::{BoundArguments, CodeObject, FunctionObject, Value};
use std::sync::Arc;

/// Maximum call depth before `RecursionError`. The interpreter grows the
/// native stack as needed, so the limit holds on any thread.
pub const MAX_RECURSION_DEPTH: usize = 1000;

/// A call frame representing a function invocation.
#[derive(Debug)]
pub struct Frame {
    /// Function being executed.
    pub func: Arc<FunctionObject>,

    /// Code being executed (the function's code).
    pub code: Arc<CodeObject>,

    /// Slot values; `None` marks an unbound slot.
    localsplus: Vec<Option<Value>>,

    /// Call depth of this frame (1 for a call made from the host).
    pub depth: usize,

    /// Qualified name of the calling routine, if any.
    pub caller: Option<Arc<str>>,
}

impl Frame {
    /// Build a frame for `func` with already-bound arguments.
    ///
    /// `bound` must have been produced against `func`'s signature.
    pub fn new(
        func: Arc<FunctionObject>,
        bound: BoundArguments,
        depth: usize,
        caller: Option<Arc<str>>,
    ) -> Self {
        let code = Arc::clone(&func.code);
        debug_assert_eq!(bound.len(), code.signature.len());

        let mut localsplus: Vec<Option<Value>> = Vec::with_capacity(code.nlocalsplus());
        localsplus.extend(bound.into_values().map(Some));
        localsplus.resize(code.freevar_offset(), None);
        localsplus.extend(code.freevars.iter().map(|name| func.free_var(name).cloned()));

        Self {
            func,
            code,
            localsplus,
            depth,
            caller,
        }
    }

    /// All slots in `localsplus` order.
    #[inline]
    pub fn localsplus(&self) -> &[Option<Value>] {
        &self.localsplus
    }

    /// Whether `name` is one of this frame's slots.
    #[inline]
    pub fn has_slot(&self, name: &str) -> bool {
        self.code.slot_of(name).is_some()
    }

    /// Current value of a slot by name; `None` if unbound or not a slot.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let slot = self.code.slot_of(name)?;
        self.localsplus.get(slot)?.as_ref()
    }

    /// Bind a slot by name. Returns false if `name` is not a slot.
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        match self.code.slot_of(name) {
            Some(slot) => {
                self.localsplus[slot] = Some(value);
                true
            }
            None => false,
        }
    }

    /// Whether `name` is a free-variable slot.
    pub fn is_free_var(&self, name: &str) -> bool {
        self.code
            .slot_of(name)
            .is_some_and(|slot| slot >= self.code.freevar_offset())
    }
}
