//! Recursion guard.
//!
//! While the guard is engaged the hook passes every frame straight to the
//! default evaluator. It is engaged around the rewrite callback and around
//! a bridged call so the engine never intercepts its own work.
//!
//! The guard belongs to one interpreter and is not `Send`: a bridged call
//! on one thread never suppresses interception on another.

use std::cell::Cell;
use std::rc::Rc;

/// Per-interpreter nesting counter.
#[derive(Debug, Default, Clone)]
pub struct RecursionGuard {
    depth: Rc<Cell<u32>>,
}

impl RecursionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engage the guard until the returned token is dropped.
    #[inline]
    pub fn engage(&self) -> GuardToken {
        let depth = self.depth.get() + 1;
        self.depth.set(depth);
        tracing::trace!(depth, "recursion guard engaged");
        GuardToken {
            depth: Rc::clone(&self.depth),
        }
    }

    /// Whether interception is currently suppressed.
    #[inline]
    pub fn is_engaged(&self) -> bool {
        self.depth.get() > 0
    }

    #[inline]
    pub fn depth(&self) -> u32 {
        self.depth.get()
    }
}

/// Scope of one guard engagement. Dropping it releases the engagement,
/// including during unwinding.
#[must_use = "the guard is released as soon as the token is dropped"]
#[derive(Debug)]
pub struct GuardToken {
    depth: Rc<Cell<u32>>,
}

impl Drop for GuardToken {
    fn drop(&mut self) {
        let depth = self.depth.get().saturating_sub(1);
        self.depth.set(depth);
        tracing::trace!(depth, "recursion guard released");
    }
}
