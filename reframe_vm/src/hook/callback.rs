//! Callback protocol between the hook and callback authors.

use super::context::Context;
use crate::error::{CallbackError, RuntimeError};
use crate::interpreter::Interpreter;
use reframe_core::{CodeObject, Value};
use std::sync::Arc;

/// What the rewrite callback decided for one call.
#[derive(Debug, Clone, PartialEq)]
pub enum RewriteOutcome {
    /// Run the original body.
    Unchanged,
    /// Run this body instead, with the same arguments.
    Replace(Arc<CodeObject>),
    /// Run the original body and never offer this routine again.
    Skip,
}

impl RewriteOutcome {
    pub fn replace(code: CodeObject) -> Self {
        RewriteOutcome::Replace(Arc::new(code))
    }

    pub fn label(&self) -> &'static str {
        match self {
            RewriteOutcome::Unchanged => "unchanged",
            RewriteOutcome::Replace(_) => "replace",
            RewriteOutcome::Skip => "skip",
        }
    }
}

/// Decides, per call, whether a routine's body is substituted.
///
/// Runs with the recursion guard engaged: any routine it calls through
/// `vm` executes unintercepted.
pub trait Rewriter: Send + Sync {
    fn rewrite(&self, ctx: &Context, vm: &mut Interpreter) -> Result<RewriteOutcome, CallbackError>;
}

impl<F> Rewriter for F
where
    F: Fn(&Context, &mut Interpreter) -> Result<RewriteOutcome, CallbackError> + Send + Sync,
{
    #[inline]
    fn rewrite(&self, ctx: &Context, vm: &mut Interpreter) -> Result<RewriteOutcome, CallbackError> {
        self(ctx, vm)
    }
}

/// Runs a replacement body in place of the built-in execution bridge.
pub trait CustomExecutor: Send + Sync {
    fn execute(
        &self,
        code: &Arc<CodeObject>,
        ctx: &Context,
        vm: &mut Interpreter,
    ) -> Result<Value, RuntimeError>;
}

impl<F> CustomExecutor for F
where
    F: Fn(&Arc<CodeObject>, &Context, &mut Interpreter) -> Result<Value, RuntimeError>
        + Send
        + Sync,
{
    #[inline]
    fn execute(
        &self,
        code: &Arc<CodeObject>,
        ctx: &Context,
        vm: &mut Interpreter,
    ) -> Result<Value, RuntimeError> {
        self(code, ctx, vm)
    }
}
