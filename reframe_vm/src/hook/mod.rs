//! Frame-evaluation hook.
//!
//! When a [`HookState`] is installed in an interpreter and enabled, every
//! interpreted frame is routed through [`intercept`] before it runs:
//!
//! ```text
//!  eval_frame(frame)
//!      │
//!      ├─ hook disabled ───────────────────────────▶ eval_frame_default
//!      │
//!      ▼
//!  intercept
//!      ├─ guard engaged ───────────────────────────▶ eval_frame_default
//!      ├─ skip-list match ─────────────────────────▶ eval_frame_default
//!      ├─ no callback ─────────────────────────────▶ eval_frame_default
//!      │
//!      ▼
//!  rewrite(ctx) under guard
//!      ├─ Unchanged ───────────────────────────────▶ eval_frame_default
//!      ├─ Skip (qualname added to skip-list) ──────▶ eval_frame_default
//!      └─ Replace(code) ──▶ bridge::execute ───────▶ eval_frame_default(new frame)
//! ```

pub mod bridge;
pub mod callback;
pub mod context;
pub mod guard;
pub mod scope;
pub mod skiplist;
pub mod state;

pub use bridge::{eval_custom_code, plan_call, rebuild_function, CallPlan};
pub use callback::{CustomExecutor, RewriteOutcome, Rewriter};
pub use context::{ArgumentPartition, Context};
pub use guard::{GuardToken, RecursionGuard};
pub use scope::{Interception, InterceptionBuilder};
pub use skiplist::SkipList;
pub use state::{HookState, HookStats};

use crate::error::RuntimeError;
use crate::frame::Frame;
use crate::interpreter::Interpreter;
use reframe_core::Value;

/// Whether any identifier of the frame's routine is on the skip-list.
fn is_skipped(skip_list: &SkipList, frame: &Frame) -> bool {
    skip_list.contains(&frame.func.qualname)
        || skip_list.contains(&frame.code.name)
        || skip_list.contains(&frame.code.filename)
}

/// Route one frame through the hook.
pub fn intercept(
    vm: &mut Interpreter,
    state: &HookState,
    frame: Frame,
) -> Result<Value, RuntimeError> {
    let counters = state.counters();

    if vm.guard().is_engaged() {
        counters.record_guarded();
        return vm.eval_frame_default(frame);
    }

    if is_skipped(state.skip_list(), &frame) {
        tracing::trace!(routine = %frame.func.qualname, "skip-list hit");
        counters.record_skipped();
        return vm.eval_frame_default(frame);
    }

    let Some(rewriter) = state.rewrite_callback() else {
        return vm.eval_frame_default(frame);
    };

    counters.record_intercepted();
    let ctx = Context::snapshot(&frame);
    let outcome = {
        let _token = vm.guard().engage();
        rewriter.rewrite(&ctx, vm)
    };
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::debug!(routine = ctx.qualname(), error = %err, "rewrite callback failed");
            counters.record_callback_error();
            return Err(err.into_runtime());
        }
    };
    tracing::debug!(routine = ctx.qualname(), outcome = outcome.label(), "rewrite decision");

    match outcome {
        RewriteOutcome::Unchanged => {
            counters.record_unchanged();
            vm.eval_frame_default(frame)
        }
        RewriteOutcome::Skip => {
            counters.record_skip_outcome();
            state.skip_list().add([ctx.qualname()]);
            vm.eval_frame_default(frame)
        }
        RewriteOutcome::Replace(code) => {
            counters.record_replaced();
            drop(frame);
            bridge::execute(vm, state, code, &ctx)
        }
    }
}
