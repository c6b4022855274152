//! Execution bridge.
//!
//! Runs a replacement body with the arguments of the call it replaces.
//! The replacement's signature may differ from the original's, so the
//! live parameter values are re-shaped into a positional/keyword call
//! and bound again against the replacement.
//!
//! # Reconciliation
//!
//! ```text
//!  original bindings ──partition──▶ positional | *args | kw-only | **kwargs
//!                                          │
//!               replacement starts with *args?
//!                 yes: names it declares go by keyword,
//!                      the rest positionally, then *args
//!                 no:  positional, then *args, then keywords
//!                                          │
//!                                   ArgumentBinder::bind
//! ```

use super::callback::CustomExecutor;
use super::context::{ArgumentPartition, Context};
use super::state::HookState;
use crate::error::RuntimeError;
use crate::frame::Frame;
use crate::interpreter::Interpreter;
use reframe_core::{ArgumentBinder, CodeObject, FunctionObject, Signature, Value};
use std::sync::Arc;

/// A call shaped for the replacement signature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallPlan {
    pub positional: Vec<Value>,
    pub keywords: Vec<(Arc<str>, Value)>,
}

/// Re-shape the original call's arguments for `target`.
pub fn plan_call(args: &ArgumentPartition, target: &Signature) -> CallPlan {
    let mut plan = CallPlan::default();

    if target.first_is_var_positional() {
        for (name, value) in &args.positional {
            if target.find_keyword(name).is_some() {
                plan.keywords.push((Arc::clone(name), value.clone()));
            } else {
                plan.positional.push(value.clone());
            }
        }
    } else {
        plan.positional
            .extend(args.positional.iter().map(|(_, value)| value.clone()));
    }

    plan.positional.extend(args.var_positional.iter().cloned());
    plan.keywords.extend(args.keyword_only.iter().cloned());
    plan.keywords.extend(args.var_keyword.iter().cloned());
    plan
}

/// The routine that runs `code` on behalf of `original`.
///
/// Shares the original's name, qualified name, module, default table and
/// closure.
pub fn rebuild_function(original: &FunctionObject, code: Arc<CodeObject>) -> FunctionObject {
    original.with_code(code)
}

/// Default executor: bind the live arguments to `code` and evaluate it
/// with the default evaluator.
///
/// Custom executors can delegate to this after their own bookkeeping.
pub fn eval_custom_code(
    code: &Arc<CodeObject>,
    ctx: &Context,
    vm: &mut Interpreter,
) -> Result<Value, RuntimeError> {
    let func = Arc::new(rebuild_function(ctx.routine(), Arc::clone(code)));
    let plan = plan_call(&ctx.arguments(), &code.signature);
    tracing::debug!(
        routine = ctx.qualname(),
        replacement = %code.name,
        positional = plan.positional.len(),
        keywords = plan.keywords.len(),
        "binding replacement"
    );

    let bound = ArgumentBinder::bind(
        &code.name,
        &func.signature(),
        plan.positional,
        plan.keywords,
    )?;
    let frame = Frame::new(func, bound, ctx.depth(), ctx.caller().map(Arc::from));
    vm.eval_frame_default(frame)
}

/// Run a replacement under the hook's bridge policy.
pub(crate) fn execute(
    vm: &mut Interpreter,
    state: &HookState,
    code: Arc<CodeObject>,
    ctx: &Context,
) -> Result<Value, RuntimeError> {
    let code = if state.mark_rewritten() && !code.is_rewritten() {
        Arc::new(code.mark_rewritten())
    } else {
        code
    };

    let token = (!state.hierarchical()).then(|| vm.guard().engage());
    let result = match state.custom_executor() {
        Some(executor) => executor.execute(&code, ctx, vm),
        None => eval_custom_code(&code, ctx, vm),
    };
    drop(token);

    if !state.restore_after_bridge() {
        tracing::debug!(routine = ctx.qualname(), "one-shot rewrite, disabling hook");
        state.disable();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partition(positional: &[(&str, i64)], star: &[i64], kw: &[(&str, i64)]) -> ArgumentPartition {
        ArgumentPartition {
            positional: positional
                .iter()
                .map(|(n, v)| (Arc::from(*n), Value::int(*v)))
                .collect(),
            keyword_only: Vec::new(),
            var_positional: star.iter().copied().map(Value::int).collect(),
            var_keyword: kw
                .iter()
                .map(|(n, v)| (Arc::from(*n), Value::int(*v)))
                .collect(),
        }
    }

    #[test]
    fn test_plan_all_positional_into_varargs() {
        let args = partition(&[("a", 1), ("b", 2), ("c", 3)], &[], &[]);
        let target = Signature::builder().var_positional("args").build().unwrap();
        let plan = plan_call(&args, &target);
        assert_eq!(plan.positional, [1, 2, 3].map(Value::int));
        assert!(plan.keywords.is_empty());
    }

    #[test]
    fn test_plan_varargs_first_routes_named_by_keyword() {
        let args = partition(&[("a", 1), ("b", 2)], &[7, 8], &[("z", 9)]);
        let target = Signature::builder()
            .var_positional("args")
            .keyword_only("b")
            .var_keyword("kw")
            .build()
            .unwrap();
        let plan = plan_call(&args, &target);
        assert_eq!(plan.positional, [1, 7, 8].map(Value::int));
        assert_eq!(
            plan.keywords,
            vec![
                (Arc::from("b"), Value::int(2)),
                (Arc::from("z"), Value::int(9))
            ]
        );
    }

    #[test]
    fn test_plan_positional_then_varargs_then_keywords() {
        let mut args = partition(&[("a", 1)], &[2, 3], &[("d", 4)]);
        args.keyword_only.push((Arc::from("k"), Value::int(5)));
        let target = Signature::positional(&["x", "y", "z"]);
        let plan = plan_call(&args, &target);
        assert_eq!(plan.positional, [1, 2, 3].map(Value::int));
        assert_eq!(
            plan.keywords,
            vec![
                (Arc::from("k"), Value::int(5)),
                (Arc::from("d"), Value::int(4))
            ]
        );
    }
}
