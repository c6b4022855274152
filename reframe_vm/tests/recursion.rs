use reframe_core::{BinOp, CodeObject, Expr, FunctionObject, Signature, Stmt, Value};
use reframe_vm::{HookState, Interception, Interpreter, RewriteOutcome};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// `fact(n) = 1 if n < 2 else n * fact(n - 1)`
fn fact_code() -> CodeObject {
    CodeObject::new("fact", "math.rf")
        .with_signature(Signature::positional(&["n"]))
        .with_body([Stmt::Return(Expr::if_else(
            Expr::binary(BinOp::Lt, Expr::name("n"), Expr::int(2)),
            Expr::int(1),
            Expr::mul(
                Expr::name("n"),
                Expr::call(
                    "fact",
                    [Expr::binary(BinOp::Sub, Expr::name("n"), Expr::int(1))],
                ),
            ),
        ))])
}

fn setup() -> (Arc<HookState>, Interpreter) {
    let state = Arc::new(HookState::new());
    let mut vm = Interpreter::with_hook(Arc::clone(&state));
    vm.define(FunctionObject::new(Arc::new(fact_code())));
    vm.define(FunctionObject::new(Arc::new(
        CodeObject::new("describe", "tools.rf")
            .with_signature(Signature::positional(&["name"]))
            .with_body([Stmt::Return(Expr::call("len", [Expr::name("name")]))]),
    )));
    (state, vm)
}

#[test]
fn test_callback_may_call_intercepted_routines() {
    let (state, mut vm) = setup();
    let offered = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&offered);
    let _scope = Interception::enter(&state, move |ctx, vm| {
        counter.fetch_add(1, Ordering::SeqCst);
        // Runs unintercepted: the guard is engaged during the callback.
        let nested = vm.call_global("fact", vec![Value::int(3)], vec![])?;
        assert_eq!(nested, Value::int(6));
        vm.call_global("describe", vec![Value::str(ctx.qualname())], vec![])?;
        Ok(RewriteOutcome::Unchanged)
    })
    .unwrap();

    assert_eq!(
        vm.call_global("fact", vec![Value::int(4)], vec![]).unwrap(),
        Value::int(24)
    );
    // One offer per recursive level of the outer call only.
    assert_eq!(offered.load(Ordering::SeqCst), 4);
    assert!(state.stats().guarded > 0);
    assert!(!vm.guard().is_engaged());
}

#[test]
fn test_recursive_replacement_runs_original_below() {
    let (state, mut vm) = setup();

    let _scope = Interception::enter(&state, |ctx, _| {
        if ctx.name() != "fact" {
            return Ok(RewriteOutcome::Unchanged);
        }
        // Base case returns 10 instead of 1.
        let body = ctx.code().map_exprs(|expr| match expr {
            Expr::IfElse {
                cond,
                then,
                otherwise,
            } if *then == Expr::int(1) => Expr::IfElse {
                cond,
                then: Box::new(Expr::int(10)),
                otherwise,
            },
            other => other,
        });
        Ok(RewriteOutcome::replace(body))
    })
    .unwrap();

    // Only the outermost frame is replaced; recursive calls run the
    // original under the guard.
    assert_eq!(
        vm.call_global("fact", vec![Value::int(3)], vec![]).unwrap(),
        Value::int(6)
    );
    assert_eq!(
        vm.call_global("fact", vec![Value::int(1)], vec![]).unwrap(),
        Value::int(10)
    );
    assert_eq!(state.stats().replaced, 2);
}

#[test]
fn test_guard_released_after_failing_replacement() {
    let (state, mut vm) = setup();

    let _scope = Interception::enter(&state, |ctx, _| {
        if ctx.name() == "describe" {
            let failing = CodeObject::new("describe", "tools.rf")
                .with_signature(Signature::positional(&["name"]))
                .with_body([Stmt::Raise(Expr::Const(Value::str("rewrite failed")))]);
            return Ok(RewriteOutcome::replace(failing));
        }
        Ok(RewriteOutcome::Unchanged)
    })
    .unwrap();

    let err = vm
        .call_global("describe", vec![Value::str("x")], vec![])
        .unwrap_err();
    assert_eq!(err.raised(), Some(&Value::str("rewrite failed")));
    assert_eq!(vm.guard().depth(), 0);
    assert!(vm.current_routine().is_none());
    assert!(state.is_enabled());

    let before = state.stats().intercepted;
    vm.call_global("fact", vec![Value::int(2)], vec![]).unwrap();
    assert_eq!(state.stats().intercepted, before + 2);
}
