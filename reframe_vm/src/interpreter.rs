//! Tree-walking interpreter.
//!
//! Every call of an interpreted routine builds a [`Frame`] and hands it to
//! [`Interpreter::eval_frame`]. With no enabled hook installed that is one
//! atomic load followed by [`Interpreter::eval_frame_default`]; otherwise
//! the frame is routed through [`hook::intercept`].

use crate::builtins::BuiltinRegistry;
use crate::error::{ConfigurationError, RuntimeError};
use crate::frame::{Frame, MAX_RECURSION_DEPTH};
use crate::globals::GlobalScope;
use crate::hook::{self, HookState, RecursionGuard};
use reframe_core::{
    Arg, ArgumentBinder, BinOp, Expr, FunctionObject, NativeFunction, Stmt, Value,
};
use std::sync::Arc;

/// Native stack that must remain before entering another frame.
const STACK_RED_ZONE: usize = 256 * 1024;

/// Size of each native stack segment allocated on demand.
const STACK_GROWTH: usize = 4 * 1024 * 1024;

/// Single-threaded execution context.
///
/// Owns its globals, builtins and recursion guard. A [`HookState`] may be
/// shared with other interpreters.
#[derive(Debug)]
pub struct Interpreter {
    globals: GlobalScope,
    builtins: BuiltinRegistry,
    hook: Option<Arc<HookState>>,
    guard: RecursionGuard,
    /// Qualified names of the frames currently executing.
    call_stack: Vec<Arc<str>>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Create an interpreter with the standard builtins and no hook.
    pub fn new() -> Self {
        Self {
            globals: GlobalScope::new(),
            builtins: BuiltinRegistry::with_standard_builtins(),
            hook: None,
            guard: RecursionGuard::new(),
            call_stack: Vec::new(),
        }
    }

    /// Create an interpreter with `hook` installed.
    pub fn with_hook(hook: Arc<HookState>) -> Self {
        let mut vm = Self::new();
        vm.hook = Some(hook);
        vm
    }

    // =========================================================================
    // Hook Installation
    // =========================================================================

    /// Install `hook`, replacing any previous one.
    ///
    /// Fails if a different hook is installed and currently enabled.
    pub fn install_hook(&mut self, hook: Arc<HookState>) -> Result<(), ConfigurationError> {
        if let Some(current) = &self.hook {
            if !Arc::ptr_eq(current, &hook) && current.is_enabled() {
                return Err(ConfigurationError::HookInUse);
            }
        }
        self.hook = Some(hook);
        Ok(())
    }

    /// Remove the installed hook, if any.
    pub fn remove_hook(&mut self) -> Option<Arc<HookState>> {
        self.hook.take()
    }

    #[inline]
    pub fn hook(&self) -> Option<&Arc<HookState>> {
        self.hook.as_ref()
    }

    #[inline]
    pub fn guard(&self) -> &RecursionGuard {
        &self.guard
    }

    // =========================================================================
    // Names
    // =========================================================================

    pub fn globals(&self) -> &GlobalScope {
        &self.globals
    }

    pub fn globals_mut(&mut self) -> &mut GlobalScope {
        &mut self.globals
    }

    pub fn builtins_mut(&mut self) -> &mut BuiltinRegistry {
        &mut self.builtins
    }

    /// Bind a function as a global under its own name and return it.
    pub fn define(&mut self, func: FunctionObject) -> Value {
        let name = Arc::clone(&func.name);
        let value = Value::function(func);
        self.globals.set(name, value.clone());
        value
    }

    /// Bind a native function as a global under its own name.
    pub fn define_native(&mut self, native: NativeFunction) -> Value {
        let name: Arc<str> = native.name().into();
        let value = Value::Native(Arc::new(native));
        self.globals.set(name, value.clone());
        value
    }

    /// Qualified name of the innermost executing routine.
    pub fn current_routine(&self) -> Option<&Arc<str>> {
        self.call_stack.last()
    }

    // =========================================================================
    // Calls
    // =========================================================================

    /// Call `callee` with positional and keyword arguments.
    pub fn call(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        kwargs: Vec<(Arc<str>, Value)>,
    ) -> Result<Value, RuntimeError> {
        match callee {
            Value::Function(func) => self.call_function(Arc::clone(func), args, kwargs),
            Value::Native(native) => native
                .call(&args, &kwargs)
                .map_err(|err| RuntimeError::Type(err.0)),
            other => Err(RuntimeError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    /// Call the global named `name`.
    pub fn call_global(
        &mut self,
        name: &str,
        args: Vec<Value>,
        kwargs: Vec<(Arc<str>, Value)>,
    ) -> Result<Value, RuntimeError> {
        let callee = self.lookup_global(name)?;
        self.call(&callee, args, kwargs)
    }

    /// Bind arguments, build a frame and evaluate it.
    pub fn call_function(
        &mut self,
        func: Arc<FunctionObject>,
        args: Vec<Value>,
        kwargs: Vec<(Arc<str>, Value)>,
    ) -> Result<Value, RuntimeError> {
        let depth = self.call_stack.len() + 1;
        if depth > MAX_RECURSION_DEPTH {
            return Err(RuntimeError::RecursionLimit);
        }

        let bound = ArgumentBinder::bind(&func.name, &func.signature(), args, kwargs)?;
        let caller = self.call_stack.last().cloned();
        let frame = Frame::new(func, bound, depth, caller);
        // Each interpreted call nests several native frames, so the
        // native stack is extended on demand to reach the depth limit.
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROWTH, || self.eval_frame(frame))
    }

    // =========================================================================
    // Frame Evaluation
    // =========================================================================

    /// Evaluate a frame, routing it through the hook when one is enabled.
    pub fn eval_frame(&mut self, frame: Frame) -> Result<Value, RuntimeError> {
        match &self.hook {
            Some(state) if state.is_enabled() => {
                let state = Arc::clone(state);
                hook::intercept(self, &state, frame)
            }
            _ => self.eval_frame_default(frame),
        }
    }

    /// Run a frame's body without consulting the hook.
    pub fn eval_frame_default(&mut self, mut frame: Frame) -> Result<Value, RuntimeError> {
        self.call_stack.push(Arc::clone(&frame.func.qualname));
        let result = self.run_body(&mut frame);
        self.call_stack.pop();
        result
    }

    fn run_body(&mut self, frame: &mut Frame) -> Result<Value, RuntimeError> {
        let body = Arc::clone(&frame.code.body);
        for stmt in body.iter() {
            match stmt {
                Stmt::Assign { target, value } => {
                    let value = self.eval_expr(frame, value)?;
                    if !frame.set(target, value) {
                        return Err(RuntimeError::Name(Arc::clone(target)));
                    }
                }
                Stmt::Expr(expr) => {
                    self.eval_expr(frame, expr)?;
                }
                Stmt::Return(expr) => return self.eval_expr(frame, expr),
                Stmt::Raise(expr) => return Err(RuntimeError::Raised(self.eval_expr(frame, expr)?)),
            }
        }
        Ok(Value::None)
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn eval_expr(&mut self, frame: &Frame, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Const(value) => Ok(value.clone()),
            Expr::Name(name) => self.lookup(frame, name),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval_expr(frame, lhs)?;
                let rhs = self.eval_expr(frame, rhs)?;
                binary_op(*op, &lhs, &rhs)
            }
            Expr::Call { func, args } => {
                let callee = self.eval_expr(frame, func)?;
                let (positional, keywords) = self.eval_args(frame, args)?;
                self.call(&callee, positional, keywords)
            }
            Expr::Tuple(items) => {
                let values = items
                    .iter()
                    .map(|item| self.eval_expr(frame, item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::tuple(values))
            }
            Expr::Subscript { value, index } => {
                let value = self.eval_expr(frame, value)?;
                let index = self.eval_expr(frame, index)?;
                subscript(&value, &index)
            }
            Expr::IfElse {
                cond,
                then,
                otherwise,
            } => {
                if self.eval_expr(frame, cond)?.is_truthy() {
                    self.eval_expr(frame, then)
                } else {
                    self.eval_expr(frame, otherwise)
                }
            }
        }
    }

    fn eval_args(
        &mut self,
        frame: &Frame,
        args: &[Arg],
    ) -> Result<(Vec<Value>, Vec<(Arc<str>, Value)>), RuntimeError> {
        let mut positional = Vec::with_capacity(args.len());
        let mut keywords = Vec::new();
        for arg in args {
            match arg {
                Arg::Positional(expr) => positional.push(self.eval_expr(frame, expr)?),
                Arg::Keyword(name, expr) => {
                    keywords.push((Arc::clone(name), self.eval_expr(frame, expr)?))
                }
                Arg::Star(expr) => match self.eval_expr(frame, expr)? {
                    Value::Tuple(items) => positional.extend(items.iter().cloned()),
                    other => {
                        return Err(RuntimeError::type_error(format!(
                            "argument after * must be a tuple, not {}",
                            other.type_name()
                        )))
                    }
                },
                Arg::DoubleStar(expr) => match self.eval_expr(frame, expr)? {
                    Value::Dict(entries) => keywords.extend(entries.iter().cloned()),
                    other => {
                        return Err(RuntimeError::type_error(format!(
                            "argument after ** must be a mapping, not {}",
                            other.type_name()
                        )))
                    }
                },
            }
        }
        Ok((positional, keywords))
    }

    /// Frame slots, then globals, then builtins.
    fn lookup(&self, frame: &Frame, name: &Arc<str>) -> Result<Value, RuntimeError> {
        if frame.has_slot(name) {
            return frame
                .get(name)
                .cloned()
                .ok_or_else(|| RuntimeError::Name(Arc::clone(name)));
        }
        self.lookup_global(name)
    }

    fn lookup_global(&self, name: &str) -> Result<Value, RuntimeError> {
        self.globals
            .get(name)
            .or_else(|| self.builtins.get(name))
            .cloned()
            .ok_or_else(|| RuntimeError::Name(name.into()))
    }
}

// =============================================================================
// Operators
// =============================================================================

fn unsupported(op: BinOp, lhs: &Value, rhs: &Value) -> RuntimeError {
    RuntimeError::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        lhs.type_name(),
        rhs.type_name()
    ))
}

fn binary_op(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match op {
        BinOp::Eq => return Ok(Value::Bool(lhs == rhs)),
        BinOp::Lt => return less_than(lhs, rhs).map(Value::Bool),
        _ => {}
    }

    match (op, lhs, rhs) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => {
            return Ok(Value::str(format!("{}{}", a, b)));
        }
        (BinOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            return Ok(Value::tuple(a.iter().chain(b.iter()).cloned()));
        }
        _ => {}
    }

    if let (Some(a), Some(b)) = (int_operand(lhs), int_operand(rhs)) {
        let result = match op {
            BinOp::Add => a.checked_add(b),
            BinOp::Sub => a.checked_sub(b),
            BinOp::Mul => a.checked_mul(b),
            BinOp::Lt | BinOp::Eq => None,
        };
        return result
            .map(Value::Int)
            .ok_or_else(|| RuntimeError::type_error("integer overflow"));
    }

    match (lhs.as_float(), rhs.as_float()) {
        (Some(a), Some(b)) => Ok(Value::Float(match op {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            _ => a * b,
        })),
        _ => Err(unsupported(op, lhs, rhs)),
    }
}

/// Integer view of an operand; bools count as integers.
fn int_operand(value: &Value) -> Option<i64> {
    match value {
        Value::Int(_) | Value::Bool(_) => value.as_int(),
        _ => None,
    }
}

fn less_than(lhs: &Value, rhs: &Value) -> Result<bool, RuntimeError> {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Ok(a < b),
        _ => match (
            int_operand(lhs).map(|i| i as f64).or(lhs.as_float()),
            int_operand(rhs).map(|i| i as f64).or(rhs.as_float()),
        ) {
            (Some(a), Some(b)) => Ok(a < b),
            _ => Err(unsupported(BinOp::Lt, lhs, rhs)),
        },
    }
}

fn subscript(value: &Value, index: &Value) -> Result<Value, RuntimeError> {
    match (value, index) {
        (Value::Tuple(items), _) => {
            let i = int_operand(index).ok_or_else(|| {
                RuntimeError::type_error(format!(
                    "tuple indices must be integers, not {}",
                    index.type_name()
                ))
            })?;
            let len = items.len() as i64;
            let slot = if i < 0 { i + len } else { i };
            if (0..len).contains(&slot) {
                Ok(items[slot as usize].clone())
            } else {
                Err(RuntimeError::Raised(Value::str("IndexError: tuple index out of range")))
            }
        }
        (Value::Dict(_), Value::Str(key)) => value
            .dict_get(key)
            .cloned()
            .ok_or_else(|| RuntimeError::Raised(Value::str(format!("KeyError: '{}'", key)))),
        _ => Err(RuntimeError::type_error(format!(
            "'{}' object is not subscriptable",
            value.type_name()
        ))),
    }
}
