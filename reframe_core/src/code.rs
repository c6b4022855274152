//! Code objects and the body IR they carry.
//!
//! A `CodeObject` is the compiled form of a routine: identity metadata,
//! the declared [`Signature`], slot names, and a body. The body is a small
//! statement/expression tree evaluated by the interpreter; everything
//! outside the interpreter treats it as opaque and only ever replaces it
//! wholesale.
//!
//! # Slot layout
//!
//! ```text
//! localsplus = [ parameters (signature order) | other locals | free variables ]
//! ```

use crate::signature::Signature;
use crate::value::Value;
use std::sync::Arc;

/// Suffix appended to the name of a code object produced by a rewrite.
///
/// Routines whose code carries it are never intercepted again.
pub const REWRITTEN_SUFFIX: &str = "__updated";

// =============================================================================
// Body IR
// =============================================================================

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Lt,
    Eq,
}

impl BinOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Lt => "<",
            BinOp::Eq => "==",
        }
    }
}

/// An argument expression at a call site.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Positional(Expr),
    Keyword(Arc<str>, Expr),
    /// `*expr`, expands a tuple into positional arguments.
    Star(Expr),
    /// `**expr`, expands a dict into keyword arguments.
    DoubleStar(Expr),
}

/// Expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(Value),
    /// Name lookup: locals, then free variables, then globals, then builtins.
    Name(Arc<str>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Arg>,
    },
    Tuple(Vec<Expr>),
    /// Tuple index or dict key lookup.
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    /// `then if cond else otherwise`.
    IfElse {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

impl Expr {
    pub fn int(i: i64) -> Self {
        Expr::Const(Value::int(i))
    }

    pub fn name(name: &str) -> Self {
        Expr::Name(name.into())
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn add(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinOp::Add, lhs, rhs)
    }

    pub fn mul(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinOp::Mul, lhs, rhs)
    }

    /// Call with plain positional arguments.
    pub fn call(func: &str, args: impl IntoIterator<Item = Expr>) -> Self {
        Self::call_with(func, args.into_iter().map(Arg::Positional))
    }

    pub fn call_with(func: &str, args: impl IntoIterator<Item = Arg>) -> Self {
        Expr::Call {
            func: Box::new(Expr::name(func)),
            args: args.into_iter().collect(),
        }
    }

    pub fn subscript(value: Expr, index: Expr) -> Self {
        Expr::Subscript {
            value: Box::new(value),
            index: Box::new(index),
        }
    }

    pub fn if_else(cond: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::IfElse {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    /// Rebuild this expression bottom-up, passing every node through `f`
    /// after its children have been rebuilt.
    pub fn map(&self, f: &mut impl FnMut(Expr) -> Expr) -> Expr {
        let rebuilt = match self {
            Expr::Const(_) | Expr::Name(_) => self.clone(),
            Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op: *op,
                lhs: Box::new(lhs.map(f)),
                rhs: Box::new(rhs.map(f)),
            },
            Expr::Call { func, args } => Expr::Call {
                func: Box::new(func.map(f)),
                args: args.iter().map(|a| a.map(f)).collect(),
            },
            Expr::Tuple(items) => Expr::Tuple(items.iter().map(|e| e.map(f)).collect()),
            Expr::Subscript { value, index } => Expr::Subscript {
                value: Box::new(value.map(f)),
                index: Box::new(index.map(f)),
            },
            Expr::IfElse {
                cond,
                then,
                otherwise,
            } => Expr::IfElse {
                cond: Box::new(cond.map(f)),
                then: Box::new(then.map(f)),
                otherwise: Box::new(otherwise.map(f)),
            },
        };
        f(rebuilt)
    }
}

impl Arg {
    fn map(&self, f: &mut impl FnMut(Expr) -> Expr) -> Arg {
        match self {
            Arg::Positional(e) => Arg::Positional(e.map(f)),
            Arg::Keyword(name, e) => Arg::Keyword(Arc::clone(name), e.map(f)),
            Arg::Star(e) => Arg::Star(e.map(f)),
            Arg::DoubleStar(e) => Arg::DoubleStar(e.map(f)),
        }
    }
}

/// Statements.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign { target: Arc<str>, value: Expr },
    Expr(Expr),
    Return(Expr),
    /// Raise the value as an exception.
    Raise(Expr),
}

impl Stmt {
    pub fn assign(target: &str, value: Expr) -> Self {
        Stmt::Assign {
            target: target.into(),
            value,
        }
    }

    fn map(&self, f: &mut impl FnMut(Expr) -> Expr) -> Stmt {
        match self {
            Stmt::Assign { target, value } => Stmt::Assign {
                target: Arc::clone(target),
                value: value.map(f),
            },
            Stmt::Expr(e) => Stmt::Expr(e.map(f)),
            Stmt::Return(e) => Stmt::Return(e.map(f)),
            Stmt::Raise(e) => Stmt::Raise(e.map(f)),
        }
    }
}

// =============================================================================
// Code Object
// =============================================================================

/// Compiled form of a routine.
///
/// Code objects are immutable once built and shared through `Arc`. The
/// `with_*` methods return modified copies, mirroring how a rewrite pass
/// produces a new code object rather than editing one in place.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeObject {
    /// Function name.
    pub name: Arc<str>,

    /// Qualified name (includes enclosing class/function names).
    pub qualname: Arc<str>,

    /// Filename where this code was defined.
    pub filename: Arc<str>,

    /// First line number in source.
    pub first_lineno: u32,

    /// Declared parameters.
    pub signature: Signature,

    /// Names assigned in the body that are not parameters or free variables.
    pub locals: Box<[Arc<str>]>,

    /// Free variable names (captured from enclosing scope).
    pub freevars: Box<[Arc<str>]>,

    /// Statements executed on call.
    pub body: Arc<[Stmt]>,
}

impl CodeObject {
    /// Create a code object with no parameters and an empty body.
    pub fn new(name: impl Into<Arc<str>>, filename: impl Into<Arc<str>>) -> Self {
        let name = name.into();
        CodeObject {
            qualname: Arc::clone(&name),
            name,
            filename: filename.into(),
            first_lineno: 1,
            signature: Signature::default(),
            locals: Box::new([]),
            freevars: Box::new([]),
            body: Arc::new([]),
        }
    }

    pub fn with_qualname(mut self, qualname: impl Into<Arc<str>>) -> Self {
        self.qualname = qualname.into();
        self
    }

    pub fn with_first_lineno(mut self, line: u32) -> Self {
        self.first_lineno = line;
        self
    }

    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self.recompute_locals();
        self
    }

    pub fn with_freevars(mut self, freevars: &[&str]) -> Self {
        self.freevars = freevars.iter().map(|n| Arc::from(*n)).collect();
        self.recompute_locals();
        self
    }

    pub fn with_body(mut self, body: impl IntoIterator<Item = Stmt>) -> Self {
        self.body = body.into_iter().collect();
        self.recompute_locals();
        self
    }

    /// Copy with a different short name; the qualified name is kept.
    pub fn with_name(&self, name: impl Into<Arc<str>>) -> Self {
        CodeObject {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Copy whose body has had every expression passed through `f`.
    pub fn map_exprs(&self, mut f: impl FnMut(Expr) -> Expr) -> Self {
        CodeObject {
            body: self.body.iter().map(|s| s.map(&mut f)).collect(),
            ..self.clone()
        }
    }

    /// Whether this code was produced by a rewrite and marked as such.
    #[inline]
    pub fn is_rewritten(&self) -> bool {
        self.name.ends_with(REWRITTEN_SUFFIX)
    }

    /// Copy carrying the rewritten-code marker (idempotent).
    pub fn mark_rewritten(&self) -> Self {
        if self.is_rewritten() {
            return self.clone();
        }
        self.with_name(format!("{}{}", self.name, REWRITTEN_SUFFIX))
    }

    /// All slot names in `localsplus` order.
    pub fn localsplus_names(&self) -> impl Iterator<Item = &Arc<str>> {
        self.signature
            .names()
            .chain(self.locals.iter())
            .chain(self.freevars.iter())
    }

    /// Number of `localsplus` slots.
    #[inline]
    pub fn nlocalsplus(&self) -> usize {
        self.signature.len() + self.locals.len() + self.freevars.len()
    }

    /// Slot index of a name.
    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.localsplus_names().position(|n| n.as_ref() == name)
    }

    /// Index of the first free-variable slot.
    #[inline]
    pub fn freevar_offset(&self) -> usize {
        self.signature.len() + self.locals.len()
    }

    fn recompute_locals(&mut self) {
        let mut locals: Vec<Arc<str>> = Vec::new();
        for stmt in self.body.iter() {
            if let Stmt::Assign { target, .. } = stmt {
                let known = self.signature.find(target).is_some()
                    || self.freevars.contains(target)
                    || locals.contains(target);
                if !known {
                    locals.push(Arc::clone(target));
                }
            }
        }
        self.locals = locals.into_boxed_slice();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CodeObject {
        CodeObject::new("f", "mod.rf")
            .with_signature(Signature::positional(&["a", "b"]))
            .with_freevars(&["k"])
            .with_body([
                Stmt::assign("x", Expr::add(Expr::name("a"), Expr::int(1))),
                Stmt::assign("a", Expr::int(0)),
                Stmt::assign("x", Expr::int(2)),
                Stmt::Return(Expr::add(Expr::name("x"), Expr::name("k"))),
            ])
    }

    #[test]
    fn test_locals_exclude_params_and_freevars() {
        let code = sample();
        assert_eq!(code.locals.len(), 1);
        assert_eq!(code.locals[0].as_ref(), "x");
        let names: Vec<&str> = code.localsplus_names().map(|n| n.as_ref()).collect();
        assert_eq!(names, ["a", "b", "x", "k"]);
        assert_eq!(code.nlocalsplus(), 4);
        assert_eq!(code.freevar_offset(), 3);
        assert_eq!(code.slot_of("k"), Some(3));
    }

    #[test]
    fn test_mark_rewritten_is_idempotent() {
        let code = sample().mark_rewritten();
        assert_eq!(code.name.as_ref(), "f__updated");
        assert_eq!(code.qualname.as_ref(), "f");
        assert!(code.is_rewritten());
        assert_eq!(code.mark_rewritten().name, code.name);
    }

    #[test]
    fn test_map_exprs_rewrites_constants() {
        let scaled = sample().map_exprs(|e| match e {
            Expr::Const(Value::Int(i)) => Expr::int(i * 10),
            other => other,
        });
        assert_eq!(
            scaled.body[0],
            Stmt::assign("x", Expr::add(Expr::name("a"), Expr::int(10)))
        );
        assert_eq!(scaled.body[2], Stmt::assign("x", Expr::int(20)));
        assert_eq!(scaled.signature, sample().signature);
    }
}
