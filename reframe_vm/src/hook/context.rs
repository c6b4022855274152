//! Read-only snapshot of a pending call.

use crate::frame::Frame;
use reframe_core::{CodeObject, FunctionObject, ParamKind, Signature, Value};
use std::sync::Arc;

/// Everything the rewrite callback may inspect about one invocation.
///
/// Built immediately before the callback runs. It owns its data, so the
/// callback can keep it or hand it to another thread, and it has no way
/// to mutate the frame it was taken from.
#[derive(Debug, Clone)]
pub struct Context {
    func: Arc<FunctionObject>,
    code: Arc<CodeObject>,
    slots: Box<[(Arc<str>, Option<Value>)]>,
    depth: usize,
    caller: Option<Arc<str>>,
}

/// Parameter values grouped by how the original signature received them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentPartition {
    /// Positional-only and positional-or-keyword values, declaration order.
    pub positional: Vec<(Arc<str>, Value)>,
    pub keyword_only: Vec<(Arc<str>, Value)>,
    /// Contents of the `*args` collection.
    pub var_positional: Vec<Value>,
    /// Contents of the `**kwargs` mapping.
    pub var_keyword: Vec<(Arc<str>, Value)>,
}

impl Context {
    pub fn snapshot(frame: &Frame) -> Self {
        let slots = frame
            .code
            .localsplus_names()
            .zip(frame.localsplus())
            .map(|(name, value)| (Arc::clone(name), value.clone()))
            .collect();
        Self {
            func: Arc::clone(&frame.func),
            code: Arc::clone(&frame.code),
            slots,
            depth: frame.depth,
            caller: frame.caller.clone(),
        }
    }

    /// The routine being invoked.
    #[inline]
    pub fn routine(&self) -> &Arc<FunctionObject> {
        &self.func
    }

    #[inline]
    pub fn code(&self) -> &Arc<CodeObject> {
        &self.code
    }

    /// Declared parameters of the code about to run.
    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.code.signature
    }

    pub fn name(&self) -> &str {
        &self.func.name
    }

    pub fn qualname(&self) -> &str {
        &self.func.qualname
    }

    pub fn filename(&self) -> &str {
        &self.code.filename
    }

    pub fn first_lineno(&self) -> u32 {
        self.code.first_lineno
    }

    pub fn localsplus_names(&self) -> impl Iterator<Item = &Arc<str>> {
        self.slots.iter().map(|(name, _)| name)
    }

    /// Slot values in `localsplus` order; `None` for unbound slots.
    pub fn localsplus(&self) -> impl Iterator<Item = Option<&Value>> {
        self.slots.iter().map(|(_, value)| value.as_ref())
    }

    /// Value of a live binding. Unbound slots and unknown names are absent.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.slots
            .iter()
            .find(|(n, _)| n.as_ref() == name)
            .and_then(|(_, value)| value.as_ref())
    }

    /// Every bound slot as `(name, value)`.
    pub fn bindings(&self) -> impl Iterator<Item = (&Arc<str>, &Value)> {
        self.slots
            .iter()
            .filter_map(|(name, value)| value.as_ref().map(|v| (name, v)))
    }

    /// Call depth of the frame (1 for a call made from the host).
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Qualified name of the routine that made this call.
    pub fn caller(&self) -> Option<&str> {
        self.caller.as_deref()
    }

    /// Partition the parameter values by the original signature.
    pub fn arguments(&self) -> ArgumentPartition {
        let mut parts = ArgumentPartition::default();
        for param in self.code.signature.params() {
            let Some(value) = self.get(&param.name) else {
                continue;
            };
            let name = Arc::clone(&param.name);
            match param.kind {
                ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword => {
                    parts.positional.push((name, value.clone()))
                }
                ParamKind::KeywordOnly => parts.keyword_only.push((name, value.clone())),
                ParamKind::VarPositional => {
                    parts
                        .var_positional
                        .extend(value.as_tuple().unwrap_or_default().iter().cloned())
                }
                ParamKind::VarKeyword => parts
                    .var_keyword
                    .extend(value.as_dict().unwrap_or_default().iter().cloned()),
            }
        }
        parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reframe_core::{ArgumentBinder, ClosureEnv, Expr, Stmt};

    fn context() -> Context {
        let sig = Signature::builder()
            .positional_only("a")
            .param("b")
            .var_positional("rest")
            .keyword_only("k")
            .var_keyword("extra")
            .build()
            .unwrap();
        let code = CodeObject::new("f", "pkg/mod.rf")
            .with_qualname("Outer.f")
            .with_first_lineno(12)
            .with_signature(sig)
            .with_freevars(&["scale"])
            .with_body([Stmt::assign("tmp", Expr::int(0))]);
        let func = FunctionObject::new(Arc::new(code))
            .with_closure(ClosureEnv::new([("scale", Value::int(10))]));
        let bound = ArgumentBinder::bind(
            "f",
            &func.signature(),
            [1, 2, 3, 4].map(Value::int),
            [
                (Arc::from("k"), Value::int(5)),
                (Arc::from("z"), Value::int(6)),
            ],
        )
        .unwrap();
        let frame = Frame::new(Arc::new(func), bound, 2, Some("main".into()));
        Context::snapshot(&frame)
    }

    #[test]
    fn test_context_metadata() {
        let ctx = context();
        assert_eq!(ctx.name(), "f");
        assert_eq!(ctx.qualname(), "Outer.f");
        assert_eq!(ctx.filename(), "pkg/mod.rf");
        assert_eq!(ctx.first_lineno(), 12);
        assert_eq!(ctx.depth(), 2);
        assert_eq!(ctx.caller(), Some("main"));
    }

    #[test]
    fn test_context_bindings() {
        let ctx = context();
        let names: Vec<&str> = ctx.localsplus_names().map(|n| n.as_ref()).collect();
        assert_eq!(names, ["a", "b", "rest", "k", "extra", "tmp", "scale"]);
        assert_eq!(ctx.get("scale"), Some(&Value::int(10)));
        assert_eq!(ctx.get("tmp"), None);
        assert_eq!(ctx.get("nope"), None);
        assert_eq!(ctx.bindings().count(), 6);
    }

    #[test]
    fn test_context_arguments_partition() {
        let parts = context().arguments();
        assert_eq!(
            parts.positional,
            vec![
                (Arc::from("a"), Value::int(1)),
                (Arc::from("b"), Value::int(2))
            ]
        );
        assert_eq!(parts.var_positional, vec![Value::int(3), Value::int(4)]);
        assert_eq!(parts.keyword_only, vec![(Arc::from("k"), Value::int(5))]);
        assert_eq!(parts.var_keyword, vec![(Arc::from("z"), Value::int(6))]);
    }
}
