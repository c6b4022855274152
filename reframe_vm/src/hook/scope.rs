//! Scoped interception.
//!
//! [`Interception`] configures and enables the hook for as long as it is
//! alive. Dropping it puts back the callbacks and enabled flag it found,
//! so nested scopes unwind correctly and the outermost scope leaves the
//! hook cleared and disabled.

use super::callback::{CustomExecutor, RewriteOutcome, Rewriter};
use super::context::Context;
use super::skiplist::SkipList;
use super::state::HookState;
use crate::error::{CallbackError, ConfigurationError, RuntimeError};
use crate::interpreter::Interpreter;
use reframe_core::{CodeObject, Value};
use std::sync::Arc;

struct Saved {
    rewrite: Option<Arc<dyn Rewriter>>,
    custom: Option<Arc<dyn CustomExecutor>>,
    enabled: bool,
}

/// An active interception scope.
#[must_use = "interception stops when the scope is dropped"]
pub struct Interception {
    state: Arc<HookState>,
    saved: Option<Saved>,
}

impl Interception {
    /// Enable interception with `rewrite` until the scope is dropped.
    pub fn enter<F>(state: &Arc<HookState>, rewrite: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&Context, &mut Interpreter) -> Result<RewriteOutcome, CallbackError>
            + Send
            + Sync
            + 'static,
    {
        Self::builder(state).enter(rewrite)
    }

    pub fn builder(state: &Arc<HookState>) -> InterceptionBuilder {
        InterceptionBuilder {
            state: Arc::clone(state),
            skip: Vec::new(),
            skip_patterns: Vec::new(),
            custom: None,
        }
    }

    pub fn state(&self) -> &Arc<HookState> {
        &self.state
    }

    /// End the scope now.
    pub fn exit(mut self) {
        self.restore();
    }

    fn restore(&mut self) {
        let Some(saved) = self.saved.take() else {
            return;
        };
        if !saved.enabled {
            self.state.disable();
        }
        self.state.configure(saved.rewrite, saved.custom);
        if saved.enabled {
            // An inner one-shot bridge may have switched the hook off.
            self.state.reenable();
        }
        tracing::debug!(enabled = saved.enabled, "interception scope exited");
    }
}

impl Drop for Interception {
    fn drop(&mut self) {
        self.restore();
    }
}

impl std::fmt::Debug for Interception {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interception")
            .field("state", &self.state)
            .field("active", &self.saved.is_some())
            .finish()
    }
}

/// Builder for an [`Interception`] scope with extra skips or a custom
/// executor.
#[must_use]
pub struct InterceptionBuilder {
    state: Arc<HookState>,
    skip: Vec<Arc<str>>,
    skip_patterns: Vec<String>,
    custom: Option<Arc<dyn CustomExecutor>>,
}

impl InterceptionBuilder {
    /// Exempt routines by exact identifier.
    pub fn skip<I, S>(mut self, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        self.skip.extend(identifiers.into_iter().map(Into::into));
        self
    }

    /// Exempt routines whose identifier fully matches `pattern`.
    pub fn skip_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.skip_patterns.push(pattern.into());
        self
    }

    pub fn custom_executor<F>(mut self, executor: F) -> Self
    where
        F: Fn(&Arc<CodeObject>, &Context, &mut Interpreter) -> Result<Value, RuntimeError>
            + Send
            + Sync
            + 'static,
    {
        self.custom = Some(Arc::new(executor));
        self
    }

    /// Install the callbacks, extend the skip-list and enable the hook.
    ///
    /// Nothing is changed if a skip pattern is invalid.
    pub fn enter<F>(self, rewrite: F) -> Result<Interception, ConfigurationError>
    where
        F: Fn(&Context, &mut Interpreter) -> Result<RewriteOutcome, CallbackError>
            + Send
            + Sync
            + 'static,
    {
        let state = self.state;
        let compiled = self
            .skip_patterns
            .iter()
            .map(|pattern| SkipList::compile_pattern(pattern))
            .collect::<Result<Vec<_>, _>>()?;
        state.skip_list().add_compiled(compiled);
        state.skip_list().add(self.skip);

        let (rewrite_prev, custom_prev) = state.saved_callbacks();
        let saved = Saved {
            rewrite: rewrite_prev,
            custom: custom_prev,
            enabled: state.is_enabled(),
        };
        state.configure(Some(Arc::new(rewrite)), self.custom);
        if !saved.enabled {
            if let Err(err) = state.enable(true) {
                state.configure(saved.rewrite, saved.custom);
                return Err(err);
            }
        }
        tracing::debug!(nested = saved.enabled, "interception scope entered");

        Ok(Interception {
            state,
            saved: Some(saved),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unchanged(_: &Context, _: &mut Interpreter) -> Result<RewriteOutcome, CallbackError> {
        Ok(RewriteOutcome::Unchanged)
    }

    #[test]
    fn test_scope_enables_and_restores() {
        let state = Arc::new(HookState::new());
        {
            let _scope = Interception::enter(&state, unchanged).unwrap();
            assert!(state.is_enabled());
            assert!(state.rewrite_callback().is_some());
        }
        assert!(!state.is_enabled());
        assert!(state.rewrite_callback().is_none());
    }

    #[test]
    fn test_nested_scopes() {
        let state = Arc::new(HookState::new());
        let outer = Interception::enter(&state, unchanged).unwrap();
        let outer_cb = state.rewrite_callback().unwrap();

        let inner = Interception::builder(&state)
            .custom_executor(|_, _, _| Ok(Value::int(0)))
            .enter(|_, _| Ok(RewriteOutcome::Skip))
            .unwrap();
        assert!(state.custom_executor().is_some());
        inner.exit();

        assert!(state.is_enabled());
        assert!(state.custom_executor().is_none());
        let restored = state.rewrite_callback().unwrap();
        assert!(Arc::ptr_eq(&outer_cb, &restored));

        drop(outer);
        assert!(!state.is_enabled());
    }

    #[test]
    fn test_inner_exit_reenables_outer_scope() {
        let state = Arc::new(HookState::new());
        let outer = Interception::enter(&state, unchanged).unwrap();

        let inner = Interception::enter(&state, unchanged).unwrap();
        // What a one-shot bridged call does inside the inner scope.
        state.disable();
        inner.exit();

        assert!(state.is_enabled());
        drop(outer);
        assert!(!state.is_enabled());
    }

    #[test]
    fn test_builder_extends_skip_list() {
        let state = Arc::new(HookState::new());
        let scope = Interception::builder(&state)
            .skip(["helper"])
            .skip_pattern("vendor/.*")
            .enter(unchanged)
            .unwrap();
        assert!(state.skip_list().contains("helper"));
        assert!(state.skip_list().contains("vendor/x.rf"));
        drop(scope);
        // The skip-list outlives the scope.
        assert!(state.skip_list().contains("helper"));
    }

    #[test]
    fn test_invalid_pattern_leaves_state_untouched() {
        let state = Arc::new(HookState::new());
        let err = Interception::builder(&state)
            .skip_pattern("ok")
            .skip_pattern("(bad")
            .enter(unchanged)
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidPattern { .. }));
        assert!(!state.is_enabled());
        assert_eq!(state.skip_list().pattern_count(), 0);
    }
}
