//! Shared hook state: enabled flag, callbacks, skip-list and policy.

use super::callback::{CustomExecutor, RewriteOutcome, Rewriter};
use super::context::Context;
use super::skiplist::SkipList;
use crate::config::HookConfig;
use crate::error::{CallbackError, ConfigurationError, RuntimeError};
use crate::interpreter::Interpreter;
use parking_lot::RwLock;
use reframe_core::{CodeObject, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

// =============================================================================
// Hook State
// =============================================================================

#[derive(Default, Clone)]
struct Callbacks {
    rewrite: Option<Arc<dyn Rewriter>>,
    custom: Option<Arc<dyn CustomExecutor>>,
}

/// State of the frame-evaluation hook.
///
/// One `HookState` may be shared by several interpreters on several
/// threads. The enabled flag is sampled once per frame entry, so toggling
/// it affects calls made after the toggle.
pub struct HookState {
    enabled: AtomicBool,
    callbacks: RwLock<Callbacks>,
    skip_list: SkipList,
    hierarchical: AtomicBool,
    restore_after_bridge: AtomicBool,
    mark_rewritten: AtomicBool,
    stats: StatCounters,
}

impl Default for HookState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HookState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let callbacks = self.callbacks.read();
        f.debug_struct("HookState")
            .field("enabled", &self.is_enabled())
            .field("has_rewrite_callback", &callbacks.rewrite.is_some())
            .field("has_custom_executor", &callbacks.custom.is_some())
            .field("skip_list", &self.skip_list)
            .field("hierarchical", &self.hierarchical())
            .field("restore_after_bridge", &self.restore_after_bridge())
            .field("mark_rewritten", &self.mark_rewritten())
            .finish()
    }
}

impl HookState {
    /// A disabled hook with no callbacks, an empty skip-list and the
    /// default policy.
    pub fn new() -> Self {
        let defaults = HookConfig::default();
        Self {
            enabled: AtomicBool::new(false),
            callbacks: RwLock::new(Callbacks::default()),
            skip_list: SkipList::new(),
            hierarchical: AtomicBool::new(defaults.hierarchical),
            restore_after_bridge: AtomicBool::new(defaults.restore_after_bridge),
            mark_rewritten: AtomicBool::new(defaults.mark_rewritten),
            stats: StatCounters::default(),
        }
    }

    /// A disabled hook configured from `config`.
    pub fn with_config(config: &HookConfig) -> Result<Self, ConfigurationError> {
        let state = Self::new();
        state.apply_config(config)?;
        Ok(state)
    }

    /// Apply policy flags and extend the skip-list.
    pub fn apply_config(&self, config: &HookConfig) -> Result<(), ConfigurationError> {
        for pattern in &config.skip_patterns {
            self.skip_list.add_pattern(pattern)?;
        }
        self.skip_list.add(config.skip.iter().map(String::as_str));
        self.set_hierarchical(config.hierarchical);
        self.set_restore_after_bridge(config.restore_after_bridge);
        self.set_mark_rewritten(config.mark_rewritten);
        Ok(())
    }

    // =========================================================================
    // Enable / Disable
    // =========================================================================

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Turn interception on or off.
    ///
    /// Enabling requires a rewrite callback and fails if the hook is
    /// already enabled. Disabling always succeeds.
    pub fn enable(&self, flag: bool) -> Result<(), ConfigurationError> {
        if !flag {
            self.disable();
            return Ok(());
        }

        // Hold the read lock so the callback cannot be cleared in between.
        let callbacks = self.callbacks.read();
        if callbacks.rewrite.is_none() {
            return Err(ConfigurationError::MissingCallback);
        }
        self.enabled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ConfigurationError::AlreadyEnabled)?;
        tracing::debug!("frame interception enabled");
        Ok(())
    }

    pub fn disable(&self) {
        if self.enabled.swap(false, Ordering::AcqRel) {
            tracing::debug!("frame interception disabled");
        }
    }

    /// Set the flag back on after a scope exit, even if it is already on.
    pub(crate) fn reenable(&self) {
        if !self.enabled.swap(true, Ordering::AcqRel) {
            tracing::debug!("frame interception re-enabled");
        }
    }

    /// Clear both callbacks and disable the hook.
    pub fn teardown(&self) {
        self.disable();
        *self.callbacks.write() = Callbacks::default();
        tracing::debug!("hook torn down");
    }

    // =========================================================================
    // Callbacks
    // =========================================================================

    /// Replace both callbacks. `None` clears one.
    pub fn configure(
        &self,
        rewrite: Option<Arc<dyn Rewriter>>,
        custom: Option<Arc<dyn CustomExecutor>>,
    ) {
        let mut callbacks = self.callbacks.write();
        callbacks.rewrite = rewrite;
        callbacks.custom = custom;
    }

    pub fn set_rewrite_callback<F>(&self, callback: F)
    where
        F: Fn(&Context, &mut Interpreter) -> Result<RewriteOutcome, CallbackError>
            + Send
            + Sync
            + 'static,
    {
        self.callbacks.write().rewrite = Some(Arc::new(callback));
    }

    pub fn set_custom_executor<F>(&self, executor: F)
    where
        F: Fn(&Arc<CodeObject>, &Context, &mut Interpreter) -> Result<Value, RuntimeError>
            + Send
            + Sync
            + 'static,
    {
        self.callbacks.write().custom = Some(Arc::new(executor));
    }

    pub fn rewrite_callback(&self) -> Option<Arc<dyn Rewriter>> {
        self.callbacks.read().rewrite.clone()
    }

    pub fn custom_executor(&self) -> Option<Arc<dyn CustomExecutor>> {
        self.callbacks.read().custom.clone()
    }

    pub(crate) fn saved_callbacks(
        &self,
    ) -> (Option<Arc<dyn Rewriter>>, Option<Arc<dyn CustomExecutor>>) {
        let callbacks = self.callbacks.read();
        (callbacks.rewrite.clone(), callbacks.custom.clone())
    }

    // =========================================================================
    // Skip-list and Policy
    // =========================================================================

    #[inline]
    pub fn skip_list(&self) -> &SkipList {
        &self.skip_list
    }

    #[inline]
    pub fn hierarchical(&self) -> bool {
        self.hierarchical.load(Ordering::Relaxed)
    }

    pub fn set_hierarchical(&self, on: bool) {
        self.hierarchical.store(on, Ordering::Relaxed);
    }

    #[inline]
    pub fn restore_after_bridge(&self) -> bool {
        self.restore_after_bridge.load(Ordering::Relaxed)
    }

    pub fn set_restore_after_bridge(&self, on: bool) {
        self.restore_after_bridge.store(on, Ordering::Relaxed);
    }

    #[inline]
    pub fn mark_rewritten(&self) -> bool {
        self.mark_rewritten.load(Ordering::Relaxed)
    }

    pub fn set_mark_rewritten(&self, on: bool) {
        self.mark_rewritten.store(on, Ordering::Relaxed);
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    pub fn stats(&self) -> HookStats {
        self.stats.snapshot()
    }

    #[inline]
    pub(crate) fn counters(&self) -> &StatCounters {
        &self.stats
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Counters for the enabled interception path.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HookStats {
    /// Calls handed to the rewrite callback.
    pub intercepted: u64,
    /// Calls passed through by the skip-list.
    pub skipped: u64,
    /// Calls passed through because the recursion guard was engaged.
    pub guarded: u64,
    pub unchanged: u64,
    pub replaced: u64,
    pub skip_outcomes: u64,
    pub callback_errors: u64,
}

impl HookStats {
    /// Fraction of intercepted calls that ran a replacement (0.0 to 1.0).
    #[inline]
    pub fn replace_rate(&self) -> f64 {
        if self.intercepted == 0 {
            0.0
        } else {
            self.replaced as f64 / self.intercepted as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    intercepted: AtomicU64,
    skipped: AtomicU64,
    guarded: AtomicU64,
    unchanged: AtomicU64,
    replaced: AtomicU64,
    skip_outcomes: AtomicU64,
    callback_errors: AtomicU64,
}

macro_rules! counter {
    ($($record:ident => $field:ident),* $(,)?) => {
        impl StatCounters {
            $(
                #[inline]
                pub(crate) fn $record(&self) {
                    self.$field.fetch_add(1, Ordering::Relaxed);
                }
            )*
        }
    };
}

counter! {
    record_intercepted => intercepted,
    record_skipped => skipped,
    record_guarded => guarded,
    record_unchanged => unchanged,
    record_replaced => replaced,
    record_skip_outcome => skip_outcomes,
    record_callback_error => callback_errors,
}

impl StatCounters {
    fn snapshot(&self) -> HookStats {
        HookStats {
            intercepted: self.intercepted.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            guarded: self.guarded.load(Ordering::Relaxed),
            unchanged: self.unchanged.load(Ordering::Relaxed),
            replaced: self.replaced.load(Ordering::Relaxed),
            skip_outcomes: self.skip_outcomes.load(Ordering::Relaxed),
            callback_errors: self.callback_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_callback() -> HookState {
        let state = HookState::new();
        state.set_rewrite_callback(|_, _| Ok(RewriteOutcome::Unchanged));
        state
    }

    #[test]
    fn test_enable_requires_callback() {
        let state = HookState::new();
        assert!(matches!(
            state.enable(true),
            Err(ConfigurationError::MissingCallback)
        ));
        assert!(!state.is_enabled());
    }

    #[test]
    fn test_double_enable_rejected() {
        let state = state_with_callback();
        state.enable(true).unwrap();
        assert!(matches!(
            state.enable(true),
            Err(ConfigurationError::AlreadyEnabled)
        ));
        assert!(state.is_enabled());

        state.enable(false).unwrap();
        state.enable(false).unwrap();
        assert!(!state.is_enabled());
        state.enable(true).unwrap();
    }

    #[test]
    fn test_teardown_clears_callbacks() {
        let state = state_with_callback();
        state.set_custom_executor(|_, _, _| Ok(Value::None));
        state.enable(true).unwrap();

        state.teardown();
        assert!(!state.is_enabled());
        assert!(state.rewrite_callback().is_none());
        assert!(state.custom_executor().is_none());
    }

    #[test]
    fn test_with_config() {
        let config = HookConfig {
            skip: vec!["helper".into()],
            skip_patterns: vec!["test_.*".into()],
            hierarchical: true,
            restore_after_bridge: false,
            mark_rewritten: false,
        };
        let state = HookState::with_config(&config).unwrap();
        assert!(state.skip_list().contains("helper"));
        assert!(state.skip_list().contains("test_one"));
        assert!(state.hierarchical());
        assert!(!state.restore_after_bridge());
        assert!(!state.mark_rewritten());
    }

    #[test]
    fn test_with_config_bad_pattern() {
        let config = HookConfig {
            skip_patterns: vec!["[".into()],
            ..HookConfig::default()
        };
        assert!(matches!(
            HookState::with_config(&config),
            Err(ConfigurationError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_stats_snapshot() {
        let state = HookState::new();
        state.counters().record_intercepted();
        state.counters().record_intercepted();
        state.counters().record_replaced();
        let stats = state.stats();
        assert_eq!(stats.intercepted, 2);
        assert_eq!(stats.replaced, 1);
        assert_eq!(stats.replace_rate(), 0.5);
        assert_eq!(HookStats::default().replace_rate(), 0.0);
    }

    #[test]
    fn test_hook_state_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HookState>();
    }
}
