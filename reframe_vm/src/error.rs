//! Error types for the interpreter and the interception engine.

use reframe_core::{BindingError, Value};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Invalid hook setup. Reported by the configuration call that caused it.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("cannot enable interception without a rewrite callback")]
    MissingCallback,
    #[error("interception is already enabled")]
    AlreadyEnabled,
    #[error("interpreter already has a different hook installed and enabled")]
    HookInUse,
    #[error("invalid skip pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Failure raised by a rewrite callback's own logic.
///
/// Displays exactly as the wrapped error, and hands it back through
/// [`downcast_ref`](Self::downcast_ref) / [`into_inner`](Self::into_inner).
pub struct CallbackError(Box<dyn StdError + Send + Sync + 'static>);

impl CallbackError {
    pub fn new(err: impl Into<Box<dyn StdError + Send + Sync + 'static>>) -> Self {
        Self(err.into())
    }

    pub fn downcast_ref<T: StdError + 'static>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn into_inner(self) -> Box<dyn StdError + Send + Sync + 'static> {
        self.0
    }

    /// The error to report at the intercepted call site.
    ///
    /// A `RuntimeError` the callback propagated from a call it made comes
    /// back as itself; anything else is carried in [`RuntimeError::Callback`].
    pub fn into_runtime(self) -> RuntimeError {
        match self.0.downcast::<RuntimeError>() {
            Ok(err) => *err,
            Err(other) => RuntimeError::Callback(CallbackError(other)),
        }
    }
}

impl From<CallbackError> for RuntimeError {
    fn from(err: CallbackError) -> Self {
        err.into_runtime()
    }
}

impl fmt::Debug for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for CallbackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for CallbackError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

impl From<RuntimeError> for CallbackError {
    fn from(err: RuntimeError) -> Self {
        Self::new(err)
    }
}

/// Anything that can surface from a call.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The arguments could not be bound to the callee's signature.
    #[error("TypeError: {0}")]
    Binding(#[from] BindingError),

    /// A rewrite callback failed.
    #[error(transparent)]
    Callback(CallbackError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("NameError: name '{0}' is not defined")]
    Name(Arc<str>),

    #[error("TypeError: {0}")]
    Type(String),

    /// A value raised by a `raise` statement.
    #[error("{0}")]
    Raised(Value),

    #[error("RecursionError: maximum recursion depth exceeded")]
    RecursionLimit,
}

impl RuntimeError {
    pub fn type_error(message: impl Into<String>) -> Self {
        RuntimeError::Type(message.into())
    }

    /// The raised value, if this is a user-level exception.
    pub fn raised(&self) -> Option<&Value> {
        match self {
            RuntimeError::Raised(value) => Some(value),
            _ => None,
        }
    }

    /// The callback's own error, if a rewrite callback failed.
    pub fn callback_error<T: StdError + 'static>(&self) -> Option<&T> {
        match self {
            RuntimeError::Callback(err) => err.downcast_ref::<T>(),
            _ => None,
        }
    }
}
