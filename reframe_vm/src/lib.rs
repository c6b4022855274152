//! Interpreter with a frame-evaluation interception hook.
//!
//! An [`Interpreter`] executes [`reframe_core`] routines. Installing an
//! enabled [`HookState`] routes every interpreted call through a rewrite
//! callback, which may let the call run, skip the routine for good, or
//! substitute a different body that receives the same arguments.
//!
//! ```text
//!  Interception::enter(&state, rewrite)
//!          │
//!          ▼
//!  Interpreter::call ──▶ eval_frame ──▶ hook::intercept ──▶ rewrite(ctx)
//!                                                │
//!                                                ▼
//!                                     bridge::execute (Replace)
//! ```

pub mod builtins;
pub mod config;
pub mod error;
pub mod frame;
pub mod globals;
pub mod hook;
pub mod interpreter;

pub use config::{ConfigError, HookConfig};
pub use error::{CallbackError, ConfigurationError, RuntimeError};
pub use frame::{Frame, MAX_RECURSION_DEPTH};
pub use hook::{
    ArgumentPartition, Context, CustomExecutor, HookState, HookStats, Interception,
    InterceptionBuilder, RewriteOutcome, Rewriter,
};
pub use interpreter::Interpreter;
