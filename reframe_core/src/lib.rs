//! Core object model for the reframe runtime.
//!
//! - [`Value`]: immutable runtime values
//! - [`Signature`]: tagged parameter lists with defaults
//! - [`ArgumentBinder`]: pure argument binding against a signature
//! - [`CodeObject`]: compiled routine bodies
//! - [`FunctionObject`]: routines (code + defaults + closure)

pub mod binding;
pub mod code;
pub mod function;
pub mod signature;
pub mod value;

pub use binding::{ArgumentBinder, BindingError, BoundArguments};
pub use code::{Arg, BinOp, CodeObject, Expr, Stmt, REWRITTEN_SUFFIX};
pub use function::{ClosureEnv, FunctionObject, NativeError, NativeFn, NativeFunction};
pub use signature::{DefaultTable, ParamKind, Parameter, Signature, SignatureBuilder, SignatureError};
pub use value::Value;
