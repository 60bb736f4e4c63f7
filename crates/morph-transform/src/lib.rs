#![deny(warnings)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all)]

//! # morph-transform
//!
//! Evaluation of compiled transform declarations over an IDR subtree: the
//! declaration walker, the caller-supplied context, the custom-function
//! table, and the embedded deterministic expression evaluator behind the
//! `eval` custom function.

/// Caller-supplied context values.
pub mod context;
/// Declaration evaluator.
pub mod eval;
/// Custom-function registration and invocation.
pub mod funcs;
/// Deterministic expression evaluator for scripted custom functions.
pub mod script;

pub use context::{Ctx, INPUT_NAME_KEY};
pub use eval::transform;
pub use funcs::{CustomFuncs, FuncInput};
pub use script::evaluate as evaluate_script;

use thiserror::Error;

/// Errors raised while evaluating a transform. All of these affect a single
/// output record and leave the reader's position intact.
#[derive(Error, Debug)]
pub enum Error {
    /// A non-optional field path selected nothing.
    #[error("no match for field path '{path}'")]
    FieldMissing { path: String },

    /// An `external` declaration named a value the caller did not supply.
    #[error("missing external value '{0}'")]
    MissingExternal(String),

    /// A declaration invoked a function that is not registered.
    #[error("unknown custom function '{0}'")]
    UnknownCustomFunc(String),

    /// A custom function returned an error.
    #[error("custom function '{name}' failed: {message}")]
    CustomFuncFailed { name: String, message: String },
}

/// Crate-local result type.
pub type Result<T> = std::result::Result<T, Error>;
