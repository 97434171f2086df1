//! Error kinds raised while building and lowering node trees.
//!
//! - [`ConfigError`]: API misuse caught when a declaration or reference is
//!   constructed (a `void` variable, a duplicate class).
//! - [`OperandError`]: malformed operands caught eagerly by node constructors.
//! - [`CastError`]: no legal conversion between two static types. Raised at
//!   emission time, before anything reaches the sink.
//!
//! Runtime-only failures (an unboxing mismatch, a failed downcast, a checked
//! narrowing overflow) are never reported here; they are encoded into the
//! instruction stream and surface when the generated code executes.

use thiserror::Error;

pub use crate::casting::CastError;
use crate::String;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("cannot declare {what} `{name}` of type void")]
    VoidType { what: &'static str, name: String },

    #[error("class `{name}` is already declared")]
    DuplicateClass { name: String },

    #[error("class `{class}` cannot extend interface `{interface}`")]
    InterfaceAsParent { class: String, interface: String },

    #[error("`{ty}` is not a valid array element type")]
    InvalidElementType { ty: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperandError {
    #[error("{what} slot {index} is out of range (limit {limit})")]
    SlotOutOfRange {
        what: &'static str,
        index: usize,
        limit: usize,
    },

    #[error("instance {what} `{name}` requires a target expression")]
    MissingTarget { what: &'static str, name: String },

    #[error("static {what} `{name}` does not take a target expression")]
    UnexpectedTarget { what: &'static str, name: String },

    #[error("cannot index into a value of type `{ty}`")]
    NotAnArray { ty: String },

    #[error("array index must be an integer, found `{ty}`")]
    InvalidIndexType { ty: String },

    #[error("operator `{op}` cannot be applied to `{ty}`")]
    InvalidOperandType { op: &'static str, ty: String },

    #[error("operator `{op}` cannot be applied to `{left}` and `{right}`")]
    MismatchedOperands {
        op: &'static str,
        left: String,
        right: String,
    },

    #[error("`{method}` expects {expected} arguments, received {received}")]
    ArgumentCount {
        method: String,
        expected: usize,
        received: usize,
    },

    #[error("condition must be bool, found `{ty}`")]
    NonBooleanCondition { ty: String },

    #[error("`{method}` is not a constructor")]
    NotAConstructor { method: String },

    #[error("`{method}` is a constructor and cannot be called directly")]
    ConstructorCall { method: String },

    #[error("cannot use a `void` expression as a value")]
    VoidValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Operand(#[from] OperandError),

    #[error(transparent)]
    Conversion(#[from] CastError),

    #[error("label L{0} was never marked")]
    UnresolvedLabel(u32),

    #[error("method `{method}` must end with a return statement")]
    MissingReturn { method: String },
}
