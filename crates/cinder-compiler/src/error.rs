//! Compilation errors

use cinder_bytecode::{EncodeError, ValueError, VerifyError};
use thiserror::Error;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Undefined identifier: {name}")]
    UndefinedIdentifier { name: String },

    #[error("Invalid identifier: {name:?}")]
    InvalidIdentifier { name: String },

    #[error("Undefined function: {name}")]
    UndefinedFunction { name: String },

    #[error("{name} is a function, not a variable")]
    NotAVariable { name: String },

    #[error("{name} already defined as {previous}")]
    DuplicateDefinition { name: String, previous: &'static str },

    #[error("Function {name} expects {expected} arguments, got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Too many parameters in {name} (max 255)")]
    TooManyParameters { name: String },

    #[error("Variable {name} may be used before it is assigned")]
    UninitializedVariable { name: String },

    #[error("Function {name} must be declared at top level")]
    NestedFunction { name: String },

    #[error("Invalid break statement (not in loop)")]
    InvalidBreak,

    #[error("Invalid continue statement (not in loop)")]
    InvalidContinue,

    #[error("Invalid assignment target: {target}")]
    InvalidAssignTarget { target: String },

    #[error("Invalid index into {name}: {index}")]
    InvalidIndex { name: String, index: String },

    #[error("Unexpected {kind} at top level")]
    UnexpectedTopLevel { kind: &'static str },

    #[error("Entry function {name} is not defined")]
    MissingEntry { name: String },

    #[error("Value error: {0}")]
    Value(#[from] ValueError),

    #[error("Internal compiler error in {function}/{block}: {message}")]
    InternalError {
        function: String,
        block: String,
        message: String,
    },

    #[error("Bytecode encoding failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("Bytecode verification failed: {0}")]
    Verification(#[from] VerifyError),

    #[error("Invalid syntax tree: {0}")]
    Tree(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl CompileError {
    /// Internal invariant violation inside a function and block
    pub fn internal(
        function: impl Into<String>,
        block: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        CompileError::InternalError {
            function: function.into(),
            block: block.into(),
            message: message.into(),
        }
    }

    /// Whether this error points at a compiler bug rather than bad input
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            CompileError::InternalError { .. }
                | CompileError::Encode(_)
                | CompileError::Verification(_)
        )
    }
}
