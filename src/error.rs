//! Error types shared by the generator, the rewrite passes and the harness
//! adapters.

use crate::ir::{BasicType, UnifiedType};

/// Errors raised by the lexical scope model.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ScopeError {
    /// Buffer-backed variables live in the root scope only.
    #[error("buffer variable `{name}` declared at scope depth {depth}, expected depth 0")]
    AlreadyDepth0Violation { name: String, depth: usize },

    #[error("variable `{0}` declared twice in the same scope")]
    Redeclared(String),

    #[error("cannot pop the root scope")]
    PopRoot,
}

/// Contract violations inside the random program generator. Any of these
/// aborts the generation of the current shader.
#[derive(Debug, thiserror::Error)]
pub enum GenError {
    #[error("no variable in scope is readable as {0}")]
    NoReadableVariable(BasicType),

    #[error("no variable in scope is writable as {0}")]
    NoWritableVariable(BasicType),

    #[error(transparent)]
    Scope(#[from] ScopeError),
}

/// Failures of the type inference used by the rewrite passes. These mean the
/// IR is ill-typed.
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),

    #[error("no prototype of `{callee}` accepts ({})", .args.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    NoMatchingPrototype {
        callee: String,
        args: Vec<UnifiedType>,
    },

    #[error("expected a basic type, found {0}")]
    NotBasic(UnifiedType),

    #[error("operator `{op}` cannot combine {left} and {right}")]
    Operands {
        op: &'static str,
        left: UnifiedType,
        right: UnifiedType,
    },

    #[error("invalid swizzle `{0}`")]
    Swizzle(String),
}

/// Errors produced while running a pipeline stage.
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("unsupported operand type {ty} for `{construct}`")]
    UnsupportedOperand {
        construct: &'static str,
        ty: UnifiedType,
    },

    #[error("program has no `main` function")]
    MissingMain,

    #[error("shader rejected by naga: {0}")]
    Validation(String),

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error("malformed wrapper trace: {0}")]
    Trace(String),
}

/// Malformed harness files.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("harness is missing the `{0}` marker")]
    MissingMarker(&'static str),

    #[error("malformed buffer declaration: {0}")]
    Buffer(String),

    #[error("no harness format uses the extension of `{0}`")]
    UnknownFormat(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Gen(#[from] GenError),

    #[error(transparent)]
    Pass(#[from] PassError),

    #[error(transparent)]
    Harness(#[from] HarnessError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("ron: {0}")]
    Ron(#[from] ron::Error),

    #[error("ron: {0}")]
    RonSpanned(#[from] ron::error::SpannedError),
}

impl From<TypeError> for Error {
    fn from(value: TypeError) -> Self {
        Error::Pass(PassError::Type(value))
    }
}
