use std::time::Duration;

use steadfast_ir::SpecError;
use thiserror::Error;

use crate::config::ConfigError;

/// Contract violations raised by the checker itself.
#[derive(Debug, Error)]
pub enum EquivalenceError {
    #[error("cannot compare specifications: {0}")]
    MalformedSpecification(#[from] SpecError),
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

/// Why one sandboxed execution produced no usable output.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to spawn `{interpreter}`: {source}")]
    Spawn {
        interpreter: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sandbox I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("execution timed out after {after:?}")]
    Timeout { after: Duration },
    #[error("process exited with {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },
    #[error("malformed output: {0}")]
    MalformedOutput(String),
}

/// Why implementation source could not be turned into a tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("inconsistent indentation on line {line}")]
    Indentation { line: usize },
    #[error("unbalanced brackets on line {line}")]
    UnbalancedBrackets { line: usize },
    #[error("source contains no code")]
    Empty,
}
