#![doc = include_str!("../README.md")]
//! Equivalence checking.
//!
//! [`EquivalenceChecker`] is the entry point. Execution failures and parse
//! failures are recovered as non-equivalence; a malformed specification or
//! an invalid configuration is an [`EquivalenceError`].

pub mod checker;
pub mod config;
pub mod error;
pub mod output;
pub mod parser;
pub mod sandbox;
pub mod similarity;
pub mod spec_eq;
pub mod structural;

pub use checker::{EquivalenceChecker, Implementation};
pub use config::{ConfigError, EquivalenceConfig};
pub use error::{EquivalenceError, ExecutionError, ParseError};
pub use output::{outputs_equivalent, FLOAT_TOLERANCE};
pub use parser::{IndentParser, ProgramTree, SourceParser};
pub use sandbox::{ExecutionRequest, ProcessSandbox, Sandbox, SandboxSession};
pub use similarity::{shared_similarity_model, TextSimilarity, TokenCosineSimilarity};
pub use spec_eq::SpecMismatch;
