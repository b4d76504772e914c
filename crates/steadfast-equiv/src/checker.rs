use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use steadfast_ir::Specification;
use tracing::{debug, warn};

use crate::config::EquivalenceConfig;
use crate::error::{EquivalenceError, ExecutionError};
use crate::output::outputs_equivalent;
use crate::parser::{IndentParser, Node, ProgramTree, SourceParser};
use crate::sandbox::{ExecutionRequest, ProcessSandbox, Sandbox};
use crate::similarity::{shared_similarity_model, TextSimilarity};
use crate::spec_eq::{SpecComparison, SpecMismatch};
use crate::structural::{normalize_bound_names, trees_equivalent};

/// Source code of one candidate plus the function to call.
///
/// Without an explicit entry point, the first top-level function is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    pub source: String,
    #[serde(default)]
    pub entry_point: Option<String>,
}

impl Implementation {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            entry_point: None,
        }
    }

    pub fn with_entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry_point = Some(name.into());
        self
    }
}

impl From<&str> for Implementation {
    fn from(source: &str) -> Self {
        Implementation::new(source)
    }
}

impl From<String> for Implementation {
    fn from(source: String) -> Self {
        Implementation::new(source)
    }
}

fn first_function(tree: &ProgramTree) -> Option<String> {
    tree.nodes.iter().find_map(|node| match node {
        Node::Block(block) if block.keyword == "def" => block.name().map(str::to_string),
        _ => None,
    })
}

/// Decides equivalence of specifications and implementations under one
/// fixed [`EquivalenceConfig`].
///
/// The checker holds no mutable state; one instance may be shared across
/// threads.
#[derive(Clone)]
pub struct EquivalenceChecker {
    config: EquivalenceConfig,
    similarity: Option<Arc<dyn TextSimilarity>>,
    sandbox: Arc<dyn Sandbox>,
    parser: Arc<dyn SourceParser>,
}

impl std::fmt::Debug for EquivalenceChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EquivalenceChecker")
            .field("config", &self.config)
            .field("custom_similarity", &self.similarity.is_some())
            .finish()
    }
}

impl EquivalenceChecker {
    /// Build a checker with the default collaborators: the shared similarity
    /// model, a `python3` [`ProcessSandbox`] and the [`IndentParser`].
    pub fn new(config: EquivalenceConfig) -> Result<Self, EquivalenceError> {
        config.validate()?;
        if config.use_formal_solver {
            warn!("use_formal_solver is reserved and has no effect");
        }
        Ok(Self {
            config,
            similarity: None,
            sandbox: Arc::new(ProcessSandbox::default()),
            parser: Arc::new(IndentParser::default()),
        })
    }

    pub fn with_similarity(mut self, model: Arc<dyn TextSimilarity>) -> Self {
        self.similarity = Some(model);
        self
    }

    pub fn with_sandbox(mut self, sandbox: Arc<dyn Sandbox>) -> Self {
        self.sandbox = sandbox;
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn SourceParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn config(&self) -> &EquivalenceConfig {
        &self.config
    }

    fn similarity_model(&self) -> &dyn TextSimilarity {
        match &self.similarity {
            Some(model) => model.as_ref(),
            None => shared_similarity_model(),
        }
    }

    /// The first clause on which `a` and `b` disagree, or `None` when they
    /// are equivalent. Malformed specifications are an error.
    pub fn explain_spec_difference(
        &self,
        a: &Specification,
        b: &Specification,
    ) -> Result<Option<SpecMismatch>, EquivalenceError> {
        a.validate()?;
        b.validate()?;
        let comparison = SpecComparison {
            config: &self.config,
            similarity: self.similarity_model(),
        };
        let mismatch = comparison.first_mismatch(a, b);
        match &mismatch {
            Some(m) => debug!(
                left = %a.signature.name,
                right = %b.signature.name,
                mismatch = %m,
                "specifications differ"
            ),
            None => debug!(signature = %a.signature.name, "specifications equivalent"),
        }
        Ok(mismatch)
    }

    pub fn spec_equivalent(
        &self,
        a: &Specification,
        b: &Specification,
    ) -> Result<bool, EquivalenceError> {
        Ok(self.explain_spec_difference(a, b)?.is_none())
    }

    fn entry_point(&self, implementation: &Implementation) -> Option<String> {
        if let Some(name) = &implementation.entry_point {
            return Some(name.clone());
        }
        match self.parser.parse(&implementation.source) {
            Ok(tree) => first_function(&tree),
            Err(err) => {
                warn!(%err, "cannot locate entry point in unparsable implementation");
                None
            }
        }
    }

    fn run_pair(
        &self,
        a: &ExecutionRequest,
        b: &ExecutionRequest,
    ) -> (Result<Value, ExecutionError>, Result<Value, ExecutionError>) {
        thread::scope(|scope| {
            let left = scope.spawn(|| self.sandbox.execute(a));
            let right = self.sandbox.execute(b);
            let left = left.join().unwrap_or_else(|_| {
                Err(ExecutionError::MalformedOutput(
                    "sandbox worker panicked".into(),
                ))
            });
            (left, right)
        })
    }

    /// Run both implementations on every input and compare the outputs.
    ///
    /// No inputs means no evidence, so the answer is `false`. The first
    /// failed run or differing output ends the comparison with `false`.
    pub fn code_equivalent_by_execution(
        &self,
        a: &Implementation,
        b: &Implementation,
        test_inputs: &[Value],
        timeout: Duration,
    ) -> bool {
        if test_inputs.is_empty() {
            debug!("no test inputs; cannot establish equivalence");
            return false;
        }
        let (Some(name_a), Some(name_b)) = (self.entry_point(a), self.entry_point(b)) else {
            warn!("implementation defines no callable function");
            return false;
        };

        for (index, input) in test_inputs.iter().enumerate() {
            let request = |source: &str, function_name: &str| ExecutionRequest {
                source: source.to_string(),
                function_name: function_name.to_string(),
                input: input.clone(),
                timeout,
            };
            let (left, right) = self.run_pair(
                &request(&a.source, &name_a),
                &request(&b.source, &name_b),
            );
            match (left, right) {
                (Ok(x), Ok(y)) => {
                    if !outputs_equivalent(&x, &y) {
                        debug!(index, left = %x, right = %y, "outputs differ");
                        return false;
                    }
                }
                (Err(err), _) | (_, Err(err)) => {
                    warn!(index, %err, "execution failed; treating pair as non-equivalent");
                    return false;
                }
            }
        }
        debug!(inputs = test_inputs.len(), "outputs agree on every input");
        true
    }

    /// Parse both sources and compare their structure.
    ///
    /// Unparsable source is never equivalent to anything.
    pub fn code_equivalent_structurally(&self, a: &str, b: &str) -> bool {
        let parse = |source: &str| -> Option<ProgramTree> {
            match self.parser.parse(source) {
                Ok(mut tree) => {
                    if self.config.normalize_naming {
                        normalize_bound_names(&mut tree);
                    }
                    Some(tree)
                }
                Err(err) => {
                    warn!(%err, "implementation failed to parse");
                    None
                }
            }
        };
        let (Some(tree_a), Some(tree_b)) = (parse(a), parse(b)) else {
            return false;
        };
        let (same, branch) = trees_equivalent(&tree_a, &tree_b);
        debug!(same, ?branch, "structural comparison");
        same
    }
}
