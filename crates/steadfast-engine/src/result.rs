use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a variant counted the way it did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VariantOutcome {
    Equivalent,
    /// Translated fine, but the output means something else. `detail` names
    /// the first differing clause when one is known.
    NotEquivalent { detail: Option<String> },
    TranslationFailed { message: String },
    /// The translator returned a value that does not validate.
    MalformedOutput { message: String },
    /// The baseline could not be translated, so nothing can match it.
    BaselineFailed { message: String },
}

impl VariantOutcome {
    pub fn is_equivalent(&self) -> bool {
        matches!(self, VariantOutcome::Equivalent)
    }
}

impl fmt::Display for VariantOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantOutcome::Equivalent => write!(f, "equivalent"),
            VariantOutcome::NotEquivalent { detail: Some(detail) } => {
                write!(f, "not equivalent: {detail}")
            }
            VariantOutcome::NotEquivalent { detail: None } => write!(f, "not equivalent"),
            VariantOutcome::TranslationFailed { message } => {
                write!(f, "translation failed: {message}")
            }
            VariantOutcome::MalformedOutput { message } => write!(f, "malformed output: {message}"),
            VariantOutcome::BaselineFailed { message } => write!(f, "baseline failed: {message}"),
        }
    }
}

/// Aggregate of one measurement batch.
///
/// `per_variant_results[i]` and `per_variant_outcomes[i]` describe the i-th
/// variant passed in, regardless of how the batch was scheduled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityResult {
    pub total_variants: usize,
    pub equivalent_count: usize,
    pub non_equivalent_count: usize,
    pub sensitivity: f64,
    pub robustness: f64,
    pub per_variant_results: Vec<bool>,
    #[serde(default)]
    pub per_variant_outcomes: Vec<VariantOutcome>,
}

impl SensitivityResult {
    pub fn from_outcomes(outcomes: Vec<VariantOutcome>) -> Self {
        let per_variant_results: Vec<bool> =
            outcomes.iter().map(VariantOutcome::is_equivalent).collect();
        let total_variants = per_variant_results.len();
        let equivalent_count = per_variant_results.iter().filter(|&&eq| eq).count();
        let non_equivalent_count = total_variants - equivalent_count;
        let sensitivity = if total_variants == 0 {
            0.0
        } else {
            non_equivalent_count as f64 / total_variants as f64
        };
        Self {
            total_variants,
            equivalent_count,
            non_equivalent_count,
            sensitivity,
            robustness: 1.0 - sensitivity,
            per_variant_results,
            per_variant_outcomes: outcomes,
        }
    }
}

impl fmt::Display for SensitivityResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} variants equivalent (sensitivity {:.3}, robustness {:.3})",
            self.equivalent_count, self.total_variants, self.sensitivity, self.robustness
        )
    }
}

/// Mean robustness over several batches; `0.0` when there are none.
pub fn aggregate_robustness(results: &[SensitivityResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    results.iter().map(|r| r.robustness).sum::<f64>() / results.len() as f64
}
