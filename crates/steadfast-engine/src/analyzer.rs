//! Batch sensitivity measurement.
//!
//! Every measurement has the same shape: translate all inputs (baseline
//! first), then compare each translated variant with the translated
//! baseline. Both phases fan out over the bounded pool in [`crate::pool`].

use std::time::Duration;

use serde_json::Value;
use steadfast_equiv::{EquivalenceChecker, EquivalenceConfig, Implementation};
use steadfast_ir::Specification;
use steadfast_variants::VariantGenerator;
use tracing::{debug, info, warn};

use crate::error::AnalysisError;
use crate::options::AnalyzerOptions;
use crate::pool::map_indexed;
use crate::result::{SensitivityResult, VariantOutcome};
use crate::translate::Translator;

/// Result of translating one input.
enum Translated<O> {
    Ok(O),
    Failed(String),
    Malformed(String),
}

impl<O> Translated<O> {
    fn failure_outcome(&self) -> Option<VariantOutcome> {
        match self {
            Translated::Ok(_) => None,
            Translated::Failed(message) => Some(VariantOutcome::TranslationFailed {
                message: message.clone(),
            }),
            Translated::Malformed(message) => Some(VariantOutcome::MalformedOutput {
                message: message.clone(),
            }),
        }
    }

    fn message(&self) -> &str {
        match self {
            Translated::Ok(_) => "",
            Translated::Failed(message) | Translated::Malformed(message) => message,
        }
    }
}

/// Measures how often a translator's output changes meaning across
/// semantics-preserving input variants.
#[derive(Debug)]
pub struct SensitivityAnalyzer {
    checker: EquivalenceChecker,
    options: AnalyzerOptions,
    generator: VariantGenerator,
}

impl SensitivityAnalyzer {
    pub fn new(
        checker: EquivalenceChecker,
        options: AnalyzerOptions,
    ) -> Result<Self, AnalysisError> {
        options.validate()?;
        Ok(Self {
            checker,
            options,
            generator: VariantGenerator::new(),
        })
    }

    /// Default checker configuration and sequential options.
    pub fn with_defaults() -> Result<Self, AnalysisError> {
        let checker = EquivalenceChecker::new(EquivalenceConfig::default())
            .map_err(|err| AnalysisError::InvalidInput(err.to_string()))?;
        Self::new(checker, AnalyzerOptions::default())
    }

    pub fn checker(&self) -> &EquivalenceChecker {
        &self.checker
    }

    pub fn options(&self) -> &AnalyzerOptions {
        &self.options
    }

    fn translate_all<I, O, T, V>(
        &self,
        inputs: &[&I],
        translate: &T,
        check: V,
    ) -> Vec<Translated<O>>
    where
        I: ?Sized + Sync,
        O: Send,
        T: Translator<I, O>,
        V: Fn(&O) -> Result<(), String> + Sync,
    {
        map_indexed(self.options.workers, inputs, |index, input| {
            match translate.translate(*input) {
                Ok(output) => match check(&output) {
                    Ok(()) => Translated::Ok(output),
                    Err(message) => {
                        warn!(index, %message, "translator produced malformed output");
                        Translated::Malformed(message)
                    }
                },
                Err(err) => {
                    warn!(index, error = %err, "translation failed");
                    Translated::Failed(err.to_string())
                }
            }
        })
    }

    /// Compare every translated variant with the translated baseline.
    fn compare_to_baseline<O, C>(
        &self,
        mut translated: Vec<Translated<O>>,
        compare: C,
    ) -> SensitivityResult
    where
        O: Sync,
        C: Fn(&O, &O) -> VariantOutcome + Sync,
    {
        let variants = translated.split_off(1);
        let outcomes = match translated.first() {
            Some(Translated::Ok(baseline)) => {
                map_indexed(self.options.workers, &variants, |index, variant| {
                    let outcome = match variant {
                        Translated::Ok(output) => compare(baseline, output),
                        failed => failed
                            .failure_outcome()
                            .unwrap_or(VariantOutcome::NotEquivalent { detail: None }),
                    };
                    debug!(index, %outcome, "variant compared");
                    outcome
                })
            }
            baseline => {
                let message = baseline
                    .map(|b| b.message().to_string())
                    .unwrap_or_else(|| "no baseline".to_string());
                warn!(
                    %message,
                    variants = variants.len(),
                    "baseline failed; every variant counts as non-equivalent"
                );
                variants
                    .iter()
                    .map(|_| VariantOutcome::BaselineFailed {
                        message: message.clone(),
                    })
                    .collect()
            }
        };
        let result = SensitivityResult::from_outcomes(outcomes);
        info!(
            total = result.total_variants,
            equivalent = result.equivalent_count,
            sensitivity = result.sensitivity,
            "sensitivity measured"
        );
        result
    }

    /// Translate `baseline` and every variant into specifications and count
    /// the variants whose specification is not equivalent to the baseline's.
    pub fn measure_spec_sensitivity<I, T>(
        &self,
        baseline: &I,
        variants: &[I],
        translate: &T,
    ) -> Result<SensitivityResult, AnalysisError>
    where
        I: Sync,
        T: Translator<I, Specification>,
    {
        if variants.is_empty() {
            return Err(AnalysisError::InvalidInput(
                "need a baseline and at least one variant".into(),
            ));
        }
        let inputs: Vec<&I> = std::iter::once(baseline).chain(variants).collect();
        let translated = self.translate_all(&inputs, translate, |spec: &Specification| {
            spec.validate().map_err(|err| err.to_string())
        });
        Ok(self.compare_to_baseline(translated, |base, spec| {
            match self.checker.explain_spec_difference(base, spec) {
                Ok(None) => VariantOutcome::Equivalent,
                Ok(Some(mismatch)) => VariantOutcome::NotEquivalent {
                    detail: Some(mismatch.to_string()),
                },
                Err(err) => VariantOutcome::MalformedOutput {
                    message: err.to_string(),
                },
            }
        }))
    }

    /// Generate code from every specification and count the variants whose
    /// code behaves differently from the code for `spec_variants[0]`.
    ///
    /// With `test_inputs` the programs are executed and their outputs
    /// compared; without, they are compared structurally. `timeout` falls
    /// back to [`AnalyzerOptions::execution_timeout`].
    pub fn measure_code_sensitivity<T>(
        &self,
        spec_variants: &[Specification],
        generate_code: &T,
        test_inputs: &[Value],
        timeout: Option<Duration>,
    ) -> Result<SensitivityResult, AnalysisError>
    where
        T: Translator<Specification, Implementation>,
    {
        if spec_variants.len() < 2 {
            return Err(AnalysisError::InvalidInput(
                "need a baseline and at least one variant".into(),
            ));
        }
        let timeout = timeout.unwrap_or(self.options.execution_timeout);
        if test_inputs.is_empty() {
            debug!("no test inputs; comparing implementations structurally");
        }
        let inputs: Vec<&Specification> = spec_variants.iter().collect();
        let translated = self.translate_all(&inputs, generate_code, |_: &Implementation| Ok(()));
        Ok(self.compare_to_baseline(translated, |base, code| {
            let same = if test_inputs.is_empty() {
                self.checker
                    .code_equivalent_structurally(&base.source, &code.source)
            } else {
                self.checker
                    .code_equivalent_by_execution(base, code, test_inputs, timeout)
            };
            if same {
                VariantOutcome::Equivalent
            } else {
                VariantOutcome::NotEquivalent { detail: None }
            }
        }))
    }

    /// Generate up to `max_variants` variants of `baseline_spec` and measure
    /// how `translate` handles them.
    pub fn generate_and_measure<T>(
        &self,
        baseline_spec: &Specification,
        translate: &T,
    ) -> Result<SensitivityResult, AnalysisError>
    where
        T: Translator<Specification, Specification>,
    {
        baseline_spec
            .validate()
            .map_err(|err| AnalysisError::InvalidInput(err.to_string()))?;
        let variants = self
            .generator
            .all_variant_specs(baseline_spec, self.options.max_variants);
        info!(
            signature = %baseline_spec.signature.name,
            variants = variants.len(),
            "generated variants"
        );
        self.measure_spec_sensitivity(baseline_spec, &variants, translate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::TranslationFailure;
    use steadfast_ir::Signature;

    fn spec(name: &str) -> Specification {
        Specification::new(
            "Return the larger of two numbers",
            Signature::new(name)
                .with_parameter("a", "int")
                .with_parameter("b", "int")
                .returning("int"),
        )
    }

    fn analyzer(workers: usize) -> SensitivityAnalyzer {
        let checker = EquivalenceChecker::new(EquivalenceConfig::default()).unwrap();
        SensitivityAnalyzer::new(checker, AnalyzerOptions::default().with_workers(workers)).unwrap()
    }

    /// Inputs are function names; `"fail"` makes the translator error out.
    fn by_name(name: &&str) -> Result<Specification, TranslationFailure> {
        match *name {
            "fail" => Err("model unavailable".into()),
            "" => Ok(Specification::new("blank", Signature::new(""))),
            other => Ok(spec(other)),
        }
    }

    #[test]
    fn needs_at_least_one_variant() {
        let err = analyzer(1)
            .measure_spec_sensitivity(&"max", &[], &by_name)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }

    #[test]
    fn per_item_failures_are_non_equivalent() {
        let result = analyzer(1)
            .measure_spec_sensitivity(&"max", &["max", "fail", "", "min"], &by_name)
            .unwrap();
        assert_eq!(result.per_variant_results, vec![true, false, false, false]);
        assert!(matches!(
            result.per_variant_outcomes[1],
            VariantOutcome::TranslationFailed { .. }
        ));
        assert!(matches!(
            result.per_variant_outcomes[2],
            VariantOutcome::MalformedOutput { .. }
        ));
        assert!(matches!(
            result.per_variant_outcomes[3],
            VariantOutcome::NotEquivalent { detail: Some(_) }
        ));
    }

    #[test]
    fn failed_baseline_fails_every_variant() {
        let result = analyzer(1)
            .measure_spec_sensitivity(&"fail", &["max", "max"], &by_name)
            .unwrap();
        assert_eq!(result.equivalent_count, 0);
        assert_eq!(result.sensitivity, 1.0);
        assert!(result
            .per_variant_outcomes
            .iter()
            .all(|o| matches!(o, VariantOutcome::BaselineFailed { .. })));
    }

    #[test]
    fn worker_count_does_not_change_the_answer() {
        let variants = ["maxValue", "fail", "MAX", "min", "Max", "", "max"];
        let sequential = analyzer(1)
            .measure_spec_sensitivity(&"max", &variants, &by_name)
            .unwrap();
        let parallel = analyzer(4)
            .measure_spec_sensitivity(&"max", &variants, &by_name)
            .unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn code_sensitivity_without_inputs_is_structural() {
        let generate = |s: &Specification| -> Result<Implementation, TranslationFailure> {
            let body = if s.signature.name == "min" {
                "a if a < b else b"
            } else {
                "a if a > b else b"
            };
            Ok(Implementation::new(format!(
                "def {}(a, b):\n    return {body}\n",
                s.signature.name
            )))
        };
        let specs = [spec("max"), spec("maxValue"), spec("min")];
        let result = analyzer(2)
            .measure_code_sensitivity(&specs, &generate, &[], None)
            .unwrap();
        // `maxValue` normalizes to `max_value`, which is still a different name from `max`.
        assert_eq!(result.per_variant_results, vec![false, false]);

        let same_name = |_: &Specification| -> Result<Implementation, TranslationFailure> {
            Ok(Implementation::new("def pick(a, b):\n    return a if a > b else b\n"))
        };
        let result = analyzer(1)
            .measure_code_sensitivity(&specs, &same_name, &[], None)
            .unwrap();
        assert_eq!(result.robustness, 1.0);
    }

    #[test]
    fn code_sensitivity_needs_two_specs() {
        let generate = |_: &Specification| -> Result<Implementation, TranslationFailure> {
            Ok(Implementation::new("def f():\n    return 1\n"))
        };
        let err = analyzer(1)
            .measure_code_sensitivity(&[spec("max")], &generate, &[], None)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }
}
