#![doc = include_str!("../README.md")]

pub mod analyzer;
pub mod error;
pub mod options;
mod pool;
pub mod result;
pub mod translate;

pub use analyzer::SensitivityAnalyzer;
pub use error::AnalysisError;
pub use options::AnalyzerOptions;
pub use result::{aggregate_robustness, SensitivityResult, VariantOutcome};
pub use translate::{TranslationFailure, Translator};

pub use steadfast_prob::{
    wilcoxon_signed_rank, Alternative, StatisticalTestResult, StatsError, TestMethod,
    SIGNIFICANCE_LEVEL,
};
