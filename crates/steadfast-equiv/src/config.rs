use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {field} {reason}")]
    OutOfRange { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn out_of_range(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::OutOfRange {
            field,
            reason: reason.into(),
        }
    }
}

/// Knobs for every equivalence decision made by one checker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquivalenceConfig {
    /// Compare identifiers and identifier-shaped text in snake_case form.
    pub normalize_naming: bool,
    /// Treat effect lists as ordered sequences instead of multisets.
    pub require_effect_order: bool,
    /// Minimum similarity for two differing intent texts to match.
    pub intent_similarity_threshold: f64,
    /// Reserved for a solver-backed comparison; no backend exists yet.
    pub use_formal_solver: bool,
}

impl EquivalenceConfig {
    /// Exact comparison: no normalization, ordered effects, identical intents.
    pub fn strict() -> Self {
        Self {
            normalize_naming: false,
            require_effect_order: true,
            intent_similarity_threshold: 1.0,
            use_formal_solver: false,
        }
    }

    pub fn lenient() -> Self {
        Self {
            normalize_naming: true,
            require_effect_order: false,
            intent_similarity_threshold: 0.7,
            use_formal_solver: false,
        }
    }

    pub fn with_normalize_naming(mut self, on: bool) -> Self {
        self.normalize_naming = on;
        self
    }

    pub fn with_require_effect_order(mut self, on: bool) -> Self {
        self.require_effect_order = on;
        self
    }

    pub fn with_intent_similarity_threshold(mut self, threshold: f64) -> Self {
        self.intent_similarity_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.intent_similarity_threshold;
        if !t.is_finite() || !(0.0..=1.0).contains(&t) {
            return Err(ConfigError::out_of_range(
                "intent_similarity_threshold",
                format!("must lie in [0, 1], got {t}"),
            ));
        }
        Ok(())
    }
}

impl Default for EquivalenceConfig {
    fn default() -> Self {
        Self {
            normalize_naming: true,
            require_effect_order: false,
            intent_similarity_threshold: 0.85,
            use_formal_solver: false,
        }
    }
}
