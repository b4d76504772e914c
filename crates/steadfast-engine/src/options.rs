use std::time::Duration;

use serde::{Deserialize, Serialize};
use steadfast_equiv::ConfigError;

/// Batch knobs for a [`crate::SensitivityAnalyzer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerOptions {
    /// Upper bound on concurrent translations or comparisons. `1` runs the
    /// batch sequentially on the calling thread.
    pub workers: usize,
    /// Cap on generated variants for `generate_and_measure`.
    pub max_variants: usize,
    /// Per-run sandbox limit when a code measurement passes no timeout.
    #[serde(with = "duration_ms", rename = "execution_timeout_ms")]
    pub execution_timeout: Duration,
}

impl AnalyzerOptions {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_max_variants(mut self, max_variants: usize) -> Self {
        self.max_variants = max_variants;
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::out_of_range("workers", "must be at least 1"));
        }
        if self.max_variants == 0 {
            return Err(ConfigError::out_of_range(
                "max_variants",
                "must be at least 1",
            ));
        }
        if self.execution_timeout.is_zero() {
            return Err(ConfigError::out_of_range(
                "execution_timeout",
                "must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            max_variants: 20,
            execution_timeout: Duration::from_secs(5),
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
