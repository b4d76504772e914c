use std::fmt;
use std::str::FromStr;

use num::bigint::BigInt;
use num::rational::BigRational;
use num::traits::{One, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// p-values strictly below this are reported as significant.
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Largest tie-free sample for which the exact null distribution is used.
pub const EXACT_MAX_SAMPLES: usize = 50;

/// Fewest paired samples the test accepts.
pub const MIN_SAMPLES: usize = 3;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("paired series differ in length: baseline has {baseline}, variant has {variant}")]
    LengthMismatch { baseline: usize, variant: usize },
    #[error("non-finite score at index {index}")]
    NonFinite { index: usize },
    #[error("unknown alternative hypothesis `{0}` (expected two-sided, greater or less)")]
    UnknownAlternative(String),
    #[error("count too large for f64 conversion ({digits} digits)")]
    PrecisionOverflow { digits: usize },
}

/// Alternative hypothesis about the paired differences `variant - baseline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Alternative {
    TwoSided,
    /// Variant scores tend to exceed baseline scores.
    Greater,
    /// Variant scores tend to fall below baseline scores.
    Less,
}

impl Alternative {
    pub fn as_str(self) -> &'static str {
        match self {
            Alternative::TwoSided => "two-sided",
            Alternative::Greater => "greater",
            Alternative::Less => "less",
        }
    }
}

impl fmt::Display for Alternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Alternative {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "two-sided" | "two_sided" => Ok(Alternative::TwoSided),
            "greater" => Ok(Alternative::Greater),
            "less" => Ok(Alternative::Less),
            other => Err(StatsError::UnknownAlternative(other.to_string())),
        }
    }
}

/// How the p-value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMethod {
    Exact,
    NormalApproximation,
    /// Every paired difference was zero; no test was run.
    Degenerate,
}

/// Outcome of a signed-rank test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalTestResult {
    pub statistic: f64,
    pub p_value: f64,
    pub significant: bool,
    pub interpretation: String,
    pub alternative: Alternative,
    pub method: TestMethod,
    /// Pairs left after discarding zero differences.
    pub effective_samples: usize,
}

impl StatisticalTestResult {
    fn new(
        statistic: f64,
        p_value: f64,
        alternative: Alternative,
        method: TestMethod,
        effective_samples: usize,
    ) -> Self {
        let p_value = p_value.clamp(0.0, 1.0);
        let significant = p_value < SIGNIFICANCE_LEVEL;
        let interpretation = match (method, significant) {
            (TestMethod::Degenerate, _) => {
                "all paired differences are zero; variant and baseline scores are identical"
                    .to_string()
            }
            (_, true) => format!(
                "significant difference ({alternative}) between variant and baseline scores \
                 (p = {p_value:.4} < {SIGNIFICANCE_LEVEL})"
            ),
            (_, false) => format!(
                "no significant difference ({alternative}) between variant and baseline scores \
                 (p = {p_value:.4} >= {SIGNIFICANCE_LEVEL})"
            ),
        };
        Self {
            statistic,
            p_value,
            significant,
            interpretation,
            alternative,
            method,
            effective_samples,
        }
    }
}

impl fmt::Display for StatisticalTestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "W = {:.1}, p = {:.4} [{:?}, n = {}]: {}",
            self.statistic, self.p_value, self.method, self.effective_samples, self.interpretation
        )
    }
}

/// Paired Wilcoxon signed-rank test on `variant - baseline`.
///
/// Zero differences are discarded before ranking. The statistic is
/// `min(W+, W-)` for [`Alternative::TwoSided`] and `W+` otherwise.
pub fn wilcoxon_signed_rank(
    baseline: &[f64],
    variant: &[f64],
    alternative: Alternative,
) -> Result<StatisticalTestResult, StatsError> {
    if baseline.len() != variant.len() {
        return Err(StatsError::LengthMismatch {
            baseline: baseline.len(),
            variant: variant.len(),
        });
    }
    if baseline.len() < MIN_SAMPLES {
        return Err(StatsError::InvalidInput(format!(
            "signed-rank test needs at least {MIN_SAMPLES} paired samples, got {}",
            baseline.len()
        )));
    }
    for (index, (b, v)) in baseline.iter().zip(variant).enumerate() {
        if !b.is_finite() || !v.is_finite() {
            return Err(StatsError::NonFinite { index });
        }
    }

    let differences: Vec<f64> = baseline
        .iter()
        .zip(variant)
        .map(|(b, v)| v - b)
        .filter(|d| *d != 0.0)
        .collect();
    if differences.is_empty() {
        debug!(samples = baseline.len(), "all paired differences are zero");
        return Ok(StatisticalTestResult::new(
            0.0,
            1.0,
            alternative,
            TestMethod::Degenerate,
            0,
        ));
    }

    let ranking = rank_absolute(&differences);
    let n = differences.len();
    let (mut w_plus, mut w_minus) = (0.0, 0.0);
    for (d, r) in differences.iter().zip(&ranking.ranks) {
        if *d > 0.0 {
            w_plus += r;
        } else {
            w_minus += r;
        }
    }
    let statistic = match alternative {
        Alternative::TwoSided => f64::min(w_plus, w_minus),
        Alternative::Greater | Alternative::Less => w_plus,
    };

    let (p_value, method) = if n <= EXACT_MAX_SAMPLES && !ranking.has_ties() {
        (exact_p_value(n, w_plus, alternative)?, TestMethod::Exact)
    } else {
        (
            normal_p_value(n, w_plus, &ranking.tie_sizes, alternative),
            TestMethod::NormalApproximation,
        )
    };
    debug!(n, w_plus, w_minus, p_value, ?method, %alternative, "signed-rank test");
    Ok(StatisticalTestResult::new(
        statistic,
        p_value,
        alternative,
        method,
        n,
    ))
}

struct Ranking {
    ranks: Vec<f64>,
    /// Sizes of tie groups with more than one member.
    tie_sizes: Vec<usize>,
}

impl Ranking {
    fn has_ties(&self) -> bool {
        !self.tie_sizes.is_empty()
    }
}

/// Rank `|d|` ascending, giving tied values the average of their ranks.
fn rank_absolute(differences: &[f64]) -> Ranking {
    let mut order: Vec<usize> = (0..differences.len()).collect();
    order.sort_by(|&a, &b| differences[a].abs().total_cmp(&differences[b].abs()));

    let mut ranks = vec![0.0; differences.len()];
    let mut tie_sizes = Vec::new();
    let mut start = 0;
    while start < order.len() {
        let value = differences[order[start]].abs();
        let mut end = start + 1;
        while end < order.len() && differences[order[end]].abs() == value {
            end += 1;
        }
        // Ranks are 1-based: positions start..end hold ranks start+1..=end.
        let average = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = average;
        }
        if end - start > 1 {
            tie_sizes.push(end - start);
        }
        start = end;
    }
    Ranking { ranks, tie_sizes }
}

/// Number of subsets of `{1..=n}` with each possible sum.
fn signed_rank_counts(n: usize) -> Vec<BigInt> {
    let max_sum = n * (n + 1) / 2;
    let mut counts = vec![BigInt::zero(); max_sum + 1];
    counts[0] = BigInt::one();
    for rank in 1..=n {
        for sum in (rank..=max_sum).rev() {
            let add = counts[sum - rank].clone();
            counts[sum] += add;
        }
    }
    counts
}

fn exact_p_value(n: usize, w_plus: f64, alternative: Alternative) -> Result<f64, StatsError> {
    let counts = signed_rank_counts(n);
    let total = BigInt::one() << n;
    let max_sum = counts.len() - 1;
    // Without ties every rank is an integer, so W+ is too.
    let w = (w_plus.round().max(0.0) as usize).min(max_sum);

    let at_most = |t: usize| -> BigInt { counts[..=t].iter().sum() };
    let at_least = |t: usize| -> BigInt { counts[t..].iter().sum() };

    let tail = match alternative {
        Alternative::Greater => at_least(w),
        Alternative::Less => at_most(w),
        Alternative::TwoSided => {
            let lower = w.min(max_sum - w);
            at_most(lower) * BigInt::from(2u8)
        }
    };
    let p = BigRational::new(tail, total);
    if p >= BigRational::one() {
        return Ok(1.0);
    }
    rational_to_f64(&p)
}

fn rational_to_f64(r: &BigRational) -> Result<f64, StatsError> {
    let numer = bigint_to_f64(r.numer())?;
    let denom = bigint_to_f64(r.denom())?;
    Ok(numer / denom)
}

fn bigint_to_f64(n: &BigInt) -> Result<f64, StatsError> {
    match n.to_f64() {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(StatsError::PrecisionOverflow {
            digits: n.to_string().len(),
        }),
    }
}

fn normal_p_value(n: usize, w_plus: f64, tie_sizes: &[usize], alternative: Alternative) -> f64 {
    let n = n as f64;
    let mean = n * (n + 1.0) / 4.0;
    let tie_adjust: f64 = tie_sizes
        .iter()
        .map(|&t| {
            let t = t as f64;
            t * t * t - t
        })
        .sum::<f64>()
        / 48.0;
    let variance = n * (n + 1.0) * (2.0 * n + 1.0) / 24.0 - tie_adjust;
    if variance <= 0.0 {
        return 1.0;
    }
    let sd = variance.sqrt();
    let diff = w_plus - mean;
    match alternative {
        Alternative::TwoSided => {
            let corrected = (diff.abs() - 0.5).max(0.0);
            erfc(corrected / sd / std::f64::consts::SQRT_2)
        }
        Alternative::Greater => {
            let z = (diff - 0.5) / sd;
            0.5 * erfc(z / std::f64::consts::SQRT_2)
        }
        Alternative::Less => {
            let z = (diff + 0.5) / sd;
            0.5 * erfc(-z / std::f64::consts::SQRT_2)
        }
    }
}

/// Complementary error function, Chebyshev approximation with fractional
/// error below 1.2e-7 everywhere.
fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87
                                    + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let r = t * poly.exp();
    if x >= 0.0 {
        r
    } else {
        2.0 - r
    }
}
