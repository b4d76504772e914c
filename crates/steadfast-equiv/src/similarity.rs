//! Intent-text similarity.
//!
//! The default model is a bag-of-words cosine similarity. It is built once
//! per process on first use and shared by every checker that was not given
//! its own model.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use tracing::debug;

/// Scores how alike two free-text descriptions are, in `[0, 1]`.
pub trait TextSimilarity: Send + Sync {
    fn similarity(&self, a: &str, b: &str) -> f64;
}

const FILLER_WORDS: &[&str] = &[
    "a", "an", "the", "of", "to", "and", "or", "in", "on", "for", "with", "by", "from", "is",
    "are", "be", "it", "its", "that", "this", "given", "each", "all",
];

/// Cosine similarity over lower-cased word counts, ignoring filler words.
#[derive(Debug)]
pub struct TokenCosineSimilarity {
    filler: HashSet<&'static str>,
}

impl Default for TokenCosineSimilarity {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCosineSimilarity {
    pub fn new() -> Self {
        Self {
            filler: FILLER_WORDS.iter().copied().collect(),
        }
    }

    fn bag(&self, text: &str) -> HashMap<String, f64> {
        let mut counts = HashMap::new();
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .filter(|w| !self.filler.contains(w.as_str()))
        {
            *counts.entry(word).or_insert(0.0) += 1.0;
        }
        counts
    }
}

impl TextSimilarity for TokenCosineSimilarity {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        let left = self.bag(a);
        let right = self.bag(b);
        match (left.is_empty(), right.is_empty()) {
            (true, true) => return 1.0,
            (true, false) | (false, true) => return 0.0,
            _ => {}
        }
        let dot: f64 = left
            .iter()
            .filter_map(|(word, x)| right.get(word).map(|y| x * y))
            .sum();
        let norm = |bag: &HashMap<String, f64>| bag.values().map(|v| v * v).sum::<f64>().sqrt();
        (dot / (norm(&left) * norm(&right))).clamp(0.0, 1.0)
    }
}

static SHARED_MODEL: OnceLock<TokenCosineSimilarity> = OnceLock::new();

/// The process-wide default similarity model, created on first call.
pub fn shared_similarity_model() -> &'static TokenCosineSimilarity {
    SHARED_MODEL.get_or_init(|| {
        debug!("initializing shared similarity model");
        TokenCosineSimilarity::new()
    })
}
