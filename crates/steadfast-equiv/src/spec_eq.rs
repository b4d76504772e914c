//! Clause-by-clause specification comparison.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use steadfast_ir::naming::{convert, rewrite_identifiers_in_text};
use steadfast_ir::{NamingStyle, Specification};

use crate::config::EquivalenceConfig;
use crate::similarity::TextSimilarity;

/// Canonical style used when naming normalization is on.
const CANONICAL_STYLE: NamingStyle = NamingStyle::SnakeCase;

/// The first clause on which two specifications disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "clause", rename_all = "snake_case")]
pub enum SpecMismatch {
    Intent { similarity: f64, threshold: f64 },
    SignatureName { left: String, right: String },
    ParameterCount { left: usize, right: usize },
    ParameterName { index: usize, left: String, right: String },
    ParameterType { index: usize, left: String, right: String },
    ReturnType { left: Option<String>, right: Option<String> },
    EffectCount { left: usize, right: usize },
    Effects { ordered: bool },
    Assertions,
}

impl fmt::Display for SpecMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecMismatch::Intent {
                similarity,
                threshold,
            } => write!(f, "intent similarity {similarity:.3} below {threshold:.3}"),
            SpecMismatch::SignatureName { left, right } => {
                write!(f, "signature name `{left}` != `{right}`")
            }
            SpecMismatch::ParameterCount { left, right } => {
                write!(f, "parameter count {left} != {right}")
            }
            SpecMismatch::ParameterName { index, left, right } => {
                write!(f, "parameter {index} name `{left}` != `{right}`")
            }
            SpecMismatch::ParameterType { index, left, right } => {
                write!(f, "parameter {index} type `{left}` != `{right}`")
            }
            SpecMismatch::ReturnType { left, right } => {
                write!(f, "return type {left:?} != {right:?}")
            }
            SpecMismatch::EffectCount { left, right } => {
                write!(f, "effect count {left} != {right}")
            }
            SpecMismatch::Effects { ordered: true } => f.write_str("effect sequences differ"),
            SpecMismatch::Effects { ordered: false } => f.write_str("effect multisets differ"),
            SpecMismatch::Assertions => f.write_str("assertion sets differ"),
        }
    }
}

fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) struct SpecComparison<'a> {
    pub config: &'a EquivalenceConfig,
    pub similarity: &'a dyn TextSimilarity,
}

impl SpecComparison<'_> {
    fn name(&self, name: &str) -> String {
        if self.config.normalize_naming {
            let converted = convert(name, CANONICAL_STYLE);
            if converted.is_empty() {
                name.to_string()
            } else {
                converted
            }
        } else {
            name.to_string()
        }
    }

    fn text(&self, text: &str) -> String {
        if self.config.normalize_naming {
            squash(&rewrite_identifiers_in_text(text, CANONICAL_STYLE))
        } else {
            text.to_string()
        }
    }

    fn texts(&self, items: &[String]) -> Vec<String> {
        items.iter().map(|t| self.text(t)).collect()
    }

    /// First mismatching clause, checked in the order intent, signature,
    /// effects, assertions. Both specifications must already be valid.
    pub fn first_mismatch(&self, a: &Specification, b: &Specification) -> Option<SpecMismatch> {
        if a.intent != b.intent {
            let threshold = self.config.intent_similarity_threshold;
            let similarity = self.similarity.similarity(&a.intent, &b.intent);
            if similarity < threshold {
                return Some(SpecMismatch::Intent {
                    similarity,
                    threshold,
                });
            }
        }

        let (left, right) = (&a.signature, &b.signature);
        if self.name(&left.name) != self.name(&right.name) {
            return Some(SpecMismatch::SignatureName {
                left: left.name.clone(),
                right: right.name.clone(),
            });
        }
        if left.parameters.len() != right.parameters.len() {
            return Some(SpecMismatch::ParameterCount {
                left: left.parameters.len(),
                right: right.parameters.len(),
            });
        }
        for (index, (p, q)) in left.parameters.iter().zip(&right.parameters).enumerate() {
            if p.ty != q.ty {
                return Some(SpecMismatch::ParameterType {
                    index,
                    left: p.ty.clone(),
                    right: q.ty.clone(),
                });
            }
            if self.name(&p.name) != self.name(&q.name) {
                return Some(SpecMismatch::ParameterName {
                    index,
                    left: p.name.clone(),
                    right: q.name.clone(),
                });
            }
        }
        if left.return_type != right.return_type {
            return Some(SpecMismatch::ReturnType {
                left: left.return_type.clone(),
                right: right.return_type.clone(),
            });
        }

        if a.effects.len() != b.effects.len() {
            return Some(SpecMismatch::EffectCount {
                left: a.effects.len(),
                right: b.effects.len(),
            });
        }
        let (ea, eb) = (self.texts(&a.effects), self.texts(&b.effects));
        let ordered = self.config.require_effect_order;
        let effects_match = if ordered {
            ea == eb
        } else {
            multiset(&ea) == multiset(&eb)
        };
        if !effects_match {
            return Some(SpecMismatch::Effects { ordered });
        }

        if multiset(&self.texts(&a.assertions)) != multiset(&self.texts(&b.assertions)) {
            return Some(SpecMismatch::Assertions);
        }
        None
    }
}

pub(crate) fn multiset<T: AsRef<str>>(items: &[T]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for item in items {
        *counts.entry(item.as_ref()).or_insert(0) += 1;
    }
    counts
}
