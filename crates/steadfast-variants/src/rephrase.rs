//! Assertion rephrasing via a fixed table of logical-equivalence rewrites.
//!
//! Rules come in forward/inverse pairs so a rephrased predicate can always be
//! mapped back to its original form:
//!
//! | forward                     | inverse                     |
//! |-----------------------------|-----------------------------|
//! | `X > 0` -> `X >= 1`         | `X >= 1` -> `X > 0`         |
//! | `len(X) > 0` -> `X != []`   | `X != []` -> `len(X) > 0`   |
//! | `X == true` -> `X`          | `X` -> `X == true`          |
//! | `X == false` -> `not X`     | `not X` -> `X == false`     |
//!
//! The integer rules only fire on an integer literal (`x > 0.5` is left
//! alone). `X -> X == true` only fires when the whole predicate is a bare
//! name, and `not X` only when the `not` starts a clause (never inside
//! `is not`). No rule treats a literal such as `True` or `None` as `X`.

use regex::{Captures, Regex};
use tracing::error;

const OPERAND: &str = r"[A-Za-z_][A-Za-z0-9_.]*(?:\([^()]*\))?";
const NAME: &str = r"[A-Za-z_][A-Za-z0-9_.]*";

/// Words that never stand in for `X`.
const NON_OPERANDS: &[&str] = &["true", "false", "not", "none", "null", "and", "or"];

/// One entry of the rewrite table.
#[derive(Debug)]
pub struct RewriteRule {
    pub name: &'static str,
    pub inverse: &'static str,
    pattern: Regex,
    replacement: &'static str,
}

fn is_non_operand(text: &str) -> bool {
    NON_OPERANDS.contains(&text.to_ascii_lowercase().as_str())
}

impl RewriteRule {
    /// Apply the rule to every match in `predicate`; `None` when nothing was rewritten.
    ///
    /// A match whose operand is a literal keyword is kept verbatim.
    pub fn apply(&self, predicate: &str) -> Option<String> {
        let mut changed = false;
        let rewritten = self.pattern.replace_all(predicate, |caps: &Captures<'_>| {
            let matched = caps.get(0).map_or("", |m| m.as_str());
            if caps.name("x").is_some_and(|x| is_non_operand(x.as_str())) {
                return matched.to_string();
            }
            let mut out = String::new();
            caps.expand(self.replacement, &mut out);
            changed |= out != matched;
            out
        });
        changed.then(|| rewritten.into_owned())
    }
}

struct RuleSource {
    name: &'static str,
    inverse: &'static str,
    pattern: String,
    replacement: &'static str,
}

fn rule_sources() -> Vec<RuleSource> {
    vec![
        RuleSource {
            name: "gt_zero_to_ge_one",
            inverse: "ge_one_to_gt_zero",
            pattern: format!(r"(?P<x>{OPERAND})\s*>\s*0\b(?P<tail>[^.]|$)"),
            replacement: "${x} >= 1${tail}",
        },
        RuleSource {
            name: "ge_one_to_gt_zero",
            inverse: "gt_zero_to_ge_one",
            pattern: format!(r"(?P<x>{OPERAND})\s*>=\s*1\b(?P<tail>[^.]|$)"),
            replacement: "${x} > 0${tail}",
        },
        RuleSource {
            name: "len_positive_to_non_empty",
            inverse: "non_empty_to_len_positive",
            pattern: format!(r"\blen\(\s*(?P<x>{NAME})\s*\)\s*>\s*0\b(?P<tail>[^.]|$)"),
            replacement: "${x} != []${tail}",
        },
        RuleSource {
            name: "non_empty_to_len_positive",
            inverse: "len_positive_to_non_empty",
            pattern: format!(r"(?P<x>{NAME})\s*!=\s*\[\s*\]"),
            replacement: "len(${x}) > 0",
        },
        RuleSource {
            name: "eq_true_to_bare",
            inverse: "bare_to_eq_true",
            pattern: format!(r"(?P<x>{OPERAND})\s*==\s*(?i:true)\b"),
            replacement: "${x}",
        },
        RuleSource {
            name: "bare_to_eq_true",
            inverse: "eq_true_to_bare",
            pattern: format!(r"^\s*(?P<x>{OPERAND})\s*$"),
            replacement: "${x} == true",
        },
        RuleSource {
            name: "eq_false_to_not",
            inverse: "not_to_eq_false",
            pattern: format!(r"(?P<x>{OPERAND})\s*==\s*(?i:false)\b"),
            replacement: "not ${x}",
        },
        RuleSource {
            name: "not_to_eq_false",
            inverse: "eq_false_to_not",
            pattern: format!(
                r"(?P<lead>(?:^|\(|\band\b|\bor\b)\s*)not\s+(?P<x>{OPERAND})(?P<tail>\s*(?:$|\)|\band\b|\bor\b))"
            ),
            replacement: "${lead}${x} == false${tail}",
        },
    ]
}

/// The compiled rewrite table.
#[derive(Debug)]
pub struct AssertionRewriter {
    rules: Vec<RewriteRule>,
}

impl Default for AssertionRewriter {
    fn default() -> Self {
        Self::new()
    }
}

impl AssertionRewriter {
    /// Compile the table. A rule whose pattern fails to compile is logged and
    /// left out rather than aborting generation.
    pub fn new() -> Self {
        let rules = rule_sources()
            .into_iter()
            .filter_map(|src| match Regex::new(&src.pattern) {
                Ok(pattern) => Some(RewriteRule {
                    name: src.name,
                    inverse: src.inverse,
                    pattern,
                    replacement: src.replacement,
                }),
                Err(err) => {
                    error!(rule = src.name, %err, "assertion rewrite rule failed to compile");
                    None
                }
            })
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    pub fn rule(&self, name: &str) -> Option<&RewriteRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Every successful rewrite of `predicate`, as `(rule name, rewritten text)`, in table order.
    pub fn rephrasings(&self, predicate: &str) -> Vec<(&'static str, String)> {
        self.rules
            .iter()
            .filter_map(|rule| rule.apply(predicate).map(|text| (rule.name, text)))
            .collect()
    }
}
