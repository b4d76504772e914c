#![doc = include_str!("../README.md")]
//! Variant generation.
//!
//! [`VariantGenerator`] owns the compiled assertion rewrite table and
//! produces [`Variant`]s tagged with the transform that created them.

pub mod rephrase;

use std::fmt;

use serde::{Deserialize, Serialize};
use steadfast_ir::dependency::enumerate_orderings;
use steadfast_ir::naming::{convert, rewrite_identifiers_in_text};
use steadfast_ir::{EffectDependencyGraph, NamingStyle, Specification};
use tracing::debug;

pub use rephrase::{AssertionRewriter, RewriteRule};

/// Which transform produced a variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VariantKind {
    Naming { style: NamingStyle },
    EffectOrder { order: Vec<usize> },
    AssertionRephrasing { index: usize, rule: String },
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantKind::Naming { style } => write!(f, "naming({style})"),
            VariantKind::EffectOrder { order } => write!(f, "effect_order({order:?})"),
            VariantKind::AssertionRephrasing { index, rule } => {
                write!(f, "assertion[{index}]({rule})")
            }
        }
    }
}

/// A generated specification together with how it was derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub kind: VariantKind,
    pub description: String,
    pub spec: Specification,
}

fn into_specs(variants: Vec<Variant>) -> Vec<Specification> {
    variants.into_iter().map(|v| v.spec).collect()
}

/// Produces semantics-preserving variants of a specification.
#[derive(Debug, Default)]
pub struct VariantGenerator {
    rewriter: AssertionRewriter,
}

impl VariantGenerator {
    pub fn new() -> Self {
        Self {
            rewriter: AssertionRewriter::new(),
        }
    }

    pub fn rewriter(&self) -> &AssertionRewriter {
        &self.rewriter
    }

    /// One variant per naming style, in [`NamingStyle::ALL`] order.
    pub fn naming_variants(&self, spec: &Specification) -> Vec<Variant> {
        NamingStyle::ALL
            .iter()
            .map(|&style| {
                let mut renamed = spec.clone();
                renamed.signature.name = convert(&spec.signature.name, style);
                for param in &mut renamed.signature.parameters {
                    param.name = convert(&param.name, style);
                }
                for effect in &mut renamed.effects {
                    *effect = rewrite_identifiers_in_text(effect, style);
                }
                for assertion in &mut renamed.assertions {
                    *assertion = rewrite_identifiers_in_text(assertion, style);
                }
                Variant {
                    kind: VariantKind::Naming { style },
                    description: format!("identifiers rendered in {style}"),
                    spec: renamed,
                }
            })
            .collect()
    }

    /// Reorderings of the effect list that respect the inferred dependencies.
    ///
    /// The original ordering is never returned.
    pub fn effect_order_variants(&self, spec: &Specification, max_variants: usize) -> Vec<Variant> {
        if spec.effects.len() < 2 || max_variants == 0 {
            return Vec::new();
        }
        let graph = EffectDependencyGraph::build(&spec.effects);
        let identity: Vec<usize> = (0..spec.effects.len()).collect();
        let identity_texts: Vec<&str> = spec.effects.iter().map(String::as_str).collect();
        let limit = max_variants.saturating_mul(2);

        let mut variants = Vec::new();
        for order in enumerate_orderings(&graph, &spec.effects, limit) {
            if order == identity {
                continue;
            }
            let effects: Vec<String> = order.iter().map(|&i| spec.effects[i].clone()).collect();
            // Same text sequence as the original when effects repeat.
            if effects.iter().map(String::as_str).eq(identity_texts.iter().copied()) {
                continue;
            }
            let mut reordered = spec.clone();
            reordered.effects = effects;
            variants.push(Variant {
                description: format!("effects reordered as {order:?}"),
                kind: VariantKind::EffectOrder { order },
                spec: reordered,
            });
            if variants.len() == max_variants {
                break;
            }
        }
        debug!(
            effects = spec.effects.len(),
            edges = graph.edges().len(),
            generated = variants.len(),
            "effect order variants"
        );
        variants
    }

    /// Single-predicate rewrites from the fixed equivalence table.
    pub fn assertion_rephrasings(&self, spec: &Specification, max_variants: usize) -> Vec<Variant> {
        let mut variants = Vec::new();
        for (index, predicate) in spec.assertions.iter().enumerate() {
            for (rule, rewritten) in self.rewriter.rephrasings(predicate) {
                if variants.len() == max_variants {
                    return variants;
                }
                let mut rephrased = spec.clone();
                rephrased.assertions[index] = rewritten;
                variants.push(Variant {
                    kind: VariantKind::AssertionRephrasing {
                        index,
                        rule: rule.to_string(),
                    },
                    description: format!("assertion {index} rewritten by {rule}"),
                    spec: rephrased,
                });
            }
        }
        variants
    }

    /// Naming, then effect-order, then assertion variants, truncated to `max_variants`.
    pub fn all_variants(&self, spec: &Specification, max_variants: usize) -> Vec<Variant> {
        let mut variants = self.naming_variants(spec);
        variants.extend(self.effect_order_variants(spec, max_variants));
        variants.extend(self.assertion_rephrasings(spec, max_variants));
        variants.truncate(max_variants);
        debug!(
            signature = %spec.signature.name,
            generated = variants.len(),
            max_variants,
            "generated variants"
        );
        variants
    }

    pub fn naming_variant_specs(&self, spec: &Specification) -> Vec<Specification> {
        into_specs(self.naming_variants(spec))
    }

    pub fn effect_order_variant_specs(
        &self,
        spec: &Specification,
        max_variants: usize,
    ) -> Vec<Specification> {
        into_specs(self.effect_order_variants(spec, max_variants))
    }

    pub fn assertion_rephrasing_specs(
        &self,
        spec: &Specification,
        max_variants: usize,
    ) -> Vec<Specification> {
        into_specs(self.assertion_rephrasings(spec, max_variants))
    }

    pub fn all_variant_specs(&self, spec: &Specification, max_variants: usize) -> Vec<Specification> {
        into_specs(self.all_variants(spec, max_variants))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use steadfast_ir::Signature;

    fn average_spec() -> Specification {
        Specification::new(
            "Compute the average of a list of numbers",
            Signature::new("computeAverage")
                .with_parameter("numList", "list[float]")
                .returning("float"),
        )
        .with_effect("Log the call")
        .with_effect("Send a metrics ping")
        .with_assertion("len(numList) > 0")
    }

    #[test]
    fn naming_variants_cover_every_style() {
        let gen = VariantGenerator::new();
        let variants = gen.naming_variants(&average_spec());
        assert_eq!(variants.len(), NamingStyle::ALL.len());
        let names: Vec<_> = variants.iter().map(|v| v.spec.signature.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["compute_average", "computeAverage", "ComputeAverage", "COMPUTE_AVERAGE"]
        );
        let snake = &variants[0].spec;
        assert_eq!(snake.signature.parameters[0].name, "num_list");
        assert_eq!(snake.signature.parameters[0].ty, "list[float]");
        assert_eq!(snake.assertions, vec!["len(num_list) > 0"]);
        assert_eq!(snake.effects.len(), 2);
    }

    #[test]
    fn naming_leaves_input_untouched() {
        let spec = average_spec();
        let _ = VariantGenerator::new().naming_variants(&spec);
        assert_eq!(spec, average_spec());
    }

    #[test]
    fn two_independent_effects_give_one_reordering() {
        let gen = VariantGenerator::new();
        let variants = gen.effect_order_variants(&average_spec(), 10);
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].kind, VariantKind::EffectOrder { order: vec![1, 0] });
        assert_eq!(
            variants[0].spec.effects,
            vec!["Send a metrics ping", "Log the call"]
        );
    }

    #[test]
    fn dependent_effects_are_not_reordered() {
        let spec = Specification::new("store", Signature::new("store"))
            .with_effect("Read the result from cache")
            .with_effect("Write the result to cache");
        assert!(VariantGenerator::new().effect_order_variants(&spec, 5).is_empty());
    }

    #[test]
    fn single_effect_or_zero_budget_yields_nothing() {
        let gen = VariantGenerator::new();
        let one = Specification::new("x", Signature::new("f")).with_effect("Log the call");
        assert!(gen.effect_order_variants(&one, 5).is_empty());
        assert!(gen.effect_order_variants(&average_spec(), 0).is_empty());
    }

    #[test]
    fn effect_orders_respect_budget() {
        let spec = Specification::new("x", Signature::new("f"))
            .with_effect("Log the call")
            .with_effect("Send a metrics ping")
            .with_effect("Emit an audit event")
            .with_effect("Increment the counter");
        let variants = VariantGenerator::new().effect_order_variants(&spec, 4);
        assert_eq!(variants.len(), 4);
        assert!(variants.iter().all(|v| v.spec.effects != spec.effects));
    }

    #[test]
    fn rephrasing_replaces_one_predicate() {
        let spec = Specification::new("x", Signature::new("f"))
            .with_assertion("count > 0")
            .with_assertion("not done");
        let variants = VariantGenerator::new().assertion_rephrasings(&spec, 10);
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].spec.assertions, vec!["count >= 1", "not done"]);
        assert_eq!(variants[1].spec.assertions, vec!["count > 0", "done == false"]);
        assert_eq!(
            variants[1].kind,
            VariantKind::AssertionRephrasing {
                index: 1,
                rule: "not_to_eq_false".into()
            }
        );
    }

    #[test]
    fn rephrasing_is_truncated() {
        let spec = Specification::new("x", Signature::new("f")).with_assertion("len(xs) > 0");
        assert_eq!(VariantGenerator::new().assertion_rephrasings(&spec, 1).len(), 1);
    }

    #[test]
    fn all_variants_puts_naming_first_and_truncates() {
        let gen = VariantGenerator::new();
        let all = gen.all_variants(&average_spec(), 100);
        // 4 naming + 1 reorder + 2 rephrasings of `len(numList) > 0`.
        assert_eq!(all.len(), 7);
        assert!(matches!(all[0].kind, VariantKind::Naming { .. }));
        assert!(matches!(all[4].kind, VariantKind::EffectOrder { .. }));
        assert!(matches!(all[6].kind, VariantKind::AssertionRephrasing { .. }));

        let few = gen.all_variant_specs(&average_spec(), 3);
        assert_eq!(few.len(), 3);
    }

    #[test]
    fn bare_spec_only_gets_naming_variants() {
        let spec = Specification::new("", Signature::new("noop"));
        let all = VariantGenerator::new().all_variants(&spec, 10);
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn variant_kind_serializes_with_tag() {
        let kind = VariantKind::Naming {
            style: NamingStyle::CamelCase,
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["kind"], "naming");
        assert_eq!(json["style"], "camel_case");
    }
}
