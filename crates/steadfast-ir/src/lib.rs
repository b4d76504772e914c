#![doc = include_str!("../README.md")]

//! Steadfast intermediate representation.
//!
//! This crate defines the structured [`Specification`] consumed and produced
//! by the variant generator and equivalence checker, identifier naming
//! transforms, and the heuristic effect dependency graph used to bound
//! effect reorderings.

pub mod dependency;
pub mod naming;
pub mod spec;

pub use dependency::{EffectDependencyGraph, Orderings};
pub use naming::NamingStyle;
pub use spec::{Parameter, Signature, SpecError, Specification};
