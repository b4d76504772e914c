#![doc = include_str!("../README.md")]

pub mod wilcoxon;

pub use wilcoxon::{
    wilcoxon_signed_rank, Alternative, StatisticalTestResult, StatsError, TestMethod,
    SIGNIFICANCE_LEVEL,
};
