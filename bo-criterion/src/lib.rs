//! Acquisition criteria and the GP-Hedge portfolio (spec.md §4.5).

pub mod criterion;
pub mod hedge;

pub use criterion::{
    AOptimality, Criterion, ExpectedImprovement, GreedyMean, LowerConfidenceBound,
    ProbabilityOfImprovement, ThompsonSampling,
};
pub use hedge::Hedge;
