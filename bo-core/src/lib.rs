//! The sequential Bayesian optimization loop (spec.md): configuration,
//! the kernel/mean/criterion string-grammar parser, persisted state,
//! and the resumable `BoOptimizer` driver built on `bo-gp`,
//! `bo-criterion`, `bo-optimizer` and `bo-doe`.

pub mod bo;
pub mod config;
pub mod error;
pub mod parser;
pub mod state;

pub use bo::{BoOptimizer, ObjectiveFn, Phase};
pub use config::{BoConfig, InitMethod, KernelSpec, MeanSpec, ScType, SurrName, VerboseLevel};
pub use error::BoError;
pub use parser::{parse_criterion, parse_kernel, parse_mean, ParsedCriterion, ParsedKernel, ParsedMean};
pub use state::BoState;
