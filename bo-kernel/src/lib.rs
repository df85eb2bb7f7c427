//! Kernel and mean-function library for the Bayesian optimization
//! surrogate (spec.md §4.1, §4.2).
//!
//! String parsing of kernel/mean grammars lives at the configuration
//! boundary in `bo-core`, not here (spec.md §9): this crate only deals
//! in constructed kernel/mean trees.

pub mod error;
pub mod kernel;
pub mod mean;
pub mod prior;

pub use error::KernelError;
pub use kernel::{
    CompositeKernel, ConstKernel, HammingKernel, Kernel, LinearArdKernel, LinearKernel,
    MaternArdKernel, MaternIsoKernel, MaternOrder, PolynomialKernel, RationalQuadraticIsoKernel,
    SeArdKernel, SeIsoKernel,
};
pub use mean::{ConstantMean, LinearConstantMean, LinearMean, Mean, OneMean, ZeroMean};
pub use prior::{KernelPriorSet, LogNormalPrior, MeanPriorSet, NormalPrior};
