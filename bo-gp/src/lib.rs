//! Surrogate model layer (spec.md §4.3, §4.4): Cholesky-based Gaussian
//! and Student-t process regression, plus the hyperparameter learner
//! that drives the kernel's `θ` toward the (MAP-penalized) maximum
//! likelihood estimate.

pub mod cholesky;
pub mod distribution;
pub mod error;
pub mod hyperparam;
pub mod nig;
pub mod surrogate;

pub use cholesky::CholeskyFactor;
pub use distribution::PredictiveDistribution;
pub use error::GpError;
pub use hyperparam::{HyperparamLearner, LearnerMode};
pub use nig::NigPrior;
pub use surrogate::{Flavor, Surrogate};
