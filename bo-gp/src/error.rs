use thiserror::Error;

/// Numerical and configuration errors raised by the surrogate (spec.md §7).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GpError {
    #[error("{operation}: matrix is not positive definite after refactor")]
    NotPositiveDefinite { operation: &'static str },

    #[error("design matrix F is singular or ill-conditioned for the given mean model")]
    SingularDesignMatrix,

    #[error("predictive variance is not finite")]
    NonFiniteVariance,

    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("operation requires at least one sample, but the sample set is empty")]
    EmptySampleSet,

    #[error(transparent)]
    Kernel(#[from] bo_kernel::KernelError),
}

pub type Result<T> = std::result::Result<T, GpError>;
