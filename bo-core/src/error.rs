//! The crate-wide error type (spec.md §7): the five error kinds the
//! core distinguishes, each carrying enough context to name the
//! offending operation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoError {
    /// Unknown kernel/mean/criterion name, hyperparameter-count
    /// mismatch, dimension mismatch — surfaced immediately from the
    /// constructor, before any mutation.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Cholesky failure after refactor, singular design matrix,
    /// non-finite predictive variance.
    #[error("numerical error: {0}")]
    Numerical(#[from] bo_gp::GpError),

    /// The inner optimizer returned a point outside `[0,1]^d` more than
    /// `force_jump` times in a row.
    #[error("optimizer error: inner optimizer failed to return a feasible point after {attempts} attempts")]
    Optimizer { attempts: usize },

    /// The objective callback raised; propagated unchanged.
    #[error("objective callback failed: {0}")]
    Objective(String),

    /// `restore` requested on an incompatible state (version or
    /// dimension mismatch); surfaced before any mutation.
    #[error("state error: {0}")]
    State(String),
}

impl From<bo_kernel::KernelError> for BoError {
    fn from(e: bo_kernel::KernelError) -> Self {
        BoError::Configuration(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BoError>;
