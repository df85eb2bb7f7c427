use thiserror::Error;

/// Errors raised while configuring or evaluating a kernel or mean function.
///
/// These are always configuration-time errors (spec.md §7, "Configuration
/// error"): wrong hyperparameter counts, dimension mismatches, or an
/// unrecognised combinator in a parsed kernel expression.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum KernelError {
    #[error("hyperparameter count mismatch: expected {expected}, found {found}")]
    HpCountMismatch { expected: usize, found: usize },

    #[error("coefficient count mismatch: expected {expected}, found {found}")]
    CoefCountMismatch { expected: usize, found: usize },

    #[error("input dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("unknown kernel name '{0}'")]
    UnknownKernel(String),

    #[error("unknown mean name '{0}'")]
    UnknownMean(String),

    #[error("invalid kernel expression '{0}'")]
    InvalidExpression(String),
}

pub type Result<T> = std::result::Result<T, KernelError>;
