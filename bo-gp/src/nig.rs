//! Normal-Inverse-Gamma prior on `(β, σ²)` used by the Student-t
//! surrogate flavour (spec.md §4.3, §6: `alpha`, `beta`, `delta`).

use serde::{Deserialize, Serialize};

/// `σ² ~ InvGamma(alpha, beta)`, `β | σ² ~ N(μ_β, σ² / delta · I)` on top
/// of the per-coefficient prior means/precisions already carried by the
/// mean function (`bo_kernel::MeanPriorSet`); `delta` uniformly scales
/// that prior's precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NigPrior {
    pub alpha: f64,
    pub beta: f64,
    pub delta: f64,
}

impl NigPrior {
    pub fn new(alpha: f64, beta: f64, delta: f64) -> Self {
        NigPrior { alpha, beta, delta }
    }

    /// The `StudentTProcessJef` label from the reference factory
    /// constructs a plain `StudentTProcessNIG`; spec.md §9 flags this as
    /// possibly intended to be distinct. Here it is an explicit, named
    /// synonym: a near-improper (Jeffreys-like) NIG prior, not a new
    /// surrogate flavour (see DESIGN.md).
    pub fn jeffreys() -> Self {
        NigPrior {
            alpha: 0.0,
            beta: 0.0,
            delta: 1e-10,
        }
    }
}

impl Default for NigPrior {
    fn default() -> Self {
        NigPrior::new(1.0, 1.0, 1.0)
    }
}
