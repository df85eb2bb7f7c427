//! Per-hyperparameter priors (spec.md §3): a log-normal prior on each
//! kernel hyperparameter, and a normal prior on each mean coefficient.
//! A zero standard deviation means "no prior / fixed point estimate".

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Log-normal prior on a single (positive) kernel hyperparameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogNormalPrior {
    pub mean: f64,
    pub std: f64,
}

impl LogNormalPrior {
    pub fn new(mean: f64, std: f64) -> Self {
        LogNormalPrior { mean, std }
    }

    pub fn fixed() -> Self {
        LogNormalPrior { mean: 0.0, std: 0.0 }
    }

    pub fn is_fixed(&self) -> bool {
        self.std <= 0.0
    }

    /// `log p(θ)` under `log θ ~ N(mean, std²)`, or `0` when fixed.
    pub fn log_pdf(&self, theta: f64) -> f64 {
        if self.is_fixed() || theta <= 0.0 {
            return 0.0;
        }
        let lt = theta.ln();
        let z = (lt - self.mean) / self.std;
        -0.5 * z * z - lt - self.std.ln() - 0.5 * (2.0 * PI).ln()
    }

    /// `d/dθ log p(θ)`, used by MAP/MLE gradient-free learners as a
    /// penalty term (finite-differenced by the learner when needed); an
    /// analytic form is provided here because it is cheap and exact.
    pub fn dlog_pdf(&self, theta: f64) -> f64 {
        if self.is_fixed() || theta <= 0.0 {
            return 0.0;
        }
        let lt = theta.ln();
        let z = (lt - self.mean) / self.std;
        -(z / self.std + 1.0) / theta
    }
}

/// Normal prior on a single mean coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalPrior {
    pub mean: f64,
    pub std: f64,
}

impl NormalPrior {
    pub fn new(mean: f64, std: f64) -> Self {
        NormalPrior { mean, std }
    }

    pub fn fixed() -> Self {
        NormalPrior { mean: 0.0, std: 0.0 }
    }

    pub fn is_fixed(&self) -> bool {
        self.std <= 0.0
    }

    pub fn log_pdf(&self, beta: f64) -> f64 {
        if self.is_fixed() {
            return 0.0;
        }
        let z = (beta - self.mean) / self.std;
        -0.5 * z * z - self.std.ln() - 0.5 * (2.0 * PI).ln()
    }
}

/// Per-hyperparameter priors matching a flattened kernel `θ` vector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KernelPriorSet(pub Vec<LogNormalPrior>);

impl KernelPriorSet {
    pub fn fixed(n: usize) -> Self {
        KernelPriorSet(vec![LogNormalPrior::fixed(); n])
    }

    pub fn log_pdf(&self, theta: &[f64]) -> f64 {
        self.0
            .iter()
            .zip(theta.iter())
            .map(|(p, t)| p.log_pdf(*t))
            .sum()
    }
}

/// Per-coefficient priors matching a mean `β` vector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeanPriorSet(pub Vec<NormalPrior>);

impl MeanPriorSet {
    pub fn fixed(n: usize) -> Self {
        MeanPriorSet(vec![NormalPrior::fixed(); n])
    }

    pub fn log_pdf(&self, beta: &[f64]) -> f64 {
        self.0
            .iter()
            .zip(beta.iter())
            .map(|(p, b)| p.log_pdf(*b))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn fixed_prior_contributes_nothing() {
        let p = LogNormalPrior::fixed();
        assert_abs_diff_eq!(p.log_pdf(5.0), 0.0);
    }

    #[test]
    fn lognormal_peaks_near_its_mode() {
        let p = LogNormalPrior::new(0.0, 1.0);
        // mode of a lognormal(mu, sigma) is exp(mu - sigma^2)
        let mode = (0.0f64 - 1.0).exp();
        assert!(p.log_pdf(mode) > p.log_pdf(mode * 10.0));
        assert!(p.log_pdf(mode) > p.log_pdf(mode / 10.0));
    }
}
