//! The trained surrogate model (spec.md §4.3): one struct, one
//! `Flavor` enum selecting among the four regression treatments the
//! reference implementation spreads across four near-duplicate types.
//! All four share a single conjugate Bayesian-linear-regression code
//! path; the flavour only decides the prior precision `Λ0` placed on
//! the mean coefficients and how the residual sum of squares is turned
//! into a predictive scale.

use crate::cholesky::{self, CholeskyFactor};
use crate::distribution::PredictiveDistribution;
use crate::error::{GpError, Result};
use crate::nig::NigPrior;
use bo_kernel::{Kernel, KernelPriorSet, Mean, MeanPriorSet};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Which regression treatment `Surrogate` runs (spec.md §4.3 flavour
/// table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Flavor {
    /// Known, fixed process variance `σ²`; plain GLS on the mean
    /// coefficients (flat prior, `Λ0 = 0`).
    Gp { sigma2: f64 },
    /// `σ²` concentrated out at its MLE, `Σ ρᵢ² / n`; same flat-prior
    /// GLS mean fit as `Gp`.
    GpMl,
    /// `GpMl`'s concentrated `σ²`, but the mean coefficients carry a
    /// proper `Normal(μ_β, σ_β²)` prior instead of a flat one.
    GpNormal,
    /// Full Normal-Inverse-Gamma conjugate treatment: both `β` and `σ²`
    /// are integrated out, yielding a Student-t predictive.
    StudentT { nig: NigPrior },
}

impl Flavor {
    fn is_bayesian_mean(&self) -> bool {
        matches!(self, Flavor::GpNormal | Flavor::StudentT { .. })
    }
}

/// Everything derived from a fit that `predict` needs, invalidated
/// whenever the sample set or hyperparameters change.
#[derive(Debug, Clone)]
struct Cache {
    /// `L⁻¹ Φᵀ`, `n × m`.
    v: Array2<f64>,
    /// `L⁻¹ y`, `n`.
    z: Array1<f64>,
    /// Posterior precision `Λn = Λ0 + VᵀV`, `m × m`.
    lambda_n: Array2<f64>,
    /// Lower Cholesky factor of `lambda_n`, for the small `m × m` solves.
    lambda_n_l: Array2<f64>,
    /// Posterior mean coefficients.
    mu_n: Array1<f64>,
    /// Whitened residual `z - V μn`, `n`.
    rho: Array1<f64>,
    /// Point estimate of the process variance (Gaussian flavours).
    sigma2: f64,
    /// NIG posterior shape/rate (Student-t flavour only).
    nig_an: f64,
    nig_bn: f64,
}

/// A fitted (or fittable) surrogate model: kernel, mean, their priors,
/// the observed samples, and the cached Cholesky factor / regression
/// state derived from the last `fit` or `update`.
#[derive(Debug, Clone)]
pub struct Surrogate {
    kernel: Box<dyn Kernel>,
    mean: Box<dyn Mean>,
    kernel_prior: KernelPriorSet,
    mean_prior: MeanPriorSet,
    flavor: Flavor,
    nugget: f64,
    x: Vec<Array1<f64>>,
    y: Vec<f64>,
    chol: CholeskyFactor,
    cache: Option<Cache>,
}

impl Surrogate {
    pub fn new(
        kernel: Box<dyn Kernel>,
        mean: Box<dyn Mean>,
        kernel_prior: KernelPriorSet,
        mean_prior: MeanPriorSet,
        flavor: Flavor,
        nugget: f64,
    ) -> Self {
        Surrogate {
            kernel,
            mean,
            kernel_prior,
            mean_prior,
            flavor,
            nugget,
            x: Vec::new(),
            y: Vec::new(),
            chol: CholeskyFactor::with_capacity(0),
            cache: None,
        }
    }

    pub fn n_samples(&self) -> usize {
        self.x.len()
    }

    pub fn kernel(&self) -> &dyn Kernel {
        self.kernel.as_ref()
    }

    pub fn mean_fn(&self) -> &dyn Mean {
        self.mean.as_ref()
    }

    pub fn flavor(&self) -> &Flavor {
        &self.flavor
    }

    /// Flattened kernel hyperparameters (the learner optimizes over
    /// these; spec.md §4.4).
    pub fn hyperparameters(&self) -> Vec<f64> {
        self.kernel.get_hp()
    }

    pub fn set_hyperparameters(&mut self, theta: &[f64]) -> Result<()> {
        self.kernel.set_hp(theta)?;
        Ok(())
    }

    pub fn kernel_prior(&self) -> &KernelPriorSet {
        &self.kernel_prior
    }

    fn x_matrix(&self) -> Array2<f64> {
        let n = self.x.len();
        let d = if n > 0 { self.x[0].len() } else { 0 };
        let mut m = Array2::<f64>::zeros((n, d));
        for (i, row) in self.x.iter().enumerate() {
            m.row_mut(i).assign(row);
        }
        m
    }

    /// `Λ0` diagonal from the mean-coefficient priors, scaled by `delta`
    /// for the Student-t flavour, or all-zero (flat / GLS) otherwise.
    fn lambda0_diag(&self, m: usize) -> Array1<f64> {
        if !self.flavor.is_bayesian_mean() {
            return Array1::zeros(m);
        }
        let delta = match &self.flavor {
            Flavor::StudentT { nig } => nig.delta,
            _ => 1.0,
        };
        Array1::from_iter((0..m).map(|i| {
            let p = self.mean_prior.0.get(i).copied().unwrap_or_else(bo_kernel::NormalPrior::fixed);
            if p.is_fixed() || p.std <= 0.0 {
                0.0
            } else {
                delta / (p.std * p.std)
            }
        }))
    }

    fn mu0(&self, m: usize) -> Array1<f64> {
        Array1::from_iter((0..m).map(|i| self.mean_prior.0.get(i).map(|p| p.mean).unwrap_or(0.0)))
    }

    /// Append a raw observation without touching the Cholesky factor or
    /// the regression cache (spec.md §4.3 `add_sample`: distinct from
    /// `update`, which also performs the incremental refit).
    pub fn add_sample(&mut self, x: Array1<f64>, y: f64) {
        self.x.push(x);
        self.y.push(y);
    }

    /// Replace the whole sample set and refit from scratch.
    pub fn set_samples(&mut self, x: &ArrayView2<f64>, y: &[f64]) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(GpError::DimensionMismatch {
                expected: x.nrows(),
                found: y.len(),
            });
        }
        self.x = x.axis_iter(Axis(0)).map(|r| r.to_owned()).collect();
        self.y = y.to_vec();
        self.fit()
    }

    /// Full refactor: rebuild `K` from scratch and recompute the
    /// regression cache (spec.md §4.3 `fit`).
    pub fn fit(&mut self) -> Result<()> {
        let n = self.x.len();
        if n == 0 {
            return Err(GpError::EmptySampleSet);
        }
        let xm = self.x_matrix();
        let mut k = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            for j in 0..=i {
                let kij = self.kernel.evaluate(self.x[i].as_slice().unwrap(), self.x[j].as_slice().unwrap())
                    + if i == j { self.nugget } else { 0.0 };
                k[[i, j]] = kij;
                k[[j, i]] = kij;
            }
        }
        self.chol.reset_from(&k.view())?;
        self.recompute_cache(&xm)
    }

    /// Incremental update: append the sample, rank-1 extend the
    /// Cholesky factor, and refresh the cache in `O(n²)`. Falls back to
    /// a full `fit` (and, if that also fails, rolls the sample back
    /// out) when the rank-1 append loses positive-definiteness (spec.md
    /// §4.3 numerical contract).
    pub fn update(&mut self, x: Array1<f64>, y: f64) -> Result<()> {
        let k_star_star = self.kernel.evaluate(x.as_slice().unwrap(), x.as_slice().unwrap()) + self.nugget;
        let k_star: Array1<f64> = self
            .x
            .iter()
            .map(|xi| self.kernel.evaluate(xi.as_slice().unwrap(), x.as_slice().unwrap()))
            .collect();

        self.x.push(x);
        self.y.push(y);

        match self.chol.append(&k_star.view(), k_star_star) {
            Ok(()) => {
                let xm = self.x_matrix();
                self.recompute_cache(&xm)
            }
            Err(_) => {
                log::warn!(
                    "Cholesky rank-1 append lost positive-definiteness at n={}, falling back to a full fit",
                    self.x.len()
                );
                match self.fit() {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        log::error!("full refactor also failed after a duplicate/near-duplicate sample: {e}");
                        self.x.pop();
                        self.y.pop();
                        Err(e)
                    }
                }
            }
        }
    }

    /// Recompute `v`, `z`, `Λn`, `μn`, `ρ` and the flavour-specific
    /// variance terms from the *current* Cholesky factor (shared by
    /// `fit` and the append path of `update`).
    fn recompute_cache(&mut self, xm: &Array2<f64>) -> Result<()> {
        let n = self.x.len();
        let m = self.mean.n_coef();
        let l = self.chol.l();

        let phi = self.mean.features_all(&xm.view()); // m x n
        let ft = phi.t().to_owned(); // n x m
        let v = cholesky::solve_lower_mat(&l, &ft.view());
        let y_arr = Array1::from_vec(self.y.clone());
        let z = cholesky::solve_lower(&l, &y_arr.view());

        let lambda0_diag = self.lambda0_diag(m);
        let mu0 = self.mu0(m);

        let mut lambda_n = v.t().dot(&v);
        for i in 0..m {
            lambda_n[[i, i]] += lambda0_diag[i];
        }
        let rhs = {
            let mut r = v.t().dot(&z);
            for i in 0..m {
                r[i] += lambda0_diag[i] * mu0[i];
            }
            r
        };

        let (mu_n, lambda_n_l) = if m == 0 {
            (Array1::zeros(0), Array2::zeros((0, 0)))
        } else {
            let chol_small = cholesky::decompose(&lambda_n.view())
                .map_err(|_| GpError::SingularDesignMatrix)?;
            let yb = cholesky::solve_lower(&chol_small.view(), &rhs.view());
            let mu_n = cholesky::solve_lower_transpose(&chol_small.view(), &yb.view());
            (mu_n, chol_small)
        };

        let rho = &z - &v.dot(&mu_n);

        let (sigma2, nig_an, nig_bn) = match &self.flavor {
            Flavor::Gp { sigma2 } => (*sigma2, 0.0, 0.0),
            Flavor::GpMl | Flavor::GpNormal => (rho.dot(&rho) / n as f64, 0.0, 0.0),
            Flavor::StudentT { nig } => {
                let an = nig.alpha + n as f64 / 2.0;
                let quad_prior = mu0.dot(&{
                    let mut lam0_mu0 = mu0.clone();
                    for i in 0..m {
                        lam0_mu0[i] = lambda0_diag[i] * mu0[i];
                    }
                    lam0_mu0
                });
                let quad_post = mu_n.dot(&lambda_n.dot(&mu_n));
                let bn = nig.beta + 0.5 * (z.dot(&z) + quad_prior - quad_post);
                (bn / an.max(1e-300), an, bn)
            }
        };

        self.cache = Some(Cache {
            v,
            z,
            lambda_n,
            lambda_n_l,
            mu_n,
            rho,
            sigma2,
            nig_an,
            nig_bn,
        });
        Ok(())
    }

    fn cache(&self) -> Result<&Cache> {
        self.cache.as_ref().ok_or(GpError::EmptySampleSet)
    }

    /// Predict the response at `x` (spec.md §4.3 `predict`).
    pub fn predict(&self, x: &[f64]) -> Result<PredictiveDistribution> {
        let cache = self.cache()?;
        let n = self.x.len();
        let m = self.mean.n_coef();
        let l = self.chol.l();

        let k_x: Array1<f64> = self
            .x
            .iter()
            .map(|xi| self.kernel.evaluate(xi.as_slice().unwrap(), x))
            .collect();
        let r = cholesky::solve_lower(&l, &k_x.view());

        let phi_x = self.mean.features(x);
        let mean_x = phi_x.dot(&cache.mu_n) + r.dot(&cache.rho);

        let base_var = (self.kernel.evaluate(x, x) + self.nugget - r.dot(&r)).max(0.0);

        let extra_var = if m == 0 {
            0.0
        } else {
            let phi_tilde = &phi_x - &cache.v.t().dot(&r);
            let yb = cholesky::solve_lower(&cache.lambda_n_l.view(), &phi_tilde.view());
            let u = cholesky::solve_lower_transpose(&cache.lambda_n_l.view(), &yb.view());
            phi_tilde.dot(&u)
        };

        let v0 = (base_var + extra_var).max(0.0);
        if !v0.is_finite() {
            return Err(GpError::NonFiniteVariance);
        }

        match &self.flavor {
            Flavor::StudentT { nig } => {
                let dof = (n as f64 - m as f64 + 2.0 * nig.alpha).max(1e-6);
                let scale2 = (cache.nig_bn / cache.nig_an.max(1e-300)) * v0;
                Ok(PredictiveDistribution::student_t(mean_x, scale2.max(1e-300).sqrt(), dof))
            }
            _ => {
                let variance = cache.sigma2 * v0;
                Ok(PredictiveDistribution::gaussian(mean_x, variance.max(0.0).sqrt()))
            }
        }
    }

    /// Negative log marginal likelihood at the current hyperparameters
    /// (spec.md §4.4: minimized in `log θ` space by the hyperparameter
    /// learner). Requires a current fit.
    pub fn neg_log_likelihood(&self) -> Result<f64> {
        let cache = self.cache()?;
        let n = self.x.len() as f64;
        let m = self.mean.n_coef();
        let log_det_k = self.chol.log_det();

        let log_det_lambda0 = if m == 0 {
            0.0
        } else {
            self.lambda0_diag(m)
                .iter()
                .filter(|d| **d > 0.0)
                .map(|d| d.ln())
                .sum::<f64>()
        };
        let log_det_lambda_n = if m == 0 {
            0.0
        } else {
            (0..m).map(|i| cache.lambda_n_l[[i, i]].ln()).sum::<f64>() * 2.0
        };

        let nll = match &self.flavor {
            Flavor::Gp { sigma2 } => {
                0.5 * (cache.rho.dot(&cache.rho) / sigma2 + n * sigma2.ln() + log_det_k + n * (2.0 * PI).ln())
            }
            Flavor::GpMl => {
                // concentrated likelihood: sigma2 already the MLE, so the
                // quadratic term collapses to n/2.
                0.5 * (n + n * cache.sigma2.ln() + log_det_k + n * (2.0 * PI).ln())
            }
            Flavor::GpNormal => {
                let mu0 = self.mu0(m);
                let lambda0_diag = self.lambda0_diag(m);
                let quad_prior: f64 = (0..m).map(|i| lambda0_diag[i] * mu0[i] * mu0[i]).sum();
                let quad_post = cache.mu_n.dot(&cache.lambda_n.dot(&cache.mu_n));
                let quad = cache.z.dot(&cache.z) + quad_prior - quad_post;
                0.5 * log_det_lambda_n - 0.5 * log_det_lambda0
                    + 0.5 * quad / cache.sigma2
                    + 0.5 * n * (2.0 * PI * cache.sigma2).ln()
                    + 0.5 * log_det_k
            }
            Flavor::StudentT { nig } => {
                let a0 = nig.alpha;
                let b0 = nig.beta.max(1e-300);
                -(-0.5 * n * (2.0 * PI).ln() - 0.5 * log_det_lambda_n + 0.5 * log_det_lambda0
                    + a0 * b0.ln()
                    - cache.nig_an * cache.nig_bn.max(1e-300).ln()
                    + crate::distribution::ln_gamma(cache.nig_an)
                    - crate::distribution::ln_gamma(a0.max(1e-300))
                    - 0.5 * log_det_k)
            }
        };
        Ok(nll)
    }

    /// Negative leave-one-out log pseudo-likelihood (Rasmussen & Williams
    /// eq. 5.12), used by the `Loo` hyperparameter-learning mode. Treats
    /// the mean as fixed at its current posterior estimate rather than
    /// refitting it per fold, which is the standard practical
    /// approximation when `m` is small relative to `n`.
    pub fn neg_loo_log_pseudo_likelihood(&self) -> Result<f64> {
        let cache = self.cache()?;
        let n = self.x.len();
        let l = self.chol.l();
        let alpha = cholesky::solve_lower_transpose(&l, &cache.rho.view());

        let mut k_inv_diag = Array1::<f64>::zeros(n);
        for i in 0..n {
            let mut e = Array1::<f64>::zeros(n);
            e[i] = 1.0;
            let col = self.chol.solve(&e.view());
            k_inv_diag[i] = col[i];
        }

        let sum: f64 = (0..n)
            .map(|i| {
                let kii = k_inv_diag[i].max(1e-300);
                -0.5 * (1.0 / kii).ln() - 0.5 * alpha[i] * alpha[i] / kii - 0.5 * (2.0 * PI).ln()
            })
            .sum();
        Ok(-sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use bo_kernel::{SeIsoKernel, ZeroMean};
    use ndarray::array;

    fn toy(flavor: Flavor) -> Surrogate {
        Surrogate::new(
            Box::new(SeIsoKernel::new(1.0)),
            Box::new(ZeroMean),
            KernelPriorSet::fixed(1),
            MeanPriorSet::fixed(0),
            flavor,
            1e-8,
        )
    }

    #[test]
    fn gp_ml_interpolates_training_points() {
        let mut s = toy(Flavor::GpMl);
        let x = array![[0.0], [0.5], [1.0]];
        let y = vec![0.0, 1.0, 0.0];
        s.set_samples(&x.view(), &y).unwrap();
        let pred = s.predict(&[0.5]).unwrap();
        assert_abs_diff_eq!(pred.mean, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn update_matches_full_fit() {
        let x = array![[0.0], [0.5], [1.0]];
        let y = vec![0.2, 0.9, 0.1];

        let mut incremental = toy(Flavor::GpMl);
        incremental.set_samples(&array![[0.0], [0.5]].view(), &[0.2, 0.9]).unwrap();
        incremental.update(array![1.0], 0.1).unwrap();

        let mut batch = toy(Flavor::GpMl);
        batch.set_samples(&x.view(), &y).unwrap();

        let p_inc = incremental.predict(&[0.3]).unwrap();
        let p_batch = batch.predict(&[0.3]).unwrap();
        assert_abs_diff_eq!(p_inc.mean, p_batch.mean, epsilon = 1e-6);
        assert_abs_diff_eq!(p_inc.scale, p_batch.scale, epsilon = 1e-6);
    }

    #[test]
    fn student_t_predictive_has_finite_dof() {
        let mut s = toy(Flavor::StudentT { nig: NigPrior::default() });
        let x = array![[0.0], [0.5], [1.0], [0.25]];
        let y = vec![0.2, 0.9, 0.1, 0.5];
        s.set_samples(&x.view(), &y).unwrap();
        let pred = s.predict(&[0.6]).unwrap();
        assert!(pred.dof.is_finite());
        assert!(pred.dof > 0.0);
    }

    #[test]
    fn predicting_before_fit_is_an_error() {
        let s = toy(Flavor::GpMl);
        assert!(s.predict(&[0.0]).is_err());
    }
}
