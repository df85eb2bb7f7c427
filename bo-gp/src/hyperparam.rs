//! Hyperparameter learner (spec.md §4.4): fixed θ, empirical ML/MAP/Loo
//! search via the inner optimizer over log10-θ space, or MCMC (step-out
//! slice sampling) over the posterior.

use crate::error::Result;
use crate::surrogate::Surrogate;
use bo_optimizer::{maximize, OptimizerConfig};
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// `log10(θ)` search bounds, matching the reference implementation's
/// Cobyla box constraints (`θ` component-wise in `[1e-6, 1e2]`).
const LOG_THETA_LOW: f64 = -6.0;
const LOG_THETA_HIGH: f64 = 2.0;

/// Which of the three learning strategies `HyperparamLearner::relearn`
/// runs (spec.md §4.4, `sc_type`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LearnerMode {
    /// θ fixed at construction; `relearn` is a no-op.
    Fixed,
    /// Maximum likelihood.
    Ml,
    /// Maximum a posteriori (likelihood plus the kernel's own prior).
    Map,
    /// Leave-one-out empirical pseudo-likelihood.
    Loo,
    /// Step-out slice sampling of the posterior, averaging predictive
    /// moments over the kept draws.
    Mcmc { n_samples: usize, burn_in: usize },
}

/// Drives `Surrogate::set_hyperparameters` / `fit` according to a
/// `LearnerMode` and a relearn cadence (spec.md §4.7 step 1,
/// `n_iter_relearn`).
#[derive(Debug, Clone)]
pub struct HyperparamLearner {
    pub mode: LearnerMode,
    /// Relearn every `n_iter_relearn` completed iterations; `0` = never.
    pub n_iter_relearn: usize,
    pub seed: u64,
}

impl HyperparamLearner {
    pub fn new(mode: LearnerMode, n_iter_relearn: usize, seed: u64) -> Self {
        HyperparamLearner {
            mode,
            n_iter_relearn,
            seed,
        }
    }

    /// `true` exactly at iterations `{n_iter_relearn, 2·n_iter_relearn, …}`
    /// (spec.md §8 scenario 4), never at iteration `0`.
    pub fn should_relearn(&self, iteration: usize) -> bool {
        self.n_iter_relearn > 0 && iteration > 0 && iteration % self.n_iter_relearn == 0
    }

    /// Run this learner's mode, leaving `surrogate` refit at the
    /// winning hyperparameters. Requires `surrogate` to already hold a
    /// fit (so the starting θ and sample set are available).
    pub fn relearn(&self, surrogate: &mut Surrogate) -> Result<()> {
        match self.mode {
            LearnerMode::Fixed => Ok(()),
            LearnerMode::Ml => self.empirical(surrogate, Self::neg_log_likelihood_score, false),
            LearnerMode::Map => self.empirical(surrogate, Self::neg_log_likelihood_score, true),
            LearnerMode::Loo => self.empirical(surrogate, Self::loo_score, false),
            LearnerMode::Mcmc { n_samples, burn_in } => self.mcmc(surrogate, n_samples, burn_in),
        }
    }

    fn neg_log_likelihood_score(surrogate: &Surrogate) -> Result<f64> {
        surrogate.neg_log_likelihood().map(|nll| -nll)
    }

    fn loo_score(surrogate: &Surrogate) -> Result<f64> {
        surrogate.neg_loo_log_pseudo_likelihood().map(|nll| -nll)
    }

    /// Fit `surrogate` at `theta` and score it with `score`, optionally
    /// adding the kernel prior's log density (MAP). Non-finite / failed
    /// fits score `-∞` so the optimizer routes around them.
    fn try_theta(
        surrogate: &mut Surrogate,
        theta: &[f64],
        score: fn(&Surrogate) -> Result<f64>,
        with_prior: bool,
    ) -> f64 {
        if surrogate.set_hyperparameters(theta).is_err() || surrogate.fit().is_err() {
            return f64::NEG_INFINITY;
        }
        match score(surrogate) {
            Ok(v) if v.is_finite() => {
                if with_prior {
                    v + surrogate.kernel_prior().log_pdf(theta)
                } else {
                    v
                }
            }
            _ => f64::NEG_INFINITY,
        }
    }

    fn unit_to_theta(unit: &[f64]) -> Vec<f64> {
        unit.iter()
            .map(|u| 10f64.powf(LOG_THETA_LOW + u * (LOG_THETA_HIGH - LOG_THETA_LOW)))
            .collect()
    }

    fn empirical(
        &self,
        surrogate: &mut Surrogate,
        score: fn(&Surrogate) -> Result<f64>,
        with_prior: bool,
    ) -> Result<()> {
        let d = surrogate.hyperparameters().len();
        if d == 0 {
            return surrogate.fit();
        }
        let config = OptimizerConfig::for_dimension(d, self.seed);
        let mut work = surrogate.clone();
        let (best_unit, _) = maximize(
            d,
            |unit| {
                let theta = Self::unit_to_theta(unit);
                Self::try_theta(&mut work, &theta, score, with_prior)
            },
            &config,
        );
        let theta = Self::unit_to_theta(&best_unit);
        surrogate.set_hyperparameters(&theta)?;
        surrogate.fit()
    }

    /// `K` posterior θ draws via step-out slice sampling (Neal 2003),
    /// after discarding `burn_in`. Leaves `surrogate` set to the
    /// coordinate-wise mean of the kept draws; criteria that integrate
    /// over the full sample set should call `posterior_samples` instead
    /// and average predictive moments themselves (spec.md §4.5).
    fn mcmc(&self, surrogate: &mut Surrogate, n_samples: usize, burn_in: usize) -> Result<()> {
        let samples = self.posterior_samples(surrogate, n_samples, burn_in)?;
        let d = samples.first().map(|s| s.len()).unwrap_or(0);
        if d == 0 {
            return surrogate.fit();
        }
        let mut mean_theta = vec![0.0; d];
        for s in &samples {
            for (i, v) in s.iter().enumerate() {
                mean_theta[i] += v / samples.len() as f64;
            }
        }
        surrogate.set_hyperparameters(&mean_theta)?;
        surrogate.fit()
    }

    /// Draw `n_samples` posterior θ samples (after `burn_in` discarded
    /// draws), each coordinate of `log10(θ)` sliced in turn.
    pub fn posterior_samples(
        &self,
        surrogate: &Surrogate,
        n_samples: usize,
        burn_in: usize,
    ) -> Result<Vec<Vec<f64>>> {
        let d = surrogate.hyperparameters().len();
        if d == 0 {
            return Ok(Vec::new());
        }
        let mut work = surrogate.clone();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.seed);
        let mut log_theta: Vec<f64> = surrogate.hyperparameters().iter().map(|t| t.log10()).collect();

        let total = burn_in + n_samples;
        let mut kept = Vec::with_capacity(n_samples);
        for it in 0..total {
            for i in 0..d {
                log_theta = slice_step(&mut work, log_theta, i, &mut rng);
            }
            if it >= burn_in {
                kept.push(log_theta.iter().map(|v| 10f64.powf(*v)).collect());
            }
        }
        Ok(kept)
    }
}

/// One step-out slice-sampling update (Neal 2003 §3) of coordinate `i`
/// of `log_theta`, bounded to `[LOG_THETA_LOW, LOG_THETA_HIGH]`.
fn slice_step(surrogate: &mut Surrogate, log_theta: Vec<f64>, i: usize, rng: &mut impl Rng) -> Vec<f64> {
    let width = (LOG_THETA_HIGH - LOG_THETA_LOW) / 20.0;
    let eval = |surrogate: &mut Surrogate, log_x: &[f64]| -> f64 {
        let theta: Vec<f64> = log_x.iter().map(|v| 10f64.powf(*v)).collect();
        HyperparamLearner::try_theta(surrogate, &theta, |s| s.neg_log_likelihood().map(|n| -n), true)
    };
    let mut x = log_theta.clone();
    let f0 = eval(surrogate, &x);
    let y_level = f0 + rng.gen::<f64>().max(1e-300).ln();

    let u: f64 = rng.gen();
    let mut left = (x[i] - width * u).max(LOG_THETA_LOW);
    let mut right = (left + width).min(LOG_THETA_HIGH);

    let max_steps = 16;
    let mut steps = 0;
    while left > LOG_THETA_LOW && steps < max_steps {
        x[i] = left;
        if eval(surrogate, &x) <= y_level {
            break;
        }
        left = (left - width).max(LOG_THETA_LOW);
        steps += 1;
    }
    steps = 0;
    while right < LOG_THETA_HIGH && steps < max_steps {
        x[i] = right;
        if eval(surrogate, &x) <= y_level {
            break;
        }
        right = (right + width).min(LOG_THETA_HIGH);
        steps += 1;
    }

    let mut result = log_theta;
    for _ in 0..max_steps {
        let candidate = left + rng.gen::<f64>() * (right - left);
        x[i] = candidate;
        if eval(surrogate, &x) > y_level {
            result[i] = candidate;
            return result;
        }
        if candidate < result[i] {
            left = candidate;
        } else {
            right = candidate;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nig::NigPrior;
    use crate::surrogate::Flavor;
    use bo_kernel::{KernelPriorSet, LogNormalPrior, MeanPriorSet, SeIsoKernel, ZeroMean};
    use ndarray::array;

    fn toy() -> Surrogate {
        let mut s = Surrogate::new(
            Box::new(SeIsoKernel::new(1.0)),
            Box::new(ZeroMean),
            KernelPriorSet(vec![LogNormalPrior::new(0.0, 1.0)]),
            MeanPriorSet::fixed(0),
            Flavor::GpMl,
            1e-8,
        );
        let x = array![[0.0], [0.25], [0.5], [0.75], [1.0]];
        let y = vec![0.1, 0.9, 0.2, 0.8, 0.0];
        s.set_samples(&x.view(), &y).unwrap();
        s
    }

    #[test]
    fn fixed_mode_leaves_hyperparameters_untouched() {
        let mut s = toy();
        let before = s.hyperparameters();
        let learner = HyperparamLearner::new(LearnerMode::Fixed, 1, 0);
        learner.relearn(&mut s).unwrap();
        assert_eq!(before, s.hyperparameters());
    }

    #[test]
    fn ml_relearn_improves_or_matches_likelihood() {
        let mut s = toy();
        let before = s.neg_log_likelihood().unwrap();
        let learner = HyperparamLearner::new(LearnerMode::Ml, 1, 123);
        learner.relearn(&mut s).unwrap();
        let after = s.neg_log_likelihood().unwrap();
        assert!(after <= before + 1e-6);
    }

    #[test]
    fn relearn_cadence_fires_only_at_multiples() {
        let learner = HyperparamLearner::new(LearnerMode::Fixed, 5, 0);
        assert!(!learner.should_relearn(0));
        assert!(!learner.should_relearn(4));
        assert!(learner.should_relearn(5));
        assert!(!learner.should_relearn(7));
        assert!(learner.should_relearn(10));
    }

    #[test]
    fn no_relearn_cadence_never_fires() {
        let learner = HyperparamLearner::new(LearnerMode::Fixed, 0, 0);
        for i in 0..20 {
            assert!(!learner.should_relearn(i));
        }
    }

    #[test]
    fn mcmc_produces_requested_sample_count() {
        let s = toy();
        let learner = HyperparamLearner::new(LearnerMode::Mcmc { n_samples: 10, burn_in: 5 }, 1, 1);
        let samples = learner.posterior_samples(&s, 10, 5).unwrap();
        assert_eq!(samples.len(), 10);
        assert!(samples.iter().all(|s| s.iter().all(|v| *v > 0.0)));
    }

    #[test]
    fn nig_prior_is_reachable_for_student_t() {
        // sanity: construction path used by the `StudentT` flavour tests
        // elsewhere in this crate.
        let _ = NigPrior::default();
    }
}
