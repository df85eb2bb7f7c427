//! Acquisition criteria (spec.md §4.5): each consumes only the
//! surrogate's predictive distribution at a candidate point plus
//! `y_min`, never the surrogate itself — a non-owning borrow per call,
//! no long-lived aliasing (spec.md §9 design note).

use bo_gp::PredictiveDistribution;
use rand::RngCore;
use std::fmt::Debug;

/// A scalar acquisition criterion: higher is better, with minimisation
/// of the underlying objective cast via sign (spec.md §4.5).
pub trait Criterion: CriterionClone + Debug {
    /// Deterministic score at `x`'s predictive distribution.
    fn score(&self, dist: &PredictiveDistribution, y_min: f64) -> f64;

    /// Stochastic variant (Thompson / optimistic sampling); defaults to
    /// the deterministic score for criteria with no random component.
    fn sample_score(&self, dist: &PredictiveDistribution, y_min: f64, rng: &mut dyn RngCore) -> f64 {
        let _ = rng;
        self.score(dist, y_min)
    }

    /// Refresh any iteration-dependent internal state (e.g. LCB's
    /// annealed `β_t`); a no-op for criteria with none.
    fn update_for_iteration(&mut self, _t: usize, _d: usize) {}

    fn name(&self) -> &'static str;
}

pub trait CriterionClone {
    fn clone_box(&self) -> Box<dyn Criterion>;
}

impl<T> CriterionClone for T
where
    T: 'static + Criterion + Clone,
{
    fn clone_box(&self) -> Box<dyn Criterion> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Criterion> {
    fn clone(&self) -> Box<dyn Criterion> {
        self.clone_box()
    }
}

/// Closed-form expected improvement that recovers the familiar Gaussian
/// formula as `dof → ∞` and the Student-t closed form (Shah, Wilson &
/// Ghahramani 2014) otherwise — one expression serves both, since
/// `PredictiveDistribution` already reports an infinite `dof` for the
/// Gaussian flavours.
fn expected_improvement_raw(dist: &PredictiveDistribution, y_min: f64) -> f64 {
    if dist.scale <= 0.0 {
        return (y_min - dist.mean).max(0.0);
    }
    let z = dist.standardize(y_min);
    let cdf = dist.cdf(y_min);
    let unit_density = dist.pdf(y_min) * dist.scale;
    let dof = dist.dof.max(1.0 + 1e-6);
    let factor = if dof.is_finite() { (dof + z * z) / (dof - 1.0) } else { 1.0 };
    ((y_min - dist.mean) * cdf + dist.scale * factor * unit_density).max(0.0)
}

/// Expected improvement, `EI^p` (spec.md §4.5; `p = 1` is plain EI).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpectedImprovement {
    pub p: f64,
}

impl ExpectedImprovement {
    pub fn new(p: f64) -> Self {
        ExpectedImprovement { p }
    }
}

impl Default for ExpectedImprovement {
    fn default() -> Self {
        ExpectedImprovement { p: 1.0 }
    }
}

impl Criterion for ExpectedImprovement {
    fn score(&self, dist: &PredictiveDistribution, y_min: f64) -> f64 {
        let ei = expected_improvement_raw(dist, y_min);
        if self.p == 1.0 {
            ei
        } else {
            ei.powf(self.p)
        }
    }
    fn name(&self) -> &'static str {
        "EI"
    }
}

/// Lower confidence bound, `−(μ − β·σ)`; optionally annealed per
/// `β_t = √(2 log(t^{d/2+2} π²/3δ))` (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowerConfidenceBound {
    pub beta: f64,
    pub annealed: bool,
    pub delta: f64,
}

impl LowerConfidenceBound {
    pub fn fixed(beta: f64) -> Self {
        LowerConfidenceBound { beta, annealed: false, delta: 0.1 }
    }

    pub fn annealed(delta: f64) -> Self {
        LowerConfidenceBound { beta: 1.0, annealed: true, delta }
    }
}

impl Criterion for LowerConfidenceBound {
    fn score(&self, dist: &PredictiveDistribution, _y_min: f64) -> f64 {
        let std = if dist.std_dev().is_finite() { dist.std_dev() } else { dist.scale };
        self.beta * std - dist.mean
    }

    fn update_for_iteration(&mut self, t: usize, d: usize) {
        if !self.annealed {
            return;
        }
        let t = (t.max(1)) as f64;
        let d = d as f64;
        let inner = t.powf(d / 2.0 + 2.0) * std::f64::consts::PI.powi(2) / (3.0 * self.delta);
        self.beta = (2.0 * inner.max(1.0).ln()).sqrt();
    }

    fn name(&self) -> &'static str {
        "LCB"
    }
}

/// Probability of improvement, `Φ(z)`, with an optional exploration
/// offset `ε` subtracted from `y_min` before standardising.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbabilityOfImprovement {
    pub epsilon: f64,
}

impl ProbabilityOfImprovement {
    pub fn new(epsilon: f64) -> Self {
        ProbabilityOfImprovement { epsilon }
    }
}

impl Default for ProbabilityOfImprovement {
    fn default() -> Self {
        ProbabilityOfImprovement { epsilon: 0.0 }
    }
}

impl Criterion for ProbabilityOfImprovement {
    fn score(&self, dist: &PredictiveDistribution, y_min: f64) -> f64 {
        dist.cdf(y_min - self.epsilon)
    }
    fn name(&self) -> &'static str {
        "POI"
    }
}

/// One posterior draw, scored so that a *low* sampled value yields a
/// *high* score (optimistic sampling toward the objective minimum).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ThompsonSampling;

impl Criterion for ThompsonSampling {
    fn score(&self, dist: &PredictiveDistribution, _y_min: f64) -> f64 {
        -dist.mean
    }

    fn sample_score(&self, dist: &PredictiveDistribution, _y_min: f64, rng: &mut dyn RngCore) -> f64 {
        use rand_distr::{Distribution, StandardNormal};
        let draw = if dist.is_gaussian() {
            let z: f64 = StandardNormal.sample(rng);
            dist.mean + dist.scale * z
        } else {
            // rand_distr's StudentT is parameterised by dof alone (unit
            // scale, zero location); rescale and relocate explicitly.
            match rand_distr::StudentT::new(dist.dof) {
                Ok(t) => dist.mean + dist.scale * t.sample(rng),
                Err(_) => dist.mean,
            }
        };
        -draw
    }

    fn name(&self) -> &'static str {
        "Thompson"
    }
}

/// Pure exploration: maximise predictive variance (A-optimal design).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AOptimality;

impl Criterion for AOptimality {
    fn score(&self, dist: &PredictiveDistribution, _y_min: f64) -> f64 {
        if dist.std_dev().is_finite() {
            dist.std_dev()
        } else {
            dist.scale
        }
    }
    fn name(&self) -> &'static str {
        "AOptimality"
    }
}

/// Pure exploitation: minimise the predictive mean (spec.md §4.5
/// "greedy / expected return").
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GreedyMean;

impl Criterion for GreedyMean {
    fn score(&self, dist: &PredictiveDistribution, _y_min: f64) -> f64 {
        -dist.mean
    }
    fn name(&self) -> &'static str {
        "GreedyMean"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn ei_is_zero_at_a_training_point_with_no_improvement_margin() {
        let dist = PredictiveDistribution::gaussian(0.0, 1.0);
        let ei = ExpectedImprovement::default();
        // y_min equals the mean: no expected improvement beyond the
        // exploration term, which is positive, so EI is strictly > 0
        // away from the degenerate scale=0 case.
        assert!(ei.score(&dist, 0.0) > 0.0);
    }

    #[test]
    fn ei_grows_with_larger_improvement_margin() {
        let dist = PredictiveDistribution::gaussian(0.0, 1.0);
        let ei = ExpectedImprovement::default();
        assert!(ei.score(&dist, -2.0) > ei.score(&dist, -0.5));
    }

    #[test]
    fn lcb_annealing_increases_beta_over_time() {
        let mut lcb = LowerConfidenceBound::annealed(0.1);
        lcb.update_for_iteration(1, 2);
        let beta1 = lcb.beta;
        lcb.update_for_iteration(50, 2);
        assert!(lcb.beta > beta1);
    }

    #[test]
    fn poi_matches_gaussian_cdf_with_no_offset() {
        let dist = PredictiveDistribution::gaussian(0.0, 1.0);
        let poi = ProbabilityOfImprovement::default();
        assert_abs_diff_eq!(poi.score(&dist, 0.0), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn a_optimality_prefers_higher_variance() {
        let narrow = PredictiveDistribution::gaussian(0.0, 0.1);
        let wide = PredictiveDistribution::gaussian(0.0, 5.0);
        let crit = AOptimality;
        assert!(crit.score(&wide, 0.0) > crit.score(&narrow, 0.0));
    }

    #[test]
    fn greedy_mean_prefers_lower_predicted_values() {
        let low = PredictiveDistribution::gaussian(-1.0, 1.0);
        let high = PredictiveDistribution::gaussian(1.0, 1.0);
        let crit = GreedyMean;
        assert!(crit.score(&low, 0.0) > crit.score(&high, 0.0));
    }
}
