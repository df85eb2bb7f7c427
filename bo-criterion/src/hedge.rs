//! GP-Hedge portfolio (spec.md §4.5): holds a fixed arm set and picks
//! among them by exponentially-weighted cumulative reward.

use crate::criterion::Criterion;
use bo_gp::PredictiveDistribution;
use bo_optimizer::{maximize, OptimizerConfig};
use rand::Rng;

/// A fixed-arm GP-Hedge portfolio. `gains[j]` accumulates arm `j`'s
/// normalised reward across iterations (spec.md §4.5 step 4).
#[derive(Debug, Clone)]
pub struct Hedge {
    arms: Vec<Box<dyn Criterion>>,
    gains: Vec<f64>,
    eta: f64,
}

impl Hedge {
    pub fn new(arms: Vec<Box<dyn Criterion>>, eta: f64) -> Self {
        let gains = vec![0.0; arms.len()];
        Hedge { arms, gains, eta }
    }

    pub fn n_arms(&self) -> usize {
        self.arms.len()
    }

    pub fn arm_names(&self) -> Vec<&'static str> {
        self.arms.iter().map(|a| a.name()).collect()
    }

    pub fn gains(&self) -> &[f64] {
        &self.gains
    }

    /// Overwrite the accumulated gains, e.g. when restoring a
    /// previously-saved portfolio (spec.md §3 Data Model).
    pub fn set_gains(&mut self, gains: Vec<f64>) {
        assert_eq!(gains.len(), self.gains.len(), "one gain per arm");
        self.gains = gains;
    }

    /// Step 1: every arm proposes its own `argmax c_j(x)` via the inner
    /// optimizer, over `[0, 1]^d`.
    pub fn propose(
        &self,
        d: usize,
        predict: &dyn Fn(&[f64]) -> PredictiveDistribution,
        y_min: f64,
        config: &OptimizerConfig,
    ) -> Vec<Vec<f64>> {
        self.arms
            .iter()
            .map(|arm| {
                let (x, _) = maximize(d, |u| arm.score(&predict(u), y_min), config);
                x
            })
            .collect()
    }

    /// Step 2: choose an arm with probability `exp(η g_j) / Σ exp(η g_k)`
    /// (the max-gain shift keeps the exponentials finite). A single-arm
    /// portfolio always returns arm `0` (spec.md §8 boundary behaviour).
    pub fn choose(&self, rng: &mut impl Rng) -> usize {
        if self.arms.len() == 1 {
            return 0;
        }
        let max_gain = self.gains.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let weights: Vec<f64> = self.gains.iter().map(|g| (self.eta * (g - max_gain)).exp()).collect();
        let total: f64 = weights.iter().sum();
        let mut r = rng.gen::<f64>() * total;
        for (i, w) in weights.iter().enumerate() {
            if r < *w {
                log::debug!("Hedge chose arm {} ({})", i, self.arms[i].name());
                return i;
            }
            r -= *w;
        }
        let last = weights.len() - 1;
        log::debug!("Hedge chose arm {} ({}) by fallthrough", last, self.arms[last].name());
        last
    }

    /// Step 4: update every arm's cumulative gain after the surrogate
    /// has absorbed the new observation. The chosen arm's reward is the
    /// observed `y` (negated, so lower `y` rewards more); every other
    /// arm's reward is its predictive mean at its own proposal,
    /// evaluated against the updated surrogate.
    pub fn update_gains(
        &mut self,
        proposals: &[Vec<f64>],
        predict_after: &dyn Fn(&[f64]) -> PredictiveDistribution,
        chosen: usize,
        observed_y: f64,
    ) {
        for (j, x_j) in proposals.iter().enumerate() {
            let reward = if j == chosen {
                -observed_y
            } else {
                -predict_after(x_j).mean
            };
            self.gains[j] += reward;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criterion::{ExpectedImprovement, GreedyMean};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn single_arm_portfolio_always_picks_that_arm() {
        let hedge = Hedge::new(vec![Box::new(ExpectedImprovement::default())], 1.0);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        for _ in 0..10 {
            assert_eq!(hedge.choose(&mut rng), 0);
        }
    }

    #[test]
    fn arm_with_larger_gain_is_chosen_more_often() {
        let mut hedge = Hedge::new(
            vec![Box::new(ExpectedImprovement::default()), Box::new(GreedyMean)],
            5.0,
        );
        hedge.update_gains(&[vec![0.0], vec![0.0]], &|_| PredictiveDistribution::gaussian(0.0, 1.0), 0, -10.0);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let mut counts = [0usize; 2];
        for _ in 0..200 {
            counts[hedge.choose(&mut rng)] += 1;
        }
        assert!(counts[0] > counts[1]);
    }
}
