//! The inner, bounded derivative-free optimizer (spec.md §4.6) used to
//! maximize the acquisition criterion at each outer iteration and,
//! reused by `bo-gp`, to maximize the surrogate's log marginal
//! likelihood over its hyperparameters.
//!
//! Two phases, matching the reference implementation's
//! global-scan-then-local-polish structure without requiring a DIRECT
//! or BOBYQA binding: a low-discrepancy global scan (`bo_doe`) to find
//! a promising basin, followed by Hooke-Jeeves coordinate pattern
//! search to polish it. Both phases operate purely on `[0, 1]^d`; the
//! caller is responsible for rescaling.

use bo_doe::{initial_design, DesignKind};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Tuning knobs for `maximize`. Defaults scale the scan budget with
/// dimensionality, matching the reference implementation's practice of
/// using more restarts in higher dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerConfig {
    /// Number of low-discrepancy points evaluated in the global scan.
    pub scan_points: usize,
    /// Number of Hooke-Jeeves pattern-search iterations run from the
    /// best scan point.
    pub local_iters: usize,
    /// Initial step size (fraction of the unit cube) for the local
    /// search; halved on stall.
    pub initial_step: f64,
    /// Local search stops once the step size falls below this.
    pub step_tolerance: f64,
    pub seed: u64,
}

impl OptimizerConfig {
    pub fn for_dimension(d: usize, seed: u64) -> Self {
        OptimizerConfig {
            scan_points: (20 * d).max(50),
            local_iters: 200,
            initial_step: 0.25,
            step_tolerance: 1e-6,
            seed,
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig::for_dimension(1, 0)
    }
}

/// Maximize `f` over `[0, 1]^d`. Returns the best point found and its
/// value. `f` is assumed cheap (it evaluates an acquisition criterion
/// or a surrogate likelihood, never the outer black-box objective).
pub fn maximize<F>(dim: usize, f: F, config: &OptimizerConfig) -> (Vec<f64>, f64)
where
    F: Fn(&[f64]) -> f64,
{
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.seed);
    let scan = initial_design(DesignKind::LowDiscrepancy, config.scan_points, dim, &mut rng);

    let mut best_x = vec![0.5; dim];
    let mut best_v = f64::NEG_INFINITY;
    for row in scan.rows() {
        let x: Vec<f64> = row.to_vec();
        let v = f(&x);
        if v.is_finite() && v > best_v {
            best_v = v;
            best_x = x;
        }
    }
    if !best_v.is_finite() {
        log::debug!("global scan found no finite value over {} points, polishing from the cube centre", config.scan_points);
    }

    let (polished_x, polished_v) = hooke_jeeves(dim, &f, best_x, best_v, config);
    log::trace!("maximize: scan best={best_v:.6}, polished={polished_v:.6}");
    (polished_x, polished_v)
}

/// Coordinate pattern search: from the current point, try a `+step`
/// and `-step` move along each dimension in turn, keeping any
/// improvement immediately (greedy). Halve the step whenever a full
/// sweep finds no improving move, stop once the step drops below
/// `step_tolerance` or `local_iters` sweeps have run.
fn hooke_jeeves<F>(dim: usize, f: &F, start: Vec<f64>, start_v: f64, config: &OptimizerConfig) -> (Vec<f64>, f64)
where
    F: Fn(&[f64]) -> f64,
{
    let mut x = start;
    let mut v = start_v;
    let mut step = config.initial_step;

    for _ in 0..config.local_iters {
        if step < config.step_tolerance {
            break;
        }
        let mut improved = false;
        for i in 0..dim {
            for &delta in &[step, -step] {
                let mut candidate = x.clone();
                candidate[i] = (candidate[i] + delta).clamp(0.0, 1.0);
                let cv = f(&candidate);
                if cv.is_finite() && cv > v {
                    x = candidate;
                    v = cv;
                    improved = true;
                }
            }
        }
        if !improved {
            step *= 0.5;
        }
    }
    (x, v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maximizes_a_simple_unimodal_bump() {
        let target = vec![0.3, 0.7];
        let f = |x: &[f64]| -(x[0] - target[0]).powi(2) - (x[1] - target[1]).powi(2);
        let config = OptimizerConfig::for_dimension(2, 42);
        let (x, v) = maximize(2, f, &config);
        assert!((x[0] - target[0]).abs() < 0.05);
        assert!((x[1] - target[1]).abs() < 0.05);
        assert!(v > -0.01);
    }

    #[test]
    fn respects_the_unit_cube_bounds() {
        let f = |x: &[f64]| x[0] + x[1];
        let config = OptimizerConfig::for_dimension(2, 1);
        let (x, _) = maximize(2, f, &config);
        assert!(x.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn is_deterministic_given_the_same_seed() {
        let f = |x: &[f64]| -(x[0] - 0.42).powi(2);
        let config = OptimizerConfig::for_dimension(1, 7);
        let (x1, _) = maximize(1, &f, &config);
        let (x2, _) = maximize(1, &f, &config);
        assert_eq!(x1, x2);
    }
}
