//! The resumable Bayesian optimization loop (spec.md §4.7): the state
//! machine `Uninitialised → Initialised → Running → Finished`, driven
//! by `initialize_optimization`/`step_optimization`/`optimize`.

use crate::config::{BoConfig, InitMethod, ScType, SurrName};
use crate::error::{BoError, Result};
use crate::parser::{parse_criterion, parse_kernel, parse_mean, ParsedCriterion};
use crate::state::BoState;
use bo_doe::{initial_design, DesignKind};
use bo_gp::{Flavor, NigPrior, Surrogate};
use bo_gp::hyperparam::{HyperparamLearner, LearnerMode};
use bo_optimizer::{maximize, OptimizerConfig};
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// The phase of `BoOptimizer`'s state machine (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialised,
    Initialised,
    Running,
    Finished,
}

/// The external objective callback: maps a point in `[lower_bound,
/// upper_bound]` to its observed value, or an error message on failure
/// (spec.md §7 "objective error").
pub type ObjectiveFn<'a> = dyn FnMut(&[f64]) -> std::result::Result<f64, String> + 'a;

fn build_flavor(config: &BoConfig) -> Flavor {
    match config.surr_name {
        SurrName::Gp => Flavor::Gp { sigma2: config.beta.max(1e-12) },
        SurrName::GpMl => Flavor::GpMl,
        SurrName::GpNormal => Flavor::GpNormal,
        SurrName::StudentTJef => Flavor::StudentT { nig: NigPrior::jeffreys() },
        SurrName::StudentTNig => Flavor::StudentT { nig: NigPrior::new(config.alpha, config.beta, config.delta) },
    }
}

fn build_learner_mode(config: &BoConfig) -> LearnerMode {
    match config.sc_type {
        ScType::Fixed => LearnerMode::Fixed,
        ScType::Ml => LearnerMode::Ml,
        ScType::Map => LearnerMode::Map,
        ScType::Loo => LearnerMode::Loo,
        ScType::Mcmc { n_samples, burn_in } => LearnerMode::Mcmc { n_samples, burn_in },
    }
}

fn build_surrogate(config: &BoConfig) -> Result<Surrogate> {
    let parsed_kernel = parse_kernel(&config.kernel, config.dim)?;
    let parsed_mean = parse_mean(&config.mean, config.dim)?;
    Ok(Surrogate::new(
        parsed_kernel.kernel,
        parsed_mean.mean,
        parsed_kernel.prior,
        parsed_mean.prior,
        build_flavor(config),
        config.noise.max(0.0),
    ))
}

fn design_kind(init_method: InitMethod) -> DesignKind {
    match init_method {
        InitMethod::LatinHypercube => DesignKind::LatinHypercube,
        InitMethod::Sobol => DesignKind::LowDiscrepancy,
        InitMethod::Uniform => DesignKind::Uniform,
    }
}

/// The BO loop, holding the surrogate, the hyperparameter learner, the
/// acquisition criterion (or Hedge portfolio), and the resumable state.
pub struct BoOptimizer {
    config: BoConfig,
    surrogate: Surrogate,
    learner: HyperparamLearner,
    criterion: ParsedCriterion,
    state: BoState,
    phase: Phase,
    optimizer_config: OptimizerConfig,
}

impl BoOptimizer {
    pub fn new(config: BoConfig) -> Result<Self> {
        config.validate()?;
        let surrogate = build_surrogate(&config)?;
        let seed = if config.random_seed >= 0 {
            config.random_seed as u64
        } else {
            rand::thread_rng().gen()
        };
        let learner = HyperparamLearner::new(build_learner_mode(&config), config.n_iter_relearn, seed);
        let criterion = parse_criterion(&config.crit_name, &config.crit_params, &config)?;
        let rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut state = BoState::new(config.clone(), rng);
        state.learner_seed = seed;
        let optimizer_config = OptimizerConfig::for_dimension(config.dim, seed);
        Ok(BoOptimizer {
            config,
            surrogate,
            learner,
            criterion,
            state,
            phase: Phase::Uninitialised,
            optimizer_config,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &BoState {
        &self.state
    }

    pub fn best(&self) -> (Vec<f64>, f64) {
        (self.config.scale_to_bounds(&self.state.x_best), self.state.y_best)
    }

    /// The Hedge portfolio's arm names in proposal order, or `None` for
    /// a single-criterion run.
    pub fn criterion_arm_names(&self) -> Option<Vec<&'static str>> {
        match &self.criterion {
            ParsedCriterion::Portfolio(hedge) => Some(hedge.arm_names()),
            ParsedCriterion::Single(_) => None,
        }
    }

    /// Serialise the current state (spec.md §6 persisted state).
    pub fn save(&self) -> Result<String> {
        let mut snap = self.state.clone();
        snap.kernel_hp = self.surrogate.hyperparameters();
        snap.mean_coef = self.surrogate.mean_fn().coef().to_vec();
        if let ParsedCriterion::Portfolio(hedge) = &self.criterion {
            snap.hedge_gains = hedge.gains().to_vec();
        }
        snap.to_json()
    }

    /// Reconstruct a `BoOptimizer` from a snapshot produced by `save`.
    pub fn restore(json: &str, expected_dim: usize) -> Result<Self> {
        let state = BoState::from_json(json, expected_dim)?;
        let config = state.config.clone();
        let mut surrogate = build_surrogate(&config)?;

        if !state.samples_x.is_empty() {
            let n = state.samples_x.len();
            let d = config.dim;
            let mut xm = Array2::<f64>::zeros((n, d));
            for (i, row) in state.samples_x.iter().enumerate() {
                xm.row_mut(i).assign(&Array1::from_vec(row.clone()));
            }
            surrogate.set_samples(&xm.view(), &state.samples_y)?;
        }
        if !state.kernel_hp.is_empty() {
            surrogate.set_hyperparameters(&state.kernel_hp)?;
            surrogate.fit()?;
        }

        let learner = HyperparamLearner::new(build_learner_mode(&config), config.n_iter_relearn, state.learner_seed);
        let mut criterion = parse_criterion(&config.crit_name, &config.crit_params, &config)?;
        if let ParsedCriterion::Portfolio(hedge) = &mut criterion {
            if !state.hedge_gains.is_empty() {
                hedge.set_gains(state.hedge_gains.clone());
            }
        }
        let optimizer_config = OptimizerConfig::for_dimension(config.dim, state.learner_seed);
        let phase = if state.samples_x.is_empty() {
            Phase::Uninitialised
        } else if state.current_iter >= config.n_iterations {
            Phase::Finished
        } else {
            Phase::Running
        };

        Ok(BoOptimizer {
            config,
            surrogate,
            learner,
            criterion,
            state,
            phase,
            optimizer_config,
        })
    }

    /// Generate the initial design, evaluate `f` on it, and fit the
    /// surrogate (spec.md §4.7: `Uninitialised → Initialised`).
    pub fn initialize_optimization(&mut self, f: &mut ObjectiveFn) -> Result<()> {
        if self.phase != Phase::Uninitialised {
            return Err(BoError::State("initialize_optimization called outside Uninitialised".into()));
        }
        let design = initial_design(design_kind(self.config.init_method), self.config.n_init_samples, self.config.dim, &mut self.state.rng);
        for row in design.rows() {
            let x_unit: Vec<f64> = row.to_vec();
            self.observe(&x_unit, f)?;
        }
        self.surrogate.fit()?;
        self.state.kernel_hp = self.surrogate.hyperparameters();
        self.phase = Phase::Initialised;
        Ok(())
    }

    fn observe(&mut self, x_unit: &[f64], f: &mut ObjectiveFn) -> Result<f64> {
        let x_scaled = self.config.scale_to_bounds(x_unit);
        let y = f(&x_scaled).map_err(BoError::Objective)?;
        self.surrogate.add_sample(Array1::from_vec(x_unit.to_vec()), y);
        self.state.samples_x.push(x_unit.to_vec());
        self.state.samples_y.push(y);
        if y < self.state.y_best {
            log::info!("new best y={y} at iteration {}", self.state.current_iter);
            self.state.y_best = y;
            self.state.x_best = x_unit.to_vec();
            self.state.counter_stuck = 0;
        } else {
            self.state.counter_stuck += 1;
        }
        self.state.y_prev = Some(y);
        Ok(y)
    }

    /// Propose the next unit-cube candidate via the criterion (or Hedge
    /// portfolio), returning it plus the per-arm proposals when a
    /// portfolio is in play (needed afterwards to update its gains).
    fn propose(&mut self, y_min: f64) -> (Vec<f64>, Option<(Vec<Vec<f64>>, usize)>) {
        let d = self.config.dim;
        let surrogate = &self.surrogate;
        match &mut self.criterion {
            ParsedCriterion::Single(c) => {
                c.update_for_iteration(self.state.current_iter + 1, d);
                let c = &*c;
                let (x, _) = maximize(
                    d,
                    |u| match surrogate.predict(u) {
                        Ok(dist) => c.score(&dist, y_min),
                        Err(_) => f64::NEG_INFINITY,
                    },
                    &self.optimizer_config,
                );
                (x, None)
            }
            ParsedCriterion::Portfolio(hedge) => {
                let predict = |u: &[f64]| surrogate.predict(u).unwrap_or(bo_gp::PredictiveDistribution::gaussian(f64::INFINITY, 1.0));
                let proposals = hedge.propose(d, &predict, y_min, &self.optimizer_config);
                let chosen = hedge.choose(&mut self.state.rng);
                let x = proposals[chosen].clone();
                (x, Some((proposals, chosen)))
            }
        }
    }

    /// Reachability fallback (spec.md §7): resample uniformly up to
    /// `force_jump` times if the proposal falls outside `[0,1]^d`.
    fn ensure_feasible(&mut self, x: Vec<f64>) -> Result<Vec<f64>> {
        if x.iter().all(|&v| (0.0..=1.0).contains(&v)) {
            return Ok(x);
        }
        log::warn!("criterion proposed an infeasible point, resampling uniformly (force_jump={})", self.config.force_jump);
        let d = self.config.dim;
        for attempt in 0..self.config.force_jump.max(1) {
            let candidate: Vec<f64> = (0..d).map(|_| self.state.rng.gen::<f64>()).collect();
            if candidate.iter().all(|&v| (0.0..=1.0).contains(&v)) {
                return Ok(candidate);
            }
            let _ = attempt;
        }
        Err(BoError::Optimizer { attempts: self.config.force_jump.max(1) })
    }

    /// Run one iteration (spec.md §4.7 per-iteration steps 1-6).
    pub fn step_optimization(&mut self, f: &mut ObjectiveFn) -> Result<()> {
        if self.phase == Phase::Uninitialised {
            return Err(BoError::State("step_optimization called before initialize_optimization".into()));
        }
        if self.phase == Phase::Finished {
            return Ok(());
        }

        let iter = self.state.current_iter + 1;
        if self.learner.should_relearn(iter) {
            log::debug!("relearning hyperparameters at iteration {iter}");
            self.learner.relearn(&mut self.surrogate)?;
            self.state.kernel_hp = self.surrogate.hyperparameters();
        }

        let y_min = self.state.y_best;
        // force_jump doubles as the stuck-restart cadence (spec.md §6)
        // and the reachability-retry budget (spec.md §7, ensure_feasible).
        let force_restart = self.config.force_jump > 0
            && self.state.counter_stuck > 0
            && self.state.counter_stuck % self.config.force_jump == 0;
        if force_restart {
            log::debug!("force_jump restart: {} iterations without improvement", self.state.counter_stuck);
        }
        let explore = force_restart || (self.config.epsilon > 0.0 && self.state.rng.gen::<f64>() < self.config.epsilon);
        let (proposal, portfolio_ctx) = if explore {
            let d = self.config.dim;
            let x: Vec<f64> = (0..d).map(|_| self.state.rng.gen::<f64>()).collect();
            (x, None)
        } else {
            self.propose(y_min)
        };
        let x_unit = self.ensure_feasible(proposal)?;

        let y = self.observe(&x_unit, f)?;
        match self.surrogate.update(Array1::from_vec(x_unit.clone()), y) {
            Ok(()) => {}
            Err(e) => return Err(BoError::from(e)),
        }

        if let Some((proposals, chosen)) = portfolio_ctx {
            if let ParsedCriterion::Portfolio(hedge) = &mut self.criterion {
                let surrogate = &self.surrogate;
                let predict_after = |u: &[f64]| surrogate.predict(u).unwrap_or(bo_gp::PredictiveDistribution::gaussian(f64::INFINITY, 1.0));
                hedge.update_gains(&proposals, &predict_after, chosen, y);
            }
            self.state.last_chosen_arm = Some(chosen);
        }

        self.state.current_iter = iter;
        self.phase = if iter >= self.config.n_iterations { Phase::Finished } else { Phase::Running };
        Ok(())
    }

    /// Run to completion: initialise (if not already) and step until
    /// `n_iterations` is reached.
    pub fn optimize(&mut self, f: &mut ObjectiveFn) -> Result<(Vec<f64>, f64)> {
        if self.phase == Phase::Uninitialised {
            self.initialize_optimization(f)?;
        }
        while self.phase != Phase::Finished {
            self.step_optimization(f)?;
        }
        Ok(self.best())
    }

    /// Discrete-candidate variant (spec.md §8 scenario 3): every
    /// proposal is snapped to the nearest point in `candidates` (unit
    /// cube), and `f` is invoked at most once per unique candidate
    /// index.
    pub fn optimize_discrete(&mut self, candidates: &[Vec<f64>], f: &mut ObjectiveFn) -> Result<(Vec<f64>, f64)> {
        if candidates.is_empty() {
            return Err(BoError::Configuration("optimize_discrete needs a non-empty candidate set".into()));
        }
        let mut evaluated = vec![false; candidates.len()];
        let mut cache = vec![f64::NAN; candidates.len()];

        if self.phase == Phase::Uninitialised {
            let design = initial_design(design_kind(self.config.init_method), self.config.n_init_samples, self.config.dim, &mut self.state.rng);
            for row in design.rows() {
                let idx = nearest_candidate(candidates, row.as_slice().unwrap());
                let snapped = candidates[idx].clone();
                let y = evaluate_candidate(&self.config, candidates, idx, &mut evaluated, &mut cache, f)?;
                self.surrogate.add_sample(Array1::from_vec(snapped.clone()), y);
                self.state.samples_x.push(snapped.clone());
                self.state.samples_y.push(y);
                if y < self.state.y_best {
                    self.state.y_best = y;
                    self.state.x_best = snapped;
                }
            }
            self.surrogate.fit()?;
            self.state.kernel_hp = self.surrogate.hyperparameters();
            self.phase = Phase::Initialised;
        }

        while self.state.current_iter < self.config.n_iterations {
            let iter = self.state.current_iter + 1;
            if self.learner.should_relearn(iter) {
                self.learner.relearn(&mut self.surrogate)?;
                self.state.kernel_hp = self.surrogate.hyperparameters();
            }
            let y_min = self.state.y_best;
            let (proposal, _) = self.propose(y_min);
            let idx = nearest_candidate(candidates, &proposal);
            let snapped = candidates[idx].clone();
            let y = evaluate_candidate(&self.config, candidates, idx, &mut evaluated, &mut cache, f)?;
            self.surrogate.update(Array1::from_vec(snapped.clone()), y)?;
            self.state.samples_x.push(snapped.clone());
            self.state.samples_y.push(y);
            if y < self.state.y_best {
                self.state.y_best = y;
                self.state.x_best = snapped;
            }
            self.state.current_iter = iter;
        }
        self.phase = Phase::Finished;
        Ok(self.best())
    }
}

/// Evaluate `f` at `candidates[idx]` (scaled to bounds), unless already
/// cached — at most one objective call per unique candidate index.
fn evaluate_candidate(
    config: &BoConfig,
    candidates: &[Vec<f64>],
    idx: usize,
    evaluated: &mut [bool],
    cache: &mut [f64],
    f: &mut ObjectiveFn,
) -> Result<f64> {
    if evaluated[idx] {
        return Ok(cache[idx]);
    }
    let x_scaled = config.scale_to_bounds(&candidates[idx]);
    let y = f(&x_scaled).map_err(BoError::Objective)?;
    evaluated[idx] = true;
    cache[idx] = y;
    Ok(y)
}

fn nearest_candidate(candidates: &[Vec<f64>], x: &[f64]) -> usize {
    candidates
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            let da: f64 = a.iter().zip(x.iter()).map(|(u, v)| (u - v).powi(2)).sum();
            let db: f64 = b.iter().zip(x.iter()).map(|(u, v)| (u - v).powi(2)).sum();
            da.partial_cmp(&db).unwrap()
        })
        .map(|(i, _)| i)
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branin_unit(x: &[f64]) -> f64 {
        let x1 = x[0] * 15.0 - 5.0;
        let x2 = x[1] * 15.0;
        let a = 1.0;
        let b = 5.1 / (4.0 * std::f64::consts::PI.powi(2));
        let c = 5.0 / std::f64::consts::PI;
        let r = 6.0;
        let s = 10.0;
        let t = 1.0 / (8.0 * std::f64::consts::PI);
        let term1 = a * (x2 - b * x1 * x1 + c * x1 - r).powi(2);
        let term2 = s * (1.0 - t) * x1.cos();
        term1 + term2 + s
    }

    fn base_config(n_iterations: usize, seed: i64) -> BoConfig {
        let mut c = BoConfig::default();
        c.dim = 2;
        c.lower_bound = vec![0.0, 0.0];
        c.upper_bound = vec![1.0, 1.0];
        c.n_init_samples = 4;
        c.n_iterations = n_iterations;
        c.random_seed = seed;
        c.noise = 1e-10;
        c.kernel.hp_mean = vec![0.0, 0.0];
        c.kernel.hp_std = vec![1.0, 1.0];
        c.kernel.name = "SEARD".to_string();
        c
    }

    #[test]
    fn full_loop_reaches_finished_and_improves_on_initial_best() {
        let config = base_config(6, 3);
        let mut opt = BoOptimizer::new(config).unwrap();
        let mut f = |x: &[f64]| Ok::<f64, String>(branin_unit(x));
        let (_, y_best) = opt.optimize(&mut f).unwrap();
        assert_eq!(opt.phase(), Phase::Finished);
        assert!(y_best.is_finite());
    }

    #[test]
    fn resume_from_saved_state_matches_uninterrupted_run() {
        let mut f = |x: &[f64]| Ok::<f64, String>(branin_unit(x));

        let config_a = base_config(10, 11);
        let mut run_a = BoOptimizer::new(config_a).unwrap();
        let (_, y_a) = run_a.optimize(&mut f).unwrap();

        let config_b = base_config(10, 11);
        let mut run_b = BoOptimizer::new(config_b).unwrap();
        run_b.initialize_optimization(&mut f).unwrap();
        for _ in 0..5 {
            run_b.step_optimization(&mut f).unwrap();
        }
        let snapshot = run_b.save().unwrap();
        let mut resumed = BoOptimizer::restore(&snapshot, 2).unwrap();
        while resumed.phase() != Phase::Finished {
            resumed.step_optimization(&mut f).unwrap();
        }
        let (_, y_b) = resumed.best();
        assert!((y_a - y_b).abs() < 1e-9);
    }

    #[test]
    fn step_before_initialize_is_an_error() {
        let config = base_config(5, 0);
        let mut opt = BoOptimizer::new(config).unwrap();
        let mut f = |x: &[f64]| Ok::<f64, String>(branin_unit(x));
        assert!(opt.step_optimization(&mut f).is_err());
    }

    #[test]
    fn relearn_cadence_changes_hyperparameters_only_at_multiples() {
        let mut config = base_config(12, 5);
        config.n_iter_relearn = 3;
        config.sc_type = crate::config::ScType::Ml;
        let mut opt = BoOptimizer::new(config).unwrap();
        let mut f = |x: &[f64]| Ok::<f64, String>(branin_unit(x));
        opt.initialize_optimization(&mut f).unwrap();
        let mut last = opt.state().kernel_hp.clone();
        for i in 1..=12 {
            opt.step_optimization(&mut f).unwrap();
            let now = opt.state().kernel_hp.clone();
            if i % 3 != 0 {
                assert_eq!(now, last, "hyperparameters changed off-cadence at iteration {i}");
            }
            last = now;
        }
    }

    #[test]
    fn discrete_variant_evaluates_each_unique_proposal_once() {
        let config = base_config(8, 2);
        let mut opt = BoOptimizer::new(config).unwrap();
        let candidates: Vec<Vec<f64>> = (0..50)
            .map(|i| vec![(i as f64) / 50.0, ((i * 7) % 50) as f64 / 50.0])
            .collect();
        let mut calls = 0usize;
        let mut f = |x: &[f64]| {
            calls += 1;
            Ok::<f64, String>(branin_unit(x))
        };
        let (x_best, _) = opt.optimize_discrete(&candidates, &mut f).unwrap();
        let unit = opt.config.scale_to_unit(&x_best);
        assert!(candidates.iter().any(|c| c.iter().zip(unit.iter()).all(|(a, b)| (a - b).abs() < 1e-9)));
        assert!(calls <= opt.state().samples_x.len());
    }
}
