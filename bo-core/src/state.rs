//! Persisted optimization state (spec.md §6 "persisted state",
//! §9 design note on resumability): everything `save`/`restore` needs
//! to continue an in-progress run bit-for-bit, including the RNG
//! stream, serialized through `serde_json`.

use crate::config::BoConfig;
use crate::error::{BoError, Result};
use serde::{Deserialize, Serialize};

/// Bumped whenever the persisted layout changes incompatibly.
const STATE_FORMAT_VERSION: u32 = 1;

/// A complete snapshot of an in-progress (or finished) optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoState {
    format_version: u32,
    pub config: BoConfig,

    pub current_iter: usize,
    /// Consecutive iterations since the last improvement of `y_best`,
    /// used to drive `force_jump` restarts.
    pub counter_stuck: usize,
    pub y_prev: Option<f64>,

    /// Kernel hyperparameters at the last fit.
    pub kernel_hp: Vec<f64>,
    /// Mean-function coefficients at the last fit.
    pub mean_coef: Vec<f64>,

    /// Observed samples, in evaluation order, as unit-cube coordinates.
    pub samples_x: Vec<Vec<f64>>,
    pub samples_y: Vec<f64>,

    pub x_best: Vec<f64>,
    pub y_best: f64,

    pub rng: rand_xoshiro::Xoshiro256PlusPlus,
    /// Seed for the hyperparameter learner's own internal RNG (MCMC,
    /// empirical-search restarts), tracked separately from `rng` so a
    /// restored run reproduces the same inner-optimizer trajectories.
    pub learner_seed: u64,

    /// Hedge's per-arm cumulative gains (spec.md §3 Data Model,
    /// "Criterion state"); empty for a single-criterion (non-portfolio)
    /// run.
    pub hedge_gains: Vec<f64>,
    /// Index into the Hedge arm list chosen at the last completed
    /// iteration (spec.md §3 Data Model, "Criterion state"); `None` for
    /// a single-criterion run, or before any portfolio iteration has run.
    pub last_chosen_arm: Option<usize>,
}

impl BoState {
    pub fn new(config: BoConfig, rng: rand_xoshiro::Xoshiro256PlusPlus) -> Self {
        BoState {
            format_version: STATE_FORMAT_VERSION,
            config,
            current_iter: 0,
            counter_stuck: 0,
            y_prev: None,
            kernel_hp: Vec::new(),
            mean_coef: Vec::new(),
            samples_x: Vec::new(),
            samples_y: Vec::new(),
            x_best: Vec::new(),
            y_best: f64::INFINITY,
            rng,
            learner_seed: 0,
            hedge_gains: Vec::new(),
            last_chosen_arm: None,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| BoError::State(e.to_string()))
    }

    /// Parse and validate a persisted snapshot before any mutation
    /// (spec.md §7: state errors surface before touching the caller's
    /// live optimizer).
    pub fn from_json(s: &str, expected_dim: usize) -> Result<Self> {
        let state: BoState = serde_json::from_str(s).map_err(|e| BoError::State(e.to_string()))?;
        if state.format_version != STATE_FORMAT_VERSION {
            return Err(BoError::State(format!(
                "state format version {} does not match the current version {}",
                state.format_version, STATE_FORMAT_VERSION
            )));
        }
        if state.config.dim != expected_dim {
            return Err(BoError::State(format!(
                "state dimension {} does not match the optimizer's dimension {}",
                state.config.dim, expected_dim
            )));
        }
        if state.samples_x.len() != state.samples_y.len() {
            return Err(BoError::State(
                "state's samples_x/samples_y lengths disagree".into(),
            ));
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn save_then_load_round_trips() {
        let mut state = BoState::new(BoConfig::default(), Xoshiro256PlusPlus::seed_from_u64(7));
        state.current_iter = 3;
        state.samples_x = vec![vec![0.1], vec![0.5]];
        state.samples_y = vec![1.0, 2.0];
        state.x_best = vec![0.5];
        state.y_best = 1.0;

        let json = state.to_json().unwrap();
        let loaded = BoState::from_json(&json, 1).unwrap();
        assert_eq!(loaded.current_iter, 3);
        assert_eq!(loaded.samples_x, state.samples_x);
        assert_eq!(loaded.y_best, 1.0);
    }

    #[test]
    fn dimension_mismatch_is_rejected_before_use() {
        let state = BoState::new(BoConfig::default(), Xoshiro256PlusPlus::seed_from_u64(0));
        let json = state.to_json().unwrap();
        assert!(BoState::from_json(&json, 7).is_err());
    }

    #[test]
    fn corrupted_json_is_rejected() {
        assert!(BoState::from_json("not json", 1).is_err());
    }

    #[test]
    fn mismatched_sample_lengths_are_rejected() {
        let mut state = BoState::new(BoConfig::default(), Xoshiro256PlusPlus::seed_from_u64(0));
        state.samples_x = vec![vec![0.1], vec![0.5]];
        state.samples_y = vec![1.0];
        let json = state.to_json().unwrap();
        assert!(BoState::from_json(&json, 1).is_err());
    }
}
