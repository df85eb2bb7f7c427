//! The literal end-to-end scenarios of spec.md §8, run against the
//! public `bo_core` API.

use bo_core::{BoConfig, BoOptimizer, Phase};

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

fn branin_config(n_iterations: usize) -> BoConfig {
    let mut c = BoConfig::default();
    c.dim = 2;
    c.lower_bound = vec![0.0, 0.0];
    c.upper_bound = vec![1.0, 1.0];
    c.n_init_samples = 5;
    c.n_iterations = n_iterations;
    c.random_seed = 0;
    c.noise = 1e-10;
    c.kernel.name = "SEARD".to_string();
    c.kernel.hp_mean = vec![0.0, 0.0];
    c.kernel.hp_std = vec![1.0, 1.0];
    c
}

/// Scenario 1: resume equivalence (Branin, 190 iterations, seed 0).
#[test]
fn resume_equivalence_branin_190_iterations() {
    let mut f = |x: &[f64]| Ok::<f64, String>(branin_unit(x));

    let mut run_a = BoOptimizer::new(branin_config(190)).unwrap();
    let (x_a, y_a) = run_a.optimize(&mut f).unwrap();

    let mut run_b = BoOptimizer::new(branin_config(190)).unwrap();
    run_b.initialize_optimization(&mut f).unwrap();
    for _ in 0..95 {
        run_b.step_optimization(&mut f).unwrap();
    }
    let snapshot = run_b.save().unwrap();
    let mut resumed = BoOptimizer::restore(&snapshot, 2).unwrap();
    while resumed.phase() != Phase::Finished {
        resumed.step_optimization(&mut f).unwrap();
    }
    let (x_b, y_b) = resumed.best();

    assert!((y_a - y_b).abs() < 1e-9);
    for (u, v) in x_a.iter().zip(x_b.iter()) {
        assert!((u - v).abs() < 1e-9);
    }
}

/// Scenario 2: 1D GP sanity — a wide kernel prior over `[0,1]` should
/// still converge close to the known minimum of a simple 1D function.
#[test]
fn one_dimensional_gp_sanity() {
    fn f1d(x: &[f64]) -> f64 {
        // Minimum at x=0.6, value -1.0.
        (10.0 * (x[0] - 0.6)).powi(2) - 1.0
    }

    let mut config = BoConfig::default();
    config.dim = 1;
    config.lower_bound = vec![0.0];
    config.upper_bound = vec![1.0];
    config.n_init_samples = 10;
    config.n_iterations = 300;
    config.random_seed = 1;
    config.noise = 1e-10;
    config.kernel.name = "SEISO".to_string();
    config.kernel.hp_mean = vec![1.0];
    config.kernel.hp_std = vec![100.0];

    let mut opt = BoOptimizer::new(config).unwrap();
    let mut f = |x: &[f64]| Ok::<f64, String>(f1d(x));
    let (_, y_best) = opt.optimize(&mut f).unwrap();

    assert!((y_best - (-1.0)).abs() < 1e-3, "y_best={y_best}");
}

/// Scenario 3: discrete variant — 1000 candidates, exactly one
/// objective call per unique proposal.
#[test]
fn discrete_variant_1000_candidates() {
    let config = branin_config(40);
    let mut opt = BoOptimizer::new(config).unwrap();

    let candidates: Vec<Vec<f64>> = (0..1000)
        .map(|i| {
            let a = (i % 32) as f64 / 31.0;
            let b = (i / 32) as f64 / 31.0;
            vec![a, b]
        })
        .collect();

    let mut seen = std::collections::HashSet::new();
    let mut calls = 0usize;
    let mut f = |x: &[f64]| {
        let key = (x[0].to_bits(), x[1].to_bits());
        assert!(seen.insert(key), "objective called twice for the same point");
        calls += 1;
        Ok::<f64, String>(branin_unit(x))
    };

    let (x_best, _) = opt.optimize_discrete(&candidates, &mut f).unwrap();
    let unit = opt.state().config.scale_to_unit(&x_best);
    assert!(candidates
        .iter()
        .any(|c| c.iter().zip(unit.iter()).all(|(a, b)| (a - b).abs() < 1e-9)));
    assert!(calls <= opt.state().samples_x.len());
}

/// Scenario 4: hyperparameter relearn cadence — changes only at
/// multiples of `n_iter_relearn`.
#[test]
fn relearn_cadence_fires_only_at_multiples_of_five() {
    let mut config = branin_config(20);
    config.n_iter_relearn = 5;
    config.sc_type = bo_core::ScType::Ml;

    let mut opt = BoOptimizer::new(config).unwrap();
    let mut f = |x: &[f64]| Ok::<f64, String>(branin_unit(x));
    opt.initialize_optimization(&mut f).unwrap();

    let mut last = opt.state().kernel_hp.clone();
    for i in 1..=20 {
        opt.step_optimization(&mut f).unwrap();
        let now = opt.state().kernel_hp.clone();
        if i % 5 != 0 {
            assert_eq!(now, last, "hyperparameters moved off-cadence at iteration {i}");
        }
        last = now;
    }
}

/// Scenario 5: criterion portfolio — `Hedge(EI,LCB,POI)` with a
/// deterministic seed produces a reproducible sequence of chosen arms,
/// and that sequence survives a save/restore midway through the run
/// (the portfolio's accumulated gains are part of the persisted loop
/// state, spec.md §3 Data Model).
#[test]
fn hedge_portfolio_reference_sequence_is_deterministic_and_survives_restore() {
    fn hedge_config(n_iterations: usize) -> BoConfig {
        let mut c = branin_config(n_iterations);
        c.crit_name = "Hedge(EI,LCB,POI)".to_string();
        c
    }

    fn run_sequence(config: BoConfig) -> Vec<usize> {
        let mut opt = BoOptimizer::new(config).unwrap();
        let mut f = |x: &[f64]| Ok::<f64, String>(branin_unit(x));
        opt.initialize_optimization(&mut f).unwrap();
        let mut seq = Vec::new();
        while opt.phase() != Phase::Finished {
            opt.step_optimization(&mut f).unwrap();
            if let Some(arm) = opt.state().last_chosen_arm {
                seq.push(arm);
            }
        }
        seq
    }

    let opt_probe = BoOptimizer::new(hedge_config(1)).unwrap();
    assert_eq!(opt_probe.criterion_arm_names(), Some(vec!["EI", "LCB", "POI"]));

    // Two independent runs with the same seed must pick identical arms
    // at every iteration (determinism).
    let reference = run_sequence(hedge_config(20));
    let repeat = run_sequence(hedge_config(20));
    assert_eq!(reference, repeat);
    assert_eq!(reference.len(), 20);

    // A run interrupted partway through, saved, and restored must
    // continue choosing the same arms the uninterrupted run does —
    // this requires the Hedge gains to round-trip through save/restore.
    let mut resumed_seq = Vec::new();
    let mut run_b = BoOptimizer::new(hedge_config(20)).unwrap();
    let mut f = |x: &[f64]| Ok::<f64, String>(branin_unit(x));
    run_b.initialize_optimization(&mut f).unwrap();
    for _ in 0..10 {
        run_b.step_optimization(&mut f).unwrap();
        if let Some(arm) = run_b.state().last_chosen_arm {
            resumed_seq.push(arm);
        }
    }
    let snapshot = run_b.save().unwrap();
    let mut resumed = BoOptimizer::restore(&snapshot, 2).unwrap();
    while resumed.phase() != Phase::Finished {
        resumed.step_optimization(&mut f).unwrap();
        if let Some(arm) = resumed.state().last_chosen_arm {
            resumed_seq.push(arm);
        }
    }
    assert_eq!(reference, resumed_seq);
}

/// Scenario 6: numerical fallback — a duplicate sample with zero
/// nugget triggers a Cholesky failure; the same duplicate with a small
/// nugget succeeds and leaves the predictive variance at the repeated
/// point close to the nugget.
#[test]
fn duplicate_sample_fails_with_zero_noise_succeeds_with_small_noise() {
    use bo_gp::{Flavor, Surrogate};
    use bo_kernel::{KernelPriorSet, LogNormalPrior, MeanPriorSet, SeIsoKernel, ZeroMean};
    use ndarray::Array1;

    fn build(noise: f64) -> Surrogate {
        let kernel = SeIsoKernel::new(1.0);
        let mean = ZeroMean;
        let prior = KernelPriorSet(vec![LogNormalPrior::fixed()]);
        Surrogate::new(Box::new(kernel), Box::new(mean), prior, MeanPriorSet(vec![]), Flavor::GpMl, noise)
    }

    let mut zero_noise = build(0.0);
    zero_noise.add_sample(Array1::from_vec(vec![0.3, 0.3]), 1.0);
    zero_noise.add_sample(Array1::from_vec(vec![0.3, 0.3]), 1.2);
    assert!(zero_noise.fit().is_err());

    let mut small_noise = build(1e-8);
    small_noise.add_sample(Array1::from_vec(vec![0.3, 0.3]), 1.0);
    small_noise.add_sample(Array1::from_vec(vec![0.3, 0.3]), 1.2);
    small_noise.fit().unwrap();
    let dist = small_noise.predict(&[0.3, 0.3]).unwrap();
    assert!(dist.std_dev().powi(2) < 1e-4);
}
