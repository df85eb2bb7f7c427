//! Configuration (spec.md §6): the recognised options, assembled by
//! the embedding program as a plain struct — no builder-pattern or CLI
//! parsing lives here, only the string-grammar names the `parser`
//! module turns into constructed kernels/means/criteria.

use serde::{Deserialize, Serialize};

/// `init_method` (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitMethod {
    LatinHypercube,
    Sobol,
    Uniform,
}

impl Default for InitMethod {
    fn default() -> Self {
        InitMethod::LatinHypercube
    }
}

/// `surr_name` (spec.md §6): which surrogate flavour to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurrName {
    Gp,
    GpMl,
    GpNormal,
    StudentTJef,
    StudentTNig,
}

impl Default for SurrName {
    fn default() -> Self {
        SurrName::GpMl
    }
}

/// `sc_type` (spec.md §6): hyperparameter learning mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScType {
    Fixed,
    Ml,
    Map,
    Loo,
    Mcmc { n_samples: usize, burn_in: usize },
}

impl Default for ScType {
    fn default() -> Self {
        ScType::Fixed
    }
}

/// `verbose_level`: ambient observability only, mapped to a
/// `log::LevelFilter` by the embedding program (spec.md §9 "global
/// logging" design note — this crate never installs a logger itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerboseLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for VerboseLevel {
    fn default() -> Self {
        VerboseLevel::Warn
    }
}

impl VerboseLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            VerboseLevel::Off => log::LevelFilter::Off,
            VerboseLevel::Error => log::LevelFilter::Error,
            VerboseLevel::Warn => log::LevelFilter::Warn,
            VerboseLevel::Info => log::LevelFilter::Info,
            VerboseLevel::Debug => log::LevelFilter::Debug,
            VerboseLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// `kernel: { name, hp_mean, hp_std }` (spec.md §6). `name` follows the
/// `k1+k2` / `k1*k2` combinator grammar, right-associative, parsed
/// left-to-right (`bo_core::parser`). `hp_mean`/`hp_std` are the
/// log-normal prior parameters, flattened left-to-right across the
/// parsed tree; the kernel's initial `θ` is `exp(hp_mean)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KernelSpec {
    pub name: String,
    pub hp_mean: Vec<f64>,
    pub hp_std: Vec<f64>,
}

/// `mean: { name, coef_mean, coef_std }` (spec.md §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeanSpec {
    pub name: String,
    pub coef_mean: Vec<f64>,
    pub coef_std: Vec<f64>,
}

/// The full recognised option set of spec.md §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoConfig {
    pub dim: usize,
    pub lower_bound: Vec<f64>,
    pub upper_bound: Vec<f64>,

    pub n_iterations: usize,
    pub n_init_samples: usize,
    pub n_iter_relearn: usize,
    pub init_method: InitMethod,
    pub random_seed: i64,

    pub verbose_level: VerboseLevel,
    pub log_filename: Option<String>,

    pub noise: f64,
    pub surr_name: SurrName,
    pub sc_type: ScType,
    pub l_all: bool,

    pub kernel: KernelSpec,
    pub mean: MeanSpec,

    /// Criterion name; portfolio syntax `Hedge(c1,c2,…)`.
    pub crit_name: String,
    /// Per-criterion scalars (e.g. `β` for a fixed LCB, `p` for `EI^p`).
    pub crit_params: Vec<f64>,

    /// NIG prior hyperparameters (Student-t flavours only).
    pub alpha: f64,
    pub beta: f64,
    pub delta: f64,

    /// ε-greedy uniformly-random exploration probability.
    pub epsilon: f64,
    /// Iterations between unconditional random restarts.
    pub force_jump: usize,
    /// Hedge softmax temperature.
    pub hedge_eta: f64,
}

impl Default for BoConfig {
    fn default() -> Self {
        BoConfig {
            dim: 1,
            lower_bound: vec![0.0],
            upper_bound: vec![1.0],
            n_iterations: 100,
            n_init_samples: 10,
            n_iter_relearn: 0,
            init_method: InitMethod::default(),
            random_seed: 0,
            verbose_level: VerboseLevel::default(),
            log_filename: None,
            noise: 1e-10,
            surr_name: SurrName::default(),
            sc_type: ScType::default(),
            l_all: false,
            kernel: KernelSpec {
                name: "SEISO".to_string(),
                hp_mean: vec![0.0],
                hp_std: vec![1.0],
            },
            mean: MeanSpec {
                name: "Zero".to_string(),
                coef_mean: vec![],
                coef_std: vec![],
            },
            crit_name: "EI".to_string(),
            crit_params: vec![],
            alpha: 1.0,
            beta: 1.0,
            delta: 1.0,
            epsilon: 0.0,
            force_jump: 20,
            hedge_eta: 1.0,
        }
    }
}

impl BoConfig {
    /// Surface configuration errors at construction (spec.md §7: "no
    /// side effects").
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::BoError;
        if self.dim == 0 {
            return Err(BoError::Configuration("dim must be >= 1".into()));
        }
        if self.lower_bound.len() != self.dim || self.upper_bound.len() != self.dim {
            return Err(BoError::Configuration(format!(
                "bounds length must equal dim ({}), got lower={} upper={}",
                self.dim,
                self.lower_bound.len(),
                self.upper_bound.len()
            )));
        }
        if self
            .lower_bound
            .iter()
            .zip(self.upper_bound.iter())
            .any(|(l, u)| !(l < u))
        {
            return Err(BoError::Configuration("lower_bound must be < upper_bound in every dimension".into()));
        }
        if self.n_iterations < 1 {
            return Err(BoError::Configuration("n_iterations must be >= 1".into()));
        }
        if self.n_init_samples < 1 {
            return Err(BoError::Configuration("n_init_samples must be >= 1".into()));
        }
        if self.kernel.hp_mean.len() != self.kernel.hp_std.len() {
            return Err(BoError::Configuration("kernel hp_mean/hp_std length mismatch".into()));
        }
        if self.mean.coef_mean.len() != self.mean.coef_std.len() {
            return Err(BoError::Configuration("mean coef_mean/coef_std length mismatch".into()));
        }
        if self.noise < 0.0 {
            return Err(BoError::Configuration("noise must be >= 0".into()));
        }
        Ok(())
    }

    /// `x ∈ [0,1]^d → [lower_bound, upper_bound]` (spec.md §6 objective
    /// contract).
    pub fn scale_to_bounds(&self, unit: &[f64]) -> Vec<f64> {
        unit.iter()
            .zip(self.lower_bound.iter().zip(self.upper_bound.iter()))
            .map(|(u, (lo, hi))| lo + u * (hi - lo))
            .collect()
    }

    /// Inverse of `scale_to_bounds`.
    pub fn scale_to_unit(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(self.lower_bound.iter().zip(self.upper_bound.iter()))
            .map(|(v, (lo, hi))| (v - lo) / (hi - lo))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn default_config_validates() {
        assert!(BoConfig::default().validate().is_ok());
    }

    #[test]
    fn mismatched_bounds_are_rejected() {
        let mut c = BoConfig::default();
        c.lower_bound = vec![0.0, 0.0];
        assert!(c.validate().is_err());
    }

    #[test]
    fn scale_round_trips() {
        let mut c = BoConfig::default();
        c.dim = 2;
        c.lower_bound = vec![-5.0, 0.0];
        c.upper_bound = vec![10.0, 1.0];
        let x = vec![3.2, 0.7];
        let unit = c.scale_to_unit(&x);
        let back = c.scale_to_bounds(&unit);
        assert_abs_diff_eq!(back[0], x[0], epsilon = 1e-9);
        assert_abs_diff_eq!(back[1], x[1], epsilon = 1e-9);
    }
}
