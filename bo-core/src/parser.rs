//! The single string-parsing boundary in the workspace (spec.md §9):
//! turns `KernelSpec`/`MeanSpec`/`crit_name` into constructed
//! `Box<dyn Kernel>`/`Box<dyn Mean>`/`Box<dyn Criterion>` trees.
//!
//! Kernel names combine with `+` (sum) and `*` (product),
//! right-associative, parsed left-to-right, e.g. `SEISO+Matern3ISO*Const`
//! parses as `SEISO + (Matern3ISO * Const)`. Atom names are listed in
//! [`build_atomic_kernel`]. `hp_mean`/`hp_std` are consumed left-to-right
//! across the parsed tree, one entry per atomic hyperparameter; the
//! initial `θ_i` is `exp(hp_mean_i)`, matching `LogNormalPrior`'s
//! `log θ ~ N(mean, std²)` convention.

use crate::config::{KernelSpec, MeanSpec};
use crate::error::{BoError, Result};
use bo_criterion::{
    AOptimality, Criterion, ExpectedImprovement, GreedyMean, Hedge, LowerConfidenceBound,
    ProbabilityOfImprovement, ThompsonSampling,
};
use bo_kernel::{
    CompositeKernel, ConstKernel, HammingKernel, Kernel, KernelPriorSet, LinearArdKernel,
    LinearConstantMean, LinearKernel, LinearMean, LogNormalPrior, MaternArdKernel,
    MaternIsoKernel, MaternOrder, Mean, MeanPriorSet, NormalPrior, OneMean,
    PolynomialKernel, RationalQuadraticIsoKernel, SeArdKernel, SeIsoKernel, ZeroMean,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Sum,
    Prod,
}

/// Split a kernel-name string on top-level `+`/`*` into atom tokens and
/// the operator that follows each one (the last atom has no operator).
fn tokenize(name: &str) -> Vec<(String, Option<Op>)> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for c in name.chars() {
        match c {
            '+' => {
                tokens.push((std::mem::take(&mut current), Some(Op::Sum)));
            }
            '*' => {
                tokens.push((std::mem::take(&mut current), Some(Op::Prod)));
            }
            c if c.is_whitespace() => {}
            c => current.push(c),
        }
    }
    tokens.push((current, None));
    tokens
}

/// The outcome of parsing a `KernelSpec`: the constructed tree and the
/// flattened, left-to-right `KernelPriorSet` that matches its `get_hp()`
/// order.
pub struct ParsedKernel {
    pub kernel: Box<dyn Kernel>,
    pub prior: KernelPriorSet,
}

/// Parse `spec.name` into a kernel tree over `dim`-dimensional inputs,
/// consuming `spec.hp_mean`/`spec.hp_std` left-to-right.
pub fn parse_kernel(spec: &KernelSpec, dim: usize) -> Result<ParsedKernel> {
    let tokens = tokenize(&spec.name);
    if tokens.is_empty() || tokens.iter().all(|(n, _)| n.is_empty()) {
        return Err(BoError::Configuration("empty kernel name".into()));
    }
    let mut cursor = 0usize;
    let kernel = parse_kernel_expr(&tokens, 0, dim, &spec.hp_mean, &mut cursor)?;
    if cursor != spec.hp_mean.len() {
        return Err(BoError::Configuration(format!(
            "kernel '{}' consumed {} of {} hyperparameters",
            spec.name,
            cursor,
            spec.hp_mean.len()
        )));
    }
    if spec.hp_std.len() != spec.hp_mean.len() {
        return Err(BoError::Configuration("kernel hp_mean/hp_std length mismatch".into()));
    }
    let prior = KernelPriorSet(
        spec.hp_mean
            .iter()
            .zip(spec.hp_std.iter())
            .map(|(m, s)| LogNormalPrior::new(*m, *s))
            .collect(),
    );
    Ok(ParsedKernel { kernel, prior })
}

/// Right-associative descent: `atom [op rest]`.
fn parse_kernel_expr(
    tokens: &[(String, Option<Op>)],
    index: usize,
    dim: usize,
    hp_mean: &[f64],
    cursor: &mut usize,
) -> Result<Box<dyn Kernel>> {
    let (name, op) = &tokens[index];
    let atom = build_atomic_kernel(name, dim, hp_mean, cursor)?;
    match op {
        None => Ok(atom),
        Some(op) => {
            let rest = parse_kernel_expr(tokens, index + 1, dim, hp_mean, cursor)?;
            Ok(Box::new(match op {
                Op::Sum => CompositeKernel::sum(atom, rest),
                Op::Prod => CompositeKernel::prod(atom, rest),
            }))
        }
    }
}

/// Consume `n` entries from `hp_mean` starting at `*cursor`, exponentiated
/// to recover the concrete starting `θ`.
fn consume_theta(hp_mean: &[f64], cursor: &mut usize, n: usize, atom: &str) -> Result<Vec<f64>> {
    if *cursor + n > hp_mean.len() {
        return Err(BoError::Configuration(format!(
            "kernel atom '{atom}' needs {n} hyperparameter(s), only {} remain",
            hp_mean.len() - *cursor
        )));
    }
    let theta: Vec<f64> = hp_mean[*cursor..*cursor + n].iter().map(|m| m.exp()).collect();
    *cursor += n;
    Ok(theta)
}

fn build_atomic_kernel(
    name: &str,
    dim: usize,
    hp_mean: &[f64],
    cursor: &mut usize,
) -> Result<Box<dyn Kernel>> {
    let mut new_with = |mut k: Box<dyn Kernel>| -> Result<Box<dyn Kernel>> {
        let theta = consume_theta(hp_mean, cursor, k.n_hp(), name)?;
        k.set_hp(&theta)?;
        Ok(k)
    };

    match name {
        "Const" => new_with(Box::new(ConstKernel::default())),
        "Linear" => new_with(Box::new(LinearKernel)),
        "LinearARD" => new_with(Box::new(LinearArdKernel::new(dim))),
        "Hamming" => new_with(Box::new(HammingKernel::default())),
        "Matern1ISO" => new_with(Box::new(MaternIsoKernel::new(MaternOrder::Half, 1.0))),
        "Matern3ISO" => new_with(Box::new(MaternIsoKernel::new(MaternOrder::ThreeHalves, 1.0))),
        "Matern5ISO" => new_with(Box::new(MaternIsoKernel::new(MaternOrder::FiveHalves, 1.0))),
        "Matern1ARD" => new_with(Box::new(MaternArdKernel::new(MaternOrder::Half, dim))),
        "Matern3ARD" => new_with(Box::new(MaternArdKernel::new(MaternOrder::ThreeHalves, dim))),
        "Matern5ARD" => new_with(Box::new(MaternArdKernel::new(MaternOrder::FiveHalves, dim))),
        "Poly1" => new_with(Box::new(PolynomialKernel::new(1, 0.0))),
        "Poly2" => new_with(Box::new(PolynomialKernel::new(2, 0.0))),
        "Poly3" => new_with(Box::new(PolynomialKernel::new(3, 0.0))),
        "Poly4" => new_with(Box::new(PolynomialKernel::new(4, 0.0))),
        "Poly5" => new_with(Box::new(PolynomialKernel::new(5, 0.0))),
        "Poly6" => new_with(Box::new(PolynomialKernel::new(6, 0.0))),
        "SEISO" => new_with(Box::new(SeIsoKernel::new(1.0))),
        "SEARD" => new_with(Box::new(SeArdKernel::new(dim))),
        "RQISO" => new_with(Box::new(RationalQuadraticIsoKernel::new(1.0, 1.0))),
        other => Err(BoError::Configuration(format!("unknown kernel atom '{other}'"))),
    }
}

/// The outcome of parsing a `MeanSpec`.
pub struct ParsedMean {
    pub mean: Box<dyn Mean>,
    pub prior: MeanPriorSet,
}

/// Parse `spec.name` (no combinator grammar for means) into a mean
/// function over `dim`-dimensional inputs.
pub fn parse_mean(spec: &MeanSpec, dim: usize) -> Result<ParsedMean> {
    let mean: Box<dyn Mean> = match spec.name.as_str() {
        "Zero" => Box::new(ZeroMean),
        "One" => Box::new(OneMean),
        "Constant" => Box::new(bo_kernel::ConstantMean::default()),
        "Linear" => Box::new(LinearMean::new(dim)),
        "LinearConstant" => Box::new(LinearConstantMean::new(dim)),
        other => return Err(BoError::Configuration(format!("unknown mean '{other}'"))),
    };
    if spec.coef_mean.len() != mean.n_coef() {
        return Err(BoError::Configuration(format!(
            "mean '{}' needs {} coefficient(s), got {}",
            spec.name,
            mean.n_coef(),
            spec.coef_mean.len()
        )));
    }
    if spec.coef_std.len() != spec.coef_mean.len() {
        return Err(BoError::Configuration("mean coef_mean/coef_std length mismatch".into()));
    }
    let mut mean = mean;
    if mean.n_coef() > 0 {
        mean.set_coef(ndarray::Array1::from_vec(spec.coef_mean.clone()))?;
    }
    let prior = MeanPriorSet(
        spec.coef_mean
            .iter()
            .zip(spec.coef_std.iter())
            .map(|(m, s)| NormalPrior::new(*m, *s))
            .collect(),
    );
    Ok(ParsedMean { mean, prior })
}

fn build_single_criterion(name: &str, params: &[f64], config: &crate::config::BoConfig) -> Result<Box<dyn Criterion>> {
    match name {
        "EI" => {
            let p = params.first().copied().unwrap_or(1.0);
            Ok(Box::new(ExpectedImprovement::new(p)))
        }
        "LCB" => {
            let beta = params.first().copied().unwrap_or(1.0);
            Ok(Box::new(LowerConfidenceBound::fixed(beta)))
        }
        "LCBAnnealed" => Ok(Box::new(LowerConfidenceBound::annealed(config.delta))),
        "POI" => {
            let epsilon = params.first().copied().unwrap_or(config.epsilon);
            Ok(Box::new(ProbabilityOfImprovement::new(epsilon)))
        }
        "Thompson" => Ok(Box::new(ThompsonSampling)),
        "AOptimality" => Ok(Box::new(AOptimality)),
        "GreedyMean" => Ok(Box::new(GreedyMean)),
        other => Err(BoError::Configuration(format!("unknown criterion '{other}'"))),
    }
}

/// A parsed criterion: either one scoring rule, or a fixed-arm GP-Hedge
/// portfolio over several.
pub enum ParsedCriterion {
    Single(Box<dyn Criterion>),
    Portfolio(Hedge),
}

/// Parse `crit_name`: either a single criterion name, or the portfolio
/// syntax `Hedge(c1,c2,…)` (spec.md §4.5). `crit_params` applies to a
/// single criterion only; portfolio arms use their own defaults.
pub fn parse_criterion(name: &str, params: &[f64], config: &crate::config::BoConfig) -> Result<ParsedCriterion> {
    let name = name.trim();
    if let Some(inner) = name.strip_prefix("Hedge(").and_then(|s| s.strip_suffix(')')) {
        let arms: Vec<Box<dyn Criterion>> = inner
            .split(',')
            .map(|s| build_single_criterion(s.trim(), &[], config))
            .collect::<Result<_>>()?;
        if arms.is_empty() {
            return Err(BoError::Configuration("Hedge portfolio needs at least one arm".into()));
        }
        return Ok(ParsedCriterion::Portfolio(Hedge::new(arms, config.hedge_eta)));
    }
    Ok(ParsedCriterion::Single(build_single_criterion(name, params, config)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BoConfig;

    #[test]
    fn sum_of_two_kernels_consumes_hyperparameters_left_to_right() {
        let spec = KernelSpec {
            name: "SEISO+Const".to_string(),
            hp_mean: vec![0.0, 1.0],
            hp_std: vec![1.0, 1.0],
        };
        let parsed = parse_kernel(&spec, 2).unwrap();
        assert_eq!(parsed.kernel.n_hp(), 2);
        assert_eq!(parsed.prior.0.len(), 2);
    }

    #[test]
    fn product_is_right_associative() {
        let spec = KernelSpec {
            name: "SEISO*Matern3ISO*Const".to_string(),
            hp_mean: vec![0.0, 0.0, 0.0],
            hp_std: vec![1.0, 1.0, 1.0],
        };
        let parsed = parse_kernel(&spec, 3).unwrap();
        assert_eq!(parsed.kernel.n_hp(), 3);
    }

    #[test]
    fn ard_kernel_consumes_one_hyperparameter_per_dimension() {
        let spec = KernelSpec {
            name: "SEARD".to_string(),
            hp_mean: vec![0.0, 0.0, 0.0],
            hp_std: vec![1.0, 1.0, 1.0],
        };
        let parsed = parse_kernel(&spec, 3).unwrap();
        assert_eq!(parsed.kernel.n_hp(), 3);
    }

    #[test]
    fn mismatched_hyperparameter_count_is_rejected() {
        let spec = KernelSpec {
            name: "SEISO".to_string(),
            hp_mean: vec![0.0, 0.0],
            hp_std: vec![1.0, 1.0],
        };
        assert!(parse_kernel(&spec, 1).is_err());
    }

    #[test]
    fn unknown_kernel_atom_is_rejected() {
        let spec = KernelSpec {
            name: "NotAKernel".to_string(),
            hp_mean: vec![],
            hp_std: vec![],
        };
        assert!(parse_kernel(&spec, 1).is_err());
    }

    #[test]
    fn zero_mean_needs_no_coefficients() {
        let spec = MeanSpec {
            name: "Zero".to_string(),
            coef_mean: vec![],
            coef_std: vec![],
        };
        let parsed = parse_mean(&spec, 3).unwrap();
        assert_eq!(parsed.mean.n_coef(), 0);
    }

    #[test]
    fn linear_constant_mean_needs_dim_plus_one_coefficients() {
        let spec = MeanSpec {
            name: "LinearConstant".to_string(),
            coef_mean: vec![0.0, 0.0, 0.0],
            coef_std: vec![1.0, 1.0, 1.0],
        };
        let parsed = parse_mean(&spec, 2).unwrap();
        assert_eq!(parsed.mean.n_coef(), 3);
    }

    #[test]
    fn hedge_syntax_builds_one_arm_per_name() {
        let config = BoConfig::default();
        match parse_criterion("Hedge(EI,LCB,POI)", &[], &config).unwrap() {
            ParsedCriterion::Portfolio(hedge) => assert_eq!(hedge.n_arms(), 3),
            ParsedCriterion::Single(_) => panic!("expected a portfolio"),
        }
    }

    #[test]
    fn single_criterion_name_builds_one_criterion() {
        let config = BoConfig::default();
        match parse_criterion("EI", &[2.0], &config).unwrap() {
            ParsedCriterion::Single(c) => assert_eq!(c.name(), "EI"),
            ParsedCriterion::Portfolio(_) => panic!("expected a single criterion"),
        }
    }
}
