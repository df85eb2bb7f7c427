//! Atomic and composite correlation kernels.
//!
//! Every kernel exposes the same capability set (spec.md §4.1): evaluate,
//! gradient-wrt-hyperparameter, and hyperparameter get/set. Deep
//! inheritance from the reference implementation (Kernel / ISOKernel /
//! ARDKernel / concrete kernels) is flattened here into one trait plus
//! per-kernel structs; ISO vs ARD is a field (the length-scale count),
//! never a subclass.

use crate::error::{KernelError, Result};
use std::fmt::Debug;

/// A stationary or non-stationary correlation kernel over `[0, 1]^d`.
///
/// Implementors must guarantee `evaluate(x, x) > 0` for any hyperparameter
/// setting reachable through `set_hp`, and that the kernel is
/// positive-semidefinite over the domain (spec.md §4.1 contract).
pub trait Kernel: KernelClone + Debug {
    /// `k(x1, x2)`.
    fn evaluate(&self, x1: &[f64], x2: &[f64]) -> f64;

    /// `∂k(x1, x2) / ∂θ_i` where `i` is the flattened index into this
    /// kernel's hyperparameter vector (the composite tree routes a global
    /// index down to the owning leaf before calling this).
    fn gradient(&self, x1: &[f64], x2: &[f64], theta_index: usize) -> f64;

    /// Flattened hyperparameter vector, left-to-right for composites.
    fn get_hp(&self) -> Vec<f64>;

    /// Overwrite the hyperparameter vector; `theta.len()` must equal
    /// `n_hp()`.
    fn set_hp(&mut self, theta: &[f64]) -> Result<()>;

    /// Number of hyperparameters (matches the flattened `get_hp` length).
    fn n_hp(&self) -> usize;
}

/// Object-safe clone, so `Box<dyn Kernel>` can be cloned (needed when the
/// surrogate snapshots itself, or when a composite kernel is built from a
/// parsed expression tree that shares sub-kernels by value).
pub trait KernelClone {
    fn clone_box(&self) -> Box<dyn Kernel>;
}

impl<T> KernelClone for T
where
    T: 'static + Kernel + Clone,
{
    fn clone_box(&self) -> Box<dyn Kernel> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Kernel> {
    fn clone(&self) -> Box<dyn Kernel> {
        self.clone_box()
    }
}

fn check_len(theta: &[f64], expected: usize) -> Result<()> {
    if theta.len() != expected {
        return Err(KernelError::HpCountMismatch {
            expected,
            found: theta.len(),
        });
    }
    Ok(())
}

fn sq_scaled_radius(x1: &[f64], x2: &[f64], length_scale: &[f64]) -> f64 {
    x1.iter()
        .zip(x2.iter())
        .zip(length_scale.iter())
        .map(|((a, b), l)| {
            let d = (a - b) / l;
            d * d
        })
        .sum()
}

// ---------------------------------------------------------------------
// Const
// ---------------------------------------------------------------------

/// Constant kernel `k(x1, x2) = θ0`, `θ0 > 0`.
#[derive(Debug, Clone)]
pub struct ConstKernel {
    sf2: f64,
}

impl ConstKernel {
    pub fn new(sf2: f64) -> Self {
        ConstKernel { sf2 }
    }
}

impl Default for ConstKernel {
    fn default() -> Self {
        ConstKernel::new(1.0)
    }
}

impl Kernel for ConstKernel {
    fn evaluate(&self, _x1: &[f64], _x2: &[f64]) -> f64 {
        self.sf2
    }
    fn gradient(&self, _x1: &[f64], _x2: &[f64], theta_index: usize) -> f64 {
        debug_assert_eq!(theta_index, 0);
        1.0
    }
    fn get_hp(&self) -> Vec<f64> {
        vec![self.sf2]
    }
    fn set_hp(&mut self, theta: &[f64]) -> Result<()> {
        check_len(theta, 1)?;
        self.sf2 = theta[0];
        Ok(())
    }
    fn n_hp(&self) -> usize {
        1
    }
}

// ---------------------------------------------------------------------
// Linear / LinearARD
// ---------------------------------------------------------------------

/// Linear kernel `k(x1, x2) = x1 · x2`. No hyperparameters.
#[derive(Debug, Clone, Default)]
pub struct LinearKernel;

impl Kernel for LinearKernel {
    fn evaluate(&self, x1: &[f64], x2: &[f64]) -> f64 {
        x1.iter().zip(x2.iter()).map(|(a, b)| a * b).sum()
    }
    fn gradient(&self, _x1: &[f64], _x2: &[f64], _theta_index: usize) -> f64 {
        0.0
    }
    fn get_hp(&self) -> Vec<f64> {
        vec![]
    }
    fn set_hp(&mut self, theta: &[f64]) -> Result<()> {
        check_len(theta, 0)
    }
    fn n_hp(&self) -> usize {
        0
    }
}

/// Linear ARD kernel `k(x1, x2) = Σ_i θ_i x1_i x2_i`, one weight per
/// input dimension.
#[derive(Debug, Clone)]
pub struct LinearArdKernel {
    weights: Vec<f64>,
}

impl LinearArdKernel {
    pub fn new(n_dims: usize) -> Self {
        LinearArdKernel {
            weights: vec![1.0; n_dims],
        }
    }
}

impl Kernel for LinearArdKernel {
    fn evaluate(&self, x1: &[f64], x2: &[f64]) -> f64 {
        x1.iter()
            .zip(x2.iter())
            .zip(self.weights.iter())
            .map(|((a, b), w)| w * a * b)
            .sum()
    }
    fn gradient(&self, x1: &[f64], x2: &[f64], theta_index: usize) -> f64 {
        x1[theta_index] * x2[theta_index]
    }
    fn get_hp(&self) -> Vec<f64> {
        self.weights.clone()
    }
    fn set_hp(&mut self, theta: &[f64]) -> Result<()> {
        check_len(theta, self.weights.len())?;
        self.weights.copy_from_slice(theta);
        Ok(())
    }
    fn n_hp(&self) -> usize {
        self.weights.len()
    }
}

// ---------------------------------------------------------------------
// Hamming
// ---------------------------------------------------------------------

/// Hamming-distance kernel for (one-hot or index-coded) categorical
/// inputs: `k(x1, x2) = exp(-θ · #{i : x1_i ≠ x2_i})`.
#[derive(Debug, Clone)]
pub struct HammingKernel {
    theta: f64,
}

impl HammingKernel {
    pub fn new(theta: f64) -> Self {
        HammingKernel { theta }
    }
}

impl Default for HammingKernel {
    fn default() -> Self {
        HammingKernel::new(1.0)
    }
}

fn hamming_distance(x1: &[f64], x2: &[f64]) -> f64 {
    x1.iter()
        .zip(x2.iter())
        .filter(|(a, b)| (**a - **b).abs() > 1e-12)
        .count() as f64
}

impl Kernel for HammingKernel {
    fn evaluate(&self, x1: &[f64], x2: &[f64]) -> f64 {
        (-self.theta * hamming_distance(x1, x2)).exp()
    }
    fn gradient(&self, x1: &[f64], x2: &[f64], theta_index: usize) -> f64 {
        debug_assert_eq!(theta_index, 0);
        let h = hamming_distance(x1, x2);
        -h * (-self.theta * h).exp()
    }
    fn get_hp(&self) -> Vec<f64> {
        vec![self.theta]
    }
    fn set_hp(&mut self, theta: &[f64]) -> Result<()> {
        check_len(theta, 1)?;
        self.theta = theta[0];
        Ok(())
    }
    fn n_hp(&self) -> usize {
        1
    }
}

// ---------------------------------------------------------------------
// Matern family (ISO and ARD share a smoothness order, ISO vs ARD is a
// field: one shared length scale vs one per dimension).
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaternOrder {
    /// ν = 1/2
    Half,
    /// ν = 3/2
    ThreeHalves,
    /// ν = 5/2
    FiveHalves,
}

impl MaternOrder {
    fn eval(self, r: f64) -> f64 {
        match self {
            MaternOrder::Half => (-r).exp(),
            MaternOrder::ThreeHalves => {
                let s3 = 3f64.sqrt();
                (1.0 + s3 * r) * (-s3 * r).exp()
            }
            MaternOrder::FiveHalves => {
                let s5 = 5f64.sqrt();
                (1.0 + s5 * r + (5.0 / 3.0) * r * r) * (-s5 * r).exp()
            }
        }
    }

    /// `d k / d r`
    fn deval_dr(self, r: f64) -> f64 {
        match self {
            MaternOrder::Half => -(-r).exp(),
            MaternOrder::ThreeHalves => {
                let s3 = 3f64.sqrt();
                -3.0 * r * (-s3 * r).exp()
            }
            MaternOrder::FiveHalves => {
                let s5 = 5f64.sqrt();
                let poly = 1.0 + s5 * r + (5.0 / 3.0) * r * r;
                let dpoly = s5 + (10.0 / 3.0) * r;
                (dpoly - s5 * poly) * (-s5 * r).exp()
            }
        }
    }
}

/// Isotropic Matérn kernel: one shared length scale across all
/// dimensions.
#[derive(Debug, Clone)]
pub struct MaternIsoKernel {
    order: MaternOrder,
    length_scale: f64,
}

impl MaternIsoKernel {
    pub fn new(order: MaternOrder, length_scale: f64) -> Self {
        MaternIsoKernel {
            order,
            length_scale,
        }
    }

    fn radius(&self, x1: &[f64], x2: &[f64]) -> f64 {
        let sq: f64 = x1
            .iter()
            .zip(x2.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        sq.sqrt() / self.length_scale
    }
}

impl Kernel for MaternIsoKernel {
    fn evaluate(&self, x1: &[f64], x2: &[f64]) -> f64 {
        self.order.eval(self.radius(x1, x2))
    }
    fn gradient(&self, x1: &[f64], x2: &[f64], theta_index: usize) -> f64 {
        debug_assert_eq!(theta_index, 0);
        let r = self.radius(x1, x2);
        // dr/dθ = -r/θ
        self.order.deval_dr(r) * (-r / self.length_scale)
    }
    fn get_hp(&self) -> Vec<f64> {
        vec![self.length_scale]
    }
    fn set_hp(&mut self, theta: &[f64]) -> Result<()> {
        check_len(theta, 1)?;
        self.length_scale = theta[0];
        Ok(())
    }
    fn n_hp(&self) -> usize {
        1
    }
}

/// ARD Matérn kernel: one length scale per input dimension.
#[derive(Debug, Clone)]
pub struct MaternArdKernel {
    order: MaternOrder,
    length_scales: Vec<f64>,
}

impl MaternArdKernel {
    pub fn new(order: MaternOrder, n_dims: usize) -> Self {
        MaternArdKernel {
            order,
            length_scales: vec![1.0; n_dims],
        }
    }

    fn per_dim_sq(&self, x1: &[f64], x2: &[f64]) -> Vec<f64> {
        x1.iter()
            .zip(x2.iter())
            .zip(self.length_scales.iter())
            .map(|((a, b), l)| {
                let d = (a - b) / l;
                d * d
            })
            .collect()
    }

    fn radius(&self, x1: &[f64], x2: &[f64]) -> f64 {
        self.per_dim_sq(x1, x2).iter().sum::<f64>().sqrt()
    }
}

impl Kernel for MaternArdKernel {
    fn evaluate(&self, x1: &[f64], x2: &[f64]) -> f64 {
        self.order.eval(self.radius(x1, x2))
    }
    fn gradient(&self, x1: &[f64], x2: &[f64], theta_index: usize) -> f64 {
        // ∂r/∂θ_i = -((x1_i - x2_i)^2 / θ_i^3) / r   (r > 0); chained
        // through order.deval_dr(r) by the chain rule. No extra sqrt
        // of the per-dimension term belongs here (see DESIGN.md,
        // "MaternARD5 gradient").
        let r = self.radius(x1, x2);
        if r <= 0.0 {
            return 0.0;
        }
        let li = self.length_scales[theta_index];
        let di = x1[theta_index] - x2[theta_index];
        let dr_dtheta_i = -(di * di) / (li * li * li) / r;
        self.order.deval_dr(r) * dr_dtheta_i
    }
    fn get_hp(&self) -> Vec<f64> {
        self.length_scales.clone()
    }
    fn set_hp(&mut self, theta: &[f64]) -> Result<()> {
        check_len(theta, self.length_scales.len())?;
        self.length_scales.copy_from_slice(theta);
        Ok(())
    }
    fn n_hp(&self) -> usize {
        self.length_scales.len()
    }
}

// ---------------------------------------------------------------------
// Polynomial
// ---------------------------------------------------------------------

/// Polynomial kernel of fixed integer degree `1..=6`:
/// `k(x1, x2) = (x1 · x2 + θ0)^degree`.
#[derive(Debug, Clone)]
pub struct PolynomialKernel {
    degree: u32,
    offset: f64,
}

impl PolynomialKernel {
    pub fn new(degree: u32, offset: f64) -> Self {
        debug_assert!((1..=6).contains(&degree));
        PolynomialKernel { degree, offset }
    }
}

impl Kernel for PolynomialKernel {
    fn evaluate(&self, x1: &[f64], x2: &[f64]) -> f64 {
        let dot: f64 = x1.iter().zip(x2.iter()).map(|(a, b)| a * b).sum();
        (dot + self.offset).powi(self.degree as i32)
    }
    fn gradient(&self, x1: &[f64], x2: &[f64], theta_index: usize) -> f64 {
        debug_assert_eq!(theta_index, 0);
        let dot: f64 = x1.iter().zip(x2.iter()).map(|(a, b)| a * b).sum();
        self.degree as f64 * (dot + self.offset).powi(self.degree as i32 - 1)
    }
    fn get_hp(&self) -> Vec<f64> {
        vec![self.offset]
    }
    fn set_hp(&mut self, theta: &[f64]) -> Result<()> {
        check_len(theta, 1)?;
        self.offset = theta[0];
        Ok(())
    }
    fn n_hp(&self) -> usize {
        1
    }
}

// ---------------------------------------------------------------------
// Squared exponential
// ---------------------------------------------------------------------

/// Isotropic squared-exponential kernel `k = exp(-r² / 2)`.
#[derive(Debug, Clone)]
pub struct SeIsoKernel {
    length_scale: f64,
}

impl SeIsoKernel {
    pub fn new(length_scale: f64) -> Self {
        SeIsoKernel { length_scale }
    }
}

impl Kernel for SeIsoKernel {
    fn evaluate(&self, x1: &[f64], x2: &[f64]) -> f64 {
        let sq = sq_scaled_radius(x1, x2, &vec![self.length_scale; x1.len()]);
        (-0.5 * sq).exp()
    }
    fn gradient(&self, x1: &[f64], x2: &[f64], theta_index: usize) -> f64 {
        debug_assert_eq!(theta_index, 0);
        let l = self.length_scale;
        let sq = sq_scaled_radius(x1, x2, &vec![l; x1.len()]);
        let k = (-0.5 * sq).exp();
        // d/dl exp(-0.5 * sum((xi-yi)^2/l^2)) = k * sum((xi-yi)^2)/l^3
        let raw_sq: f64 = x1
            .iter()
            .zip(x2.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        k * raw_sq / l.powi(3)
    }
    fn get_hp(&self) -> Vec<f64> {
        vec![self.length_scale]
    }
    fn set_hp(&mut self, theta: &[f64]) -> Result<()> {
        check_len(theta, 1)?;
        self.length_scale = theta[0];
        Ok(())
    }
    fn n_hp(&self) -> usize {
        1
    }
}

/// ARD squared-exponential kernel, one length scale per dimension.
#[derive(Debug, Clone)]
pub struct SeArdKernel {
    length_scales: Vec<f64>,
}

impl SeArdKernel {
    pub fn new(n_dims: usize) -> Self {
        SeArdKernel {
            length_scales: vec![1.0; n_dims],
        }
    }
}

impl Kernel for SeArdKernel {
    fn evaluate(&self, x1: &[f64], x2: &[f64]) -> f64 {
        let sq = sq_scaled_radius(x1, x2, &self.length_scales);
        (-0.5 * sq).exp()
    }
    fn gradient(&self, x1: &[f64], x2: &[f64], theta_index: usize) -> f64 {
        let sq = sq_scaled_radius(x1, x2, &self.length_scales);
        let k = (-0.5 * sq).exp();
        let li = self.length_scales[theta_index];
        let di = x1[theta_index] - x2[theta_index];
        k * (di * di) / li.powi(3)
    }
    fn get_hp(&self) -> Vec<f64> {
        self.length_scales.clone()
    }
    fn set_hp(&mut self, theta: &[f64]) -> Result<()> {
        check_len(theta, self.length_scales.len())?;
        self.length_scales.copy_from_slice(theta);
        Ok(())
    }
    fn n_hp(&self) -> usize {
        self.length_scales.len()
    }
}

// ---------------------------------------------------------------------
// Rational quadratic (isotropic only, per spec.md §2)
// ---------------------------------------------------------------------

/// Isotropic rational-quadratic kernel:
/// `k = (1 + r² / (2α))^(-α)`, hyperparameters `[length_scale, α]`.
#[derive(Debug, Clone)]
pub struct RationalQuadraticIsoKernel {
    length_scale: f64,
    alpha: f64,
}

impl RationalQuadraticIsoKernel {
    pub fn new(length_scale: f64, alpha: f64) -> Self {
        RationalQuadraticIsoKernel {
            length_scale,
            alpha,
        }
    }

    fn sq_radius(&self, x1: &[f64], x2: &[f64]) -> f64 {
        sq_scaled_radius(x1, x2, &vec![self.length_scale; x1.len()])
    }
}

impl Kernel for RationalQuadraticIsoKernel {
    fn evaluate(&self, x1: &[f64], x2: &[f64]) -> f64 {
        let r2 = self.sq_radius(x1, x2);
        (1.0 + r2 / (2.0 * self.alpha)).powf(-self.alpha)
    }
    fn gradient(&self, x1: &[f64], x2: &[f64], theta_index: usize) -> f64 {
        let r2 = self.sq_radius(x1, x2);
        let base = 1.0 + r2 / (2.0 * self.alpha);
        match theta_index {
            0 => {
                // d/dl: base^(-alpha) depends on l through r2 = raw_sq/l^2
                let raw_sq: f64 = x1
                    .iter()
                    .zip(x2.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                let dr2_dl = -2.0 * raw_sq / self.length_scale.powi(3);
                -self.alpha * base.powf(-self.alpha - 1.0) * (dr2_dl / (2.0 * self.alpha))
            }
            1 => {
                // d/dalpha of (1 + r2/(2a))^(-a)
                let ln_base = base.ln();
                let dbase_dalpha = -r2 / (2.0 * self.alpha * self.alpha);
                base.powf(-self.alpha)
                    * (-ln_base + (-self.alpha) * dbase_dalpha / base)
            }
            _ => unreachable!("rational quadratic has 2 hyperparameters"),
        }
    }
    fn get_hp(&self) -> Vec<f64> {
        vec![self.length_scale, self.alpha]
    }
    fn set_hp(&mut self, theta: &[f64]) -> Result<()> {
        check_len(theta, 2)?;
        self.length_scale = theta[0];
        self.alpha = theta[1];
        Ok(())
    }
    fn n_hp(&self) -> usize {
        2
    }
}

// ---------------------------------------------------------------------
// Composite kernels
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Sum,
    Prod,
}

/// A binary combination of two kernels, `k1 + k2` or `k1 * k2`.
///
/// Composite nodes own their children by value (spec.md §9: "Composite
/// kernels via owned child pointers" becomes owned-by-value recursive
/// construction here).
#[derive(Debug, Clone)]
pub struct CompositeKernel {
    left: Box<dyn Kernel>,
    right: Box<dyn Kernel>,
    combinator: Combinator,
}

impl CompositeKernel {
    pub fn sum(left: Box<dyn Kernel>, right: Box<dyn Kernel>) -> Self {
        CompositeKernel {
            left,
            right,
            combinator: Combinator::Sum,
        }
    }

    pub fn prod(left: Box<dyn Kernel>, right: Box<dyn Kernel>) -> Self {
        CompositeKernel {
            left,
            right,
            combinator: Combinator::Prod,
        }
    }
}

impl Kernel for CompositeKernel {
    fn evaluate(&self, x1: &[f64], x2: &[f64]) -> f64 {
        let a = self.left.evaluate(x1, x2);
        let b = self.right.evaluate(x1, x2);
        match self.combinator {
            Combinator::Sum => a + b,
            Combinator::Prod => a * b,
        }
    }

    fn gradient(&self, x1: &[f64], x2: &[f64], theta_index: usize) -> f64 {
        let n_left = self.left.n_hp();
        match self.combinator {
            Combinator::Sum => {
                if theta_index < n_left {
                    self.left.gradient(x1, x2, theta_index)
                } else {
                    self.right.gradient(x1, x2, theta_index - n_left)
                }
            }
            Combinator::Prod => {
                if theta_index < n_left {
                    self.left.gradient(x1, x2, theta_index) * self.right.evaluate(x1, x2)
                } else {
                    self.left.evaluate(x1, x2) * self.right.gradient(x1, x2, theta_index - n_left)
                }
            }
        }
    }

    fn get_hp(&self) -> Vec<f64> {
        let mut hp = self.left.get_hp();
        hp.extend(self.right.get_hp());
        hp
    }

    fn set_hp(&mut self, theta: &[f64]) -> Result<()> {
        check_len(theta, self.n_hp())?;
        let n_left = self.left.n_hp();
        self.left.set_hp(&theta[..n_left])?;
        self.right.set_hp(&theta[n_left..])?;
        Ok(())
    }

    fn n_hp(&self) -> usize {
        self.left.n_hp() + self.right.n_hp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn const_kernel_is_positive_and_constant() {
        let k = ConstKernel::new(2.0);
        assert_abs_diff_eq!(k.evaluate(&[0.1, 0.2], &[0.9, 0.5]), 2.0);
        assert_abs_diff_eq!(k.evaluate(&[0.1, 0.2], &[0.1, 0.2]), 2.0);
    }

    #[test]
    fn linear_matches_dot_product() {
        let k = LinearKernel;
        assert_abs_diff_eq!(k.evaluate(&[1.0, 2.0], &[3.0, 4.0]), 11.0);
    }

    #[test]
    fn se_iso_self_correlation_is_one() {
        let k = SeIsoKernel::new(0.5);
        assert_abs_diff_eq!(k.evaluate(&[0.3, 0.7], &[0.3, 0.7]), 1.0);
    }

    #[test]
    fn matern_orders_agree_at_zero_radius() {
        for order in [MaternOrder::Half, MaternOrder::ThreeHalves, MaternOrder::FiveHalves] {
            let k = MaternIsoKernel::new(order, 1.0);
            assert_abs_diff_eq!(k.evaluate(&[0.2], &[0.2]), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn sum_composition_is_pointwise_sum() {
        let k1: Box<dyn Kernel> = Box::new(ConstKernel::new(1.0));
        let k2: Box<dyn Kernel> = Box::new(SeIsoKernel::new(1.0));
        let sum = CompositeKernel::sum(k1.clone(), k2.clone());
        let x = [0.2, 0.4];
        let y = [0.6, 0.1];
        assert_abs_diff_eq!(
            sum.evaluate(&x, &y),
            k1.evaluate(&x, &y) + k2.evaluate(&x, &y),
            epsilon = 1e-12
        );
    }

    #[test]
    fn sum_gradient_routes_to_owning_child() {
        let k1: Box<dyn Kernel> = Box::new(ConstKernel::new(1.0));
        let k2: Box<dyn Kernel> = Box::new(SeIsoKernel::new(0.7));
        let sum = CompositeKernel::sum(k1.clone(), k2.clone());
        let x = [0.2, 0.4];
        let y = [0.6, 0.1];
        // index 0 belongs to k1 (0 hyperparameters -> falls through to k2 at index 0)
        assert_abs_diff_eq!(sum.gradient(&x, &y, 0), k2.gradient(&x, &y, 0), epsilon = 1e-12);
    }

    #[test]
    fn prod_gradient_multiplies_other_child_evaluation() {
        let k1: Box<dyn Kernel> = Box::new(SeIsoKernel::new(0.7));
        let k2: Box<dyn Kernel> = Box::new(MaternIsoKernel::new(MaternOrder::ThreeHalves, 1.2));
        let prod = CompositeKernel::prod(k1.clone(), k2.clone());
        let x = [0.2, 0.4];
        let y = [0.6, 0.1];
        assert_abs_diff_eq!(
            prod.gradient(&x, &y, 0),
            k1.gradient(&x, &y, 0) * k2.evaluate(&x, &y),
            epsilon = 1e-10
        );
    }

    #[test]
    fn hp_count_mismatch_is_rejected() {
        let mut k = SeIsoKernel::new(1.0);
        assert!(k.set_hp(&[1.0, 2.0]).is_err());
    }
}
