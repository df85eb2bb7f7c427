//! Parametric mean functions `μ(x) = β · φ(x)` (spec.md §4.2).

use crate::error::{KernelError, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use std::fmt::Debug;

/// A parametric mean function with a fixed-size feature map.
pub trait Mean: MeanClone + Debug {
    /// Number of coefficients / feature dimensions, fixed at construction.
    fn n_coef(&self) -> usize;

    /// `φ(x) ∈ ℝ^m`.
    fn features(&self, x: &[f64]) -> Array1<f64>;

    /// `Φ ∈ ℝ^{m×n}` for a design matrix `X` with `n` rows.
    fn features_all(&self, x: &ArrayView2<f64>) -> Array2<f64> {
        let m = self.n_coef();
        let n = x.nrows();
        let mut phi = Array2::<f64>::zeros((m, n));
        for (i, row) in x.axis_iter(Axis(0)).enumerate() {
            let f = self.features(row.as_slice().expect("contiguous row"));
            phi.column_mut(i).assign(&f);
        }
        phi
    }

    fn coef(&self) -> &Array1<f64>;

    fn set_coef(&mut self, beta: Array1<f64>) -> Result<()>;

    /// `μ(x) = β · φ(x)`.
    fn mean(&self, x: &[f64]) -> f64 {
        self.coef().dot(&self.features(x))
    }

    /// `Φᵀβ` for every row of `X`.
    fn mean_all(&self, x: &ArrayView2<f64>) -> Array1<f64> {
        self.features_all(x).t().dot(self.coef())
    }
}

pub trait MeanClone {
    fn clone_box(&self) -> Box<dyn Mean>;
}

impl<T> MeanClone for T
where
    T: 'static + Mean + Clone,
{
    fn clone_box(&self) -> Box<dyn Mean> {
        Box::new(self.clone())
    }
}

impl Clone for Box<dyn Mean> {
    fn clone(&self) -> Box<dyn Mean> {
        self.clone_box()
    }
}

fn check_coef_len(beta: &Array1<f64>, expected: usize) -> Result<()> {
    if beta.len() != expected {
        return Err(KernelError::CoefCountMismatch {
            expected,
            found: beta.len(),
        });
    }
    Ok(())
}

/// `μ(x) ≡ 0`; no coefficients.
#[derive(Debug, Clone, Default)]
pub struct ZeroMean;

impl Mean for ZeroMean {
    fn n_coef(&self) -> usize {
        0
    }
    fn features(&self, _x: &[f64]) -> Array1<f64> {
        Array1::zeros(0)
    }
    fn coef(&self) -> &Array1<f64> {
        static EMPTY: once_cell_like::Empty = once_cell_like::Empty::new();
        EMPTY.get()
    }
    fn set_coef(&mut self, beta: Array1<f64>) -> Result<()> {
        check_coef_len(&beta, 0)
    }
    fn mean(&self, _x: &[f64]) -> f64 {
        0.0
    }
}

/// `μ(x) ≡ 1`; no coefficients (a fixed, unlearned mean).
#[derive(Debug, Clone, Default)]
pub struct OneMean;

impl Mean for OneMean {
    fn n_coef(&self) -> usize {
        0
    }
    fn features(&self, _x: &[f64]) -> Array1<f64> {
        Array1::zeros(0)
    }
    fn coef(&self) -> &Array1<f64> {
        static EMPTY: once_cell_like::Empty = once_cell_like::Empty::new();
        EMPTY.get()
    }
    fn set_coef(&mut self, beta: Array1<f64>) -> Result<()> {
        check_coef_len(&beta, 0)
    }
    fn mean(&self, _x: &[f64]) -> f64 {
        1.0
    }
}

/// `μ(x) = β0`, one learnable coefficient.
#[derive(Debug, Clone)]
pub struct ConstantMean {
    beta: Array1<f64>,
}

impl Default for ConstantMean {
    fn default() -> Self {
        ConstantMean {
            beta: Array1::zeros(1),
        }
    }
}

impl Mean for ConstantMean {
    fn n_coef(&self) -> usize {
        1
    }
    fn features(&self, _x: &[f64]) -> Array1<f64> {
        Array1::ones(1)
    }
    fn coef(&self) -> &Array1<f64> {
        &self.beta
    }
    fn set_coef(&mut self, beta: Array1<f64>) -> Result<()> {
        check_coef_len(&beta, 1)?;
        self.beta = beta;
        Ok(())
    }
}

/// `μ(x) = β · x`, one coefficient per input dimension.
#[derive(Debug, Clone)]
pub struct LinearMean {
    beta: Array1<f64>,
}

impl LinearMean {
    pub fn new(n_dims: usize) -> Self {
        LinearMean {
            beta: Array1::zeros(n_dims),
        }
    }
}

impl Mean for LinearMean {
    fn n_coef(&self) -> usize {
        self.beta.len()
    }
    fn features(&self, x: &[f64]) -> Array1<f64> {
        Array1::from_vec(x.to_vec())
    }
    fn coef(&self) -> &Array1<f64> {
        &self.beta
    }
    fn set_coef(&mut self, beta: Array1<f64>) -> Result<()> {
        check_coef_len(&beta, self.beta.len())?;
        self.beta = beta;
        Ok(())
    }
}

/// `μ(x) = β0 + β1..d · x`, intercept plus one coefficient per dimension.
#[derive(Debug, Clone)]
pub struct LinearConstantMean {
    beta: Array1<f64>,
}

impl LinearConstantMean {
    pub fn new(n_dims: usize) -> Self {
        LinearConstantMean {
            beta: Array1::zeros(n_dims + 1),
        }
    }
}

impl Mean for LinearConstantMean {
    fn n_coef(&self) -> usize {
        self.beta.len()
    }
    fn features(&self, x: &[f64]) -> Array1<f64> {
        let mut f = Vec::with_capacity(x.len() + 1);
        f.push(1.0);
        f.extend_from_slice(x);
        Array1::from_vec(f)
    }
    fn coef(&self) -> &Array1<f64> {
        &self.beta
    }
    fn set_coef(&mut self, beta: Array1<f64>) -> Result<()> {
        check_coef_len(&beta, self.beta.len())?;
        self.beta = beta;
        Ok(())
    }
}

/// A tiny zero-sized-friendly holder for the empty coefficient vector
/// returned by means with no learnable parameters, avoiding an
/// allocation in `coef()`'s hot path.
mod once_cell_like {
    use ndarray::Array1;
    use std::sync::OnceLock;

    pub struct Empty(OnceLock<Array1<f64>>);

    impl Empty {
        pub const fn new() -> Self {
            Empty(OnceLock::new())
        }
        pub fn get(&self) -> &Array1<f64> {
            self.0.get_or_init(|| Array1::zeros(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn zero_mean_is_always_zero() {
        let m = ZeroMean;
        assert_abs_diff_eq!(m.mean(&[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn constant_mean_uses_its_coefficient() {
        let mut m = ConstantMean::default();
        m.set_coef(array![4.0]).unwrap();
        assert_abs_diff_eq!(m.mean(&[1.0, 2.0]), 4.0);
    }

    #[test]
    fn linear_constant_mean_features_prepend_one() {
        let m = LinearConstantMean::new(2);
        let f = m.features(&[2.0, 3.0]);
        assert_eq!(f.to_vec(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn mean_all_matches_per_row_mean() {
        let mut m = LinearMean::new(2);
        m.set_coef(array![1.0, -1.0]).unwrap();
        let x = array![[1.0, 2.0], [3.0, 1.0]];
        let all = m.mean_all(&x.view());
        assert_abs_diff_eq!(all[0], m.mean(&[1.0, 2.0]));
        assert_abs_diff_eq!(all[1], m.mean(&[3.0, 1.0]));
    }
}
