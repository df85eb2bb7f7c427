//! Linear-algebra primitives (spec.md §4.1 numerical contract):
//! symmetric Cholesky decompose, triangular solve, and rank-1 Cholesky
//! append. Treated as primitives per spec.md §1 rather than routed
//! through an external linear-algebra/LAPACK binding, since the
//! incremental append has no off-the-shelf equivalent and the plain
//! decompose/solve routines it depends on are a handful of lines.

use crate::error::{GpError, Result};
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};

/// Decompose a symmetric positive-definite matrix `k` into its lower
/// Cholesky factor `l` such that `l · lᵀ = k`.
pub fn decompose(k: &ArrayView2<f64>) -> Result<Array2<f64>> {
    let n = k.nrows();
    debug_assert_eq!(k.ncols(), n);
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = k[[i, j]];
            for p in 0..j {
                sum -= l[[i, p]] * l[[j, p]];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return Err(GpError::NotPositiveDefinite { operation: "decompose" });
                }
                l[[i, j]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Ok(l)
}

/// Forward substitution: solve `l x = b` for lower-triangular `l`.
pub fn solve_lower(l: &ArrayView2<f64>, b: &ArrayView1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut x = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[[i, j]] * x[j];
        }
        x[i] = sum / l[[i, i]];
    }
    x
}

/// Backward substitution: solve `lᵀ x = b` for lower-triangular `l`.
pub fn solve_lower_transpose(l: &ArrayView2<f64>, b: &ArrayView1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = b[i];
        for j in (i + 1)..n {
            sum -= l[[j, i]] * x[j];
        }
        x[i] = sum / l[[i, i]];
    }
    x
}

/// Solve `l X = B` column-by-column (forward substitution on every
/// column of a dense right-hand side).
pub fn solve_lower_mat(l: &ArrayView2<f64>, b: &ArrayView2<f64>) -> Array2<f64> {
    let n = l.nrows();
    let m = b.ncols();
    let mut x = Array2::<f64>::zeros((n, m));
    for col in 0..m {
        let bc = b.column(col).to_owned();
        let xc = solve_lower(l, &bc.view());
        x.column_mut(col).assign(&xc);
    }
    x
}

/// A growable lower-triangular Cholesky factor with capacity reserved up
/// front (spec.md §9 "Mutable matrices resized in place" becomes a
/// fixed-capacity buffer grown by index, not reallocated, on the common
/// path).
#[derive(Debug, Clone)]
pub struct CholeskyFactor {
    storage: Array2<f64>,
    len: usize,
}

impl CholeskyFactor {
    /// Allocate storage for up to `capacity` samples.
    pub fn with_capacity(capacity: usize) -> Self {
        CholeskyFactor {
            storage: Array2::zeros((capacity, capacity)),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.storage.nrows()
    }

    /// View of the valid `len x len` lower-triangular factor.
    pub fn l(&self) -> ArrayView2<f64> {
        self.storage.slice(s![..self.len, ..self.len])
    }

    fn ensure_capacity(&mut self, needed: usize) {
        if needed <= self.capacity() {
            return;
        }
        let new_cap = needed.max(self.capacity() * 2).max(1);
        let mut new_storage = Array2::<f64>::zeros((new_cap, new_cap));
        new_storage
            .slice_mut(s![..self.len, ..self.len])
            .assign(&self.storage.slice(s![..self.len, ..self.len]));
        self.storage = new_storage;
    }

    /// Recompute the factor from scratch for a freshly built `k`
    /// (spec.md §4.3 `fit`).
    pub fn reset_from(&mut self, k: &ArrayView2<f64>) -> Result<()> {
        let n = k.nrows();
        self.ensure_capacity(n);
        let l = decompose(k)?;
        self.storage.slice_mut(s![..n, ..n]).assign(&l);
        self.len = n;
        Ok(())
    }

    /// Rank-1 append: given the correlation of a new sample against the
    /// existing ones (`k_star`) and its self-correlation (`k_star_star`,
    /// nugget included), extend the factor by one row/column in
    /// `O(n²)` without a full refactor.
    ///
    /// Returns an error (without mutating `self`) if the new diagonal
    /// entry would be non-positive — the caller is expected to fall back
    /// to a full `reset_from` refactor (spec.md §4.3 numerical contract).
    pub fn append(&mut self, k_star: &ArrayView1<f64>, k_star_star: f64) -> Result<()> {
        let n = self.len;
        debug_assert_eq!(k_star.len(), n);
        let l21 = if n == 0 {
            Array1::<f64>::zeros(0)
        } else {
            solve_lower(&self.l(), k_star)
        };
        let residual = k_star_star - l21.dot(&l21);
        if residual <= 0.0 || !residual.is_finite() {
            return Err(GpError::NotPositiveDefinite { operation: "append" });
        }
        let l22 = residual.sqrt();
        self.ensure_capacity(n + 1);
        self.storage
            .slice_mut(s![n, ..n])
            .assign(&l21);
        self.storage[[n, n]] = l22;
        self.len = n + 1;
        Ok(())
    }

    pub fn solve(&self, b: &ArrayView1<f64>) -> Array1<f64> {
        let y = solve_lower(&self.l(), b);
        solve_lower_transpose(&self.l(), &y.view())
    }

    /// `2 Σ log(l_ii)`, the log-determinant of `k = l lᵀ`.
    pub fn log_det(&self) -> f64 {
        (0..self.len).map(|i| self.storage[[i, i]].ln()).sum::<f64>() * 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn frobenius_residual(k: &Array2<f64>, l: &ArrayView2<f64>) -> f64 {
        let recon = l.dot(&l.t());
        (&recon - k).mapv(|v| v * v).sum().sqrt()
    }

    #[test]
    fn decompose_reconstructs_matrix() {
        let k = array![[4.0, 2.0, 0.0], [2.0, 5.0, 1.0], [0.0, 1.0, 3.0]];
        let l = decompose(&k.view()).unwrap();
        assert!(frobenius_residual(&k, &l.view()) < 1e-9 * (k.mapv(|v| v * v).sum().sqrt()).max(1.0));
    }

    #[test]
    fn append_matches_full_refactor() {
        let k_small = array![[4.0, 2.0], [2.0, 5.0]];
        let mut chol = CholeskyFactor::with_capacity(4);
        chol.reset_from(&k_small.view()).unwrap();

        let k_star = array![1.0, 0.5];
        let k_star_star = 3.0;
        chol.append(&k_star.view(), k_star_star).unwrap();

        let k_full = array![[4.0, 2.0, 1.0], [2.0, 5.0, 0.5], [1.0, 0.5, 3.0]];
        let l_full = decompose(&k_full.view()).unwrap();
        let diff = (&chol.l().to_owned() - &l_full).mapv(|v| v.abs()).sum();
        assert_abs_diff_eq!(diff, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn append_rejects_loss_of_positive_definiteness() {
        let k_small = array![[1.0, 0.0], [0.0, 1.0]];
        let mut chol = CholeskyFactor::with_capacity(4);
        chol.reset_from(&k_small.view()).unwrap();
        // duplicate point with zero nugget: k_star_star - l21.l21 <= 0
        let k_star = array![1.0, 0.0];
        assert!(chol.append(&k_star.view(), 1.0).is_err());
    }

    #[test]
    fn solve_round_trips_through_cholesky() {
        let k = array![[4.0, 2.0], [2.0, 5.0]];
        let mut chol = CholeskyFactor::with_capacity(2);
        chol.reset_from(&k.view()).unwrap();
        let b = array![1.0, 2.0];
        let x = chol.solve(&b.view());
        let reconstructed = k.dot(&x);
        assert_abs_diff_eq!(reconstructed[0], b[0], epsilon = 1e-9);
        assert_abs_diff_eq!(reconstructed[1], b[1], epsilon = 1e-9);
    }
}
