//! Initial design-of-experiments generators (spec.md §4.7): every
//! generator fills an `n × d` matrix of points in `[0, 1]^d`, leaving
//! rescaling to problem bounds to the caller.

use ndarray::Array2;
use rand::Rng;

/// Which generator `initial_design` should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesignKind {
    /// Plain i.i.d. uniform samples.
    Uniform,
    /// Latin hypercube: one stratified sample per row/column cell,
    /// jittered within the cell.
    LatinHypercube,
    /// A deterministic low-discrepancy sequence (Halton, one coprime
    /// base per dimension) used as a practical stand-in for the
    /// reference implementation's Sobol generator — it gives the same
    /// better-than-random space-filling property without needing a
    /// direction-number table.
    LowDiscrepancy,
}

pub fn initial_design(kind: DesignKind, n: usize, d: usize, rng: &mut impl Rng) -> Array2<f64> {
    match kind {
        DesignKind::Uniform => uniform(n, d, rng),
        DesignKind::LatinHypercube => latin_hypercube(n, d, rng),
        DesignKind::LowDiscrepancy => low_discrepancy(n, d),
    }
}

pub fn uniform(n: usize, d: usize, rng: &mut impl Rng) -> Array2<f64> {
    Array2::from_shape_fn((n, d), |_| rng.gen::<f64>())
}

/// Standard Latin hypercube: an independent random permutation of
/// `{0, ..., n-1}` per column, each cell jittered uniformly within its
/// `1/n` stratum.
pub fn latin_hypercube(n: usize, d: usize, rng: &mut impl Rng) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros((n, d));
    if n == 0 {
        return out;
    }
    for col in 0..d {
        let mut perm: Vec<usize> = (0..n).collect();
        for i in (1..n).rev() {
            let j = rng.gen_range(0..=i);
            perm.swap(i, j);
        }
        for (row, &p) in perm.iter().enumerate() {
            let jitter: f64 = rng.gen();
            out[[row, col]] = (p as f64 + jitter) / n as f64;
        }
    }
    out
}

const PRIMES: [u64; 16] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53];

/// The `i`-th term of the van der Corput sequence in base `base`.
fn van_der_corput(mut i: u64, base: u64) -> f64 {
    let mut f = 1.0;
    let mut r = 0.0;
    while i > 0 {
        f /= base as f64;
        r += f * (i % base) as f64;
        i /= base;
    }
    r
}

/// Halton sequence: one van der Corput sequence per dimension, each in
/// a distinct prime base (points `1..=n`, skipping `0` which is
/// degenerate in every base).
pub fn low_discrepancy(n: usize, d: usize) -> Array2<f64> {
    Array2::from_shape_fn((n, d), |(row, col)| {
        let base = PRIMES[col % PRIMES.len()];
        van_der_corput((row + 1) as u64, base)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn latin_hypercube_has_one_point_per_stratum() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let design = latin_hypercube(5, 2, &mut rng);
        for col in 0..2 {
            let mut strata: Vec<usize> = design
                .column(col)
                .iter()
                .map(|v| (v * 5.0).floor() as usize)
                .collect();
            strata.sort_unstable();
            assert_eq!(strata, vec![0, 1, 2, 3, 4]);
        }
    }

    #[test]
    fn low_discrepancy_points_stay_in_unit_cube() {
        let design = low_discrepancy(20, 3);
        assert!(design.iter().all(|&v| (0.0..1.0).contains(&v)));
    }

    #[test]
    fn uniform_points_stay_in_unit_cube() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let design = uniform(10, 2, &mut rng);
        assert!(design.iter().all(|&v| (0.0..1.0).contains(&v)));
    }
}
