//! The scalar predictive distribution returned by `Surrogate::predict`
//! (spec.md §4.3): mean, standard deviation, degrees of freedom (`∞` for
//! the Gaussian flavours), plus a CDF/PDF oracle used by the acquisition
//! criteria.

use std::f64::consts::PI;

/// `mean`, `scale` and `dof` fully determine the distribution: a Normal
/// when `dof` is infinite, a (possibly non-standard, `scale`d) Student-t
/// otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictiveDistribution {
    pub mean: f64,
    pub scale: f64,
    pub dof: f64,
}

impl PredictiveDistribution {
    pub fn gaussian(mean: f64, std_dev: f64) -> Self {
        PredictiveDistribution {
            mean,
            scale: std_dev,
            dof: f64::INFINITY,
        }
    }

    pub fn student_t(mean: f64, scale: f64, dof: f64) -> Self {
        PredictiveDistribution { mean, scale, dof }
    }

    pub fn is_gaussian(&self) -> bool {
        !self.dof.is_finite()
    }

    /// Standard deviation of the distribution (for `ν ≤ 2` Student-t this
    /// is infinite, matching the undefined second moment).
    pub fn std_dev(&self) -> f64 {
        if self.is_gaussian() {
            self.scale
        } else if self.dof > 2.0 {
            self.scale * (self.dof / (self.dof - 2.0)).sqrt()
        } else {
            f64::INFINITY
        }
    }

    /// `Φ((y - mean) / scale)` for Gaussian, the Student-t CDF otherwise.
    pub fn cdf(&self, y: f64) -> f64 {
        let z = (y - self.mean) / self.scale;
        if self.is_gaussian() {
            standard_normal_cdf(z)
        } else {
            student_t_cdf(z, self.dof)
        }
    }

    /// Density at `y`.
    pub fn pdf(&self, y: f64) -> f64 {
        let z = (y - self.mean) / self.scale;
        if self.is_gaussian() {
            standard_normal_pdf(z) / self.scale
        } else {
            student_t_pdf(z, self.dof) / self.scale
        }
    }

    /// `z = (y - mean) / scale`, the standardised argument used by the
    /// acquisition criteria.
    pub fn standardize(&self, y: f64) -> f64 {
        if self.scale <= 0.0 {
            return if y >= self.mean { f64::INFINITY } else { f64::NEG_INFINITY };
        }
        (y - self.mean) / self.scale
    }
}

pub fn standard_normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / (2.0 * PI).sqrt()
}

pub fn standard_normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Abramowitz & Stegun 7.1.26 rational approximation, accurate to
/// `~1.5e-7`, which is ample for acquisition-criterion ranking.
pub fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;
    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();
    sign * y
}

pub fn student_t_pdf(t: f64, dof: f64) -> f64 {
    let num = gamma_fn((dof + 1.0) / 2.0);
    let den = (dof * PI).sqrt() * gamma_fn(dof / 2.0);
    (num / den) * (1.0 + t * t / dof).powf(-(dof + 1.0) / 2.0)
}

pub fn student_t_cdf(t: f64, dof: f64) -> f64 {
    let x = dof / (dof + t * t);
    let ib = regularized_incomplete_beta(x, dof / 2.0, 0.5);
    if t >= 0.0 {
        1.0 - 0.5 * ib
    } else {
        0.5 * ib
    }
}

/// Lanczos approximation of `Γ(x)` for `x > 0`.
pub fn gamma_fn(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEF: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        PI / ((PI * x).sin() * gamma_fn(1.0 - x))
    } else {
        let x = x - 1.0;
        let mut a = COEF[0];
        let t = x + G + 0.5;
        for (i, c) in COEF.iter().enumerate().skip(1) {
            a += c / (x + i as f64);
        }
        (2.0 * PI).sqrt() * t.powf(x + 0.5) * (-t).exp() * a
    }
}

pub(crate) fn ln_gamma(x: f64) -> f64 {
    gamma_fn(x).ln()
}

/// Regularized incomplete beta `I_x(a, b)` via a continued-fraction
/// evaluation (the standard Numerical-Recipes `betacf` scheme).
fn regularized_incomplete_beta(x: f64, a: f64, b: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let bt = (ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln()).exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        bt * betacf(x, a, b) / a
    } else {
        1.0 - bt * betacf(1.0 - x, b, a) / b
    }
}

/// Continued fraction for the incomplete beta function (Lentz's
/// algorithm), per Numerical Recipes §6.4.
fn betacf(x: f64, a: f64, b: f64) -> f64 {
    const MAXIT: usize = 200;
    const EPS: f64 = 3e-14;
    const FPMIN: f64 = 1e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < FPMIN {
        d = FPMIN;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAXIT {
        let m_f = m as f64;
        let m2 = 2.0 * m_f;

        let aa = m_f * (b - m_f) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m_f) * (qab + m_f) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;

        if (del - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn standard_normal_cdf_at_zero_is_half() {
        assert_abs_diff_eq!(standard_normal_cdf(0.0), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn standard_normal_cdf_matches_known_quantile() {
        // Phi(1.959964) ~= 0.975
        assert_abs_diff_eq!(standard_normal_cdf(1.959_964), 0.975, epsilon = 1e-4);
    }

    #[test]
    fn student_t_converges_to_normal_for_large_dof() {
        let z = 1.3;
        let t_cdf = student_t_cdf(z, 1.0e6);
        assert_abs_diff_eq!(t_cdf, standard_normal_cdf(z), epsilon = 1e-3);
    }

    #[test]
    fn student_t_cdf_at_zero_is_half() {
        assert_abs_diff_eq!(student_t_cdf(0.0, 5.0), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn predictive_distribution_gaussian_matches_normal_helpers() {
        let d = PredictiveDistribution::gaussian(1.0, 2.0);
        assert_abs_diff_eq!(d.cdf(1.0), 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(d.std_dev(), 2.0, epsilon = 1e-12);
    }
}
