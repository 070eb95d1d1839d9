//! Special functions evaluated in log space.
//!
//! Likelihoods of the count and value models are products of gamma-function
//! ratios and powers of time ratios. Evaluated directly they overflow for
//! customers with a few dozen transactions, so every function here returns the
//! logarithm of the quantity it names.
//!
//! # Examples
//!
//! ```
//! use cltv_stats::special::{ln_beta, ln_gamma, ln_hyp2f1};
//!
//! assert!((ln_gamma(1.0)).abs() < 1e-12);
//! assert!((ln_beta(1.0, 1.0)).abs() < 1e-12);
//!
//! // 2F1(1, 1; 2; z) = -ln(1 - z) / z
//! let z: f64 = 0.5;
//! let expected = (-(1.0 - z).ln() / z).ln();
//! assert!((ln_hyp2f1(1.0, 1.0, 2.0, z).unwrap() - expected).abs() < 1e-12);
//! ```

use std::f64::consts::PI;

/// Lanczos coefficients for g = 7, n = 9.
const LANCZOS_COEFFS: [f64; 9] = [
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
const LANCZOS_G: f64 = 7.0;

/// Upper bound on the number of hypergeometric series terms.
const HYP2F1_MAX_TERMS: usize = 500_000;

/// Natural logarithm of the gamma function, `ln |Γ(x)|`.
///
/// Uses the Lanczos approximation for `x >= 0.5` and the reflection formula
/// below that. Returns `+inf` at the poles (`x` a non-positive integer).
///
/// # Examples
///
/// ```
/// use cltv_stats::special::ln_gamma;
///
/// // Γ(0.5) = √π
/// let expected = std::f64::consts::PI.sqrt().ln();
/// assert!((ln_gamma(0.5) - expected).abs() < 1e-12);
/// ```
#[must_use]
pub fn ln_gamma(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    if x <= 0.0 && x.fract() == 0.0 {
        return f64::INFINITY;
    }
    if x < 0.5 {
        let sin = (PI * x).sin();
        if sin.abs() < 1e-300 {
            return f64::INFINITY;
        }
        return PI.ln() - sin.abs().ln() - ln_gamma(1.0 - x);
    }

    let z = x - 1.0;
    let mut sum = LANCZOS_COEFFS[0];
    for (i, &coeff) in LANCZOS_COEFFS[1..].iter().enumerate() {
        #[expect(clippy::cast_precision_loss)]
        let denom = z + (i as f64) + 1.0;
        sum += coeff / denom;
    }
    let t = z + LANCZOS_G + 0.5;
    (z + 0.5).mul_add(t.ln(), 0.5 * (2.0 * PI).ln()) - t + sum.ln()
}

/// Natural logarithm of the beta function, `ln B(a, b)`.
#[must_use]
pub fn ln_beta(a: f64, b: f64) -> f64 {
    ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b)
}

/// Computes `ln(e^a + e^b)` without overflow.
///
/// Either argument may be `-inf` (a zero-probability term).
#[must_use]
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    let max = a.max(b);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + (-(a - b).abs()).exp().ln_1p()
}

/// Computes `ln Σ e^x` over a sequence of log-space values.
///
/// Returns `-inf` for an empty sequence.
#[must_use]
pub fn log_sum_exp<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let values = values.into_iter().collect::<Vec<_>>();
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY || max.is_nan() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Logarithm of the Gauss hypergeometric function `2F1(a, b; c; z)`.
///
/// The power series is summed term by term in log space with a running
/// rescale, so results far beyond `f64::MAX` are still representable through
/// their logarithm.
///
/// Returns `None` when
///
/// - `z` is outside `[0, 1)` or any argument is not finite,
/// - `c` is a non-positive integer (the series has a pole),
/// - the series does not converge within the term budget,
/// - the sum is not positive (its logarithm is undefined).
#[must_use]
pub fn ln_hyp2f1(a: f64, b: f64, c: f64, z: f64) -> Option<f64> {
    if !(a.is_finite() && b.is_finite() && c.is_finite()) || !(0.0..1.0).contains(&z) {
        return None;
    }
    if c <= 0.0 && c.fract() == 0.0 {
        return None;
    }
    if z == 0.0 {
        return Some(0.0);
    }

    // acc holds the partial sum divided by exp(log_scale)
    let mut log_scale = 0.0_f64;
    let mut acc = 1.0_f64;
    let mut ln_term = 0.0_f64;
    let mut sign = 1.0_f64;

    for n in 0..HYP2F1_MAX_TERMS {
        #[expect(clippy::cast_precision_loss)]
        let n = n as f64;
        let ratio = (a + n) * (b + n) / ((c + n) * (n + 1.0)) * z;
        if !ratio.is_finite() {
            return None;
        }
        if ratio == 0.0 {
            // terminating (polynomial) series
            return (acc > 0.0).then(|| log_scale + acc.ln());
        }
        ln_term += ratio.abs().ln();
        if ratio < 0.0 {
            sign = -sign;
        }
        if ln_term > log_scale + 300.0 {
            acc *= (log_scale - ln_term).exp();
            log_scale = ln_term;
        }
        let contribution = sign * (ln_term - log_scale).exp();
        acc += contribution;

        let q = ratio.abs().max(z);
        if q < 1.0 && contribution.abs() * q / (1.0 - q) <= f64::EPSILON * acc.abs() {
            return (acc > 0.0).then(|| log_scale + acc.ln());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance * expected.abs().max(1.0),
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_ln_gamma_factorials() {
        let mut factorial = 1.0_f64;
        for n in 1..20 {
            assert_close(ln_gamma(f64::from(n)), factorial.ln(), 1e-12);
            factorial *= f64::from(n);
        }
    }

    #[test]
    fn test_ln_gamma_large_argument() {
        // Stirling: ln Γ(x) ≈ (x - 0.5) ln x - x + 0.5 ln(2π) + 1/(12x)
        let x = 1.0e6_f64;
        let stirling = (x - 0.5) * x.ln() - x + 0.5 * (2.0 * PI).ln() + 1.0 / (12.0 * x);
        assert_close(ln_gamma(x), stirling, 1e-12);
    }

    #[test]
    fn test_ln_gamma_reflection() {
        // Γ(-0.5) = -2√π
        assert_close(ln_gamma(-0.5), (2.0 * PI.sqrt()).ln(), 1e-12);
        assert!(ln_gamma(0.0).is_infinite());
        assert!(ln_gamma(-3.0).is_infinite());
    }

    #[test]
    fn test_ln_beta_symmetry() {
        assert_close(ln_beta(2.5, 7.0), ln_beta(7.0, 2.5), 1e-14);
        // B(2, 3) = 1! 2! / 4! = 1/12
        assert_close(ln_beta(2.0, 3.0), (1.0_f64 / 12.0).ln(), 1e-12);
    }

    #[test]
    fn test_log_add_exp() {
        assert_close(log_add_exp(0.0, 0.0), 2.0_f64.ln(), 1e-15);
        assert_close(log_add_exp(1000.0, 1000.0), 1000.0 + 2.0_f64.ln(), 1e-15);
        assert_eq!(log_add_exp(f64::NEG_INFINITY, 3.0), 3.0);
        assert_eq!(
            log_add_exp(f64::NEG_INFINITY, f64::NEG_INFINITY),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn test_log_sum_exp() {
        let values = [1.0, 2.0, 3.0];
        let expected = values.iter().map(|v: &f64| v.exp()).sum::<f64>().ln();
        assert_close(log_sum_exp(values), expected, 1e-14);
        assert_eq!(log_sum_exp(std::iter::empty()), f64::NEG_INFINITY);
    }

    #[test]
    fn test_hyp2f1_closed_forms() {
        // 2F1(a, b; b; z) = (1 - z)^(-a)
        for &z in &[0.1_f64, 0.5, 0.9] {
            let expected = -2.5 * (1.0 - z).ln();
            assert_close(ln_hyp2f1(2.5, 3.0, 3.0, z).unwrap(), expected, 1e-12);
        }
        // 2F1(1, 1; 2; z) = -ln(1 - z) / z
        let z = 0.99_f64;
        let expected = (-(1.0 - z).ln() / z).ln();
        assert_close(ln_hyp2f1(1.0, 1.0, 2.0, z).unwrap(), expected, 1e-10);
    }

    #[test]
    fn test_hyp2f1_huge_values_stay_finite() {
        // (1 - z)^(-a) with a = 2000 overflows f64 but not its logarithm.
        let z = 0.9_f64;
        let expected = -2000.0 * (1.0 - z).ln();
        assert!(expected > 709.0);
        assert_close(ln_hyp2f1(2000.0, 5.0, 5.0, z).unwrap(), expected, 1e-10);
    }

    #[test]
    fn test_hyp2f1_terminating_series() {
        // 2F1(-2, b; c; z) is a polynomial: 1 - 2bz/c + b(b+1)z²/(c(c+1))
        let (b, c, z) = (3.0, 4.0, 0.5);
        let expected = 1.0 - 2.0 * b * z / c + b * (b + 1.0) * z * z / (c * (c + 1.0));
        assert_close(ln_hyp2f1(-2.0, b, c, z).unwrap(), expected.ln(), 1e-14);
    }

    #[test]
    fn test_hyp2f1_invalid_arguments() {
        assert_eq!(ln_hyp2f1(1.0, 1.0, 2.0, 1.0), None);
        assert_eq!(ln_hyp2f1(1.0, 1.0, 2.0, -0.1), None);
        assert_eq!(ln_hyp2f1(1.0, 1.0, -1.0, 0.5), None);
        assert_eq!(ln_hyp2f1(1.0, 1.0, 2.0, 0.0), Some(0.0));
    }
}
