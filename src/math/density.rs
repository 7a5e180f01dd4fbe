//! Density helpers shared by the calibration and uncalibration transforms.
//!
//! Probability grids in this crate are plain `f64` slices. The helpers here
//! implement the small set of operations every transform repeats:
//!
//! - Gaussian density evaluation
//! - the `eps` numerical floor
//! - normalisation to unit mass
//! - conversion between radiocarbon age and fraction modern (F14C)

use std::f64::consts::PI;

/// Libby mean-life (years) used by the conventional radiocarbon age definition.
pub const LIBBY_MEAN_LIFE: f64 = 8033.0;

/// Normal probability density at `x`.
///
/// Returns `NaN` when `sd` is not strictly positive, so callers that may see
/// degenerate curve errors must check first.
pub fn normal_pdf(x: f64, mean: f64, sd: f64) -> f64 {
    if !(sd > 0.0) {
        return f64::NAN;
    }
    let z = (x - mean) / sd;
    (-0.5 * z * z).exp() / (sd * (2.0 * PI).sqrt())
}

/// Zero every value below `eps`.
///
/// `NaN` values are left untouched so range checks further down the
/// pipeline can still see them.
pub fn apply_eps_floor(values: &mut [f64], eps: f64) {
    for v in values.iter_mut() {
        if *v < eps {
            *v = 0.0;
        }
    }
}

/// Scale `values` to unit sum.
///
/// Returns the pre-normalisation total. Grids with zero (or non-finite)
/// mass are left as-is.
pub fn normalise(values: &mut [f64]) -> f64 {
    let total: f64 = values.iter().filter(|v| v.is_finite()).sum();
    if total > 0.0 && total.is_finite() {
        for v in values.iter_mut() {
            *v /= total;
        }
    }
    total
}

/// Normalise, re-apply the floor, and normalise again.
///
/// The floor can remove a material share of the mass in the tails, so one
/// pass is not enough to guarantee unit sum.
pub fn normalise_with_floor(values: &mut [f64], eps: f64) {
    normalise(values);
    apply_eps_floor(values, eps);
    normalise(values);
}

/// Convert a radiocarbon age (BP) and its error to F14C and its error.
///
/// Error propagation is first order: `σF = F · σ / 8033`.
pub fn c14_to_f14c(age: f64, error: f64) -> (f64, f64) {
    let f = (age / -LIBBY_MEAN_LIFE).exp();
    (f, f * error / LIBBY_MEAN_LIFE)
}

/// Un-normalised Gaussian likelihood of a sample against a curve point in F14C space.
pub fn f14c_likelihood(sample: (f64, f64), curve: (f64, f64)) -> f64 {
    let (f_sample, sd_sample) = sample;
    let (f_curve, sd_curve) = curve;
    let var = sd_sample * sd_sample + sd_curve * sd_curve;
    let diff = f_sample - f_curve;
    (-(diff * diff) / (2.0 * var)).exp() / var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_pdf_peak_matches_closed_form() {
        let v = normal_pdf(10.0, 10.0, 2.0);
        assert!((v - 1.0 / (2.0 * (2.0 * PI).sqrt())).abs() < 1e-15);
        assert!(normal_pdf(0.0, 0.0, 0.0).is_nan());
    }

    #[test]
    fn floor_is_idempotent_after_normalisation() {
        let mut v = vec![1e-9, 0.2, 0.5, 0.3, 2e-7];
        normalise_with_floor(&mut v, 1e-5);
        let snapshot = v.clone();
        apply_eps_floor(&mut v, 1e-5);
        assert_eq!(v, snapshot);
        assert!((v.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn normalise_leaves_empty_mass_alone() {
        let mut v = vec![0.0, 0.0];
        assert_eq!(normalise(&mut v), 0.0);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn f14c_of_zero_age_is_one() {
        let (f, sd) = c14_to_f14c(0.0, 8033.0);
        assert!((f - 1.0).abs() < 1e-15);
        assert!((sd - 1.0).abs() < 1e-15);
    }
}
