//! Inverse calibration: calendar ages back into radiocarbon-age space.
//!
//! Two forms:
//!
//! - **point**: interpolate the curve at a calendar age and draw a plausible
//!   measured age around it (the random source is injected)
//! - **grid**: invert a full calendar density into a density over integer
//!   radiocarbon ages
//!
//! The grid form is a discretised Bayesian inversion. For each candidate
//! radiocarbon age `k`:
//!
//! ```text
//! Raw(k)  = Σ_y density(y) · N(k; μ(y), σc(y))
//! Base(k) = Σ_y N(k; μ(y), σc(y))       (y over every whole year of the curve)
//! PrDens(k) = Raw(k) / Base(k)      (0 where Base(k) = 0)
//! ```

use rand::Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde::Serialize;

use crate::calibrate::CurveSamples;
use crate::curve::CalibrationCurve;
use crate::domain::{CalGrid, PerDate, UncalGrid};
use crate::error::{CalError, Result};
use crate::math::{apply_eps_floor, normal_pdf, normalise};

/// Result of uncalibrating one calendar age.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UncalPoint {
    pub cal_bp: f64,
    /// Curve radiocarbon age at `cal_bp`.
    pub cc_cra: f64,
    /// Curve error at `cal_bp`.
    pub cc_error: f64,
    /// Random draw from `N(cc_cra, sqrt(cc_error² + error²))`.
    pub r_cra: f64,
    /// Measurement error supplied by the caller.
    pub r_error: f64,
}

/// Uncalibrate one calendar age.
///
/// With `round` set the curve age and error are rounded to whole years
/// before the draw.
pub fn uncalibrate_point<R: Rng + ?Sized>(
    cal_bp: f64,
    error: f64,
    curve: &CalibrationCurve,
    round: bool,
    rng: &mut R,
) -> Result<UncalPoint> {
    if cal_bp.is_nan() {
        return Err(CalError::MissingValue { field: "cal_bp", index: 0 });
    }
    if !(error.is_finite() && error >= 0.0) {
        return Err(CalError::InvalidParameterCombination(format!(
            "measurement error must be a non-negative number, got {error}"
        )));
    }

    let (mut cc_cra, mut cc_error) = curve.at(cal_bp)?;
    if round {
        cc_cra = cc_cra.round();
        cc_error = cc_error.round();
    }

    // Curve and measurement errors combine in quadrature here.
    let sd = (cc_error * cc_error + error * error).sqrt();
    let r_cra = if sd > 0.0 {
        let normal = Normal::new(cc_cra, sd)
            .map_err(|e| {
                CalError::InvalidParameterCombination(format!("sampling distribution: {e}"))
            })?;
        normal.sample(rng)
    } else {
        cc_cra
    };

    Ok(UncalPoint {
        cal_bp,
        cc_cra,
        cc_error,
        r_cra,
        r_error: error,
    })
}

/// Uncalibrate many calendar ages with a shared or per-age measurement error.
///
/// Draws are made in input order from one generator, so a seeded generator
/// gives reproducible output.
pub fn uncalibrate_points<R: Rng + ?Sized>(
    cal_bp: &[f64],
    errors: &PerDate<f64>,
    curve: &CalibrationCurve,
    round: bool,
    rng: &mut R,
) -> Result<Vec<UncalPoint>> {
    if let Some(found) = errors.explicit_len() {
        if found != cal_bp.len() {
            return Err(CalError::InputLengthMismatch {
                field: "errors",
                expected: cal_bp.len(),
                found,
            });
        }
    }
    cal_bp
        .iter()
        .enumerate()
        .map(|(i, &age)| {
            let error = errors.get(i).unwrap_or(0.0);
            uncalibrate_point(age, error, curve, round, rng).map_err(|e| match e {
                CalError::MissingValue { field, .. } => CalError::MissingValue { field, index: i },
                other => other,
            })
        })
        .collect()
}

/// Options for grid inversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UncalibrateOptions {
    pub eps: f64,
    /// Drop zero-density radiocarbon ages from the output.
    pub compact: bool,
}

impl Default for UncalibrateOptions {
    fn default() -> Self {
        Self {
            eps: crate::calibrate::DEFAULT_EPS,
            compact: true,
        }
    }
}

/// Invert a calendar density into a density over radiocarbon ages.
pub fn uncalibrate_grid(
    grid: &CalGrid,
    curve: &CalibrationCurve,
    opts: &UncalibrateOptions,
) -> Result<UncalGrid> {
    if !(opts.eps.is_finite() && opts.eps >= 0.0) {
        return Err(CalError::InvalidParameterCombination(format!(
            "eps must be a non-negative number, got {}",
            opts.eps
        )));
    }

    // Base runs over every whole year of the curve, so years missing from a
    // compacted grid count as zero density rather than dropping out.
    let samples = CurveSamples::new(curve);
    let base_terms: Vec<(f64, f64)> = samples
        .mu
        .iter()
        .zip(&samples.sd)
        .filter(|&(mu, sd)| mu.is_finite() && *sd > 0.0)
        .map(|(&mu, &sd)| (mu, sd))
        .collect();

    let mut raw_terms: Vec<(f64, f64, f64)> = Vec::new();
    for (year, dens) in grid.iter().filter(|&(_, d)| d > 0.0) {
        let Some(i) = samples.index_of(year) else {
            let (min, max) = curve.cal_range();
            return Err(CalError::CurveRangeExceeded {
                age: year as f64,
                min,
                max,
            });
        };
        if samples.sd[i] > 0.0 {
            raw_terms.push((samples.mu[i], samples.sd[i], dens));
        }
    }
    if raw_terms.is_empty() || base_terms.is_empty() {
        return Err(CalError::UnsupportedInversionMode(format!(
            "curve '{}' has zero error wherever the density is positive; \
             density inversion needs curve uncertainty",
            curve.name()
        )));
    }

    let ages = curve.radiocarbon_ages();
    let mut dens: Vec<f64> = ages
        .par_iter()
        .map(|&k| {
            let k = k as f64;
            let raw: f64 = raw_terms
                .iter()
                .map(|&(mu, sd, d)| d * normal_pdf(k, mu, sd))
                .sum();
            let base: f64 = base_terms.iter().map(|&(mu, sd)| normal_pdf(k, mu, sd)).sum();
            if base > 0.0 { raw / base } else { 0.0 }
        })
        .collect();

    normalise(&mut dens);
    apply_eps_floor(&mut dens, opts.eps);
    normalise(&mut dens);

    let out = UncalGrid::new(ages, dens);
    Ok(if opts.compact { out.compact() } else { out })
}
