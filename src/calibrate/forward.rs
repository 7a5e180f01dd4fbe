//! Forward calibration of a single date.
//!
//! Given a radiocarbon age `a ± e` and a curve, each integer calendar year `y`
//! in the curve's domain receives the likelihood of `a` under the curve at `y`:
//!
//! ```text
//! density(y) = N(a; μ(y), sqrt(e² + σc(y)²))
//! ```
//!
//! or the F14C-space equivalent. Values below `eps` are zeroed, the grid is
//! optionally normalised, restricted to the requested window and optionally
//! compacted.

use rayon::prelude::*;

use crate::curve::CalibrationCurve;
use crate::domain::{CalGrid, CalibrationInput, CalibrationStrategy, UncalGrid};
use crate::error::{CalError, Result};
use crate::math::{apply_eps_floor, c14_to_f14c, f14c_likelihood, normal_pdf, normalise_with_floor};

/// Default numerical floor for densities.
pub const DEFAULT_EPS: f64 = 1e-5;

/// Default calendar window (BP), oldest first.
pub const DEFAULT_TIME_RANGE: (i64, i64) = (50_000, 0);

/// Per-date calibration settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrateOptions {
    pub reservoir_offset: f64,
    pub reservoir_offset_error: f64,
    /// Oldest year of the output window (BP).
    pub start_bp: i64,
    /// Youngest year of the output window (BP).
    pub end_bp: i64,
    pub normalised: bool,
    /// Evaluate the likelihood in F14C space.
    pub f14c: bool,
    pub eps: f64,
    /// Drop zero-density years from the output.
    pub compact: bool,
}

impl Default for CalibrateOptions {
    fn default() -> Self {
        Self {
            reservoir_offset: 0.0,
            reservoir_offset_error: 0.0,
            start_bp: DEFAULT_TIME_RANGE.0,
            end_bp: DEFAULT_TIME_RANGE.1,
            normalised: true,
            f14c: false,
            eps: DEFAULT_EPS,
            compact: true,
        }
    }
}

impl CalibrateOptions {
    pub fn window(&self) -> (i64, i64) {
        (self.start_bp, self.end_bp)
    }

    /// Reject settings no calibration could satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.start_bp < self.end_bp {
            return Err(CalError::InvalidParameterCombination(format!(
                "time range start ({}) must be older than or equal to its end ({})",
                self.start_bp, self.end_bp
            )));
        }
        if !(self.eps.is_finite() && self.eps >= 0.0) {
            return Err(CalError::InvalidParameterCombination(format!(
                "eps must be a non-negative number, got {}",
                self.eps
            )));
        }
        if !(self.reservoir_offset.is_finite() && self.reservoir_offset_error.is_finite()) {
            return Err(CalError::InvalidParameterCombination(
                "reservoir offset and its error must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// A curve sampled at every integer calendar year of its domain.
///
/// Building this is the expensive part of calibrating against a long curve,
/// so batches build it once per curve and share it across dates.
#[derive(Debug, Clone)]
pub struct CurveSamples {
    pub years: Vec<i64>,
    pub mu: Vec<f64>,
    pub sd: Vec<f64>,
}

impl CurveSamples {
    pub fn new(curve: &CalibrationCurve) -> Self {
        let years = curve.calendar_years();
        let (mu, sd) = curve.sample_years(&years);
        Self { years, mu, sd }
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    /// Position of `year` on the year grid.
    pub fn index_of(&self, year: i64) -> Option<usize> {
        let oldest = *self.years.first()?;
        let i = usize::try_from(oldest - year).ok()?;
        (i < self.years.len()).then_some(i)
    }

    /// Index range of `[end_bp, start_bp]` on the year grid, if fully covered.
    fn window_indices(&self, start_bp: i64, end_bp: i64) -> Option<(usize, usize)> {
        let oldest = *self.years.first()?;
        let youngest = *self.years.last()?;
        if start_bp > oldest || end_bp < youngest {
            return None;
        }
        Some(((oldest - start_bp) as usize, (oldest - end_bp) as usize))
    }
}

/// Calibrate one radiocarbon date against `curve`.
pub fn calibrate_date(
    age: f64,
    error: f64,
    curve: &CalibrationCurve,
    opts: &CalibrateOptions,
) -> Result<CalGrid> {
    calibrate_date_on(age, error, curve, &CurveSamples::new(curve), opts)
}

/// Calibrate one date against pre-sampled curve values.
pub fn calibrate_date_on(
    age: f64,
    error: f64,
    curve: &CalibrationCurve,
    samples: &CurveSamples,
    opts: &CalibrateOptions,
) -> Result<CalGrid> {
    opts.validate()?;
    if age.is_nan() {
        return Err(CalError::MissingValue { field: "age", index: 0 });
    }
    if error.is_nan() {
        return Err(CalError::MissingValue { field: "error", index: 0 });
    }

    let age = age - opts.reservoir_offset;
    // Measurement and reservoir errors add linearly here.
    let error = error + opts.reservoir_offset_error;
    curve.check_c14_age(age)?;

    let mut dens: Vec<f64> = if opts.f14c {
        let sample = c14_to_f14c(age, error);
        samples
            .mu
            .iter()
            .zip(&samples.sd)
            .map(|(&mu, &sd)| finite_or_zero(f14c_likelihood(sample, c14_to_f14c(mu, sd))))
            .collect()
    } else {
        samples
            .mu
            .iter()
            .zip(&samples.sd)
            .map(|(&mu, &sd)| {
                let tau = error * error + sd * sd;
                finite_or_zero(normal_pdf(age, mu, tau.sqrt()))
            })
            .collect()
    };

    finish_grid(&mut dens, samples, opts)
}

/// Calibrate a density over radiocarbon ages.
///
/// With [`CalibrationStrategy::Fast`] each calendar year takes the grid's
/// density at the curve's rounded radiocarbon age. With
/// [`CalibrationStrategy::Full`] every radiocarbon age `k` with positive
/// density contributes `PrDens(k) · N(k; μ(y), σc(y))`; when
/// `opts.normalised` is set each of those components is normalised before
/// weighting. Reservoir and F14C settings do not apply to grids.
pub fn calibrate_uncal_grid(
    grid: &UncalGrid,
    curve: &CalibrationCurve,
    strategy: CalibrationStrategy,
    opts: &CalibrateOptions,
) -> Result<CalGrid> {
    opts.validate()?;
    let samples = CurveSamples::new(curve);

    let mut dens: Vec<f64> = match strategy {
        CalibrationStrategy::Fast => samples
            .mu
            .iter()
            .map(|mu| grid.density_at(mu.round() as i64))
            .collect(),
        CalibrationStrategy::Full => {
            let active: Vec<(i64, f64)> = grid.iter().filter(|(_, d)| *d > 0.0).collect();
            let norms: Vec<f64> = active
                .par_iter()
                .map(|&(k, _)| {
                    if !opts.normalised {
                        return 1.0;
                    }
                    let total: f64 = samples
                        .mu
                        .iter()
                        .zip(&samples.sd)
                        .map(|(&mu, &sd)| finite_or_zero(normal_pdf(k as f64, mu, sd)))
                        .sum();
                    if total > 0.0 { total } else { 1.0 }
                })
                .collect();

            samples
                .mu
                .par_iter()
                .zip(samples.sd.par_iter())
                .map(|(&mu, &sd)| {
                    active
                        .iter()
                        .zip(&norms)
                        .map(|(&(k, w), norm)| {
                            w * finite_or_zero(normal_pdf(k as f64, mu, sd)) / norm
                        })
                        .sum::<f64>()
                })
                .collect()
        }
    };

    finish_grid(&mut dens, &samples, opts)
}

/// Dispatch on the kind of input.
pub fn calibrate_input(
    input: &CalibrationInput,
    curve: &CalibrationCurve,
    strategy: CalibrationStrategy,
    opts: &CalibrateOptions,
) -> Result<CalGrid> {
    match input {
        CalibrationInput::RawDate { age, error } => calibrate_date(*age, *error, curve, opts),
        CalibrationInput::DensityGrid(grid) => calibrate_uncal_grid(grid, curve, strategy, opts),
    }
}

/// Floor, normalise, restrict to the window and compact.
fn finish_grid(
    dens: &mut [f64],
    samples: &CurveSamples,
    opts: &CalibrateOptions,
) -> Result<CalGrid> {
    apply_eps_floor(dens, opts.eps);
    if opts.normalised {
        normalise_with_floor(dens, opts.eps);
    }

    let Some((lo, hi)) = samples.window_indices(opts.start_bp, opts.end_bp) else {
        return Err(out_of_window(opts, samples));
    };
    let years = samples.years[lo..=hi].to_vec();
    let values = dens[lo..=hi].to_vec();
    if values.iter().any(|v| v.is_nan()) {
        return Err(out_of_window(opts, samples));
    }

    let grid = CalGrid::new(years, values);
    Ok(if opts.compact { grid.compact() } else { grid })
}

fn out_of_window(opts: &CalibrateOptions, samples: &CurveSamples) -> CalError {
    let reason = match (samples.years.first(), samples.years.last()) {
        (Some(old), Some(young)) => format!("the curve only covers {old}..{young} BP"),
        _ => "the curve covers no whole calendar year".to_string(),
    };
    CalError::DateOutOfCalibrationRange {
        id: String::new(),
        start_bp: opts.start_bp,
        end_bp: opts.end_bp,
        reason,
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::identity_curve;

    fn window(start_bp: i64, end_bp: i64) -> CalibrateOptions {
        CalibrateOptions {
            start_bp,
            end_bp,
            ..CalibrateOptions::default()
        }
    }

    #[test]
    fn identity_curve_peaks_at_the_measured_age() {
        let curve = identity_curve(3000, 5000, 20.0);
        let opts = CalibrateOptions {
            compact: false,
            ..window(5000, 3000)
        };
        let grid = calibrate_date(4000.0, 30.0, &curve, &opts).unwrap();

        assert_eq!(grid.len(), 2001);
        assert_eq!(grid.mode(), Some(4000));
        assert!((grid.total() - 1.0).abs() < 1e-9);
        for d in 1..150 {
            let older = grid.density_at(4000 + d);
            let younger = grid.density_at(4000 - d);
            assert!((older - younger).abs() < 1e-12, "asymmetric at ±{d}");
            assert!(older <= grid.density_at(4000 + d - 1));
        }
    }

    #[test]
    fn densities_are_non_negative_and_floored() {
        let curve = identity_curve(0, 2000, 15.0);
        let grid = calibrate_date(1000.0, 40.0, &curve, &window(2000, 0)).unwrap();
        assert!(grid.pr_dens.iter().all(|&d| d >= DEFAULT_EPS));
        assert!((grid.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unnormalised_grid_keeps_raw_likelihood() {
        let curve = identity_curve(0, 2000, 0.0);
        let opts = CalibrateOptions {
            normalised: false,
            compact: false,
            ..window(2000, 0)
        };
        let grid = calibrate_date(1000.0, 10.0, &curve, &opts).unwrap();
        let expected = normal_pdf(1000.0, 1000.0, 10.0);
        assert!((grid.density_at(1000) - expected).abs() < 1e-15);
    }

    #[test]
    fn reservoir_offset_shifts_the_peak_and_widens_it() {
        let curve = identity_curve(0, 3000, 10.0);
        let opts = CalibrateOptions {
            reservoir_offset: 400.0,
            reservoir_offset_error: 50.0,
            ..window(3000, 0)
        };
        let shifted = calibrate_date(1400.0, 30.0, &curve, &opts).unwrap();
        assert_eq!(shifted.mode(), Some(1000));

        let plain = calibrate_date(1000.0, 30.0, &curve, &window(3000, 0)).unwrap();
        assert!(shifted.density_at(1000) < plain.density_at(1000));
    }

    #[test]
    fn age_outside_curve_range_is_rejected() {
        let curve = identity_curve(1000, 2000, 10.0);
        let err = calibrate_date(2500.0, 30.0, &curve, &window(2000, 1000)).unwrap_err();
        assert!(matches!(err, CalError::CurveRangeExceeded { .. }));
    }

    #[test]
    fn window_beyond_curve_domain_is_rejected() {
        let curve = identity_curve(1000, 2000, 10.0);
        let err = calibrate_date(1500.0, 30.0, &curve, &window(2500, 1000)).unwrap_err();
        assert!(matches!(err, CalError::DateOutOfCalibrationRange { .. }));
    }

    #[test]
    fn inverted_window_is_a_parameter_error() {
        let curve = identity_curve(1000, 2000, 10.0);
        let err = calibrate_date(1500.0, 30.0, &curve, &window(1000, 2000)).unwrap_err();
        assert!(matches!(err, CalError::InvalidParameterCombination(_)));
    }

    #[test]
    fn f14c_likelihood_agrees_on_the_mode() {
        let curve = identity_curve(3000, 5000, 20.0);
        let opts = CalibrateOptions {
            f14c: true,
            ..window(5000, 3000)
        };
        let grid = calibrate_date(4000.0, 30.0, &curve, &opts).unwrap();
        assert_eq!(grid.mode(), Some(4000));
        assert!((grid.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn compaction_only_drops_zero_rows() {
        let curve = identity_curve(0, 2000, 10.0);
        let full = calibrate_date(
            1000.0,
            20.0,
            &curve,
            &CalibrateOptions {
                compact: false,
                ..window(2000, 0)
            },
        )
        .unwrap();
        let compact = calibrate_date(1000.0, 20.0, &curve, &window(2000, 0)).unwrap();
        assert!(compact.len() < full.len());
        for (year, d) in full.iter() {
            assert_eq!(compact.density_at(year), d);
        }
    }

    #[test]
    fn fast_grid_calibration_reads_density_at_curve_age() {
        let curve = identity_curve(0, 100, 5.0);
        let uncal = UncalGrid::new(vec![60, 50, 40], vec![0.25, 0.5, 0.25]);
        let opts = CalibrateOptions {
            compact: false,
            ..window(100, 0)
        };
        let grid = calibrate_uncal_grid(&uncal, &curve, CalibrationStrategy::Fast, &opts).unwrap();
        assert!((grid.density_at(50) - 0.5).abs() < 1e-12);
        assert!((grid.density_at(60) - 0.25).abs() < 1e-12);
        assert_eq!(grid.density_at(55), 0.0);
    }

    #[test]
    fn full_grid_calibration_smooths_with_curve_error() {
        let curve = identity_curve(0, 200, 5.0);
        let uncal = UncalGrid::new(vec![100], vec![1.0]);
        let opts = CalibrateOptions {
            compact: false,
            ..window(200, 0)
        };
        let input = CalibrationInput::DensityGrid(uncal);
        let grid = calibrate_input(&input, &curve, CalibrationStrategy::Full, &opts).unwrap();
        assert_eq!(grid.mode(), Some(100));
        assert!(grid.density_at(103) > 0.0);
        assert!((grid.density_at(95) - grid.density_at(105)).abs() < 1e-12);
        assert!((grid.total() - 1.0).abs() < 1e-9);
    }
}
