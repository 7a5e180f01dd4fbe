//! The calibration curve: an immutable calendar age ↔ radiocarbon age table.
//!
//! Rows are kept sorted by descending calendar age (the order published
//! curves use). All lookups interpolate linearly against calendar age; there
//! is no extrapolation beyond the curve's domain.

use serde::Serialize;

use crate::error::{CalError, Result};
use crate::math::interp_descending;

/// One row of a calibration curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurvePoint {
    pub cal_bp: f64,
    pub c14_bp: f64,
    pub error: f64,
}

/// A validated calibration curve.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationCurve {
    name: String,
    cal_bp: Vec<f64>,
    c14_bp: Vec<f64>,
    error: Vec<f64>,
}

impl CalibrationCurve {
    /// Build a curve from rows in any order.
    ///
    /// Rows are sorted by calendar age; duplicate calendar ages, negative
    /// errors and non-finite values are rejected.
    pub fn from_points(name: impl Into<String>, mut points: Vec<CurvePoint>) -> Result<Self> {
        let name = name.into();
        if points.len() < 2 {
            return Err(CalError::InvalidCurveFormat(format!(
                "curve '{name}' needs at least two rows, got {}",
                points.len()
            )));
        }
        for (i, p) in points.iter().enumerate() {
            if !(p.cal_bp.is_finite() && p.c14_bp.is_finite() && p.error.is_finite()) {
                return Err(CalError::InvalidCurveFormat(format!(
                    "curve '{name}' row {i} has a non-numeric value"
                )));
            }
            if p.error < 0.0 {
                return Err(CalError::InvalidCurveFormat(format!(
                    "curve '{name}' row {i} has a negative error ({})",
                    p.error
                )));
            }
        }

        points.sort_by(|a, b| b.cal_bp.total_cmp(&a.cal_bp));
        if let Some(w) = points.windows(2).find(|w| w[0].cal_bp == w[1].cal_bp) {
            return Err(CalError::InvalidCurveFormat(format!(
                "curve '{name}' has duplicate calendar age {}",
                w[0].cal_bp
            )));
        }

        Ok(Self {
            name,
            cal_bp: points.iter().map(|p| p.cal_bp).collect(),
            c14_bp: points.iter().map(|p| p.c14_bp).collect(),
            error: points.iter().map(|p| p.error).collect(),
        })
    }

    /// Build a curve from a generic numeric table.
    ///
    /// Every row must have exactly three columns: calendar age, radiocarbon
    /// age, curve error.
    pub fn from_table(name: impl Into<String>, rows: &[Vec<f64>]) -> Result<Self> {
        let name = name.into();
        let mut points = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let [cal_bp, c14_bp, error] = row.as_slice() else {
                return Err(CalError::InvalidCurveFormat(format!(
                    "custom curve row {i} has {} columns, expected 3",
                    row.len()
                )));
            };
            points.push(CurvePoint {
                cal_bp: *cal_bp,
                c14_bp: *c14_bp,
                error: *error,
            });
        }
        Self::from_points(name, points)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.cal_bp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cal_bp.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = CurvePoint> + '_ {
        (0..self.len()).map(|i| CurvePoint {
            cal_bp: self.cal_bp[i],
            c14_bp: self.c14_bp[i],
            error: self.error[i],
        })
    }

    pub fn cal_bp(&self) -> &[f64] {
        &self.cal_bp
    }

    pub fn c14_bp(&self) -> &[f64] {
        &self.c14_bp
    }

    pub fn errors(&self) -> &[f64] {
        &self.error
    }

    /// `(min, max)` calendar age covered by the curve.
    pub fn cal_range(&self) -> (f64, f64) {
        (self.cal_bp[self.len() - 1], self.cal_bp[0])
    }

    /// `(min, max)` radiocarbon age reached by the curve.
    pub fn c14_range(&self) -> (f64, f64) {
        self.c14_bp
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }

    /// Fail with `CurveRangeExceeded` unless `age` lies within the curve's radiocarbon range.
    pub fn check_c14_age(&self, age: f64) -> Result<()> {
        let (min, max) = self.c14_range();
        if age.is_nan() || age < min || age > max {
            return Err(CalError::CurveRangeExceeded { age, min, max });
        }
        Ok(())
    }

    /// Interpolated `(radiocarbon age, curve error)` at a calendar age.
    pub fn at(&self, cal_bp: f64) -> Result<(f64, f64)> {
        let mu = interp_descending(&self.cal_bp, &self.c14_bp, cal_bp);
        let sd = interp_descending(&self.cal_bp, &self.error, cal_bp);
        match (mu, sd) {
            (Some(mu), Some(sd)) => Ok((mu, sd)),
            _ => {
                let (min, max) = self.cal_range();
                Err(CalError::CurveRangeExceeded { age: cal_bp, min, max })
            }
        }
    }

    /// Interpolated `(radiocarbon age, curve error)` at each year, `NaN` outside the domain.
    pub fn sample_years(&self, years: &[i64]) -> (Vec<f64>, Vec<f64>) {
        years
            .iter()
            .map(|&y| {
                let y = y as f64;
                (
                    interp_descending(&self.cal_bp, &self.c14_bp, y).unwrap_or(f64::NAN),
                    interp_descending(&self.cal_bp, &self.error, y).unwrap_or(f64::NAN),
                )
            })
            .unzip()
    }

    /// Every integer calendar year inside the curve's domain, oldest first.
    pub fn calendar_years(&self) -> Vec<i64> {
        let (min, max) = self.cal_range();
        let hi = max.floor() as i64;
        let lo = min.ceil() as i64;
        (lo..=hi).rev().collect()
    }

    /// Every integer radiocarbon age inside the curve's radiocarbon range, oldest first.
    pub fn radiocarbon_ages(&self) -> Vec<i64> {
        let (min, max) = self.c14_range();
        let hi = max.floor() as i64;
        let lo = min.ceil() as i64;
        (lo..=hi).rev().collect()
    }
}
