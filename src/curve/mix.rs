//! Mixed terrestrial/marine calibration curves.
//!
//! Samples with mixed carbon sources (e.g. human bone from coastal diets)
//! are calibrated against a blend of a terrestrial and a marine curve:
//!
//! ```text
//! mean  = p · T(y) + (1 − p) · M(y)
//! error = p · σT(y) + (1 − p) · σM(y)
//! ```
//!
//! where `M` is the marine curve shifted by the local reservoir offset, its
//! error combined in quadrature with the offset error, and resampled onto the
//! terrestrial curve's calendar ages (values clamped at the marine curve's
//! boundaries). Errors blend linearly, not in quadrature.

use crate::curve::{CalibrationCurve, CurveName, CurvePoint, CurveSource};
use crate::error::{CalError, Result};
use crate::math::interp_descending_clamped;

/// Parameters of a mixed curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixParams {
    /// Weight of the terrestrial curve, in `[0, 1]`.
    pub p: f64,
    pub reservoir_offset: f64,
    pub reservoir_offset_error: f64,
}

impl Default for MixParams {
    fn default() -> Self {
        Self {
            p: 0.5,
            reservoir_offset: 0.0,
            reservoir_offset_error: 0.0,
        }
    }
}

/// Blend two loaded curves on the terrestrial curve's calendar grid.
pub fn mix_curves(
    terrestrial: &CalibrationCurve,
    marine: &CalibrationCurve,
    params: MixParams,
) -> Result<CalibrationCurve> {
    let MixParams {
        p,
        reservoir_offset,
        reservoir_offset_error,
    } = params;
    if !(0.0..=1.0).contains(&p) {
        return Err(CalError::InvalidParameterCombination(format!(
            "mixing proportion must be within [0, 1], got {p}"
        )));
    }
    if !(reservoir_offset.is_finite() && reservoir_offset_error.is_finite()) {
        return Err(CalError::InvalidParameterCombination(
            "reservoir offset and its error must be finite".to_string(),
        ));
    }

    let marine_mean: Vec<f64> = marine.c14_bp().iter().map(|c| c + reservoir_offset).collect();
    let marine_error: Vec<f64> = marine
        .errors()
        .iter()
        .map(|e| (e * e + reservoir_offset_error * reservoir_offset_error).sqrt())
        .collect();

    let mut points = Vec::with_capacity(terrestrial.len());
    for t in terrestrial.points() {
        let m_mean = interp_descending_clamped(marine.cal_bp(), &marine_mean, t.cal_bp);
        let m_err = interp_descending_clamped(marine.cal_bp(), &marine_error, t.cal_bp);
        let (Some(m_mean), Some(m_err)) = (m_mean, m_err) else {
            return Err(CalError::InvalidCurveFormat(format!(
                "marine curve '{}' cannot be resampled at {} BP",
                marine.name(),
                t.cal_bp
            )));
        };
        points.push(CurvePoint {
            cal_bp: t.cal_bp,
            c14_bp: p * t.c14_bp + (1.0 - p) * m_mean,
            error: p * t.error + (1.0 - p) * m_err,
        });
    }

    let name = format!("mixed:{}+{}@{p}", terrestrial.name(), marine.name());
    log::debug!(
        "mixed curve {name}: {} rows, offset={reservoir_offset}±{reservoir_offset_error}",
        points.len()
    );
    CalibrationCurve::from_points(name, points)
}

/// Load two named curves from `source` and blend them.
pub fn mix_named_curves(
    source: &dyn CurveSource,
    terrestrial: CurveName,
    marine: CurveName,
    params: MixParams,
) -> Result<CalibrationCurve> {
    let t = source.load(terrestrial)?;
    let m = source.load(marine)?;
    mix_curves(&t, &m, params)
}
