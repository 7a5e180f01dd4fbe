//! Synthetic curves shared by unit tests.

use crate::curve::CalibrationCurve;

/// Radiocarbon age equals calendar age, constant error, one row per year over `lo..=hi`.
pub fn identity_curve(lo: i64, hi: i64, err: f64) -> CalibrationCurve {
    let rows: Vec<Vec<f64>> = (lo..=hi).map(|y| vec![y as f64, y as f64, err]).collect();
    CalibrationCurve::from_table("identity", &rows).unwrap()
}

/// Radiocarbon age = calendar age + `shift`, constant error.
pub fn shifted_curve(lo: i64, hi: i64, shift: f64, err: f64) -> CalibrationCurve {
    let rows: Vec<Vec<f64>> = (lo..=hi)
        .map(|y| vec![y as f64, y as f64 + shift, err])
        .collect();
    CalibrationCurve::from_table("shifted", &rows).unwrap()
}
