//! Terminal output for calibration, uncalibration and curve mixing.
//!
//! Formatting lives here so output changes stay localized and the numeric
//! modules never print.

use crate::curve::CalibrationCurve;
use crate::domain::{StorageMode, UncalGrid};
use crate::io::export::format_intervals;
use crate::store::CalDatesStore;
use crate::summary::DateSummary;
use crate::uncalibrate::UncalPoint;

/// Table of calibrated dates: age, curve, median and HPD intervals.
pub fn format_calibration_summary(store: &CalDatesStore, summaries: &[DateSummary]) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "=== c14 - calibrated {} date(s), {} storage ===\n",
        store.len(),
        match store.storage_mode() {
            StorageMode::Sparse => "sparse",
            StorageMode::Dense => "dense",
        }
    ));

    let header = format!(
        "{:<16} {:>14} {:<12} {:>8} {:<24} {:<24}",
        "id", "age", "curve", "median", "68.3% hpd", "95.4% hpd"
    );
    out.push_str(header.trim_end());
    out.push('\n');
    let rule = format!("{:-<16} {:-<14} {:-<12} {:-<8} {:-<24} {:-<24}", "", "", "", "", "", "");
    out.push_str(&rule);
    out.push('\n');

    for (record, summary) in store.metadata().iter().zip(summaries) {
        let median = summary
            .median_bp
            .map(|m| m.to_string())
            .unwrap_or_else(|| "-".to_string());
        let row = format!(
            "{:<16} {:>14} {:<12} {:>8} {:<24} {:<24}",
            truncate(&record.date_id, 16),
            format!("{:.0}±{:.0}", record.c14_age, record.c14_error),
            truncate(&record.calibration_curve, 12),
            median,
            format_intervals(&summary.one_sigma),
            format_intervals(&summary.two_sigma),
        );
        out.push_str(row.trim_end());
        out.push('\n');
    }

    out
}

/// Table of point uncalibrations.
pub fn format_uncal_points(curve: &str, points: &[UncalPoint]) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== c14 - uncalibrated against {curve} ===\n"));
    out.push_str(&format!(
        "{:>10} {:>10} {:>10} {:>10} {:>10}\n",
        "cal_bp", "cc_cra", "cc_error", "r_cra", "r_error"
    ));
    for p in points {
        out.push_str(&format!(
            "{:>10.1} {:>10.1} {:>10.1} {:>10.1} {:>10.1}\n",
            p.cal_bp, p.cc_cra, p.cc_error, p.r_cra, p.r_error
        ));
    }
    out
}

/// One-paragraph description of a radiocarbon-age density.
pub fn format_uncal_grid(grid: &UncalGrid) -> String {
    let (Some(&oldest), Some(&youngest)) = (grid.c14_bp.first(), grid.c14_bp.last()) else {
        return "empty radiocarbon density\n".to_string();
    };
    let mode = grid.mode().map(|m| m.to_string()).unwrap_or_else(|| "-".to_string());
    format!(
        "radiocarbon density: {} ages in {oldest}..{youngest} BP, mode {mode} BP, mass {:.4}\n",
        grid.len(),
        grid.total()
    )
}

/// Name, size and ranges of a curve.
pub fn format_curve_info(curve: &CalibrationCurve) -> String {
    let (cal_min, cal_max) = curve.cal_range();
    let (c14_min, c14_max) = curve.c14_range();
    format!(
        "curve {}: {} rows | cal=[{cal_min:.0}, {cal_max:.0}] BP | \
         c14=[{c14_min:.1}, {c14_max:.1}] BP\n",
        curve.name(),
        curve.len()
    )
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
