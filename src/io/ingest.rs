//! CSV ingest of radiocarbon dates.
//!
//! Turns a date list into the parallel arrays a [`CalibrationBatch`] takes.
//!
//! Recognised columns (case-insensitive, any order):
//!
//! - `age` (or `cra`, `c14age`) and `error` (or `c14error`): required
//! - `id`, `details`: optional strings
//! - `curve`: optional per-date curve name
//! - `reservoir_offset`, `reservoir_offset_error`: optional per-date numbers
//!
//! Empty or non-numeric cells in numeric columns become `NaN`, so the batch
//! validator reports them as missing values with their row index.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::calibrate::{CalibrationBatch, CurveSelection};
use crate::curve::CurveName;
use crate::domain::{CalGrid, PerDate};
use crate::error::{CalError, Result};

/// Dates read from CSV, column by column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateTable {
    pub ids: Option<Vec<String>>,
    pub ages: Vec<f64>,
    pub errors: Vec<f64>,
    pub details: Option<Vec<String>>,
    pub curves: Option<Vec<CurveName>>,
    pub reservoir_offsets: Option<Vec<f64>>,
    pub reservoir_offset_errors: Option<Vec<f64>>,
}

impl DateTable {
    pub fn len(&self) -> usize {
        self.ages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ages.is_empty()
    }

    /// Batch over these dates. Per-date columns override the shared curve / offsets.
    pub fn into_batch(self, shared_curve: CurveSelection) -> CalibrationBatch {
        let mut batch = CalibrationBatch::new(self.ages, self.errors);
        batch.ids = self.ids;
        batch.details = self.details;
        batch.curves = match self.curves {
            Some(names) => CurveSelection::PerDate(names),
            None => shared_curve,
        };
        if let Some(offsets) = self.reservoir_offsets {
            batch.reservoir_offsets = PerDate::Each(offsets);
        }
        if let Some(errors) = self.reservoir_offset_errors {
            batch.reservoir_offset_errors = PerDate::Each(errors);
        }
        batch
    }
}

/// Load a date list from a CSV file.
pub fn load_dates(path: &Path) -> Result<DateTable> {
    let file = File::open(path).map_err(|source| CalError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_dates(file)
}

/// Read a date list from any CSV source.
pub fn read_dates<R: Read>(reader: R) -> Result<DateTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let header_map = build_header_map(&headers);

    let age_col = find_column(&header_map, &["age", "cra", "c14age"])
        .ok_or_else(|| missing_column("age"))?;
    let error_col = find_column(&header_map, &["error", "c14error"])
        .ok_or_else(|| missing_column("error"))?;
    let id_col = find_column(&header_map, &["id", "labid"]);
    let details_col = find_column(&header_map, &["details"]);
    let curve_col = find_column(&header_map, &["curve", "calcurve"]);
    let offset_col = find_column(&header_map, &["reservoir_offset", "resoffset"]);
    let offset_err_col = find_column(&header_map, &["reservoir_offset_error", "reserror"]);

    let mut table = DateTable {
        ids: id_col.map(|_| Vec::new()),
        details: details_col.map(|_| Vec::new()),
        curves: curve_col.map(|_| Vec::new()),
        reservoir_offsets: offset_col.map(|_| Vec::new()),
        reservoir_offset_errors: offset_err_col.map(|_| Vec::new()),
        ..DateTable::default()
    };

    for result in reader.records() {
        let record = result?;
        table.ages.push(parse_f64(field(&record, age_col)));
        table.errors.push(parse_f64(field(&record, error_col)));
        if let (Some(col), Some(ids)) = (id_col, table.ids.as_mut()) {
            ids.push(field(&record, col).to_string());
        }
        if let (Some(col), Some(details)) = (details_col, table.details.as_mut()) {
            details.push(field(&record, col).to_string());
        }
        if let (Some(col), Some(curves)) = (curve_col, table.curves.as_mut()) {
            curves.push(field(&record, col).parse::<CurveName>()?);
        }
        if let (Some(col), Some(offsets)) = (offset_col, table.reservoir_offsets.as_mut()) {
            offsets.push(parse_f64_or_zero(field(&record, col)));
        }
        let offset_errors = table.reservoir_offset_errors.as_mut();
        if let (Some(col), Some(errors)) = (offset_err_col, offset_errors) {
            errors.push(parse_f64_or_zero(field(&record, col)));
        }
    }

    log::debug!("read {} dates", table.len());
    Ok(table)
}

fn missing_column(name: &str) -> CalError {
    CalError::InvalidParameterCombination(format!("missing required column `{name}`"))
}

/// Load a calendar density written as `cal_bp,pr_dens` (e.g. by `write_grid_csv`).
pub fn load_cal_grid(path: &Path) -> Result<CalGrid> {
    let file = File::open(path).map_err(|source| CalError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_cal_grid(file)
}

/// Read a calendar density from any CSV source. Rows may come in any order.
pub fn read_cal_grid<R: Read>(reader: R) -> Result<CalGrid> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let header_map = build_header_map(&reader.headers()?.clone());
    let year_col = find_column(&header_map, &["cal_bp", "calbp"])
        .ok_or_else(|| missing_column("cal_bp"))?;
    let dens_col = find_column(&header_map, &["pr_dens", "prdens", "density"])
        .ok_or_else(|| missing_column("pr_dens"))?;

    let mut rows: Vec<(i64, f64)> = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result?;
        let year = field(&record, year_col).parse::<i64>().ok();
        let dens = parse_f64(field(&record, dens_col));
        let Some(year) = year.filter(|_| dens.is_finite()) else {
            return Err(CalError::MissingValue { field: "pr_dens", index });
        };
        rows.push((year, dens));
    }
    rows.sort_by(|a, b| b.0.cmp(&a.0));
    if rows.windows(2).any(|w| w[0].0 == w[1].0) {
        return Err(CalError::InvalidParameterCombination(
            "calendar density lists a year twice".to_string(),
        ));
    }

    let (years, dens) = rows.into_iter().unzip();
    Ok(CalGrid::new(years, dens))
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn find_column(header_map: &HashMap<String, usize>, names: &[&str]) -> Option<usize> {
    names.iter().find_map(|n| header_map.get(*n).copied())
}

fn field(record: &StringRecord, col: usize) -> &str {
    record.get(col).unwrap_or("")
}

fn parse_f64(s: &str) -> f64 {
    s.parse::<f64>().unwrap_or(f64::NAN)
}

/// Blank offset cells mean "no offset".
fn parse_f64_or_zero(s: &str) -> f64 {
    if s.is_empty() { 0.0 } else { parse_f64(s) }
}
