//! Read/write calibration curve tables.
//!
//! Two input layouts are supported:
//!
//! - published `.14c` files: `#` comment lines, then comma-separated rows whose
//!   first three columns are calendar age, radiocarbon age and error (extra
//!   columns such as Δ14C are ignored)
//! - custom curve CSV: exactly three numeric columns, with or without a header

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::curve::CalibrationCurve;
use crate::error::{CalError, Result};

/// Read a published `.14c` curve file.
pub fn read_14c_file(path: &Path, name: &str) -> Result<CalibrationCurve> {
    let file = open(path)?;
    read_14c(file, name)
}

/// Read a `.14c` table from any source.
pub fn read_14c<R: Read>(reader: R, name: &str) -> Result<CalibrationCurve> {
    let rows = read_rows(reader, Some(b'#'))?;
    let mut table = Vec::with_capacity(rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        if row.len() < 3 {
            return Err(CalError::InvalidCurveFormat(format!(
                "curve '{name}' row {i} has {} columns, expected at least 3",
                row.len()
            )));
        }
        table.push(parse_numeric_row(&row[..3], name, i)?);
    }
    CalibrationCurve::from_table(name, &table)
}

/// Read a custom three-column curve CSV.
pub fn read_curve_csv(path: &Path) -> Result<CalibrationCurve> {
    let file = open(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "custom".to_string());
    read_custom_curve(file, &name)
}

/// Read a custom three-column table from any source.
///
/// A first row where no cell parses as a number is treated as a header.
pub fn read_custom_curve<R: Read>(reader: R, name: &str) -> Result<CalibrationCurve> {
    let mut rows = read_rows(reader, None)?;
    let has_header = rows
        .first()
        .is_some_and(|r| r.iter().all(|c| c.parse::<f64>().is_err()));
    if has_header {
        rows.remove(0);
    }

    let mut table = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        if row.len() != 3 {
            return Err(CalError::InvalidCurveFormat(format!(
                "custom curve row {i} has {} columns, expected 3",
                row.len()
            )));
        }
        table.push(parse_numeric_row(row, name, i)?);
    }
    CalibrationCurve::from_table(name, &table)
}

/// Write a curve as a three-column CSV with a header.
pub fn write_curve_csv(path: &Path, curve: &CalibrationCurve) -> Result<()> {
    let file = File::create(path).map_err(|source| CalError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    write_curve(file, curve)
}

pub fn write_curve<W: Write>(writer: W, curve: &CalibrationCurve) -> Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(["cal_bp", "c14_bp", "error"])?;
    for p in curve.points() {
        w.write_record([p.cal_bp.to_string(), p.c14_bp.to_string(), p.error.to_string()])?;
    }
    w.flush().map_err(|e| CalError::Csv(e.into()))?;
    Ok(())
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| CalError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_rows<R: Read>(reader: R, comment: Option<u8>) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(comment)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

fn parse_numeric_row(cells: &[String], name: &str, row: usize) -> Result<Vec<f64>> {
    cells
        .iter()
        .map(|c| {
            c.parse::<f64>().map_err(|_| {
                CalError::InvalidCurveFormat(format!(
                    "curve '{name}' row {row} has a non-numeric value '{c}'"
                ))
            })
        })
        .collect()
}
