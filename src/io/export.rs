//! Export calibrated dates.
//!
//! - whole store as JSON (metadata + per-date grids), for reloading elsewhere
//! - one grid as CSV, for spreadsheets and plotting tools
//! - per-date summaries as CSV

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{CalGrid, DateRecord, StorageMode, UncalGrid};
use crate::error::{CalError, Result};
use crate::store::CalDatesStore;
use crate::summary::{DateSummary, HpdInterval};

/// JSON layout of an exported store.
///
/// Dense stores are written as full per-date grids over the shared window, so
/// both layouts reload the same way.
#[derive(Debug, Serialize)]
pub struct StoreExport<'a> {
    pub tool: &'static str,
    pub generated: DateTime<Utc>,
    pub storage: StorageMode,
    pub metadata: &'a [DateRecord],
    pub grids: Vec<CalGrid>,
}

impl<'a> StoreExport<'a> {
    pub fn new(store: &'a CalDatesStore) -> Self {
        Self {
            tool: "c14",
            generated: Utc::now(),
            storage: store.storage_mode(),
            metadata: store.metadata(),
            grids: (0..store.len()).filter_map(|i| store.grid(i)).collect(),
        }
    }
}

/// Write a store to a JSON file.
pub fn write_store_json(path: &Path, store: &CalDatesStore) -> Result<()> {
    let file = create(path)?;
    serde_json::to_writer_pretty(file, &StoreExport::new(store))?;
    Ok(())
}

/// Write one calendar grid as `cal_bp,pr_dens`.
pub fn write_grid_csv(path: &Path, grid: &CalGrid) -> Result<()> {
    let file = create(path)?;
    write_pairs(file, "cal_bp", grid.iter())
}

/// Write one radiocarbon-age grid as `c14_bp,pr_dens`.
pub fn write_uncal_grid_csv(path: &Path, grid: &UncalGrid) -> Result<()> {
    let file = create(path)?;
    write_pairs(file, "c14_bp", grid.iter())
}

/// Write per-date summaries: one row per date, intervals joined with `;`.
pub fn write_summary_csv<W: Write>(writer: W, summaries: &[DateSummary]) -> Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(["date_id", "median_bp", "hpd_68", "hpd_95"])?;
    for s in summaries {
        w.write_record([
            s.date_id.clone(),
            s.median_bp.map(|m| m.to_string()).unwrap_or_default(),
            format_intervals(&s.one_sigma),
            format_intervals(&s.two_sigma),
        ])?;
    }
    w.flush().map_err(|e| CalError::Csv(e.into()))?;
    Ok(())
}

/// `start-end` pairs joined by `;`, e.g. `4150-3980;3950-3900`.
pub fn format_intervals(intervals: &[HpdInterval]) -> String {
    intervals
        .iter()
        .map(|r| format!("{}-{}", r.start_bp, r.end_bp))
        .collect::<Vec<_>>()
        .join(";")
}

fn write_pairs<W: Write>(
    writer: W,
    key: &str,
    rows: impl Iterator<Item = (i64, f64)>,
) -> Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record([key, "pr_dens"])?;
    for (k, d) in rows {
        w.write_record([k.to_string(), format!("{d:.10e}")])?;
    }
    w.flush().map_err(|e| CalError::Csv(e.into()))?;
    Ok(())
}

fn create(path: &Path) -> Result<File> {
    File::create(path).map_err(|source| CalError::Io {
        path: path.to_path_buf(),
        source,
    })
}
