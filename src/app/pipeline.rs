//! Shared calibration workflow used by the `c14` subcommands.
//!
//! ingest -> curve resolution -> batch calibration -> summaries
//!
//! The handlers in [`crate::app`] only deal with presentation and exports.

use std::path::{Path, PathBuf};

use crate::calibrate::{
    CalibrationBatch, CurveSelection, LogProgress, ProgressReporter, calibrate_batch,
};
use crate::curve::{CurveChoice, CurveDirectory, CurveName, CurveSource};
use crate::domain::{PerDate, StorageMode};
use crate::error::AppError;
use crate::io::ingest::load_dates;
use crate::store::CalDatesStore;
use crate::summary::{DateSummary, summarize};

/// Where the dates of a run come from.
#[derive(Debug, Clone, PartialEq)]
pub enum DateInput {
    Csv(PathBuf),
    Single { id: Option<String>, age: f64, error: f64 },
}

/// Settings of one `c14 calibrate` run.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrateConfig {
    pub input: DateInput,
    pub curve: CurveName,
    pub curve_file: Option<PathBuf>,
    pub curve_dir: Option<PathBuf>,
    pub start_bp: i64,
    pub end_bp: i64,
    pub normalised: bool,
    pub f14c: bool,
    pub eps: f64,
    pub storage: StorageMode,
    pub workers: Option<usize>,
    pub reservoir_offset: f64,
    pub reservoir_offset_error: f64,
}

/// All computed outputs of a single calibration run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub store: CalDatesStore,
    pub summaries: Vec<DateSummary>,
}

/// Curve directory from an explicit path, or from the environment.
pub fn curve_source(dir: Option<&Path>) -> CurveDirectory {
    match dir {
        Some(dir) => CurveDirectory::new(dir),
        None => CurveDirectory::from_env(),
    }
}

/// A custom curve file wins over a built-in name.
pub fn curve_choice(curve: CurveName, curve_file: Option<&Path>) -> Result<CurveChoice, AppError> {
    match curve_file {
        Some(path) => {
            let custom = crate::io::curve::read_curve_csv(path)?;
            log::info!("using custom curve '{}' ({} rows)", custom.name(), custom.len());
            Ok(custom.into())
        }
        None => Ok(curve.into()),
    }
}

/// Execute the calibration workflow against curves from disk.
pub fn run_calibration(config: &CalibrateConfig) -> Result<RunOutput, AppError> {
    let source = curve_source(config.curve_dir.as_deref());
    run_calibration_with(config, &source, &LogProgress::default())
}

/// Execute the calibration workflow against any curve source.
pub fn run_calibration_with(
    config: &CalibrateConfig,
    source: &dyn CurveSource,
    reporter: &dyn ProgressReporter,
) -> Result<RunOutput, AppError> {
    let shared = CurveSelection::Shared(curve_choice(config.curve, config.curve_file.as_deref())?);

    // 1) Ingest.
    let mut batch = match &config.input {
        DateInput::Csv(path) => {
            let table = load_dates(path)?;
            log::info!("read {} dates from {}", table.len(), path.display());
            table.into_batch(shared)
        }
        DateInput::Single { id, age, error } => {
            let mut batch = CalibrationBatch::new(vec![*age], vec![*error]);
            batch.ids = id.clone().map(|id| vec![id]);
            batch.curves = shared;
            batch
        }
    };
    if batch.is_empty() {
        return Err(AppError::new(2, "no dates to calibrate"));
    }

    // 2) Shared settings; per-date offset columns keep priority.
    if matches!(batch.reservoir_offsets, PerDate::Shared(_)) {
        batch.reservoir_offsets = PerDate::Shared(config.reservoir_offset);
    }
    if matches!(batch.reservoir_offset_errors, PerDate::Shared(_)) {
        batch.reservoir_offset_errors = PerDate::Shared(config.reservoir_offset_error);
    }
    batch.start_bp = config.start_bp;
    batch.end_bp = config.end_bp;
    batch.normalised = config.normalised;
    batch.f14c = config.f14c;
    batch.eps = config.eps;
    batch.storage = config.storage;
    batch.workers = config.workers;

    // 3) Calibrate and summarize.
    let store = calibrate_batch(&batch, source, reporter)?;
    let summaries = summarize(&store);

    Ok(RunOutput { store, summaries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibrate::NoProgress;
    use crate::curve::CurveLibrary;
    use crate::test_support::identity_curve;
    use std::io::Write;

    fn config(input: DateInput) -> CalibrateConfig {
        CalibrateConfig {
            input,
            curve: CurveName::Intcal20,
            curve_file: None,
            curve_dir: None,
            start_bp: 6000,
            end_bp: 2000,
            normalised: true,
            f14c: false,
            eps: 1e-5,
            storage: StorageMode::Sparse,
            workers: None,
            reservoir_offset: 0.0,
            reservoir_offset_error: 0.0,
        }
    }

    #[test]
    fn single_date_is_calibrated_and_summarized() {
        let lib = CurveLibrary::new().with(CurveName::Intcal20, identity_curve(0, 10_000, 0.0));
        let cfg = config(DateInput::Single {
            id: Some("OxA-1".to_string()),
            age: 4000.0,
            error: 30.0,
        });
        let out = run_calibration_with(&cfg, &lib, &NoProgress).unwrap();
        assert_eq!(out.store.len(), 1);
        assert_eq!(out.summaries[0].date_id, "OxA-1");
        assert_eq!(out.summaries[0].median_bp, Some(4000));
    }

    #[test]
    fn csv_offsets_override_the_shared_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dates.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "id,age,error,reservoir_offset").unwrap();
        writeln!(f, "a,4000,30,100").unwrap();
        writeln!(f, "b,3000,30,").unwrap();
        drop(f);

        let lib = CurveLibrary::new().with(CurveName::Intcal20, identity_curve(0, 10_000, 0.0));
        let mut cfg = config(DateInput::Csv(path));
        cfg.reservoir_offset = 500.0;
        let out = run_calibration_with(&cfg, &lib, &NoProgress).unwrap();

        let records = out.store.metadata();
        assert_eq!(records[0].reservoir_offset, 100.0);
        assert_eq!(records[1].reservoir_offset, 0.0);
        assert_eq!(out.summaries[0].median_bp, Some(3900));
    }

    #[test]
    fn range_failures_keep_their_exit_code() {
        let lib = CurveLibrary::new().with(CurveName::Intcal20, identity_curve(0, 10_000, 0.0));
        let cfg = config(DateInput::Single { id: None, age: 20_000.0, error: 30.0 });
        let err = run_calibration_with(&cfg, &lib, &NoProgress).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
