//! Batch calibration driver.
//!
//! Turns parallel arrays of radiocarbon ages and errors into a
//! [`CalDatesStore`]:
//!
//! 1. validate every input up front (lengths, missing values, ids, curves,
//!    ages within curve range, window within curve domain)
//! 2. calibrate each date independently (parallel, results land in input order)
//! 3. keep per-date grids, or scatter them into a dense matrix
//!
//! Any failure aborts the whole batch; a partial store is never returned.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::calibrate::forward::{
    CalibrateOptions, CurveSamples, DEFAULT_EPS, DEFAULT_TIME_RANGE, calibrate_date_on,
};
use crate::calibrate::progress::{ProgressEvent, ProgressReporter};
use crate::curve::{CalibrationCurve, CurveChoice, CurveName, CurveSource};
use crate::domain::{CalGrid, DateRecord, PerDate, StorageMode};
use crate::error::{CalError, Result};
use crate::store::CalDatesStore;

/// Which curve(s) back a batch.
///
/// Per-date selection is by name only: a single custom table may back a
/// whole batch, but not one custom table per date.
#[derive(Debug, Clone)]
pub enum CurveSelection {
    Shared(CurveChoice),
    PerDate(Vec<CurveName>),
}

impl Default for CurveSelection {
    fn default() -> Self {
        CurveSelection::Shared(CurveChoice::Named(CurveName::Intcal20))
    }
}

/// Inputs and settings of one batch calibration call.
#[derive(Debug, Clone)]
pub struct CalibrationBatch {
    pub ages: Vec<f64>,
    pub errors: Vec<f64>,
    /// Defaults to `"1"..="n"`.
    pub ids: Option<Vec<String>>,
    pub details: Option<Vec<String>>,
    pub curves: CurveSelection,
    pub reservoir_offsets: PerDate<f64>,
    pub reservoir_offset_errors: PerDate<f64>,
    pub start_bp: i64,
    pub end_bp: i64,
    pub normalised: bool,
    pub f14c: bool,
    pub eps: f64,
    pub storage: StorageMode,
    /// Worker threads; `None` uses rayon's global pool.
    pub workers: Option<usize>,
}

impl CalibrationBatch {
    pub fn new(ages: Vec<f64>, errors: Vec<f64>) -> Self {
        Self {
            ages,
            errors,
            ids: None,
            details: None,
            curves: CurveSelection::default(),
            reservoir_offsets: PerDate::Shared(0.0),
            reservoir_offset_errors: PerDate::Shared(0.0),
            start_bp: DEFAULT_TIME_RANGE.0,
            end_bp: DEFAULT_TIME_RANGE.1,
            normalised: true,
            f14c: false,
            eps: DEFAULT_EPS,
            storage: StorageMode::Sparse,
            workers: None,
        }
    }

    pub fn with_ids(mut self, ids: Vec<String>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn with_curve(mut self, curve: impl Into<CurveChoice>) -> Self {
        self.curves = CurveSelection::Shared(curve.into());
        self
    }

    pub fn with_window(mut self, start_bp: i64, end_bp: i64) -> Self {
        self.start_bp = start_bp;
        self.end_bp = end_bp;
        self
    }

    pub fn with_storage(mut self, storage: StorageMode) -> Self {
        self.storage = storage;
        self
    }

    pub fn len(&self) -> usize {
        self.ages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ages.is_empty()
    }
}

/// A curve prepared for a batch: loaded once and sampled once.
struct PreparedCurve {
    label: String,
    curve: Arc<CalibrationCurve>,
    samples: CurveSamples,
}

/// Everything needed to calibrate date `i`, resolved during validation.
struct DateJob {
    curve: usize,
    opts: CalibrateOptions,
}

/// Calibrate a batch of dates.
pub fn calibrate_batch(
    batch: &CalibrationBatch,
    source: &dyn CurveSource,
    reporter: &dyn ProgressReporter,
) -> Result<CalDatesStore> {
    let n = batch.len();
    let ids = validate_inputs(batch)?;

    let mut normalised = batch.normalised;
    if batch.f14c && !normalised {
        log::warn!("F14C calibration requires normalised densities; forcing normalised = true");
        normalised = true;
    }

    let (curves, curve_of) = prepare_curves(batch, source)?;
    let jobs = build_jobs(batch, normalised, &curve_of)?;

    // Range checks are cheap; run them before any density is computed.
    for (i, job) in jobs.iter().enumerate() {
        let prepared = &curves[job.curve];
        prepared
            .curve
            .check_c14_age(batch.ages[i] - job.opts.reservoir_offset)?;
        check_window(&ids[i], &prepared.samples, &job.opts)?;
    }

    reporter.report(ProgressEvent::Started { total: n });
    let completed = AtomicUsize::new(0);
    let run = || -> Result<Vec<CalGrid>> {
        (0..n)
            .into_par_iter()
            .map(|i| {
                let job = &jobs[i];
                let prepared = &curves[job.curve];
                let grid = calibrate_date_on(
                    batch.ages[i],
                    batch.errors[i],
                    &prepared.curve,
                    &prepared.samples,
                    &job.opts,
                )
                .map_err(|e| attach_id(e, &ids[i], i))?;
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                reporter.report(ProgressEvent::DateCalibrated {
                    index: i,
                    completed: done,
                    total: n,
                });
                Ok(grid)
            })
            .collect()
    };

    let grids = match batch.workers {
        Some(workers) => match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
            Ok(pool) => pool.install(run)?,
            Err(e) => {
                log::warn!("could not start {workers} worker threads ({e}); using the global pool");
                run()?
            }
        },
        None => run()?,
    };
    reporter.report(ProgressEvent::Finished { total: n });

    let metadata: Vec<DateRecord> = (0..n)
        .map(|i| DateRecord {
            date_id: ids[i].clone(),
            c14_age: batch.ages[i],
            c14_error: batch.errors[i],
            details: batch.details.as_ref().and_then(|d| d.get(i).cloned()),
            calibration_curve: curves[jobs[i].curve].label.clone(),
            reservoir_offset: jobs[i].opts.reservoir_offset,
            reservoir_offset_error: jobs[i].opts.reservoir_offset_error,
            start_bp: batch.start_bp,
            end_bp: batch.end_bp,
            normalised,
            f14c: batch.f14c,
            eps: batch.eps,
        })
        .collect();

    match batch.storage {
        StorageMode::Sparse => CalDatesStore::sparse(metadata, grids),
        StorageMode::Dense => {
            CalDatesStore::dense_from_grids(metadata, &grids, batch.start_bp, batch.end_bp)
        }
    }
}

/// Length, missing-value and id checks. Returns the resolved ids.
fn validate_inputs(batch: &CalibrationBatch) -> Result<Vec<String>> {
    let n = batch.len();
    check_len("errors", n, batch.errors.len())?;
    if let Some(ids) = &batch.ids {
        check_len("ids", n, ids.len())?;
    }
    if let Some(details) = &batch.details {
        check_len("details", n, details.len())?;
    }
    if let CurveSelection::PerDate(names) = &batch.curves {
        check_len("curves", n, names.len())?;
    }
    if let Some(len) = batch.reservoir_offsets.explicit_len() {
        check_len("reservoir_offsets", n, len)?;
    }
    if let Some(len) = batch.reservoir_offset_errors.explicit_len() {
        check_len("reservoir_offset_errors", n, len)?;
    }

    if let Some(index) = batch.ages.iter().position(|a| a.is_nan()) {
        return Err(CalError::MissingValue { field: "ages", index });
    }
    if let Some(index) = batch.errors.iter().position(|e| e.is_nan()) {
        return Err(CalError::MissingValue { field: "errors", index });
    }
    if let Some(index) = first_nan(&batch.reservoir_offsets) {
        return Err(CalError::MissingValue { field: "reservoir_offsets", index });
    }
    if let Some(index) = first_nan(&batch.reservoir_offset_errors) {
        return Err(CalError::MissingValue { field: "reservoir_offset_errors", index });
    }
    if let Some(bad) = batch.errors.iter().find(|e| **e < 0.0 || e.is_infinite()) {
        return Err(CalError::InvalidParameterCombination(format!(
            "measurement errors must be finite and non-negative, got {bad}"
        )));
    }

    let ids: Vec<String> = match &batch.ids {
        Some(ids) => ids.clone(),
        None => (1..=n).map(|i| i.to_string()).collect(),
    };
    let mut seen = HashSet::with_capacity(n);
    for id in &ids {
        if !seen.insert(id.as_str()) {
            return Err(CalError::DuplicateIdentifier(id.clone()));
        }
    }
    Ok(ids)
}

fn first_nan(values: &PerDate<f64>) -> Option<usize> {
    match values {
        PerDate::Shared(_) => None,
        PerDate::Each(v) => v.iter().position(|x| x.is_nan()),
    }
}

fn check_len(field: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(CalError::InputLengthMismatch {
            field,
            expected,
            found,
        });
    }
    Ok(())
}

/// Load every distinct curve once. Returns the curves and, per date, its curve index.
fn prepare_curves(
    batch: &CalibrationBatch,
    source: &dyn CurveSource,
) -> Result<(Vec<PreparedCurve>, Vec<usize>)> {
    let prepare = |choice: &CurveChoice| -> Result<PreparedCurve> {
        let curve = choice.resolve(source)?;
        let samples = CurveSamples::new(&curve);
        Ok(PreparedCurve {
            label: choice.label(),
            curve,
            samples,
        })
    };

    match &batch.curves {
        CurveSelection::Shared(choice) => Ok((vec![prepare(choice)?], vec![0; batch.len()])),
        CurveSelection::PerDate(names) => {
            let mut curves = Vec::new();
            let mut slot: HashMap<CurveName, usize> = HashMap::new();
            let mut curve_of = Vec::with_capacity(names.len());
            for name in names {
                let idx = match slot.get(name) {
                    Some(&idx) => idx,
                    None => {
                        curves.push(prepare(&CurveChoice::Named(*name))?);
                        slot.insert(*name, curves.len() - 1);
                        curves.len() - 1
                    }
                };
                curve_of.push(idx);
            }
            Ok((curves, curve_of))
        }
    }
}

fn build_jobs(
    batch: &CalibrationBatch,
    normalised: bool,
    curve_of: &[usize],
) -> Result<Vec<DateJob>> {
    curve_of
        .iter()
        .enumerate()
        .map(|(i, &curve)| {
            let opts = CalibrateOptions {
                reservoir_offset: batch.reservoir_offsets.get(i).unwrap_or(0.0),
                reservoir_offset_error: batch.reservoir_offset_errors.get(i).unwrap_or(0.0),
                start_bp: batch.start_bp,
                end_bp: batch.end_bp,
                normalised,
                f14c: batch.f14c,
                eps: batch.eps,
                compact: batch.storage == StorageMode::Sparse,
            };
            opts.validate()?;
            Ok(DateJob { curve, opts })
        })
        .collect()
}

fn check_window(id: &str, samples: &CurveSamples, opts: &CalibrateOptions) -> Result<()> {
    let covered = match (samples.years.first(), samples.years.last()) {
        (Some(&oldest), Some(&youngest)) => opts.start_bp <= oldest && opts.end_bp >= youngest,
        _ => false,
    };
    if covered {
        return Ok(());
    }
    Err(CalError::DateOutOfCalibrationRange {
        id: id.to_string(),
        start_bp: opts.start_bp,
        end_bp: opts.end_bp,
        reason: format!(
            "the curve only covers {}..{} BP",
            samples.years.first().copied().unwrap_or_default(),
            samples.years.last().copied().unwrap_or_default()
        ),
    })
}

/// Put the date's id (or position) into errors raised by the single-date path.
fn attach_id(err: CalError, id: &str, index: usize) -> CalError {
    match err {
        CalError::DateOutOfCalibrationRange {
            start_bp,
            end_bp,
            reason,
            ..
        } => CalError::DateOutOfCalibrationRange {
            id: id.to_string(),
            start_bp,
            end_bp,
            reason,
        },
        CalError::MissingValue { field, .. } => CalError::MissingValue { field, index },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibrate::NoProgress;
    use crate::curve::CurveLibrary;
    use crate::test_support::identity_curve;
    use std::sync::Mutex;

    fn library() -> CurveLibrary {
        CurveLibrary::new()
            .with(CurveName::Intcal20, identity_curve(0, 6000, 20.0))
            .with(CurveName::Marine20, identity_curve(0, 6000, 40.0))
    }

    fn three_dates() -> CalibrationBatch {
        CalibrationBatch::new(vec![4000.0, 3000.0, 2000.0], vec![30.0, 40.0, 25.0])
            .with_ids(vec!["a".into(), "b".into(), "c".into()])
            .with_window(5000, 1000)
    }

    #[test]
    fn dense_matrix_has_one_column_per_date() {
        let batch = three_dates().with_storage(StorageMode::Dense);
        let store = calibrate_batch(&batch, &library(), &NoProgress).unwrap();
        let m = store.matrix().unwrap();
        assert_eq!(m.ncols(), 3);
        assert_eq!(m.nrows(), 5000 - 1000 + 1);
    }

    #[test]
    fn sparse_grids_scatter_to_the_dense_matrix() {
        let lib = library();
        let dense_batch = three_dates().with_storage(StorageMode::Dense);
        let dense = calibrate_batch(&dense_batch, &lib, &NoProgress).unwrap();
        let sparse = calibrate_batch(&three_dates(), &lib, &NoProgress).unwrap();
        assert_eq!(sparse.grids().unwrap().len(), 3);
        let scattered = sparse.to_dense().unwrap();
        assert_eq!(scattered.matrix(), dense.matrix());
    }

    #[test]
    fn metadata_records_inputs_in_order() {
        let store = calibrate_batch(&three_dates(), &library(), &NoProgress).unwrap();
        let ids: Vec<&str> = store.metadata().iter().map(|r| r.date_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(store.record(1).unwrap().c14_age, 3000.0);
        assert_eq!(store.record(1).unwrap().calibration_curve, "intcal20");
        assert_eq!(store.grid_by_id("a").unwrap().mode(), Some(4000));
    }

    #[test]
    fn default_ids_count_from_one() {
        let batch =
            CalibrationBatch::new(vec![1000.0, 1100.0], vec![20.0, 20.0]).with_window(5000, 0);
        let store = calibrate_batch(&batch, &library(), &NoProgress).unwrap();
        assert_eq!(store.position("2"), Some(1));
    }

    #[test]
    fn validation_fails_fast() {
        let lib = library();
        let mut batch = three_dates();
        batch.errors.pop();
        assert!(matches!(
            calibrate_batch(&batch, &lib, &NoProgress),
            Err(CalError::InputLengthMismatch { field: "errors", .. })
        ));

        let mut batch = three_dates();
        batch.ages[1] = f64::NAN;
        assert!(matches!(
            calibrate_batch(&batch, &lib, &NoProgress),
            Err(CalError::MissingValue { field: "ages", index: 1 })
        ));

        let mut batch = three_dates();
        batch.reservoir_offsets = PerDate::Each(vec![0.0, 0.0, f64::NAN]);
        assert!(matches!(
            calibrate_batch(&batch, &lib, &NoProgress),
            Err(CalError::MissingValue { field: "reservoir_offsets", index: 2 })
        ));

        let mut batch = three_dates();
        batch.reservoir_offset_errors = PerDate::Each(vec![f64::NAN, 0.0, 0.0]);
        assert!(matches!(
            calibrate_batch(&batch, &lib, &NoProgress),
            Err(CalError::MissingValue { field: "reservoir_offset_errors", index: 0 })
        ));

        let batch = three_dates().with_ids(vec!["a".into(), "b".into(), "a".into()]);
        assert!(matches!(
            calibrate_batch(&batch, &lib, &NoProgress),
            Err(CalError::DuplicateIdentifier(_))
        ));

        let mut batch = three_dates();
        batch.curves = CurveSelection::PerDate(vec![CurveName::Intcal20]);
        assert!(matches!(
            calibrate_batch(&batch, &lib, &NoProgress),
            Err(CalError::InputLengthMismatch { field: "curves", .. })
        ));
    }

    #[test]
    fn out_of_range_age_aborts_the_batch() {
        let mut batch = three_dates();
        batch.ages[2] = 9000.0;
        let calls = AtomicUsize::new(0);
        let reporter = |_: ProgressEvent| {
            calls.fetch_add(1, Ordering::Relaxed);
        };
        let err = calibrate_batch(&batch, &library(), &reporter).unwrap_err();
        assert!(matches!(err, CalError::CurveRangeExceeded { .. }));
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn window_outside_curve_names_the_date() {
        let batch = three_dates().with_window(7000, 1000);
        let err = calibrate_batch(&batch, &library(), &NoProgress).unwrap_err();
        match err {
            CalError::DateOutOfCalibrationRange { id, .. } => assert_eq!(id, "a"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unknown_curve_is_reported() {
        let batch = three_dates().with_curve(CurveName::Shcal20);
        assert!(matches!(
            calibrate_batch(&batch, &library(), &NoProgress),
            Err(CalError::UnknownCurveName(_))
        ));
    }

    #[test]
    fn per_date_curves_and_offsets() {
        let mut batch = three_dates();
        batch.curves = CurveSelection::PerDate(vec![
            CurveName::Intcal20,
            CurveName::Marine20,
            CurveName::Intcal20,
        ]);
        batch.reservoir_offsets = PerDate::Each(vec![0.0, 200.0, 0.0]);
        let store = calibrate_batch(&batch, &library(), &NoProgress).unwrap();
        assert_eq!(store.record(1).unwrap().calibration_curve, "marine20");
        assert_eq!(store.record(1).unwrap().reservoir_offset, 200.0);
        assert_eq!(store.grid(1).unwrap().mode(), Some(2800));
    }

    #[test]
    fn f14c_forces_normalisation() {
        let mut batch = three_dates();
        batch.f14c = true;
        batch.normalised = false;
        let store = calibrate_batch(&batch, &library(), &NoProgress).unwrap();
        assert!(store.metadata().iter().all(|r| r.normalised));
        assert!((store.grid(0).unwrap().total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn worker_pool_gives_identical_results() {
        let lib = library();
        let mut pooled = three_dates();
        pooled.workers = Some(2);
        let a = calibrate_batch(&pooled, &lib, &NoProgress).unwrap();
        let b = calibrate_batch(&three_dates(), &lib, &NoProgress).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn reporter_sees_every_date() {
        let events = Mutex::new(Vec::new());
        let reporter = |e: ProgressEvent| events.lock().unwrap().push(e);
        calibrate_batch(&three_dates(), &library(), &reporter).unwrap();
        let events = events.into_inner().unwrap();
        assert_eq!(events.first(), Some(&ProgressEvent::Started { total: 3 }));
        assert_eq!(events.last(), Some(&ProgressEvent::Finished { total: 3 }));
        let mut indices: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::DateCalibrated { index, .. } => Some(*index),
                _ => None,
            })
            .collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn custom_curve_is_labelled() {
        let batch = three_dates().with_curve(identity_curve(0, 6000, 10.0));
        let store = calibrate_batch(&batch, &CurveLibrary::new(), &NoProgress).unwrap();
        assert!(store.metadata().iter().all(|r| r.calibration_curve == "custom"));
    }
}
