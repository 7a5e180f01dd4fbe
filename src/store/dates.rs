//! Container for a batch of calibrated dates.
//!
//! A store pairs one metadata row per date (input order) with the densities,
//! kept in exactly one of two layouts:
//!
//! - **sparse**: one (usually compacted) [`CalGrid`] per date
//! - **dense**: one `[year, date]` matrix covering the whole time window,
//!   rows ordered from the oldest to the youngest year
//!
//! Both layouts describe the same densities; years missing from a sparse grid
//! are implicit zeros.

use std::collections::{HashMap, HashSet};

use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::domain::{CalGrid, DateRecord, StorageMode};
use crate::error::{CalError, Result};

/// Dense densities: rows are years (`years[0]` oldest), columns are dates.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    pub years: Vec<i64>,
    pub values: DMatrix<f64>,
}

impl DenseMatrix {
    /// All-zero matrix over `start_bp..=end_bp` (descending) for `ncols` dates.
    pub fn zeros(start_bp: i64, end_bp: i64, ncols: usize) -> Self {
        let years: Vec<i64> = (end_bp..=start_bp).rev().collect();
        let nrows = years.len();
        Self {
            years,
            values: DMatrix::zeros(nrows, ncols),
        }
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    /// Row index of `year`, if inside the window.
    pub fn row_of(&self, year: i64) -> Option<usize> {
        let oldest = *self.years.first()?;
        let row = oldest.checked_sub(year)?;
        usize::try_from(row).ok().filter(|&r| r < self.years.len())
    }

    /// Column `col` as a full (uncompacted) grid.
    pub fn column_grid(&self, col: usize) -> CalGrid {
        CalGrid::new(self.years.clone(), self.values.column(col).iter().copied().collect())
    }
}

/// Density layout of a [`CalDatesStore`].
#[derive(Debug, Clone, PartialEq)]
pub enum DensityStorage {
    Sparse(Vec<CalGrid>),
    Dense(DenseMatrix),
}

/// Metadata plus densities for a batch of calibrated dates.
#[derive(Debug, Clone, PartialEq)]
pub struct CalDatesStore {
    metadata: Vec<DateRecord>,
    storage: DensityStorage,
    index: HashMap<String, usize>,
}

impl CalDatesStore {
    /// Sparse store: one grid per metadata row.
    pub fn sparse(metadata: Vec<DateRecord>, grids: Vec<CalGrid>) -> Result<Self> {
        if grids.len() != metadata.len() {
            return Err(CalError::InputLengthMismatch {
                field: "grids",
                expected: metadata.len(),
                found: grids.len(),
            });
        }
        Self::build(metadata, DensityStorage::Sparse(grids))
    }

    /// Dense store from an existing matrix.
    pub fn dense(metadata: Vec<DateRecord>, matrix: DenseMatrix) -> Result<Self> {
        if matrix.ncols() != metadata.len() {
            return Err(CalError::InputLengthMismatch {
                field: "matrix columns",
                expected: metadata.len(),
                found: matrix.ncols(),
            });
        }
        if matrix.nrows() != matrix.years.len() {
            return Err(CalError::InputLengthMismatch {
                field: "matrix rows",
                expected: matrix.years.len(),
                found: matrix.nrows(),
            });
        }
        Self::build(metadata, DensityStorage::Dense(matrix))
    }

    /// Dense store built by scattering each grid into its own column.
    ///
    /// Columns are filled independently; years absent from a grid stay zero.
    pub fn dense_from_grids(
        metadata: Vec<DateRecord>,
        grids: &[CalGrid],
        start_bp: i64,
        end_bp: i64,
    ) -> Result<Self> {
        if grids.len() != metadata.len() {
            return Err(CalError::InputLengthMismatch {
                field: "grids",
                expected: metadata.len(),
                found: grids.len(),
            });
        }
        let template = DenseMatrix::zeros(start_bp, end_bp, 0);
        let nrows = template.years.len();

        let columns: Vec<Vec<f64>> = grids
            .par_iter()
            .zip(metadata.par_iter())
            .map(|(grid, record)| {
                let mut col = vec![0.0; nrows];
                for (year, dens) in grid.iter() {
                    let Some(row) = template.row_of(year) else {
                        return Err(CalError::DateOutOfCalibrationRange {
                            id: record.date_id.clone(),
                            start_bp,
                            end_bp,
                            reason: format!("grid year {year} lies outside the matrix window"),
                        });
                    };
                    col[row] = dens;
                }
                Ok(col)
            })
            .collect::<Result<_>>()?;

        let ncols = columns.len();
        let values = DMatrix::from_vec(nrows, ncols, columns.concat());
        Self::dense(
            metadata,
            DenseMatrix {
                years: template.years,
                values,
            },
        )
    }

    fn build(metadata: Vec<DateRecord>, storage: DensityStorage) -> Result<Self> {
        let mut index = HashMap::with_capacity(metadata.len());
        for (i, record) in metadata.iter().enumerate() {
            if index.insert(record.date_id.clone(), i).is_some() {
                return Err(CalError::DuplicateIdentifier(record.date_id.clone()));
            }
        }
        Ok(Self {
            metadata,
            storage,
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    pub fn metadata(&self) -> &[DateRecord] {
        &self.metadata
    }

    pub fn record(&self, i: usize) -> Option<&DateRecord> {
        self.metadata.get(i)
    }

    /// Position of the date with this id.
    pub fn position(&self, date_id: &str) -> Option<usize> {
        self.index.get(date_id).copied()
    }

    pub fn storage(&self) -> &DensityStorage {
        &self.storage
    }

    pub fn storage_mode(&self) -> StorageMode {
        match self.storage {
            DensityStorage::Sparse(_) => StorageMode::Sparse,
            DensityStorage::Dense(_) => StorageMode::Dense,
        }
    }

    pub fn grids(&self) -> Option<&[CalGrid]> {
        match &self.storage {
            DensityStorage::Sparse(grids) => Some(grids),
            DensityStorage::Dense(_) => None,
        }
    }

    pub fn matrix(&self) -> Option<&DenseMatrix> {
        match &self.storage {
            DensityStorage::Sparse(_) => None,
            DensityStorage::Dense(m) => Some(m),
        }
    }

    /// Densities of date `i` as a grid, whatever the layout.
    pub fn grid(&self, i: usize) -> Option<CalGrid> {
        if i >= self.len() {
            return None;
        }
        match &self.storage {
            DensityStorage::Sparse(grids) => grids.get(i).cloned(),
            DensityStorage::Dense(m) => Some(m.column_grid(i)),
        }
    }

    pub fn grid_by_id(&self, date_id: &str) -> Option<CalGrid> {
        self.grid(self.position(date_id)?)
    }

    /// New store holding the dates at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        let mut seen = HashSet::with_capacity(indices.len());
        for &i in indices {
            if i >= self.len() {
                return Err(CalError::InvalidParameterCombination(format!(
                    "date index {i} is out of range for a store of {} dates",
                    self.len()
                )));
            }
            if !seen.insert(i) {
                return Err(CalError::DuplicateIdentifier(self.metadata[i].date_id.clone()));
            }
        }

        let metadata: Vec<DateRecord> = indices.iter().map(|&i| self.metadata[i].clone()).collect();
        let storage = match &self.storage {
            DensityStorage::Sparse(grids) => {
                DensityStorage::Sparse(indices.iter().map(|&i| grids[i].clone()).collect())
            }
            DensityStorage::Dense(m) => DensityStorage::Dense(DenseMatrix {
                years: m.years.clone(),
                values: m.values.select_columns(indices),
            }),
        };
        Self::build(metadata, storage)
    }

    /// New store holding the dates with these ids, in that order.
    pub fn select_ids<S: AsRef<str>>(&self, ids: &[S]) -> Result<Self> {
        let indices = ids
            .iter()
            .map(|id| {
                let id = id.as_ref();
                self.position(id).ok_or_else(|| {
                    CalError::InvalidParameterCombination(format!(
                        "no date with id '{id}' in store"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.select(&indices)
    }

    /// Same dates in the dense layout over each date's requested window.
    ///
    /// All dates must share one window.
    pub fn to_dense(&self) -> Result<Self> {
        let grids = match &self.storage {
            DensityStorage::Dense(_) => return Ok(self.clone()),
            DensityStorage::Sparse(grids) => grids,
        };
        let (start_bp, end_bp) = self.shared_window()?;
        Self::dense_from_grids(self.metadata.clone(), grids, start_bp, end_bp)
    }

    /// Same dates as compacted per-date grids.
    pub fn to_sparse(&self) -> Self {
        match &self.storage {
            DensityStorage::Sparse(_) => self.clone(),
            DensityStorage::Dense(m) => Self {
                metadata: self.metadata.clone(),
                storage: DensityStorage::Sparse(
                    (0..m.ncols()).map(|c| m.column_grid(c).compact()).collect(),
                ),
                index: self.index.clone(),
            },
        }
    }

    fn shared_window(&self) -> Result<(i64, i64)> {
        let Some(first) = self.metadata.first() else {
            return Ok((0, 0));
        };
        let window = (first.start_bp, first.end_bp);
        if let Some(other) = self
            .metadata
            .iter()
            .find(|r| (r.start_bp, r.end_bp) != window)
        {
            return Err(CalError::InvalidParameterCombination(format!(
                "dates '{}' and '{}' use different time windows",
                first.date_id, other.date_id
            )));
        }
        Ok(window)
    }
}
