//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - produced by the calibration transforms
//! - aggregated into a [`crate::store::CalDatesStore`]
//! - exported to JSON/CSV

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Probability density over integer calendar years (BP).
///
/// Rows are ordered by descending calendar age (oldest first). A compacted
/// grid omits zero-density years; it is equivalent to the full grid padded
/// with zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalGrid {
    pub cal_bp: Vec<i64>,
    pub pr_dens: Vec<f64>,
}

/// Probability density over integer radiocarbon ages (BP), descending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncalGrid {
    pub c14_bp: Vec<i64>,
    pub pr_dens: Vec<f64>,
}

macro_rules! grid_common {
    ($ty:ident, $key:ident) => {
        impl $ty {
            pub fn new($key: Vec<i64>, pr_dens: Vec<f64>) -> Self {
                debug_assert_eq!($key.len(), pr_dens.len());
                Self { $key, pr_dens }
            }

            pub fn len(&self) -> usize {
                self.pr_dens.len()
            }

            pub fn is_empty(&self) -> bool {
                self.pr_dens.is_empty()
            }

            /// Total probability mass.
            pub fn total(&self) -> f64 {
                self.pr_dens.iter().sum()
            }

            /// `(key, density)` pairs in grid order.
            pub fn iter(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
                self.$key.iter().copied().zip(self.pr_dens.iter().copied())
            }

            /// Density at `key`, or `0.0` if the key is not on the grid.
            pub fn density_at(&self, key: i64) -> f64 {
                // Keys are descending.
                match self.$key.binary_search_by(|k| key.cmp(k)) {
                    Ok(idx) => self.pr_dens[idx],
                    Err(_) => 0.0,
                }
            }

            /// Drop zero-density rows.
            pub fn compact(self) -> Self {
                let (keys, dens): (Vec<i64>, Vec<f64>) =
                    self.iter().filter(|(_, d)| *d > 0.0).unzip();
                Self::new(keys, dens)
            }

            /// Key with the highest density (first one on ties).
            pub fn mode(&self) -> Option<i64> {
                let mut best: Option<(i64, f64)> = None;
                for (k, d) in self.iter() {
                    match best {
                        Some((_, bd)) if d <= bd => {}
                        _ => best = Some((k, d)),
                    }
                }
                best.map(|(k, _)| k)
            }
        }
    };
}

grid_common!(CalGrid, cal_bp);
grid_common!(UncalGrid, c14_bp);

/// Metadata for one calibrated date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRecord {
    pub date_id: String,
    pub c14_age: f64,
    pub c14_error: f64,
    pub details: Option<String>,
    pub calibration_curve: String,
    pub reservoir_offset: f64,
    pub reservoir_offset_error: f64,
    pub start_bp: i64,
    pub end_bp: i64,
    pub normalised: bool,
    pub f14c: bool,
    pub eps: f64,
}

/// How a [`crate::store::CalDatesStore`] keeps its densities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// One compacted grid per date.
    #[default]
    Sparse,
    /// One `[year, date]` matrix over the whole time window.
    Dense,
}

/// How a density grid over radiocarbon ages is taken to calendar space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationStrategy {
    /// Read the grid density at the curve's (rounded) radiocarbon age for each year.
    #[default]
    Fast,
    /// Convolve every radiocarbon age in the grid with the curve uncertainty.
    Full,
}

/// What the forward calibrator consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationInput {
    RawDate { age: f64, error: f64 },
    DensityGrid(UncalGrid),
}

/// A parameter that is either shared by every date or given per date.
#[derive(Debug, Clone, PartialEq)]
pub enum PerDate<T> {
    Shared(T),
    Each(Vec<T>),
}

impl<T: Clone> PerDate<T> {
    /// Value for date `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        match self {
            PerDate::Shared(v) => Some(v.clone()),
            PerDate::Each(values) => values.get(index).cloned(),
        }
    }

    /// Number of explicit values, if per-date.
    pub fn explicit_len(&self) -> Option<usize> {
        match self {
            PerDate::Shared(_) => None,
            PerDate::Each(values) => Some(values.len()),
        }
    }
}

impl<T: Default> Default for PerDate<T> {
    fn default() -> Self {
        PerDate::Shared(T::default())
    }
}

impl<T> From<T> for PerDate<T> {
    fn from(value: T) -> Self {
        PerDate::Shared(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn density_lookup_and_compaction() {
        let grid = CalGrid::new(vec![5, 4, 3, 2], vec![0.0, 0.25, 0.75, 0.0]);
        assert_eq!(grid.density_at(3), 0.75);
        assert_eq!(grid.density_at(9), 0.0);
        assert_eq!(grid.mode(), Some(3));

        let compact = grid.compact();
        assert_eq!(compact.cal_bp, vec![4, 3]);
        assert!((compact.total() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn per_date_resolution() {
        let shared: PerDate<f64> = 2.5.into();
        assert_eq!(shared.get(10), Some(2.5));
        assert_eq!(shared.explicit_len(), None);

        let each = PerDate::Each(vec![1.0, 2.0]);
        assert_eq!(each.get(1), Some(2.0));
        assert_eq!(each.get(2), None);
        assert_eq!(each.explicit_len(), Some(2));
    }
}
