//! Point and interval summaries of calibrated dates.
//!
//! - highest posterior density (HPD) intervals at a credible mass
//! - median calendar dates
//! - the conventional 1σ / 2σ summary table combining both

use serde::Serialize;

use crate::domain::CalGrid;
use crate::error::{CalError, Result};
use crate::store::CalDatesStore;

/// Credible mass of the conventional "1σ" HPD interval.
pub const ONE_SIGMA: f64 = 0.683;
/// Credible mass of the conventional "2σ" HPD interval.
pub const TWO_SIGMA: f64 = 0.954;

/// Relative tolerance used when comparing cumulative masses.
const MASS_TOL: f64 = 1e-12;

/// One contiguous run of calendar years, oldest year first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HpdInterval {
    pub start_bp: i64,
    pub end_bp: i64,
}

impl HpdInterval {
    pub fn contains(&self, year: i64) -> bool {
        year <= self.start_bp && year >= self.end_bp
    }

    pub fn span(&self) -> i64 {
        self.start_bp - self.end_bp + 1
    }
}

/// Median and HPD summary of one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateSummary {
    pub date_id: String,
    pub median_bp: Option<i64>,
    pub one_sigma: Vec<HpdInterval>,
    pub two_sigma: Vec<HpdInterval>,
}

/// HPD intervals of every date in the store, in store order.
pub fn hpd(store: &CalDatesStore, cred_mass: f64) -> Result<Vec<Vec<HpdInterval>>> {
    check_cred_mass(cred_mass)?;
    Ok((0..store.len())
        .map(|i| {
            store
                .grid(i)
                .map(|g| hpd_intervals(&g, cred_mass))
                .unwrap_or_default()
        })
        .collect())
}

/// HPD intervals of a single grid.
///
/// Densities are ranked from highest to lowest; the threshold is the
/// density of the last value needed to reach `cred_mass` of the total.
/// Every year at or above it is kept, and runs separated by a gap of more
/// than one year become separate intervals.
pub fn hpd_intervals(grid: &CalGrid, cred_mass: f64) -> Vec<HpdInterval> {
    let total = grid.total();
    if !(total > 0.0) {
        return Vec::new();
    }

    let mut sorted: Vec<f64> = grid.pr_dens.iter().copied().filter(|d| *d > 0.0).collect();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let target = total * cred_mass * (1.0 - MASS_TOL);
    let mut cum = 0.0;
    let mut threshold = sorted[sorted.len() - 1];
    for &d in &sorted {
        cum += d;
        if cum >= target {
            threshold = d;
            break;
        }
    }

    let mut years: Vec<i64> = grid
        .iter()
        .filter(|&(_, d)| d > 0.0 && d >= threshold)
        .map(|(y, _)| y)
        .collect();
    years.sort_unstable_by(|a, b| b.cmp(a));

    let mut out: Vec<HpdInterval> = Vec::new();
    for y in years {
        match out.last_mut() {
            Some(run) if run.end_bp - y <= 1 => run.end_bp = y,
            _ => out.push(HpdInterval {
                start_bp: y,
                end_bp: y,
            }),
        }
    }
    out
}

/// Median calendar year of every date in the store.
pub fn median_dates(store: &CalDatesStore) -> Vec<Option<i64>> {
    (0..store.len())
        .map(|i| store.grid(i).and_then(|g| median_date(&g)))
        .collect()
}

/// Year whose cumulative density (oldest to youngest) is closest to half the total.
///
/// Ties go to the year with the higher density, which keeps symmetric
/// distributions centred on their peak.
pub fn median_date(grid: &CalGrid) -> Option<i64> {
    let total = grid.total();
    if !(total > 0.0) {
        return None;
    }
    let half = total / 2.0;
    let tol = total * MASS_TOL;

    let mut cum = 0.0;
    let mut best: Option<(i64, f64, f64)> = None;
    for (year, dens) in grid.iter() {
        cum += dens;
        let dist = (cum - half).abs();
        best = match best {
            None => Some((year, dist, dens)),
            Some((_, bdist, bdens))
                if dist < bdist - tol || (dist <= bdist + tol && dens > bdens) =>
            {
                Some((year, dist, dens))
            }
            keep => keep,
        };
    }
    best.map(|(year, _, _)| year)
}

/// Median plus 1σ and 2σ HPD intervals for every date.
pub fn summarize(store: &CalDatesStore) -> Vec<DateSummary> {
    store
        .metadata()
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let grid = store.grid(i);
            DateSummary {
                date_id: record.date_id.clone(),
                median_bp: grid.as_ref().and_then(median_date),
                one_sigma: grid
                    .as_ref()
                    .map(|g| hpd_intervals(g, ONE_SIGMA))
                    .unwrap_or_default(),
                two_sigma: grid
                    .as_ref()
                    .map(|g| hpd_intervals(g, TWO_SIGMA))
                    .unwrap_or_default(),
            }
        })
        .collect()
}

fn check_cred_mass(cred_mass: f64) -> Result<()> {
    if cred_mass > 0.0 && cred_mass <= 1.0 {
        Ok(())
    } else {
        Err(CalError::InvalidParameterCombination(format!(
            "credible mass must be within (0, 1], got {cred_mass}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bimodal() -> CalGrid {
        CalGrid::new(
            vec![10, 9, 8, 7, 6, 5, 4, 3],
            vec![0.05, 0.3, 0.05, 0.0, 0.0, 0.1, 0.4, 0.1],
        )
    }

    #[test]
    fn hpd_splits_disjoint_modes() {
        let intervals = hpd_intervals(&bimodal(), 0.6);
        assert_eq!(
            intervals,
            vec![
                HpdInterval { start_bp: 9, end_bp: 9 },
                HpdInterval { start_bp: 4, end_bp: 4 },
            ]
        );
    }

    #[test]
    fn hpd_grows_with_credible_mass() {
        let grid = bimodal();
        let narrow = hpd_intervals(&grid, 0.68);
        let wide = hpd_intervals(&grid, 0.95);
        for y in 0..=12 {
            if narrow.iter().any(|r| r.contains(y)) {
                assert!(wide.iter().any(|r| r.contains(y)), "year {y} missing from 95%");
            }
        }
        assert_eq!(
            wide,
            vec![
                HpdInterval { start_bp: 10, end_bp: 8 },
                HpdInterval { start_bp: 5, end_bp: 3 },
            ]
        );
    }

    #[test]
    fn hpd_treats_missing_years_as_gaps() {
        // Compacted grid: years 7 and 6 are absent.
        let grid = CalGrid::new(vec![9, 8, 5], vec![0.4, 0.3, 0.3]);
        let intervals = hpd_intervals(&grid, 1.0);
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].span(), 2);
    }

    #[test]
    fn median_of_symmetric_grid_is_the_peak() {
        let grid = CalGrid::new(vec![5, 4, 3, 2, 1], vec![0.1, 0.2, 0.4, 0.2, 0.1]);
        assert_eq!(median_date(&grid), Some(3));
    }

    #[test]
    fn median_ignores_zero_padding() {
        let grid = CalGrid::new(vec![4, 3, 2, 1], vec![0.0, 0.75, 0.25, 0.0]);
        assert_eq!(median_date(&grid), Some(3));
        let compact = grid.clone().compact();
        assert_eq!(median_date(&compact), median_date(&grid));
    }

    #[test]
    fn empty_grids_have_no_summary() {
        let grid = CalGrid::new(vec![], vec![]);
        assert_eq!(median_date(&grid), None);
        assert!(hpd_intervals(&grid, 0.95).is_empty());
    }
}
