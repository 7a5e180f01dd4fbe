//! Resolving curve names to loaded curves.
//!
//! The published curves are identified by a small, fixed set of canonical
//! names. How those names map to data is delegated to a [`CurveSource`]:
//!
//! - [`CurveDirectory`] reads `<dir>/<name>.14c` files (the stock source)
//! - [`CurveLibrary`] holds curves already in memory (tests, mixed curves)

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::curve::CalibrationCurve;
use crate::error::{CalError, Result};

/// Environment variable pointing at the directory holding the `.14c` curve files.
pub const CURVE_DIR_ENV: &str = "C14_CURVE_DIR";

/// Canonical names of the built-in calibration curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CurveName {
    Intcal20,
    Shcal20,
    Marine20,
    Intcal13,
    Shcal13,
    Marine13,
    Intcal13nhpine16,
    Shcal13shkauri16,
}

impl CurveName {
    pub const ALL: [CurveName; 8] = [
        CurveName::Intcal20,
        CurveName::Shcal20,
        CurveName::Marine20,
        CurveName::Intcal13,
        CurveName::Shcal13,
        CurveName::Marine13,
        CurveName::Intcal13nhpine16,
        CurveName::Shcal13shkauri16,
    ];

    /// Name used in metadata and as the curve file stem.
    pub fn as_str(self) -> &'static str {
        match self {
            CurveName::Intcal20 => "intcal20",
            CurveName::Shcal20 => "shcal20",
            CurveName::Marine20 => "marine20",
            CurveName::Intcal13 => "intcal13",
            CurveName::Shcal13 => "shcal13",
            CurveName::Marine13 => "marine13",
            CurveName::Intcal13nhpine16 => "intcal13nhpine16",
            CurveName::Shcal13shkauri16 => "shcal13shkauri16",
        }
    }

    /// True for the marine reservoir curves.
    pub fn is_marine(self) -> bool {
        matches!(self, CurveName::Marine20 | CurveName::Marine13)
    }
}

impl fmt::Display for CurveName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurveName {
    type Err = CalError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase();
        CurveName::ALL
            .into_iter()
            .find(|n| n.as_str() == key)
            .ok_or_else(|| CalError::UnknownCurveName(s.to_string()))
    }
}

/// A curve given either by name or as a custom table.
#[derive(Debug, Clone)]
pub enum CurveChoice {
    Named(CurveName),
    Custom(Arc<CalibrationCurve>),
}

impl CurveChoice {
    /// Label recorded in date metadata.
    pub fn label(&self) -> String {
        match self {
            CurveChoice::Named(name) => name.to_string(),
            CurveChoice::Custom(_) => "custom".to_string(),
        }
    }

    pub fn resolve(&self, source: &dyn CurveSource) -> Result<Arc<CalibrationCurve>> {
        match self {
            CurveChoice::Named(name) => source.load(*name),
            CurveChoice::Custom(curve) => Ok(Arc::clone(curve)),
        }
    }
}

impl From<CurveName> for CurveChoice {
    fn from(name: CurveName) -> Self {
        CurveChoice::Named(name)
    }
}

impl From<CalibrationCurve> for CurveChoice {
    fn from(curve: CalibrationCurve) -> Self {
        CurveChoice::Custom(Arc::new(curve))
    }
}

/// Anything that can hand out built-in curves by name.
pub trait CurveSource: Send + Sync {
    fn load(&self, name: CurveName) -> Result<Arc<CalibrationCurve>>;
}

/// In-memory curve set.
#[derive(Debug, Default, Clone)]
pub struct CurveLibrary {
    curves: HashMap<CurveName, Arc<CalibrationCurve>>,
}

impl CurveLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: CurveName, curve: CalibrationCurve) {
        self.curves.insert(name, Arc::new(curve));
    }

    pub fn with(mut self, name: CurveName, curve: CalibrationCurve) -> Self {
        self.insert(name, curve);
        self
    }
}

impl CurveSource for CurveLibrary {
    fn load(&self, name: CurveName) -> Result<Arc<CalibrationCurve>> {
        self.curves
            .get(&name)
            .cloned()
            .ok_or_else(|| CalError::UnknownCurveName(name.to_string()))
    }
}

/// Reads `<dir>/<name>.14c` files on first use and caches them.
#[derive(Debug)]
pub struct CurveDirectory {
    dir: PathBuf,
    cache: Mutex<HashMap<CurveName, Arc<CalibrationCurve>>>,
}

impl CurveDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Use `C14_CURVE_DIR` (a `.env` file is honoured), falling back to `./curves`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let dir = std::env::var(CURVE_DIR_ENV).unwrap_or_else(|_| "curves".to_string());
        log::debug!("curve directory: {dir}");
        Self::new(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: CurveName) -> PathBuf {
        self.dir.join(format!("{}.14c", name.as_str()))
    }
}

impl CurveSource for CurveDirectory {
    fn load(&self, name: CurveName) -> Result<Arc<CalibrationCurve>> {
        if let Some(curve) = self.cache.lock().ok().and_then(|c| c.get(&name).cloned()) {
            return Ok(curve);
        }

        let path = self.path_for(name);
        let curve = Arc::new(crate::io::curve::read_14c_file(&path, name.as_str())?);
        log::debug!(
            "loaded curve {name} from {} ({} rows)",
            path.display(),
            curve.len()
        );
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(name, Arc::clone(&curve));
        }
        Ok(curve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!("IntCal20".parse::<CurveName>().unwrap(), CurveName::Intcal20);
        assert_eq!(" marine20 ".parse::<CurveName>().unwrap(), CurveName::Marine20);
        assert!(matches!(
            "intcal99".parse::<CurveName>(),
            Err(CalError::UnknownCurveName(_))
        ));
    }

    #[test]
    fn library_reports_missing_curves_by_name() {
        let lib = CurveLibrary::new();
        let err = lib.load(CurveName::Shcal20).unwrap_err();
        assert!(err.to_string().contains("shcal20"));
    }

    #[test]
    fn custom_choice_is_labelled_custom() {
        let curve =
            CalibrationCurve::from_table("mine", &[vec![0.0, 0.0, 1.0], vec![10.0, 10.0, 1.0]])
                .unwrap();
        let choice = CurveChoice::from(curve);
        assert_eq!(choice.label(), "custom");
        assert_eq!(choice.resolve(&CurveLibrary::new()).unwrap().name(), "mine");
    }
}
