//! Error types.
//!
//! The library reports failures through [`CalError`]; the `c14` binary wraps
//! them in [`AppError`], which carries the process exit code.

use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by curve loading, calibration and uncalibration.
#[derive(Debug, Error)]
pub enum CalError {
    /// Parallel input arrays disagree in length.
    #[error("input length mismatch: {field} has {found} entries, expected {expected}")]
    InputLengthMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("duplicate date identifier '{0}'")]
    DuplicateIdentifier(String),

    /// A required numeric input is NaN.
    #[error("missing value in '{field}' at index {index}")]
    MissingValue { field: &'static str, index: usize },

    #[error("invalid calibration curve: {0}")]
    InvalidCurveFormat(String),

    #[error("unknown calibration curve '{0}'")]
    UnknownCurveName(String),

    /// An age falls outside the domain the curve can interpolate.
    #[error("age {age} is outside the calibration curve range [{min}, {max}]")]
    CurveRangeExceeded { age: f64, min: f64, max: f64 },

    #[error("date '{id}' cannot be calibrated over {start_bp}..{end_bp} BP: {reason}")]
    DateOutOfCalibrationRange {
        id: String,
        start_bp: i64,
        end_bp: i64,
        reason: String,
    },

    #[error("invalid parameter combination: {0}")]
    InvalidParameterCombination(String),

    #[error("unsupported inversion: {0}")]
    UnsupportedInversionMode(String),

    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for library operations.
pub type Result<T> = std::result::Result<T, CalError>;

impl CalError {
    /// Process exit code used by the binary when this error ends a run.
    ///
    /// - `2`: bad input or usage
    /// - `3`: an age or window the curve cannot cover
    /// - `4`: IO / serialization
    pub fn exit_code(&self) -> u8 {
        match self {
            CalError::CurveRangeExceeded { .. } | CalError::DateOutOfCalibrationRange { .. } => 3,
            CalError::Io { .. } | CalError::Csv(_) | CalError::Json(_) => 4,
            _ => 2,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<CalError> for AppError {
    fn from(err: CalError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_errors_map_to_exit_code_three() {
        let err = CalError::CurveRangeExceeded {
            age: 60000.0,
            min: 0.0,
            max: 50000.0,
        };
        let app: AppError = err.into();
        assert_eq!(app.exit_code(), 3);
        assert!(app.to_string().contains("60000"));
    }

    #[test]
    fn validation_errors_map_to_exit_code_two() {
        let app: AppError = CalError::DuplicateIdentifier("x".to_string()).into();
        assert_eq!(app.exit_code(), 2);
    }
}
