//! `c14cal` library crate: radiocarbon calibration.
//!
//! The binary (`c14`) is a thin wrapper around this library so that:
//!
//! - calibration logic is testable without spawning processes
//! - curves, calibrators and stores can be embedded in other tools
//!
//! Typical flow: load a [`curve::CalibrationCurve`], run
//! [`calibrate::calibrate_batch`] to get a [`store::CalDatesStore`], then
//! summarize it with [`summary::hpd`] / [`summary::median_dates`].

pub mod app;
pub mod calibrate;
pub mod cli;
pub mod curve;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod report;
pub mod store;
pub mod summary;
pub mod uncalibrate;

#[cfg(test)]
pub(crate) mod test_support;
