//! Calibrated-date containers.

pub mod dates;

pub use dates::*;
