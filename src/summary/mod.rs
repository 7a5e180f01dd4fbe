//! Summary statistics over calibrated dates (HPD intervals, medians).

pub mod stats;

pub use stats::*;
