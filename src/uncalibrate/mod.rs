//! Inverse calibration (calendar age → radiocarbon age).

pub mod inverse;

pub use inverse::*;
