//! Calibration curves.
//!
//! - validated curve tables + interpolation (`calibration`)
//! - canonical names and curve sources (`source`)
//! - terrestrial/marine blending (`mix`)

pub mod calibration;
pub mod mix;
pub mod source;

pub use calibration::*;
pub use mix::*;
pub use source::*;
