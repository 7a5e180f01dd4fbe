//! Numerical utilities: interpolation and density-grid arithmetic.

pub mod density;
pub mod interp;

pub use density::*;
pub use interp::*;
