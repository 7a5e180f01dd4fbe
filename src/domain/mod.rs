//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - density grids (`CalGrid`, `UncalGrid`)
//! - per-date metadata (`DateRecord`)
//! - configuration enums (`StorageMode`, `CalibrationStrategy`)
//! - per-date parameter plumbing (`PerDate`)

pub mod types;

pub use types::*;
