//! Input/output helpers.
//!
//! - date list CSV ingest (`ingest`)
//! - curve table read/write (`curve`)
//! - store / grid / summary exports (`export`)

pub mod curve;
pub mod export;
pub mod ingest;

pub use curve::*;
pub use export::*;
pub use ingest::*;
