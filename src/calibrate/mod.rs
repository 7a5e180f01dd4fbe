//! Forward calibration (radiocarbon age → calendar age).
//!
//! Responsibilities:
//!
//! - calibrate one date or one radiocarbon-age density (`forward`)
//! - validate and run a whole batch of dates, in parallel (`batch`)
//! - report batch progress to an injected reporter (`progress`)

pub mod batch;
pub mod forward;
pub mod progress;

pub use batch::*;
pub use forward::*;
pub use progress::*;
