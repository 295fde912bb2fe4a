//! Device implementations for the titrator.
//!
//! Only simulated devices live here today: a stepper syringe pump and a pH
//! meter driven by a response curve. Both are `Send` so a run can execute on
//! a worker thread.

pub mod error;
pub mod meter;
pub mod pump;

pub use error::HwError;
pub use meter::SimulatedMeter;
pub use pump::{DispensedVolume, SimulatedPump};
