//! Device capability traits for the titration engine.
//!
//! The engine only ever talks to a syringe pump and a pH meter through these
//! traits; concrete drivers and simulators live in other crates.

pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Boxed error returned across the device boundary.
pub type DeviceError = Box<dyn std::error::Error + Send + Sync>;

/// One reading from the pH meter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub ph: f64,
    /// Electrode potential in millivolts.
    pub emf_mv: f64,
    /// Probe temperature in degrees Celsius.
    pub temperature_c: f64,
}

/// Syringe pump dosing titrant.
///
/// Volumes are in liters. Every call blocks until the device acknowledges
/// completion.
pub trait Pump {
    /// Draw the syringe to its full stroke from the titrant reservoir.
    fn fill(&mut self) -> Result<(), DeviceError>;
    /// Push the whole syringe contents out to waste.
    fn empty(&mut self) -> Result<(), DeviceError>;
    fn dispense(&mut self, volume_l: f64) -> Result<(), DeviceError>;
    fn aspirate(&mut self, volume_l: f64) -> Result<(), DeviceError>;
    /// True when the syringe holds strictly more than `volume_l`.
    fn check_volume_available(&mut self, volume_l: f64) -> Result<bool, DeviceError>;
    /// Current plunger position in motor steps (0 = empty).
    fn get_syringe_position(&mut self) -> Result<u32, DeviceError>;
    /// Volume held by a full syringe, in liters.
    fn syringe_volume_l(&self) -> f64;

    /// Rinse the syringe with `cycles` full fill/empty strokes.
    fn wash(&mut self, cycles: u32) -> Result<(), DeviceError> {
        for _ in 0..cycles {
            self.fill()?;
            self.empty()?;
        }
        Ok(())
    }
}

pub trait PhMeter {
    fn get_measurement(&mut self) -> Result<Measurement, DeviceError>;
}

impl<P: Pump + ?Sized> Pump for Box<P> {
    fn fill(&mut self) -> Result<(), DeviceError> {
        (**self).fill()
    }
    fn empty(&mut self) -> Result<(), DeviceError> {
        (**self).empty()
    }
    fn dispense(&mut self, volume_l: f64) -> Result<(), DeviceError> {
        (**self).dispense(volume_l)
    }
    fn aspirate(&mut self, volume_l: f64) -> Result<(), DeviceError> {
        (**self).aspirate(volume_l)
    }
    fn check_volume_available(&mut self, volume_l: f64) -> Result<bool, DeviceError> {
        (**self).check_volume_available(volume_l)
    }
    fn get_syringe_position(&mut self) -> Result<u32, DeviceError> {
        (**self).get_syringe_position()
    }
    fn syringe_volume_l(&self) -> f64 {
        (**self).syringe_volume_l()
    }
    fn wash(&mut self, cycles: u32) -> Result<(), DeviceError> {
        (**self).wash(cycles)
    }
}

impl<M: PhMeter + ?Sized> PhMeter for Box<M> {
    fn get_measurement(&mut self) -> Result<Measurement, DeviceError> {
        (**self).get_measurement()
    }
}
