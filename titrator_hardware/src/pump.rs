//! Simulated stepper-driven syringe pump.

use std::sync::{Arc, Mutex};

use titrator_traits::{DeviceError, Pump};

use crate::error::HwError;

/// Acid delivered into the sample so far, in liters. Clones share the total,
/// so a simulated meter can see what the pump has added.
#[derive(Debug, Clone, Default)]
pub struct DispensedVolume(Arc<Mutex<f64>>);

impl DispensedVolume {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> f64 {
        self.0.lock().map(|v| *v).unwrap_or(0.0)
    }

    fn add(&self, liters: f64) {
        if let Ok(mut v) = self.0.lock() {
            *v += liters;
        }
    }
}

/// Syringe of `max_steps` motor steps spanning `syringe_volume_l` liters.
///
/// Position counts steps of titrant held (0 = empty). Moves are whole steps;
/// requested volumes are truncated to the step below.
#[derive(Debug)]
pub struct SimulatedPump {
    syringe_volume_l: f64,
    max_steps: u32,
    liters_per_step: f64,
    position: u32,
    dispensed: DispensedVolume,
    dispense_calls: usize,
    fail_on_dispense: Option<usize>,
}

impl SimulatedPump {
    pub fn new(syringe_volume_l: f64, max_steps: u32) -> Self {
        Self {
            syringe_volume_l,
            max_steps,
            liters_per_step: syringe_volume_l / f64::from(max_steps.max(1)),
            position: 0,
            dispensed: DispensedVolume::new(),
            dispense_calls: 0,
            fail_on_dispense: None,
        }
    }

    /// Share the dispensed-volume total with another device.
    pub fn dispensed(&self) -> DispensedVolume {
        self.dispensed.clone()
    }

    /// Make the `n`th dispense call (1-based) fail with a serial error.
    pub fn fail_on_dispense(mut self, n: usize) -> Self {
        self.fail_on_dispense = Some(n);
        self
    }

    pub fn liters_per_step(&self) -> f64 {
        self.liters_per_step
    }

    /// Whole steps for `volume_l`, truncating.
    pub fn liters_to_steps(&self, volume_l: f64) -> Result<u32, HwError> {
        if !(volume_l.is_finite() && volume_l >= 0.0) {
            return Err(HwError::InvalidVolume(volume_l));
        }
        let steps = (volume_l / self.liters_per_step).floor();
        if steps > f64::from(u32::MAX) {
            return Err(HwError::InvalidVolume(volume_l));
        }
        // Truncation is the device's resolution.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(steps as u32)
    }

    pub fn steps_to_liters(&self, steps: u32) -> f64 {
        f64::from(steps) * self.liters_per_step
    }

    fn move_to(&mut self, target: i64) -> Result<(), HwError> {
        if target < 0 || target > i64::from(self.max_steps) {
            return Err(HwError::SyringeRange {
                requested: target,
                max: self.max_steps,
            });
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            self.position = target as u32;
        }
        Ok(())
    }
}

impl Pump for SimulatedPump {
    fn fill(&mut self) -> Result<(), DeviceError> {
        self.move_to(i64::from(self.max_steps))?;
        tracing::debug!(position = self.position, "sim pump fill");
        Ok(())
    }

    fn empty(&mut self) -> Result<(), DeviceError> {
        self.move_to(0)?;
        tracing::debug!("sim pump empty");
        Ok(())
    }

    fn dispense(&mut self, volume_l: f64) -> Result<(), DeviceError> {
        self.dispense_calls += 1;
        if self.fail_on_dispense == Some(self.dispense_calls) {
            return Err(Box::new(HwError::Serial("no acknowledgement from pump".into())));
        }
        let steps = self.liters_to_steps(volume_l)?;
        self.move_to(i64::from(self.position) - i64::from(steps))?;
        self.dispensed.add(self.steps_to_liters(steps));
        tracing::debug!(steps, position = self.position, "sim pump dispense");
        Ok(())
    }

    fn aspirate(&mut self, volume_l: f64) -> Result<(), DeviceError> {
        let steps = self.liters_to_steps(volume_l)?;
        self.move_to(i64::from(self.position) + i64::from(steps))?;
        tracing::debug!(steps, position = self.position, "sim pump aspirate");
        Ok(())
    }

    fn check_volume_available(&mut self, volume_l: f64) -> Result<bool, DeviceError> {
        Ok(self.position > self.liters_to_steps(volume_l)?)
    }

    fn get_syringe_position(&mut self) -> Result<u32, DeviceError> {
        Ok(self.position)
    }

    fn syringe_volume_l(&self) -> f64 {
        self.syringe_volume_l
    }
}
