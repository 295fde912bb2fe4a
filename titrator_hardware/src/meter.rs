//! Simulated pH meter.

use std::collections::VecDeque;

use titrator_traits::{DeviceError, Measurement, PhMeter};

use crate::error::HwError;
use crate::pump::DispensedVolume;

/// Nernst slope factor `1000·R·ln(10)/F` in mV per kelvin.
const NERNST_MV_PER_K: f64 = 0.198_416;

type Response = Box<dyn FnMut(f64) -> f64 + Send>;

/// Meter whose pH is a function of the acid the paired pump has dispensed.
pub struct SimulatedMeter {
    response: Response,
    dispensed: DispensedVolume,
    temperature_c: f64,
    emf_offset_mv: f64,
    scripted_failures: VecDeque<HwError>,
}

impl core::fmt::Debug for SimulatedMeter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimulatedMeter")
            .field("dispensed_l", &self.dispensed.get())
            .field("temperature_c", &self.temperature_c)
            .finish_non_exhaustive()
    }
}

impl SimulatedMeter {
    /// `response` maps cumulative dispensed liters to pH.
    pub fn new<F>(dispensed: DispensedVolume, response: F) -> Self
    where
        F: FnMut(f64) -> f64 + Send + 'static,
    {
        Self {
            response: Box::new(response),
            dispensed,
            temperature_c: 25.0,
            emf_offset_mv: 400.0,
            scripted_failures: VecDeque::new(),
        }
    }

    pub fn with_temperature(mut self, temperature_c: f64) -> Self {
        self.temperature_c = temperature_c;
        self
    }

    pub fn with_emf_offset(mut self, emf_offset_mv: f64) -> Self {
        self.emf_offset_mv = emf_offset_mv;
        self
    }

    /// Queue an error for the next reading.
    pub fn fail_next(&mut self, err: HwError) {
        self.scripted_failures.push_back(err);
    }

    /// Ideal electrode potential for `ph` at the meter temperature.
    pub fn emf_for(&self, ph: f64) -> f64 {
        self.emf_offset_mv - NERNST_MV_PER_K * (self.temperature_c + 273.15) * ph
    }
}

impl PhMeter for SimulatedMeter {
    fn get_measurement(&mut self) -> Result<Measurement, DeviceError> {
        if let Some(e) = self.scripted_failures.pop_front() {
            tracing::debug!(error = %e, "sim meter scripted failure");
            return Err(Box::new(e));
        }
        let ph = (self.response)(self.dispensed.get());
        if !ph.is_finite() {
            return Err(Box::new(HwError::Parse(format!("pH={ph}"))));
        }
        Ok(Measurement {
            ph,
            emf_mv: self.emf_for(ph),
            temperature_c: self.temperature_c,
        })
    }
}
