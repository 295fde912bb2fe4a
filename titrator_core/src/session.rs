//! Sample parameters and the append-only record of one titration run.

use crate::equilibrium::EquilibriumConstants;
use crate::error::{Result, TitratorError};

const KELVIN_OFFSET: f64 = 273.15;

/// Immutable description of the sample and titrant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleParameters {
    mass_kg: f64,
    salinity: f64,
    acid_conc_mol_l: f64,
    temperature_c: f64,
}

impl SampleParameters {
    /// Validate and build. Mass and acid concentration must be positive,
    /// salinity within 0..=45, temperature above absolute zero.
    pub fn new(
        mass_kg: f64,
        salinity: f64,
        acid_conc_mol_l: f64,
        temperature_c: f64,
    ) -> Result<Self> {
        let p = Self {
            mass_kg,
            salinity,
            acid_conc_mol_l,
            temperature_c,
        };
        p.check().map_err(eyre::Report::new)?;
        Ok(p)
    }

    /// Check everything except temperature, for runs that take the
    /// temperature from the probe.
    pub fn validate_sample(
        mass_kg: f64,
        salinity: f64,
        acid_conc_mol_l: f64,
    ) -> std::result::Result<(), TitratorError> {
        if !(mass_kg.is_finite() && mass_kg > 0.0) {
            return Err(TitratorError::InvalidSample("sample mass must be > 0"));
        }
        if !(0.0..=45.0).contains(&salinity) {
            return Err(TitratorError::InvalidSample("salinity must be in [0, 45]"));
        }
        if !(acid_conc_mol_l.is_finite() && acid_conc_mol_l > 0.0) {
            return Err(TitratorError::InvalidSample(
                "acid concentration must be > 0",
            ));
        }
        Ok(())
    }

    fn check(&self) -> std::result::Result<(), TitratorError> {
        Self::validate_sample(self.mass_kg, self.salinity, self.acid_conc_mol_l)?;
        if !(self.temperature_k().is_finite() && self.temperature_k() > 0.0) {
            return Err(TitratorError::InvalidSample("temperature must be above 0 K"));
        }
        Ok(())
    }

    pub fn mass_kg(&self) -> f64 {
        self.mass_kg
    }
    pub fn salinity(&self) -> f64 {
        self.salinity
    }
    pub fn acid_conc_mol_l(&self) -> f64 {
        self.acid_conc_mol_l
    }
    pub fn temperature_c(&self) -> f64 {
        self.temperature_c
    }
    pub fn temperature_k(&self) -> f64 {
        self.temperature_c + KELVIN_OFFSET
    }
}

/// History of one run: index-aligned pH, emf (mV) and cumulative volume (L).
///
/// Never empty; seeded with the initial reading at volume 0. The only
/// mutator is `add_step_data`, which appends.
#[derive(Debug, Clone)]
pub struct TitrationSession {
    params: SampleParameters,
    constants: EquilibriumConstants,
    ph: Vec<f64>,
    emf_mv: Vec<f64>,
    volume_l: Vec<f64>,
}

impl TitrationSession {
    pub fn new(params: SampleParameters, initial_ph: f64, initial_emf_mv: f64) -> Self {
        let constants = EquilibriumConstants::new(params.salinity(), params.temperature_k());
        Self {
            params,
            constants,
            ph: vec![initial_ph],
            emf_mv: vec![initial_emf_mv],
            volume_l: vec![0.0],
        }
    }

    /// Append one completed step. `volume_delta_l` is the acid added since the
    /// previous reading and must be finite and non-negative.
    pub fn add_step_data(&mut self, ph: f64, emf_mv: f64, volume_delta_l: f64) -> Result<()> {
        if !(volume_delta_l.is_finite() && volume_delta_l >= 0.0) {
            return Err(eyre::Report::new(TitratorError::ImplausibleDose {
                volume_l: volume_delta_l,
            }));
        }
        let volume = self.last_volume() + volume_delta_l;
        self.ph.push(ph);
        self.emf_mv.push(emf_mv);
        self.volume_l.push(volume);
        Ok(())
    }

    #[inline]
    pub fn last_ph(&self) -> f64 {
        self.ph.last().copied().unwrap_or(f64::NAN)
    }

    #[inline]
    pub fn last_emf(&self) -> f64 {
        self.emf_mv.last().copied().unwrap_or(f64::NAN)
    }

    #[inline]
    pub fn last_volume(&self) -> f64 {
        self.volume_l.last().copied().unwrap_or(0.0)
    }

    pub fn params(&self) -> &SampleParameters {
        &self.params
    }

    pub fn constants(&self) -> &EquilibriumConstants {
        &self.constants
    }

    pub fn ph_history(&self) -> &[f64] {
        &self.ph
    }

    pub fn emf_history(&self) -> &[f64] {
        &self.emf_mv
    }

    pub fn volume_history(&self) -> &[f64] {
        &self.volume_l
    }

    /// Number of readings, including the initial one.
    pub fn len(&self) -> usize {
        self.ph.len()
    }

    /// Always false; kept for the `len` convention.
    pub fn is_empty(&self) -> bool {
        self.ph.is_empty()
    }

    /// Number of doses applied so far.
    pub fn step_count(&self) -> usize {
        self.ph.len().saturating_sub(1)
    }
}
