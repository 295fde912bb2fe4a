//! Forward model of a seawater sample being titrated.
//!
//! Given a true total alkalinity, predicts the pH after `V` liters of acid by
//! solving the dilution-aware alkalinity balance
//!
//! `m·TA − C·V = (m + V)·( m/(m+V)·(Ac + Ab) + Kw/[H+] − [H+] )`
//!
//! by bisection. Drives the simulated pH meter and the engine's
//! end-to-end tests.

use crate::equilibrium::{EquilibriumConstants, hydrogen_ion};
use crate::session::SampleParameters;

const BISECT_ITERS: usize = 100;

#[derive(Debug, Clone, Copy)]
pub struct SampleModel {
    params: SampleParameters,
    constants: EquilibriumConstants,
    total_alkalinity_mol_kg: f64,
}

impl SampleModel {
    pub fn new(params: SampleParameters, total_alkalinity_umol_kg: f64) -> Self {
        Self {
            params,
            constants: EquilibriumConstants::new(params.salinity(), params.temperature_k()),
            total_alkalinity_mol_kg: total_alkalinity_umol_kg * 1e-6,
        }
    }

    pub fn params(&self) -> &SampleParameters {
        &self.params
    }

    /// Residual of the balance at `ph`; strictly decreasing in pH.
    fn residual(&self, ph: f64, volume_l: f64) -> f64 {
        let m = self.params.mass_kg();
        let h = hydrogen_ion(ph);
        let dilution = m / (m + volume_l);
        let k = &self.constants;
        m * self.total_alkalinity_mol_kg
            - self.params.acid_conc_mol_l() * volume_l
            - (m + volume_l)
                * (dilution * (k.carbonate_alkalinity(h) + k.borate_alkalinity(h)) + k.kw / h
                    - h)
    }

    /// Equilibrium pH after adding `volume_l` liters of acid.
    pub fn ph_after(&self, volume_l: f64) -> f64 {
        let mut lo = 0.0f64;
        let mut hi = 14.0f64;
        for _ in 0..BISECT_ITERS {
            let mid = 0.5 * (lo + hi);
            if self.residual(mid, volume_l) > 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        0.5 * (lo + hi)
    }
}
