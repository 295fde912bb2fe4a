#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and run-data files for the titrator.
//!
//! - `Config` and its tables are deserialized from TOML and validated with
//!   `Config::validate`. Every table is optional; an empty file is a valid
//!   config holding the bench defaults.
//! - `run_csv` reads and writes the per-run CSV export.
use serde::Deserialize;

pub mod run_csv;

pub use run_csv::{RunMetadata, RunRecord, RunRow, load_run_csv, write_run_csv};

/// Two-phase titration control parameters (pH units unless noted).
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Titration {
    /// The coarse phase ends once the reading drops below this pH.
    pub first_phase_threshold_ph: f64,
    /// Coarse dose target sits this far below the threshold so it is crossed.
    pub first_phase_margin_ph: f64,
    /// The fine phase ends once the reading drops below this pH.
    pub second_phase_end_ph: f64,
    /// pH decrement per fine step.
    pub second_phase_step_ph: f64,
    /// Fine phase also ends once this many doses were applied, coarse ones included.
    pub max_steps: usize,
    /// Upper pH bound of the Gran region used by the endpoint fit.
    pub gran_max_ph: f64,
}

impl Default for Titration {
    fn default() -> Self {
        Self {
            first_phase_threshold_ph: 3.8,
            first_phase_margin_ph: 0.01,
            second_phase_end_ph: 3.0,
            second_phase_step_ph: 0.1,
            max_steps: 25,
            gran_max_ph: 3.8,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Timing {
    /// Wait after a syringe refill before dosing.
    pub fill_settle_ms: u64,
    pub first_phase_settle_ms: u64,
    pub second_phase_settle_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            fill_settle_ms: 15_000,
            first_phase_settle_ms: 15_000,
            second_phase_settle_ms: 12_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PumpCfg {
    /// Calibrated syringe volume at full stroke, in liters.
    pub syringe_volume_l: f64,
    /// Motor steps for a full stroke.
    pub syringe_steps: u32,
    pub wash_cycles: u32,
}

impl Default for PumpCfg {
    fn default() -> Self {
        Self {
            syringe_volume_l: 0.002_478,
            syringe_steps: 48_000,
            wash_cycles: 3,
        }
    }
}

/// Parameters of the simulated bench used when no hardware is attached.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Simulation {
    pub total_alkalinity_umol_kg: f64,
    /// Electrode standard potential in mV.
    pub emf_offset_mv: f64,
    pub meter_temperature_c: f64,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            total_alkalinity_umol_kg: 2300.0,
            emf_offset_mv: 400.0,
            meter_temperature_c: 25.0,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Report {
    /// Directory for run CSV files; current directory when unset.
    pub dir: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub titration: Titration,
    pub timing: Timing,
    pub pump: PumpCfg,
    pub simulation: Simulation,
    pub logging: Logging,
    pub report: Report,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

fn is_ph(x: f64) -> bool {
    x.is_finite() && x > 0.0 && x < 14.0
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Titration
        let t = &self.titration;
        if !is_ph(t.first_phase_threshold_ph) {
            eyre::bail!("titration.first_phase_threshold_ph must be in (0, 14)");
        }
        if !(t.first_phase_margin_ph.is_finite() && t.first_phase_margin_ph > 0.0) {
            eyre::bail!("titration.first_phase_margin_ph must be > 0");
        }
        if t.first_phase_margin_ph >= t.first_phase_threshold_ph {
            eyre::bail!("titration.first_phase_margin_ph must be below the threshold");
        }
        if !is_ph(t.second_phase_end_ph) {
            eyre::bail!("titration.second_phase_end_ph must be in (0, 14)");
        }
        if t.second_phase_end_ph >= t.first_phase_threshold_ph {
            eyre::bail!(
                "titration.second_phase_end_ph must be below titration.first_phase_threshold_ph"
            );
        }
        if !(t.second_phase_step_ph.is_finite() && t.second_phase_step_ph > 0.0) {
            eyre::bail!("titration.second_phase_step_ph must be > 0");
        }
        if t.second_phase_step_ph > 1.0 {
            eyre::bail!("titration.second_phase_step_ph is unreasonably large (>1 pH)");
        }
        if t.max_steps == 0 {
            eyre::bail!("titration.max_steps must be >= 1");
        }
        if !is_ph(t.gran_max_ph) {
            eyre::bail!("titration.gran_max_ph must be in (0, 14)");
        }

        // Timing
        let hour_ms = 60 * 60 * 1000;
        if self.timing.fill_settle_ms > hour_ms
            || self.timing.first_phase_settle_ms > hour_ms
            || self.timing.second_phase_settle_ms > hour_ms
        {
            eyre::bail!("timing settle waits are unreasonably large (>1h)");
        }

        // Pump
        if !(self.pump.syringe_volume_l.is_finite() && self.pump.syringe_volume_l > 0.0) {
            eyre::bail!("pump.syringe_volume_l must be > 0");
        }
        if self.pump.syringe_steps == 0 {
            eyre::bail!("pump.syringe_steps must be >= 1");
        }
        if self.pump.wash_cycles == 0 {
            eyre::bail!("pump.wash_cycles must be >= 1");
        }

        // Simulation
        let s = &self.simulation;
        if !(s.total_alkalinity_umol_kg.is_finite() && s.total_alkalinity_umol_kg > 0.0) {
            eyre::bail!("simulation.total_alkalinity_umol_kg must be > 0");
        }
        if !s.emf_offset_mv.is_finite() {
            eyre::bail!("simulation.emf_offset_mv must be finite");
        }
        if !(-2.0..=40.0).contains(&s.meter_temperature_c) {
            eyre::bail!("simulation.meter_temperature_c must be in [-2, 40]");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
