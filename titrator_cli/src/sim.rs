//! Simulated bench: a syringe pump and a pH meter titrating a modeled sample.

use titrator_config::Config;
use titrator_core::{SampleModel, SampleParameters, SyringeCfg};
use titrator_hardware::{SimulatedMeter, SimulatedPump};

/// Sample assumed by commands that do not titrate (self-check, pump).
const IDLE_SAMPLE: (f64, f64, f64) = (0.1, 35.0, 0.1);

pub fn pump(cfg: &Config) -> SimulatedPump {
    let syringe: SyringeCfg = (&cfg.pump).into();
    SimulatedPump::new(syringe.volume_l, syringe.steps)
}

/// Pump and meter wired so the meter reads the modeled pH of `sample` after
/// whatever the pump has dispensed.
pub fn devices(cfg: &Config, sample: SampleParameters) -> (SimulatedPump, SimulatedMeter) {
    let pump = pump(cfg);
    let model = SampleModel::new(sample, cfg.simulation.total_alkalinity_umol_kg);
    tracing::debug!(
        total_alkalinity_umol_kg = cfg.simulation.total_alkalinity_umol_kg,
        temperature_c = cfg.simulation.meter_temperature_c,
        "simulated bench"
    );
    let meter = SimulatedMeter::new(pump.dispensed(), move |v| model.ph_after(v))
        .with_temperature(cfg.simulation.meter_temperature_c)
        .with_emf_offset(cfg.simulation.emf_offset_mv);
    (pump, meter)
}

pub fn idle_devices(cfg: &Config) -> eyre::Result<(SimulatedPump, SimulatedMeter)> {
    let (mass_kg, salinity, acid) = IDLE_SAMPLE;
    let sample =
        SampleParameters::new(mass_kg, salinity, acid, cfg.simulation.meter_temperature_c)?;
    Ok(devices(cfg, sample))
}
