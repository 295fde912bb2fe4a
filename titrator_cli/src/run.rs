//! Subcommand implementations over the simulated bench.

use std::path::{Path, PathBuf};

use serde_json::json;
use titrator_config::Config;
use titrator_core::endpoint::fit_points;
use titrator_core::error::TitratorError;
use titrator_core::hw_error::{Device, map_hw_error};
use titrator_core::runner::{self, RunEvent, RunOutcome};
use titrator_core::{
    CancelToken, ControlCfg, FitResult, SampleParameters, StartRequest, TimingCfg, Titrator,
    TitrationSession,
};
use titrator_traits::{PhMeter, Pump};

use crate::cli::{PumpAction, json_mode};
use crate::{report, sim};

/// Process exit code for a cancelled run.
pub const EXIT_CANCELLED: u8 = 130;

pub struct TitrateArgs {
    pub mass_g: f64,
    pub salinity: f64,
    pub acid_conc: f64,
    pub temp_c: Option<f64>,
    pub out: Option<PathBuf>,
}

// ── titrate ──────────────────────────────────────────────────────────────────

/// Returns the process exit code: 0 on a result, 130 when cancelled.
pub fn titrate(cfg: &Config, args: &TitrateArgs, cancel: CancelToken) -> eyre::Result<u8> {
    let started_at = chrono::Local::now();
    let mass_kg = args.mass_g / 1000.0;

    // The simulated sample sits at the meter temperature unless told otherwise.
    let sample_temp = args.temp_c.unwrap_or(cfg.simulation.meter_temperature_c);
    let sample = SampleParameters::new(mass_kg, args.salinity, args.acid_conc, sample_temp)?;
    let request = match args.temp_c {
        Some(_) => StartRequest::Sample(sample),
        None => StartRequest::ProbeTemperature {
            mass_kg,
            salinity: args.salinity,
            acid_conc_mol_l: args.acid_conc,
        },
    };

    let (pump, meter) = sim::devices(cfg, sample);
    let control: ControlCfg = (&cfg.titration).into();
    let timing: TimingCfg = (&cfg.timing).into();
    let titrator = Titrator::builder()
        .with_pump(pump)
        .with_meter(meter)
        .with_control(control)
        .with_timing(timing)
        .with_cancel_token(cancel)
        .build()?;

    let handle = runner::spawn(titrator, request);
    for ev in handle.events() {
        print_event(&ev);
    }
    let (titrator, res) = handle.join()?;

    let out = args
        .out
        .clone()
        .unwrap_or_else(|| report::default_path(cfg.report.dir.as_deref(), started_at));
    let ta = match &res {
        Ok(RunOutcome::Complete(r)) => Some(r.total_alkalinity_umol_kg),
        _ => None,
    };
    let saved = match titrator.session() {
        Some(s) => match report::write(&out, s, ta) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, path = %out.display(), "could not write run data");
                false
            }
        },
        None => false,
    };

    match res? {
        RunOutcome::Complete(r) => {
            let session = titrator
                .session()
                .ok_or_else(|| TitratorError::State("finished run has no session".into()))?;
            print_result(&r, session, titrator.refills(), saved.then_some(out.as_path()));
            Ok(0)
        }
        RunOutcome::Cancelled => {
            if json_mode() {
                println!("{}", json!({ "event": "cancelled", "saved": saved }));
            } else {
                println!("Titration cancelled.");
                if saved {
                    println!("Partial run data: {}", out.display());
                }
            }
            Ok(EXIT_CANCELLED)
        }
    }
}

fn print_event(ev: &RunEvent) {
    if json_mode() {
        let line = match ev {
            RunEvent::Started {
                initial_ph,
                temperature_c,
            } => json!({ "event": "started", "initial_ph": initial_ph, "temperature_c": temperature_c }),
            RunEvent::PhaseChanged(p) => json!({ "event": "phase", "phase": p.as_str() }),
            RunEvent::Step(r) => json!({
                "event": "step",
                "step": r.step,
                "phase": r.phase.as_str(),
                "target_ph": r.target_ph,
                "volume_l": r.volume_l,
                "total_volume_l": r.cumulative_volume_l,
                "ph": r.ph,
                "emf_mv": r.emf_mv,
                "refilled": r.refilled,
            }),
            // Terminal events are reported by the caller.
            RunEvent::Finished(_) | RunEvent::Cancelled | RunEvent::Failed(_) => return,
        };
        println!("{line}");
        return;
    }
    match ev {
        RunEvent::Started {
            initial_ph,
            temperature_c,
        } => println!("Initial pH {initial_ph:.3} at {temperature_c:.2} °C"),
        RunEvent::PhaseChanged(p) => println!("-- {} --", p.as_str()),
        RunEvent::Step(r) => println!(
            "step {:>2}  {:>7.2} µL  total {:>8.2} µL  pH {:.3}  emf {:.1} mV{}",
            r.step,
            r.volume_l * 1e6,
            r.cumulative_volume_l * 1e6,
            r.ph,
            r.emf_mv,
            if r.refilled { "  (refilled)" } else { "" }
        ),
        RunEvent::Finished(_) | RunEvent::Cancelled | RunEvent::Failed(_) => {}
    }
}

fn print_result(r: &FitResult, session: &TitrationSession, refills: usize, csv: Option<&Path>) {
    let initial_ph = session.ph_history().first().copied().unwrap_or(f64::NAN);
    let borate = session.constants().borate_alkalinity_umol_kg(initial_ph);
    if json_mode() {
        println!(
            "{}",
            json!({
                "event": "result",
                "total_alkalinity_umol_kg": r.total_alkalinity_umol_kg,
                "gamma": r.gamma,
                "rsq": r.rsq,
                "rsq_conventional": r.rsq_conventional,
                "equivalence_volume_l": r.equivalence_volume_l,
                "points_used": r.points_used,
                "steps": session.step_count(),
                "refills": refills,
                "initial_ph": initial_ph,
                "borate_alkalinity_umol_kg": borate,
                "csv": csv.map(|p| p.display().to_string()),
            })
        );
        return;
    }
    println!("Titration complete.");
    println!("Total alkalinity: {:.2} µmol/kg", r.total_alkalinity_umol_kg);
    println!(
        "  gamma {:.5}  R² {:.6}  points {}  Veq {:.4} mL",
        r.gamma,
        r.rsq_conventional,
        r.points_used,
        r.equivalence_volume_l * 1e3
    );
    println!("  borate alkalinity at initial pH {initial_ph:.3}: {borate:.2} µmol/kg");
    println!("  doses {}  syringe fills {refills}", session.step_count());
    if let Some(p) = csv {
        println!("Run data: {}", p.display());
    }
}

// ── fit ──────────────────────────────────────────────────────────────────────

pub fn fit(
    cfg: &Config,
    data: &Path,
    mass_g: Option<f64>,
    acid_conc: Option<f64>,
) -> eyre::Result<()> {
    let run = titrator_config::load_run_csv(data)?;
    let mass_g = mass_g
        .or(run.metadata.map(|m| m.sample_mass_g))
        .ok_or(TitratorError::InvalidSample("sample mass unknown; pass --mass-g"))?;
    let acid_conc = acid_conc
        .or(run.metadata.map(|m| m.acid_conc_m))
        .ok_or(TitratorError::InvalidSample(
            "acid concentration unknown; pass --acid-conc",
        ))?;
    if !(mass_g.is_finite() && mass_g > 0.0) {
        return Err(TitratorError::InvalidSample("sample mass must be > 0").into());
    }
    if !(acid_conc.is_finite() && acid_conc > 0.0) {
        return Err(TitratorError::InvalidSample("acid concentration must be > 0").into());
    }

    let vols: Vec<f64> = run.rows.iter().map(|r| r.volume_l).collect();
    let phs: Vec<f64> = run.rows.iter().map(|r| r.ph).collect();
    let r = fit_points(
        &vols,
        &phs,
        mass_g / 1000.0,
        acid_conc,
        cfg.titration.gran_max_ph,
    )
    .map_err(TitratorError::Endpoint)?;
    let recorded = run.metadata.and_then(|m| m.total_alk_umol_kg);

    if json_mode() {
        println!(
            "{}",
            json!({
                "event": "fit",
                "total_alkalinity_umol_kg": r.total_alkalinity_umol_kg,
                "gamma": r.gamma,
                "rsq": r.rsq,
                "rsq_conventional": r.rsq_conventional,
                "equivalence_volume_l": r.equivalence_volume_l,
                "points_used": r.points_used,
                "recorded_umol_kg": recorded,
            })
        );
        return Ok(());
    }
    println!("Total alkalinity: {:.2} µmol/kg", r.total_alkalinity_umol_kg);
    println!(
        "  gamma {:.5}  R² {:.6}  points {}  Veq {:.4} mL",
        r.gamma,
        r.rsq_conventional,
        r.points_used,
        r.equivalence_volume_l * 1e3
    );
    if let Some(ta) = recorded {
        println!("  recorded at run time: {ta:.3} µmol/kg");
    }
    Ok(())
}

// ── pump / self-check ────────────────────────────────────────────────────────

fn pump_err(e: &titrator_traits::DeviceError) -> eyre::Report {
    eyre::Report::new(map_hw_error(Device::Pump, &**e))
}

pub fn pump(cfg: &Config, action: PumpAction) -> eyre::Result<()> {
    let mut pump = sim::pump(cfg);
    match action {
        PumpAction::Fill => pump.fill().map_err(|e| pump_err(&e))?,
        PumpAction::Empty => pump.empty().map_err(|e| pump_err(&e))?,
        PumpAction::Wash { cycles } => {
            let cycles = cycles.unwrap_or(cfg.pump.wash_cycles);
            pump.wash(cycles).map_err(|e| pump_err(&e))?;
        }
    }
    let position = pump.get_syringe_position().map_err(|e| pump_err(&e))?;
    tracing::info!(?action, position, "pump command done");
    if json_mode() {
        println!(
            "{}",
            json!({ "event": "pump", "position_steps": position, "max_steps": cfg.pump.syringe_steps })
        );
    } else {
        println!(
            "Syringe at {position}/{} steps ({:.1} µL held)",
            cfg.pump.syringe_steps,
            pump.steps_to_liters(position) * 1e6
        );
    }
    Ok(())
}

pub fn self_check(cfg: &Config) -> eyre::Result<()> {
    let (mut pump, mut meter) = sim::idle_devices(cfg)?;
    pump.fill().map_err(|e| pump_err(&e))?;
    let full = pump.get_syringe_position().map_err(|e| pump_err(&e))?;
    pump.empty().map_err(|e| pump_err(&e))?;
    let m = meter
        .get_measurement()
        .map_err(|e| eyre::Report::new(map_hw_error(Device::Meter, &*e)))?;
    if json_mode() {
        println!(
            "{}",
            json!({
                "event": "self_check",
                "ok": true,
                "pump_full_steps": full,
                "ph": m.ph,
                "emf_mv": m.emf_mv,
                "temperature_c": m.temperature_c,
            })
        );
    } else {
        println!("Pump ok (full stroke {full} steps)");
        println!(
            "Meter ok (pH {:.3}, {:.1} mV, {:.2} °C)",
            m.ph, m.emf_mv, m.temperature_c
        );
        println!("self-check ok");
    }
    Ok(())
}
