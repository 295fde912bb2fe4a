//! The two-phase titration state machine (`TitratorCore`).
//!
//! One call to `step` is one atomic unit of work: compute the dose, refill
//! the syringe if needed, dispense, settle, read, append. Cancellation is
//! only observed before a unit starts.

use std::sync::Arc;
use std::time::Instant;

use eyre::WrapErr;
use titrator_traits::clock::Clock;
use titrator_traits::{Measurement, PhMeter, Pump};

use crate::cancel::CancelToken;
use crate::config::{ControlCfg, TimingCfg};
use crate::dose::required_acid_volume;
use crate::endpoint::{FitResult, fit_with_max_ph};
use crate::error::{FitError, Result, TitratorError};
use crate::hw_error::{Device, map_hw_error};
use crate::session::{SampleParameters, TitrationSession};
use crate::status::{Phase, StepRecord, TitrationStatus};

/// How the sample is described when a run starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StartRequest {
    /// Fully specified sample, temperature included.
    Sample(SampleParameters),
    /// Take the sample temperature from the probe's initial reading.
    ProbeTemperature {
        mass_kg: f64,
        salinity: f64,
        acid_conc_mol_l: f64,
    },
}

impl From<SampleParameters> for StartRequest {
    fn from(p: SampleParameters) -> Self {
        Self::Sample(p)
    }
}

/// Unified core for both dynamic (boxed) and generic (static dispatch) variants.
pub struct TitratorCore<P: Pump, M: PhMeter> {
    pub(crate) pump: P,
    pub(crate) meter: M,
    pub(crate) control: ControlCfg,
    pub(crate) timing: TimingCfg,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) cancel: CancelToken,
    pub(crate) epoch: Instant,

    pub(crate) phase: Phase,
    pub(crate) session: Option<TitrationSession>,
    pub(crate) outcome: Option<std::result::Result<FitResult, FitError>>,
    pub(crate) refills: usize,
}

impl<P: Pump, M: PhMeter> core::fmt::Debug for TitratorCore<P, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TitratorCore")
            .field("phase", &self.phase)
            .field("steps", &self.session.as_ref().map(TitrationSession::step_count))
            .field("last_ph", &self.session.as_ref().map(TitrationSession::last_ph))
            .finish_non_exhaustive()
    }
}

impl<P: Pump, M: PhMeter> TitratorCore<P, M> {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// History of the current or last run, once started.
    pub fn session(&self) -> Option<&TitrationSession> {
        self.session.as_ref()
    }

    pub fn control_cfg(&self) -> &ControlCfg {
        &self.control
    }

    /// Syringe refills performed during the run, including the initial fill.
    pub fn refills(&self) -> usize {
        self.refills
    }

    /// A handle that cancels this controller from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Request cancellation; honored at the top of the next `step`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Begin a run: read the initial measurement, seed the session, fill the
    /// syringe and wait for it to settle.
    ///
    /// Sample parameters are checked before any device is touched.
    pub fn start(&mut self, request: impl Into<StartRequest>) -> Result<&TitrationSession> {
        if self.phase != Phase::AwaitingStart {
            return Err(eyre::Report::new(TitratorError::State(format!(
                "cannot start: run is {}",
                self.phase.as_str()
            ))));
        }
        let request = request.into();
        if let StartRequest::ProbeTemperature {
            mass_kg,
            salinity,
            acid_conc_mol_l,
        } = request
        {
            SampleParameters::validate_sample(mass_kg, salinity, acid_conc_mol_l)
                .map_err(eyre::Report::new)?;
        }

        self.epoch = self.clock.now();
        let initial = self
            .read_meter()
            .wrap_err("reading initial measurement")
            .inspect_err(|_| self.phase = Phase::Faulted)?;

        let params = match request {
            StartRequest::Sample(p) => p,
            StartRequest::ProbeTemperature {
                mass_kg,
                salinity,
                acid_conc_mol_l,
            } => SampleParameters::new(mass_kg, salinity, acid_conc_mol_l, initial.temperature_c)
                .wrap_err("probe temperature out of range")
                .inspect_err(|_| self.phase = Phase::Faulted)?,
        };

        let session = TitrationSession::new(params, initial.ph, initial.emf_mv);
        let k = session.constants();
        tracing::info!(
            mass_kg = params.mass_kg(),
            salinity = params.salinity(),
            acid_conc = params.acid_conc_mol_l(),
            temperature_c = params.temperature_c(),
            initial_ph = initial.ph,
            initial_emf_mv = initial.emf_mv,
            "titration start"
        );
        tracing::debug!(
            ionic_strength = k.ionic_strength,
            k1 = k.k1,
            k2 = k.k2,
            kw = k.kw,
            kb = k.kb,
            borate_alk_umol_kg = k.borate_alkalinity_umol_kg(initial.ph),
            "equilibrium constants"
        );
        self.session = Some(session);
        self.outcome = None;
        self.refills = 0;

        self.refill()
            .wrap_err("initial syringe fill")
            .inspect_err(|_| self.phase = Phase::Faulted)?;
        self.phase = Phase::FirstPhase;

        self.session
            .as_ref()
            .ok_or_else(|| eyre::Report::new(TitratorError::State("session missing".into())))
    }

    /// Advance the run by one dose/settle/read cycle, or finish it.
    pub fn step(&mut self) -> Result<TitrationStatus> {
        match self.phase {
            Phase::FirstPhase | Phase::SecondPhase => {}
            other => {
                return Err(eyre::Report::new(TitratorError::State(format!(
                    "cannot step: run is {}",
                    other.as_str()
                ))));
            }
        }

        if self.cancel.is_cancelled() {
            self.phase = Phase::Cancelled;
            tracing::warn!(
                steps = self.session.as_ref().map_or(0, TitrationSession::step_count),
                "titration cancelled"
            );
            return Ok(TitrationStatus::Cancelled);
        }

        let (last_ph, steps) = {
            let s = self.session_ref()?;
            (s.last_ph(), s.step_count())
        };

        if self.phase == Phase::FirstPhase && last_ph < self.control.first_phase_threshold_ph {
            tracing::info!(ph = last_ph, steps, "entering second phase");
            self.phase = Phase::SecondPhase;
        }

        let (target_ph, settle_ms) = match self.phase {
            Phase::FirstPhase => (
                self.control.first_phase_target_ph(),
                self.timing.first_phase_settle_ms,
            ),
            _ => {
                if last_ph < self.control.second_phase_end_ph || steps >= self.control.max_steps {
                    return self.finish();
                }
                (
                    last_ph - self.control.second_phase_step_ph,
                    self.timing.second_phase_settle_ms,
                )
            }
        };

        match self.dose_cycle(target_ph, settle_ms) {
            Ok(rec) => Ok(TitrationStatus::Running(rec)),
            Err(e) => {
                self.phase = Phase::Faulted;
                tracing::error!(error = %e, "titration step failed");
                Err(e)
            }
        }
    }

    /// Final fit of a finished run.
    pub fn result(&self) -> Result<FitResult> {
        match &self.outcome {
            Some(Ok(r)) => Ok(*r),
            Some(Err(e)) => Err(eyre::Report::new(TitratorError::Endpoint(*e))),
            None => Err(eyre::Report::new(TitratorError::State(format!(
                "no result: run is {}",
                self.phase.as_str()
            )))),
        }
    }

    /// Fill the syringe and wait for the line to settle.
    pub fn refill(&mut self) -> Result<()> {
        self.pump
            .fill()
            .map_err(|e| eyre::Report::new(map_hw_error(Device::Pump, &*e)))
            .wrap_err("filling syringe")?;
        self.refills += 1;
        tracing::info!(settle_ms = self.timing.fill_settle_ms, "syringe filled");
        self.clock.sleep_ms(self.timing.fill_settle_ms);
        Ok(())
    }

    // ── Private: one dose/settle/read unit ───────────────────────────────────

    fn dose_cycle(&mut self, target_ph: f64, settle_ms: u64) -> Result<StepRecord> {
        let mut volume_l = required_acid_volume(self.session_ref()?, target_ph)
            .wrap_err("computing acid dose")?;

        let mut refilled = false;
        if !self.volume_available(volume_l)? {
            self.refill()?;
            refilled = true;
            if !self.volume_available(volume_l)? {
                // A coarse dose may span several syringes; the next coarse
                // step doses the rest from the new reading.
                let full_l = self.pump.syringe_volume_l();
                if self.phase != Phase::FirstPhase || !(full_l.is_finite() && full_l > 0.0) {
                    return Err(eyre::Report::new(TitratorError::DoseExceedsCapacity {
                        volume_l,
                    }));
                }
                tracing::warn!(
                    requested_ul = volume_l * 1e6,
                    dispensing_ul = full_l * 1e6,
                    "coarse dose exceeds syringe; dispensing a full syringe"
                );
                volume_l = full_l;
            }
        }

        tracing::info!(
            phase = self.phase.as_str(),
            target_ph,
            volume_ul = volume_l * 1e6,
            "dispensing acid"
        );
        self.pump
            .dispense(volume_l)
            .map_err(|e| eyre::Report::new(map_hw_error(Device::Pump, &*e)))
            .wrap_err("dispensing acid")?;

        self.clock.sleep_ms(settle_ms);
        let m = self.read_meter()?;

        let phase = self.phase;
        let session = self.session_mut()?;
        session.add_step_data(m.ph, m.emf_mv, volume_l)?;
        let rec = StepRecord {
            step: session.step_count(),
            phase,
            target_ph,
            volume_l,
            cumulative_volume_l: session.last_volume(),
            ph: m.ph,
            emf_mv: m.emf_mv,
            refilled,
        };
        tracing::debug!(
            step = rec.step,
            ph = rec.ph,
            emf_mv = rec.emf_mv,
            total_l = rec.cumulative_volume_l,
            "reading"
        );
        Ok(rec)
    }

    fn finish(&mut self) -> Result<TitrationStatus> {
        self.phase = Phase::Finished;
        let session = self.session_ref()?;
        let outcome = fit_with_max_ph(session, self.control.gran_max_ph);
        let elapsed_ms = self.clock.ms_since(self.epoch);
        let steps = session.step_count();
        self.outcome = Some(outcome);
        match outcome {
            Ok(r) => {
                tracing::info!(
                    total_alkalinity_umol_kg = r.total_alkalinity_umol_kg,
                    gamma = r.gamma,
                    rsq = r.rsq,
                    steps,
                    elapsed_ms,
                    "titration complete"
                );
                Ok(TitrationStatus::Complete(r))
            }
            Err(e) => {
                tracing::error!(error = %e, steps, "endpoint fit failed");
                Err(eyre::Report::new(TitratorError::Endpoint(e)))
            }
        }
    }

    fn volume_available(&mut self, volume_l: f64) -> Result<bool> {
        self.pump
            .check_volume_available(volume_l)
            .map_err(|e| eyre::Report::new(map_hw_error(Device::Pump, &*e)))
            .wrap_err("checking syringe volume")
    }

    fn read_meter(&mut self) -> Result<Measurement> {
        let m = self
            .meter
            .get_measurement()
            .map_err(|e| eyre::Report::new(map_hw_error(Device::Meter, &*e)))
            .wrap_err("reading pH meter")?;
        if !(m.ph.is_finite() && m.emf_mv.is_finite()) {
            return Err(eyre::Report::new(TitratorError::Meter(format!(
                "non-finite reading: pH {} emf {} mV",
                m.ph, m.emf_mv
            ))));
        }
        Ok(m)
    }

    fn session_ref(&self) -> Result<&TitrationSession> {
        self.session
            .as_ref()
            .ok_or_else(|| eyre::Report::new(TitratorError::State("run not started".into())))
    }

    fn session_mut(&mut self) -> Result<&mut TitrationSession> {
        self.session
            .as_mut()
            .ok_or_else(|| eyre::Report::new(TitratorError::State("run not started".into())))
    }
}
