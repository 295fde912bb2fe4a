//! Type-state builder for `Titrator` and generic `build_titrator` constructor.
//!
//! The builder enforces at compile time that a pump and a pH meter are
//! provided before `build()` is available. `try_build()` is always available
//! for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use titrator_traits::clock::{Clock, MonotonicClock};
use titrator_traits::{PhMeter, Pump};

use crate::cancel::CancelToken;
use crate::config::{ControlCfg, TimingCfg};
use crate::controller::{StartRequest, TitratorCore};
use crate::endpoint::FitResult;
use crate::error::{BuildError, Result};
use crate::runner::{self, RunEvent, RunOutcome};
use crate::session::TitrationSession;
use crate::status::{Phase, TitrationStatus};

pub type BoxedPump = Box<dyn Pump + Send>;
pub type BoxedMeter = Box<dyn PhMeter + Send>;

// ── Public dynamic-dispatch wrapper ──────────────────────────────────────────

/// Titration controller over boxed devices. `Send`, so a run can be moved
/// to a worker thread (see `runner::spawn`).
pub struct Titrator {
    pub(crate) inner: TitratorCore<BoxedPump, BoxedMeter>,
}

impl core::fmt::Debug for Titrator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Titrator")
            .field("phase", &self.inner.phase)
            .field("session_len", &self.inner.session.as_ref().map(TitrationSession::len))
            .finish()
    }
}

impl Titrator {
    /// Start building a Titrator.
    pub fn builder() -> TitratorBuilder<Missing, Missing> {
        TitratorBuilder::default()
    }

    pub fn start(&mut self, request: impl Into<StartRequest>) -> Result<&TitrationSession> {
        self.inner.start(request)
    }

    /// One iteration of the titration loop.
    pub fn step(&mut self) -> Result<TitrationStatus> {
        self.inner.step()
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.inner.cancel_token()
    }

    pub fn result(&self) -> Result<FitResult> {
        self.inner.result()
    }

    pub fn phase(&self) -> Phase {
        self.inner.phase()
    }

    pub fn session(&self) -> Option<&TitrationSession> {
        self.inner.session()
    }

    pub fn refills(&self) -> usize {
        self.inner.refills()
    }

    /// Run to completion on the calling thread; see `runner::run`.
    pub fn run<F: FnMut(&RunEvent)>(
        &mut self,
        request: impl Into<StartRequest>,
        on_event: F,
    ) -> Result<RunOutcome> {
        runner::run(&mut self.inner, request, on_event)
    }
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Titrator`. Configuration is validated on `build()`.
pub struct TitratorBuilder<P, M> {
    pump: Option<BoxedPump>,
    meter: Option<BoxedMeter>,
    control: Option<ControlCfg>,
    timing: Option<TimingCfg>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    cancel: Option<CancelToken>,
    _p: PhantomData<P>,
    _m: PhantomData<M>,
}

impl Default for TitratorBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            pump: None,
            meter: None,
            control: None,
            timing: None,
            clock: None,
            cancel: None,
            _p: PhantomData,
            _m: PhantomData,
        }
    }
}

/// Validate configuration and construct a `TitratorCore`.
///
/// Shared by `TitratorBuilder::try_build()` and `build_titrator()`.
fn validate_and_build<P: Pump, M: PhMeter>(
    pump: P,
    meter: M,
    control: ControlCfg,
    timing: TimingCfg,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    cancel: Option<CancelToken>,
) -> Result<TitratorCore<P, M>> {
    // ── Validation ───────────────────────────────────────────────────────────
    let is_ph = |x: f64| x.is_finite() && x > 0.0 && x < 14.0;
    if !is_ph(control.first_phase_threshold_ph) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "first_phase_threshold_ph out of range",
        )));
    }
    if !(control.first_phase_margin_ph.is_finite() && control.first_phase_margin_ph > 0.0) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "first_phase_margin_ph must be > 0",
        )));
    }
    if !is_ph(control.first_phase_target_ph()) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "first phase target pH out of range",
        )));
    }
    if !is_ph(control.second_phase_end_ph)
        || control.second_phase_end_ph >= control.first_phase_threshold_ph
    {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "second_phase_end_ph must be below first_phase_threshold_ph",
        )));
    }
    if !(control.second_phase_step_ph.is_finite() && control.second_phase_step_ph > 0.0) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "second_phase_step_ph must be > 0",
        )));
    }
    if control.max_steps == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "max_steps must be >= 1",
        )));
    }
    if !is_ph(control.gran_max_ph) {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "gran_max_ph out of range",
        )));
    }

    let clock: Arc<dyn Clock + Send + Sync> = match clock {
        Some(b) => Arc::from(b),
        None => Arc::new(MonotonicClock::new()),
    };
    let epoch = clock.now();

    Ok(TitratorCore {
        pump,
        meter,
        control,
        timing,
        clock,
        cancel: cancel.unwrap_or_default(),
        epoch,
        phase: Phase::AwaitingStart,
        session: None,
        outcome: None,
        refills: 0,
    })
}

impl<P, M> TitratorBuilder<P, M> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<Titrator> {
        let pump = self
            .pump
            .ok_or_else(|| eyre::Report::new(BuildError::MissingPump))?;
        let meter = self
            .meter
            .ok_or_else(|| eyre::Report::new(BuildError::MissingMeter))?;

        let inner = validate_and_build(
            pump,
            meter,
            self.control.unwrap_or_default(),
            self.timing.unwrap_or_default(),
            self.clock,
            self.cancel,
        )?;
        Ok(Titrator { inner })
    }

    pub fn with_control(mut self, control: ControlCfg) -> Self {
        self.control = Some(control);
        self
    }
    pub fn with_timing(mut self, timing: TimingCfg) -> Self {
        self.timing = Some(timing);
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    /// Share an existing cancellation flag, e.g. one set by a signal handler.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

// Setters that advance type-state
impl<M> TitratorBuilder<Missing, M> {
    pub fn with_pump(self, pump: impl Pump + Send + 'static) -> TitratorBuilder<Set, M> {
        TitratorBuilder {
            pump: Some(Box::new(pump)),
            meter: self.meter,
            control: self.control,
            timing: self.timing,
            clock: self.clock,
            cancel: self.cancel,
            _p: PhantomData,
            _m: PhantomData,
        }
    }
}

impl<P> TitratorBuilder<P, Missing> {
    pub fn with_meter(self, meter: impl PhMeter + Send + 'static) -> TitratorBuilder<P, Set> {
        TitratorBuilder {
            pump: self.pump,
            meter: Some(Box::new(meter)),
            control: self.control,
            timing: self.timing,
            clock: self.clock,
            cancel: self.cancel,
            _p: PhantomData,
            _m: PhantomData,
        }
    }
}

impl TitratorBuilder<Set, Set> {
    /// Validate and build. Only available once pump and meter are set.
    pub fn build(self) -> Result<Titrator> {
        self.try_build()
    }
}

/// Generic, statically-dispatched alias using the unified core.
pub type TitratorG<P, M> = TitratorCore<P, M>;

/// Build a statically-dispatched controller from concrete devices.
pub fn build_titrator<P, M>(
    pump: P,
    meter: M,
    control: ControlCfg,
    timing: TimingCfg,
    clock: Option<Box<dyn Clock + Send + Sync>>,
) -> Result<TitratorG<P, M>>
where
    P: Pump,
    M: PhMeter,
{
    validate_and_build(pump, meter, control, timing, clock, None)
}
