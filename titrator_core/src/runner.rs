//! Drive a titration to completion, in place or on a worker thread.

use std::thread;

use crossbeam_channel::{Receiver, unbounded};
use titrator_traits::{PhMeter, Pump};

use crate::builder::Titrator;
use crate::cancel::CancelToken;
use crate::controller::{StartRequest, TitratorCore};
use crate::endpoint::FitResult;
use crate::error::{Result as CoreResult, TitratorError};
use crate::status::{Phase, StepRecord, TitrationStatus};

/// Terminal outcome of a run that did not fail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RunOutcome {
    Complete(FitResult),
    Cancelled,
}

/// Progress stream of a background run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Started { initial_ph: f64, temperature_c: f64 },
    PhaseChanged(Phase),
    Step(StepRecord),
    Finished(FitResult),
    Cancelled,
    Failed(String),
}

/// Start and step until the run finishes or is cancelled. `on_event` sees
/// every event in order; the terminal event is also the return value.
pub fn run<P, M, F>(
    titrator: &mut TitratorCore<P, M>,
    request: impl Into<StartRequest>,
    mut on_event: F,
) -> CoreResult<RunOutcome>
where
    P: Pump,
    M: PhMeter,
    F: FnMut(&RunEvent),
{
    let session = titrator.start(request)?;
    on_event(&RunEvent::Started {
        initial_ph: session.last_ph(),
        temperature_c: session.params().temperature_c(),
    });

    let mut phase = titrator.phase();
    on_event(&RunEvent::PhaseChanged(phase));
    loop {
        let status = titrator.step()?;
        if titrator.phase() != phase {
            phase = titrator.phase();
            if !phase.is_terminal() {
                on_event(&RunEvent::PhaseChanged(phase));
            }
        }
        match status {
            TitrationStatus::Running(rec) => on_event(&RunEvent::Step(rec)),
            TitrationStatus::Complete(r) => {
                on_event(&RunEvent::Finished(r));
                return Ok(RunOutcome::Complete(r));
            }
            TitrationStatus::Cancelled => {
                on_event(&RunEvent::Cancelled);
                return Ok(RunOutcome::Cancelled);
            }
        }
    }
}

/// Handle to a run executing on a worker thread.
#[derive(Debug)]
pub struct RunHandle {
    events: Receiver<RunEvent>,
    cancel: CancelToken,
    join: thread::JoinHandle<(Titrator, CoreResult<RunOutcome>)>,
}

impl RunHandle {
    pub fn events(&self) -> &Receiver<RunEvent> {
        &self.events
    }

    /// Ask the worker to stop before its next step.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the worker; returns the controller (for its session history)
    /// and the run result.
    pub fn join(self) -> CoreResult<(Titrator, CoreResult<RunOutcome>)> {
        self.join.join().map_err(|_| {
            eyre::Report::new(TitratorError::State("titration worker panicked".into()))
        })
    }
}

/// Run on a worker thread, streaming `RunEvent`s. A failure is reported as
/// `RunEvent::Failed` and through `RunHandle::join`.
pub fn spawn(mut titrator: Titrator, request: impl Into<StartRequest>) -> RunHandle {
    let (tx, rx) = unbounded();
    let cancel = titrator.cancel_token();
    let request = request.into();
    let join = thread::spawn(move || {
        let res = run(&mut titrator.inner, request, |ev| {
            let _ = tx.send(ev.clone());
        });
        if let Err(e) = &res {
            let _ = tx.send(RunEvent::Failed(format!("{e:#}")));
        }
        (titrator, res)
    });
    RunHandle {
        events: rx,
        cancel,
        join,
    }
}
