//! Controller phases and the outcome of a single step.

use crate::endpoint::FitResult;

/// Where the controller is in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingStart,
    /// Coarse single-jump dosing toward the Gran region.
    FirstPhase,
    /// Fine fixed-decrement dosing inside the Gran region.
    SecondPhase,
    Finished,
    Cancelled,
    /// A device error ended the run.
    Faulted,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled | Self::Faulted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingStart => "awaiting_start",
            Self::FirstPhase => "first_phase",
            Self::SecondPhase => "second_phase",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
            Self::Faulted => "faulted",
        }
    }
}

/// One completed dose/settle/read cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepRecord {
    /// 1-based dose number within the run.
    pub step: usize,
    pub phase: Phase,
    pub target_ph: f64,
    pub volume_l: f64,
    pub cumulative_volume_l: f64,
    pub ph: f64,
    pub emf_mv: f64,
    /// The syringe was refilled before this dose.
    pub refilled: bool,
}

/// Outcome of `Titrator::step`.
#[derive(Debug, Clone, PartialEq)]
pub enum TitrationStatus {
    /// A step was applied; more remain.
    Running(StepRecord),
    /// Termination reached and the endpoint fit succeeded.
    Complete(FitResult),
    /// Cancellation was observed before the next step.
    Cancelled,
}
