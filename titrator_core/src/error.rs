use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TitratorError {
    #[error("invalid sample: {0}")]
    InvalidSample(&'static str),
    #[error("target pH {target} is not below current pH {current}")]
    InvalidTarget { current: f64, target: f64 },
    #[error("implausible acid volume {volume_l} L")]
    ImplausibleDose { volume_l: f64 },
    #[error("pump error: {0}")]
    Pump(String),
    #[error("pH meter error: {0}")]
    Meter(String),
    #[error("timeout waiting for device")]
    Timeout,
    #[error("dose of {volume_l} L exceeds a full syringe")]
    DoseExceedsCapacity { volume_l: f64 },
    #[error("cannot compute endpoint: {0}")]
    Endpoint(#[from] FitError),
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum FitError {
    #[error("insufficient data: {found} point(s) in the Gran region, need at least 2")]
    InsufficientData { found: usize },
    #[error("degenerate fit (slope {slope})")]
    DegenerateFit { slope: f64 },
    #[error("fit produced a non-finite result")]
    NonFinite,
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing pump")]
    MissingPump,
    #[error("missing pH meter")]
    MissingMeter,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
