#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Titration control engine (hardware-agnostic).
//!
//! Automates an open-cell modified Gran titration of a seawater sample. All
//! device interaction goes through `titrator_traits::Pump` and
//! `titrator_traits::PhMeter`.
//!
//! ## Architecture
//!
//! - **Equilibrium model**: carbonate, borate and water constants from
//!   salinity and temperature (`equilibrium`)
//! - **Dose calculator**: acid volume between two pH values (`dose`)
//! - **Session**: append-only pH/emf/volume history (`session`)
//! - **Endpoint solver**: Gran linearization and least squares (`endpoint`,
//!   `regression`)
//! - **Controller**: two-phase dose/settle/read state machine (`TitratorCore`)
//! - **Runner**: run to completion or on a worker thread with an event stream
//!
//! ## Units
//!
//! Mass in kg, volume in liters, acid concentration in mol/L, temperature in
//! °C at the API (Kelvin internally), alkalinity in µmol/kg at the output.

pub mod builder;
pub mod cancel;
pub mod config;
pub mod conversions;
pub mod controller;
pub mod dose;
pub mod endpoint;
pub mod equilibrium;
pub mod error;
pub mod hw_error;
pub mod regression;
pub mod runner;
pub mod sample_model;
pub mod session;
pub mod status;

pub use builder::{Titrator, TitratorBuilder, TitratorG, build_titrator};
pub use cancel::CancelToken;
pub use config::{ControlCfg, SyringeCfg, TimingCfg};
pub use controller::{StartRequest, TitratorCore};
pub use dose::required_acid_volume;
pub use endpoint::{FitResult, GRAN_MAX_PH, fit};
pub use equilibrium::EquilibriumConstants;
pub use error::{BuildError, FitError, TitratorError};
pub use runner::{RunEvent, RunHandle, RunOutcome};
pub use sample_model::SampleModel;
pub use session::{SampleParameters, TitrationSession};
pub use status::{Phase, StepRecord, TitrationStatus};
