//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[inline]
pub fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}

#[derive(Parser, Debug)]
#[command(
    name = "titrator",
    version,
    about = "Seawater total alkalinity titrator (modified Gran)"
)]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/titrator.toml")]
    pub config: PathBuf,

    /// Log as JSON lines and print results as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Titrate a sample and report its total alkalinity
    Titrate {
        /// Sample mass in grams
        #[arg(long, value_name = "G")]
        mass_g: f64,
        /// Sample salinity (PSU)
        #[arg(long, value_name = "PSU")]
        salinity: f64,
        /// Titrant (HCl) concentration in mol/L
        #[arg(long, value_name = "MOL_L")]
        acid_conc: f64,
        /// Sample temperature in °C; the probe reading is used when omitted
        #[arg(long, value_name = "C")]
        temp_c: Option<f64>,
        /// Run CSV path; defaults to a time-stamped file in report.dir
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Re-run the endpoint fit on an exported run CSV
    Fit {
        /// Run CSV written by `titrate`
        #[arg(long, value_name = "FILE")]
        data: PathBuf,
        /// Sample mass in grams (taken from the CSV when omitted)
        #[arg(long, value_name = "G")]
        mass_g: Option<f64>,
        /// Titrant concentration in mol/L (taken from the CSV when omitted)
        #[arg(long, value_name = "MOL_L")]
        acid_conc: Option<f64>,
    },
    /// Manual syringe controls
    Pump {
        #[command(subcommand)]
        action: PumpAction,
    },
    /// Quick health check (pump and meter respond)
    SelfCheck,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum PumpAction {
    /// Draw a full syringe of titrant
    Fill,
    /// Return the syringe contents to the reservoir
    Empty,
    /// Rinse the syringe with fill/empty cycles
    Wash {
        /// Number of cycles (defaults to pump.wash_cycles)
        #[arg(long)]
        cycles: Option<u32>,
    },
}
