#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod error_fmt;
mod logging;
mod report;
mod run;
mod sim;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use eyre::WrapErr;
use titrator_config::Config;
use titrator_core::CancelToken;

use crate::cli::{Cli, Commands, JSON_MODE, json_mode};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

const DEFAULT_CONFIG: &str = "etc/titrator.toml";

fn main() -> ExitCode {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    match real_main(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            if json_mode() {
                println!("{}", format_error_json(&e));
            } else {
                eprintln!("{}", humanize(&e));
            }
            ExitCode::from(exit_code_for_error(&e))
        }
    }
}

fn real_main(cli: Cli) -> eyre::Result<u8> {
    let cfg = load_config(&cli.config)?;
    let _log_guard = logging::init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    let res = dispatch(cli.cmd, &cfg);
    if let Err(e) = &res {
        tracing::error!(error = %format!("{e:#}"), "command failed");
    }
    res
}

fn dispatch(cmd: Commands, cfg: &Config) -> eyre::Result<u8> {
    match cmd {
        Commands::Titrate {
            mass_g,
            salinity,
            acid_conc,
            temp_c,
            out,
        } => {
            let cancel = CancelToken::new();
            let on_signal = cancel.clone();
            ctrlc::set_handler(move || {
                tracing::warn!("interrupt received; stopping after the current step");
                on_signal.cancel();
            })
            .wrap_err("installing Ctrl-C handler")?;
            let args = run::TitrateArgs {
                mass_g,
                salinity,
                acid_conc,
                temp_c,
                out,
            };
            run::titrate(cfg, &args, cancel)
        }
        Commands::Fit {
            data,
            mass_g,
            acid_conc,
        } => run::fit(cfg, &data, mass_g, acid_conc).map(|()| 0),
        Commands::Pump { action } => run::pump(cfg, action).map(|()| 0),
        Commands::SelfCheck => run::self_check(cfg).map(|()| 0),
    }
}

/// Read and validate the config. A missing file at the default location
/// means bench defaults; a missing file given with --config is an error.
fn load_config(path: &Path) -> eyre::Result<Config> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && path == Path::new(DEFAULT_CONFIG) => {
            return Ok(Config::default());
        }
        Err(e) => {
            return Err(e).wrap_err_with(|| format!("reading config {}", path.display()));
        }
    };
    let cfg = titrator_config::load_toml(&text)
        .map_err(eyre::Report::new)
        .wrap_err_with(|| format!("invalid configuration in {}", path.display()))?;
    cfg.validate()
        .wrap_err_with(|| format!("invalid configuration in {}", path.display()))?;
    Ok(cfg)
}
