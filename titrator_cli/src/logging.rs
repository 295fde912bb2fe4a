//! Tracing subscriber setup: console layer plus optional rolling file.

use std::io::IsTerminal;
use std::path::Path;

use eyre::WrapErr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber. `RUST_LOG` overrides `console_level`.
///
/// The returned guard flushes the file writer on drop; keep it alive until
/// the process exits.
pub fn init_tracing(
    json: bool,
    console_level: &str,
    cfg: &titrator_config::Logging,
) -> eyre::Result<Option<WorkerGuard>> {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(console_level))
        .wrap_err_with(|| format!("invalid log level '{console_level}'"))?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    // Logs go to stderr so stdout carries only results.
    if json {
        layers.push(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_filter(console_filter)
                .boxed(),
        );
    } else {
        layers.push(
            fmt::layer()
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal())
                .with_writer(std::io::stderr)
                .with_filter(console_filter)
                .boxed(),
        );
    }

    let mut guard = None;
    if let Some(file) = cfg.file.as_deref() {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| eyre::eyre!("logging.file '{file}' has no file name"))?;
        let appender = match cfg.rotation.as_deref().unwrap_or("never") {
            "daily" => rolling::daily(dir, name),
            "hourly" => rolling::hourly(dir, name),
            _ => rolling::never(dir, name),
        };
        let (writer, g) = tracing_appender::non_blocking(appender);
        let level = cfg.level.as_deref().unwrap_or("info");
        let file_filter = EnvFilter::try_new(level)
            .wrap_err_with(|| format!("invalid logging.level '{level}'"))?;
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(file_filter)
                .boxed(),
        );
        guard = Some(g);
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .wrap_err("installing tracing subscriber")?;
    Ok(guard)
}
