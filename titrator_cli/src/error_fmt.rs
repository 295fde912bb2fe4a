//! Human-readable error descriptions, exit codes, and structured JSON errors.

use titrator_core::error::{BuildError, FitError, TitratorError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingPump => {
                "What happened: No syringe pump was provided to the titrator.\nLikely causes: The pump failed to initialize or was not wired into the builder.\nHow to fix: Ensure the pump is created successfully and passed via with_pump(...).".to_string()
            }
            BuildError::MissingMeter => {
                "What happened: No pH meter was provided to the titrator.\nLikely causes: The meter failed to initialize or was not wired into the builder.\nHow to fix: Ensure the meter is created successfully and passed via with_meter(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid titration settings ({msg}).\nLikely causes: Out-of-range values in the [titration] table.\nHow to fix: Edit the config file, then rerun. See etc/titrator.toml for a sample."
            ),
        };
    }

    if let Some(te) = err.downcast_ref::<TitratorError>() {
        return match te {
            TitratorError::InvalidSample(what) => format!(
                "What happened: The sample description was rejected ({what}).\nLikely causes: Mass entered in kg instead of g, or a missing or negative value.\nHow to fix: Pass --mass-g, --salinity and --acid-conc with positive values."
            ),
            TitratorError::InvalidTarget { current, target } => format!(
                "What happened: A dose was requested towards pH {target:.3} from pH {current:.3}.\nLikely causes: The reading rose after a dose, or a non-finite reading.\nHow to fix: Check the electrode and stirring, then start a new run."
            ),
            TitratorError::ImplausibleDose { volume_l } => format!(
                "What happened: The computed acid dose ({volume_l} L) is not physical.\nLikely causes: Unusual sample parameters or a faulty reading.\nHow to fix: Verify salinity and temperature, then start a new run."
            ),
            TitratorError::DoseExceedsCapacity { volume_l } => format!(
                "What happened: A single dose of {:.1} µL does not fit in a full syringe.\nLikely causes: Sample too large or titrant too dilute for the syringe size.\nHow to fix: Use a smaller sample, a stronger titrant, or check pump.syringe_volume_l.",
                volume_l * 1e6
            ),
            TitratorError::Timeout => "What happened: A device did not answer in time.\nLikely causes: Loose cable, powered-off instrument, or wrong serial port.\nHow to fix: Check connections and power, then start a new run.".to_string(),
            TitratorError::Pump(msg) => format!(
                "What happened: The syringe pump reported an error ({msg}).\nLikely causes: Stalled plunger, empty reservoir, or a communication fault.\nHow to fix: Inspect the pump, run `titrator pump wash`, then start a new run."
            ),
            TitratorError::Meter(msg) => format!(
                "What happened: The pH meter reported an error ({msg}).\nLikely causes: Electrode not in solution or a communication fault.\nHow to fix: Check the electrode and meter, run `titrator self-check`, then start a new run."
            ),
            TitratorError::Endpoint(fe) => humanize_fit(fe),
            TitratorError::State(msg) => format!(
                "What happened: {msg}.\nLikely causes: A command was issued out of order.\nHow to fix: Start a new run."
            ),
        };
    }

    if let Some(fe) = err.downcast_ref::<FitError>() {
        return humanize_fit(fe);
    }

    // String-based heuristics for errors coming from config or data files
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("invalid configuration") {
        let cause = err
            .chain()
            .nth(1)
            .map(ToString::to_string)
            .unwrap_or_default();
        return format!(
            "What happened: Configuration is invalid ({cause}).\nLikely causes: A typo or an out-of-range value in the TOML.\nHow to fix: Edit the config file and try again."
        );
    }

    if lower.contains("run csv must start with headers") {
        return format!(
            "Invalid headers in run CSV. Expected 'total_volume_added_L,emf_mV,pH,...'.\nOriginal: {msg}"
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn humanize_fit(fe: &FitError) -> String {
    match fe {
        FitError::InsufficientData { found } => format!(
            "What happened: Only {found} reading(s) fell in the Gran region; at least 2 are needed.\nLikely causes: The run stopped early or the sample was already acidified.\nHow to fix: Check the sample and titrant, then titrate a fresh sample."
        ),
        FitError::DegenerateFit { .. } | FitError::NonFinite => format!(
            "What happened: The endpoint fit failed ({fe}).\nLikely causes: Readings did not change between doses.\nHow to fix: Check the electrode response and that acid is being dispensed."
        ),
    }
}

/// Stable exit codes: 2 precondition, 3 device, 4 endpoint, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> u8 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    if err.downcast_ref::<FitError>().is_some() {
        return 4;
    }
    match err.downcast_ref::<TitratorError>() {
        Some(
            TitratorError::InvalidSample(_)
            | TitratorError::InvalidTarget { .. }
            | TitratorError::ImplausibleDose { .. },
        ) => 2,
        Some(
            TitratorError::Pump(_)
            | TitratorError::Meter(_)
            | TitratorError::Timeout
            | TitratorError::DoseExceedsCapacity { .. },
        ) => 3,
        Some(TitratorError::Endpoint(_)) => 4,
        Some(TitratorError::State(_)) | None => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingPump => "MissingPump",
            BuildError::MissingMeter => "MissingMeter",
            BuildError::InvalidConfig(_) => "InvalidConfig",
        };
    }
    match err.downcast_ref::<TitratorError>() {
        Some(TitratorError::InvalidSample(_)) => "InvalidSample",
        Some(TitratorError::InvalidTarget { .. }) => "InvalidTarget",
        Some(TitratorError::ImplausibleDose { .. }) => "ImplausibleDose",
        Some(TitratorError::Pump(_)) => "Pump",
        Some(TitratorError::Meter(_)) => "Meter",
        Some(TitratorError::Timeout) => "Timeout",
        Some(TitratorError::DoseExceedsCapacity { .. }) => "DoseExceedsCapacity",
        Some(TitratorError::Endpoint(_)) => "Endpoint",
        Some(TitratorError::State(_)) => "State",
        None if err.downcast_ref::<FitError>().is_some() => "Endpoint",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let mut obj = json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    });
    if let Some(TitratorError::Endpoint(FitError::InsufficientData { found })) =
        err.downcast_ref::<TitratorError>()
    {
        obj["details"] = json!({ "points_found": found });
    } else if let Some(TitratorError::DoseExceedsCapacity { volume_l }) =
        err.downcast_ref::<TitratorError>()
    {
        obj["details"] = json!({ "volume_l": volume_l });
    }
    obj.to_string()
}
