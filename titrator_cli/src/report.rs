//! Run CSV export.

use std::path::{Path, PathBuf};

use titrator_config::{RunMetadata, RunRecord, RunRow};
use titrator_core::TitrationSession;

/// `YYYY_MM_DD-hh_mm_ss_AM.csv` for the given local time.
pub fn default_file_name(at: chrono::DateTime<chrono::Local>) -> String {
    at.format("%Y_%m_%d-%I_%M_%S_%p.csv").to_string()
}

pub fn default_path(dir: Option<&str>, at: chrono::DateTime<chrono::Local>) -> PathBuf {
    Path::new(dir.unwrap_or(".")).join(default_file_name(at))
}

/// Session history as a CSV record; `total_alk_umol_kg` is `None` when the
/// run produced no result.
pub fn record(session: &TitrationSession, total_alk_umol_kg: Option<f64>) -> RunRecord {
    let p = session.params();
    let rows = session
        .volume_history()
        .iter()
        .zip(session.emf_history())
        .zip(session.ph_history())
        .map(|((&volume_l, &emf_mv), &ph)| RunRow {
            volume_l,
            emf_mv,
            ph,
        })
        .collect();
    RunRecord {
        metadata: Some(RunMetadata {
            sample_mass_g: p.mass_kg() * 1000.0,
            temperature_c: p.temperature_c(),
            salinity: p.salinity(),
            acid_conc_m: p.acid_conc_mol_l(),
            total_alk_umol_kg,
        }),
        rows,
    }
}

pub fn write(
    path: &Path,
    session: &TitrationSession,
    total_alk_umol_kg: Option<f64>,
) -> eyre::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    titrator_config::write_run_csv(path, &record(session, total_alk_umol_kg))?;
    tracing::info!(path = %path.display(), rows = session.len(), "run data written");
    Ok(())
}
