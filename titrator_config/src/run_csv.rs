//! Run-data CSV export.
//!
//! Expected headers:
//! total_volume_added_L,emf_mV,pH,sample_mass_g,temp_C,salinity,acid_conc_M,total_alk_umol_kg
//!
//! The first data row carries every column; the remaining rows carry only the
//! first three. Example:
//! ```text
//! total_volume_added_L,emf_mV,pH,sample_mass_g,temp_C,salinity,acid_conc_M,total_alk_umol_kg
//! 0,-72.1,7.95,100,25,35,0.1,2284.512
//! 0.002444,178.4,3.799
//! ```
use std::path::Path;

pub const HEADERS: [&str; 8] = [
    "total_volume_added_L",
    "emf_mV",
    "pH",
    "sample_mass_g",
    "temp_C",
    "salinity",
    "acid_conc_M",
    "total_alk_umol_kg",
];

/// One (cumulative volume, emf, pH) reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunRow {
    pub volume_l: f64,
    pub emf_mv: f64,
    pub ph: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunMetadata {
    pub sample_mass_g: f64,
    pub temperature_c: f64,
    pub salinity: f64,
    pub acid_conc_m: f64,
    /// Absent when the run ended without a successful fit.
    pub total_alk_umol_kg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub metadata: Option<RunMetadata>,
    pub rows: Vec<RunRow>,
}

pub fn write_run_csv(path: &Path, run: &RunRecord) -> eyre::Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| eyre::eyre!("create run CSV {:?}: {}", path, e))?;
    wtr.write_record(HEADERS)?;

    for (idx, row) in run.rows.iter().enumerate() {
        let mut fields = vec![
            row.volume_l.to_string(),
            row.emf_mv.to_string(),
            row.ph.to_string(),
        ];
        if idx == 0
            && let Some(m) = run.metadata
        {
            fields.push(m.sample_mass_g.to_string());
            fields.push(m.temperature_c.to_string());
            fields.push(m.salinity.to_string());
            fields.push(m.acid_conc_m.to_string());
            fields.push(
                m.total_alk_umol_kg
                    .map(|ta| format!("{ta:.3}"))
                    .unwrap_or_default(),
            );
        }
        wtr.write_record(&fields)?;
    }
    wtr.flush()
        .map_err(|e| eyre::eyre!("write run CSV {:?}: {}", path, e))?;
    Ok(())
}

fn parse_field(rec: &csv::StringRecord, col: usize, line: usize) -> eyre::Result<f64> {
    let raw = rec
        .get(col)
        .ok_or_else(|| eyre::eyre!("row {line}: missing column {}", HEADERS[col]))?;
    raw.trim()
        .parse::<f64>()
        .map_err(|e| eyre::eyre!("row {line}: invalid {} {:?}: {}", HEADERS[col], raw, e))
}

pub fn load_run_csv(path: &Path) -> eyre::Result<RunRecord> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open run CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let actual: Vec<&str> = headers.iter().map(str::trim).collect();
    if actual.len() < 3 || actual[..3] != HEADERS[..3] {
        eyre::bail!(
            "run CSV must start with headers '{}', got: {}",
            HEADERS[..3].join(","),
            actual.join(",")
        );
    }

    let mut metadata = None;
    let mut rows = Vec::new();
    for (idx, rec) in rdr.records().enumerate() {
        let line = idx + 2;
        let rec = rec.map_err(|e| eyre::eyre!("invalid CSV row {line}: {e}"))?;
        rows.push(RunRow {
            volume_l: parse_field(&rec, 0, line)?,
            emf_mv: parse_field(&rec, 1, line)?,
            ph: parse_field(&rec, 2, line)?,
        });
        if idx == 0 && rec.len() >= 7 {
            let ta = match rec.get(7).map(str::trim) {
                Some(s) if !s.is_empty() => Some(parse_field(&rec, 7, line)?),
                _ => None,
            };
            metadata = Some(RunMetadata {
                sample_mass_g: parse_field(&rec, 3, line)?,
                temperature_c: parse_field(&rec, 4, line)?,
                salinity: parse_field(&rec, 5, line)?,
                acid_conc_m: parse_field(&rec, 6, line)?,
                total_alk_umol_kg: ta,
            });
        }
    }

    if rows.is_empty() {
        eyre::bail!("run CSV {:?} has no data rows", path);
    }
    Ok(RunRecord { metadata, rows })
}
