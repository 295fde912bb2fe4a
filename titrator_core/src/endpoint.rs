//! Modified Gran endpoint solver.
//!
//! Below pH 3.8 carbonate is fully protonated and the excess acid term
//! `(m + V)·10^−pH` is linear in the added volume `V`. Its zero crossing is
//! the equivalence volume, from which total alkalinity follows.

use crate::error::FitError;
use crate::regression::fit_line;
use crate::session::TitrationSession;

/// Default upper pH bound of the Gran region (inclusive).
pub const GRAN_MAX_PH: f64 = 3.8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitResult {
    /// Total alkalinity in µmol/kg.
    pub total_alkalinity_umol_kg: f64,
    /// Fitted slope normalized by acid concentration.
    pub gamma: f64,
    pub rsq: f64,
    pub rsq_conventional: f64,
    pub slope: f64,
    pub intercept: f64,
    pub equivalence_volume_l: f64,
    pub points_used: usize,
}

/// Fit the session's Gran region with the default pH bound.
pub fn fit(session: &TitrationSession) -> Result<FitResult, FitError> {
    fit_with_max_ph(session, GRAN_MAX_PH)
}

pub fn fit_with_max_ph(session: &TitrationSession, max_ph: f64) -> Result<FitResult, FitError> {
    let p = session.params();
    fit_points(
        session.volume_history(),
        session.ph_history(),
        p.mass_kg(),
        p.acid_conc_mol_l(),
        max_ph,
    )
}

/// Fit raw (volume L, pH) pairs. Used directly when re-fitting exported runs.
pub fn fit_points(
    volumes_l: &[f64],
    phs: &[f64],
    mass_kg: f64,
    acid_conc_mol_l: f64,
    max_ph: f64,
) -> Result<FitResult, FitError> {
    let (x, y): (Vec<f64>, Vec<f64>) = volumes_l
        .iter()
        .zip(phs)
        .filter(|&(_, &ph)| ph <= max_ph)
        .map(|(&v, &ph)| (v, (mass_kg + v) * 10f64.powf(-ph)))
        .unzip();

    let line = fit_line(&x, &y)?;

    if is_flat(line.slope, &x, &y) {
        return Err(FitError::DegenerateFit { slope: line.slope });
    }

    let gamma = line.slope / acid_conc_mol_l;
    let v_eq = -line.intercept / line.slope;
    let ta = v_eq * acid_conc_mol_l / mass_kg * 1e6;
    if !(gamma.is_finite() && v_eq.is_finite() && ta.is_finite()) {
        return Err(FitError::NonFinite);
    }

    tracing::debug!(
        points = line.n,
        slope = line.slope,
        intercept = line.intercept,
        v_eq_l = v_eq,
        "gran fit"
    );

    Ok(FitResult {
        total_alkalinity_umol_kg: ta,
        gamma,
        rsq: line.rsq,
        rsq_conventional: line.rsq_conventional,
        slope: line.slope,
        intercept: line.intercept,
        equivalence_volume_l: v_eq,
        points_used: line.n,
    })
}

/// A slope whose rise across the whole volume span is below the rounding
/// error of `y` cannot locate an equivalence point.
fn is_flat(slope: f64, x: &[f64], y: &[f64]) -> bool {
    let finite = |v: &&f64| v.is_finite();
    let x_min = x.iter().filter(finite).copied().fold(f64::INFINITY, f64::min);
    let x_max = x.iter().filter(finite).copied().fold(f64::NEG_INFINITY, f64::max);
    let y_scale = y.iter().filter(finite).map(|v| v.abs()).fold(0.0, f64::max);
    let rise = (slope * (x_max - x_min)).abs();
    slope == 0.0 || rise <= f64::EPSILON * y_scale
}
