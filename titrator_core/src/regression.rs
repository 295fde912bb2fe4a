//! Ordinary least squares line fit used by the endpoint solver.

use crate::error::FitError;

/// Degree-1 least squares fit `y = slope·x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// `1 − SSE / Σ(ŷ − ȳ)²`. The denominator uses the fitted values, not the
    /// observations; kept for comparability with historical results.
    pub rsq: f64,
    /// Textbook `1 − SSE / Σ(y − ȳ)²`.
    pub rsq_conventional: f64,
    /// Rows that survived non-finite filtering.
    pub n: usize,
}

/// Fit `y` on `x`. Rows where either value is NaN or infinite are dropped
/// before fitting. Fewer than two remaining rows, or no spread in `x`, is
/// an error.
pub fn fit_line(x: &[f64], y: &[f64]) -> Result<LinearFit, FitError> {
    let rows: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .map(|(&a, &b)| (a, b))
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .collect();

    let n = rows.len();
    if n < 2 {
        return Err(FitError::InsufficientData { found: n });
    }

    let nf = n as f64;
    let mean_x = rows.iter().map(|r| r.0).sum::<f64>() / nf;
    let mean_y = rows.iter().map(|r| r.1).sum::<f64>() / nf;
    let mut sxx = 0.0f64;
    let mut sxy = 0.0f64;
    for (rx, ry) in &rows {
        let dx = rx - mean_x;
        sxx += dx * dx;
        sxy += dx * (ry - mean_y);
    }
    if !sxx.is_finite() || sxx == 0.0 {
        return Err(FitError::DegenerateFit { slope: f64::NAN });
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    if !(slope.is_finite() && intercept.is_finite()) {
        return Err(FitError::NonFinite);
    }

    let mut sse = 0.0f64;
    let mut ss_model = 0.0f64;
    let mut ss_total = 0.0f64;
    for (rx, ry) in &rows {
        let y_hat = slope * rx + intercept;
        sse += (ry - y_hat).powi(2);
        ss_model += (y_hat - mean_y).powi(2);
        ss_total += (ry - mean_y).powi(2);
    }

    Ok(LinearFit {
        slope,
        intercept,
        rsq: 1.0 - sse / ss_model,
        rsq_conventional: 1.0 - sse / ss_total,
        n,
    })
}
