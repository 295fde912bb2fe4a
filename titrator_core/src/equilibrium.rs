//! Seawater carbonate/borate equilibrium model.
//!
//! Everything here is a pure function of practical salinity `s` and absolute
//! temperature `t_k`. Inputs outside salinity 0..=45 or at non-positive
//! temperature are a caller contract violation; `SampleParameters` rejects
//! them before a session is created.

/// Ionic strength (mol/kg-H2O) from salinity.
#[inline]
pub fn ionic_strength(s: f64) -> f64 {
    19.924 * s / (1000.0 - 1.005 * s)
}

/// First carbonic acid dissociation constant, Mehrbach et al. (1973) as
/// refit by Dickson & Millero (1987).
#[inline]
pub fn k1(s: f64, t_k: f64) -> f64 {
    let pk1 = 3670.7 / t_k - 62.008 + 9.7944 * t_k.ln() - 0.0118 * s + 0.000_116 * s * s;
    10f64.powf(-pk1)
}

/// Second carbonic acid dissociation constant (same source as `k1`).
#[inline]
pub fn k2(s: f64, t_k: f64) -> f64 {
    let pk2 = 1394.7 / t_k + 4.777 - 0.0184 * s + 0.000_118 * s * s;
    10f64.powf(-pk2)
}

/// Ion product of water, Dickson & Goyet (1994).
pub fn kw(s: f64, t_k: f64) -> f64 {
    let ln_t = t_k.ln();
    let ln_kw = -13847.26 / t_k + 148.9652 - 23.6521 * ln_t
        + (118.67 / t_k - 5.977 + 1.0495 * ln_t) * s.sqrt()
        - 0.016_15 * s;
    ln_kw.exp()
}

/// Boric acid dissociation constant, Dickson (1990b).
pub fn kb(s: f64, t_k: f64) -> f64 {
    let sqrt_s = s.sqrt();
    let ln_kb = (-8966.90 - 2890.53 * sqrt_s - 77.942 * s + 1.728 * s.powf(1.5)
        - 0.0996 * s * s)
        / t_k
        + 148.0248
        + 137.1942 * sqrt_s
        + 1.62142 * s
        - (24.4344 + 25.085 * sqrt_s + 0.2474 * s) * t_k.ln()
        + 0.053_105 * sqrt_s * t_k;
    ln_kb.exp()
}

/// Total borate (mol/kg) scaled from the salinity-35 value.
#[inline]
pub fn total_borate(s: f64) -> f64 {
    0.000_416 * s / 35.0
}

/// Dissolved inorganic carbon estimate (mol/kg) scaled from salinity 35.
#[inline]
pub fn dic_estimate(s: f64) -> f64 {
    0.002_050 * s / 35.0
}

/// `[H+]` in mol/kg for a pH value.
#[inline]
pub fn hydrogen_ion(ph: f64) -> f64 {
    10f64.powf(-ph)
}

/// Constants derived once per session from salinity and temperature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquilibriumConstants {
    pub ionic_strength: f64,
    pub k1: f64,
    pub k2: f64,
    pub kw: f64,
    pub kb: f64,
    pub total_borate: f64,
    pub dic: f64,
}

impl EquilibriumConstants {
    pub fn new(salinity: f64, temperature_k: f64) -> Self {
        Self {
            ionic_strength: ionic_strength(salinity),
            k1: k1(salinity, temperature_k),
            k2: k2(salinity, temperature_k),
            kw: kw(salinity, temperature_k),
            kb: kb(salinity, temperature_k),
            total_borate: total_borate(salinity),
            dic: dic_estimate(salinity),
        }
    }

    /// Carbonate alkalinity `DIC·(α1 + 2·α2)` at hydrogen ion concentration `h`.
    pub fn carbonate_alkalinity(&self, h: f64) -> f64 {
        let k1k2 = self.k1 * self.k2;
        let d = h * h + self.k1 * h + k1k2;
        let alpha1 = self.k1 * h / d;
        let alpha2 = k1k2 / d;
        self.dic * (alpha1 + 2.0 * alpha2)
    }

    /// Borate alkalinity `BT·KB/(KB + h)`.
    pub fn borate_alkalinity(&self, h: f64) -> f64 {
        self.total_borate * self.kb / (self.kb + h)
    }

    /// Borate alkalinity at `ph` in µmol/kg, for run summaries.
    pub fn borate_alkalinity_umol_kg(&self, ph: f64) -> f64 {
        self.borate_alkalinity(hydrogen_ion(ph)) * 1e6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T25: f64 = 298.15;

    fn rel(a: f64, b: f64) -> f64 {
        ((a - b) / b).abs()
    }

    #[test]
    fn reference_values_at_s35_25c() {
        let c = EquilibriumConstants::new(35.0, T25);
        assert!(rel(c.ionic_strength, 0.722_763_195_398_129_2) < 1e-12);
        assert!((-c.k1.log10() - 5.837_229_397_751_952).abs() < 1e-9);
        assert!((-c.k2.log10() - 8.955_396_721_448_937).abs() < 1e-9);
        assert!((c.kw.ln() + 30.433_844_133_033_49).abs() < 1e-9);
        assert!((c.kb.ln() + 19.796_402_001_747_48).abs() < 1e-9);
        assert!(rel(c.total_borate, 0.000_416) < 1e-12);
        assert!(rel(c.dic, 0.002_05) < 1e-12);
    }

    #[test]
    fn zero_salinity_is_finite() {
        let c = EquilibriumConstants::new(0.0, T25);
        assert_eq!(c.ionic_strength, 0.0);
        assert_eq!(c.total_borate, 0.0);
        assert!(c.k1.is_finite() && c.k2.is_finite() && c.kw.is_finite() && c.kb.is_finite());
    }

    #[test]
    fn carbonate_alkalinity_vanishes_in_strong_acid() {
        let c = EquilibriumConstants::new(35.0, T25);
        let ac = c.carbonate_alkalinity(hydrogen_ion(2.0));
        assert!(ac < 1e-6 * c.dic);
        // At high pH nearly all DIC is carbonate, contributing twice.
        let ac_hi = c.carbonate_alkalinity(hydrogen_ion(12.0));
        assert!(rel(ac_hi, 2.0 * c.dic) < 1e-3);
    }

    #[test]
    fn borate_alkalinity_at_ph8() {
        let c = EquilibriumConstants::new(35.0, T25);
        assert!((c.borate_alkalinity_umol_kg(8.0) - 83.905_978_495_574_67).abs() < 1e-6);
    }
}
