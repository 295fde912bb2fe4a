//! Runtime configuration for the step controller.
//!
//! Separate from the TOML schema in `titrator_config`; see `conversions`.

/// Two-phase control parameters (pH units).
#[derive(Debug, Clone, PartialEq)]
pub struct ControlCfg {
    /// Coarse phase runs while the last reading is at or above this pH.
    pub first_phase_threshold_ph: f64,
    /// Coarse dose target is `first_phase_threshold_ph - first_phase_margin_ph`.
    pub first_phase_margin_ph: f64,
    /// Fine phase runs while the last reading is at or above this pH.
    pub second_phase_end_ph: f64,
    /// Fine dose target is the last reading minus this decrement.
    pub second_phase_step_ph: f64,
    /// Fine phase also stops once the dose count reaches this.
    pub max_steps: usize,
    /// Upper bound of the Gran region handed to the endpoint solver.
    pub gran_max_ph: f64,
}

impl ControlCfg {
    #[inline]
    pub fn first_phase_target_ph(&self) -> f64 {
        self.first_phase_threshold_ph - self.first_phase_margin_ph
    }
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            first_phase_threshold_ph: 3.8,
            first_phase_margin_ph: 0.01,
            second_phase_end_ph: 3.0,
            second_phase_step_ph: 0.1,
            max_steps: 25,
            gran_max_ph: crate::endpoint::GRAN_MAX_PH,
        }
    }
}

/// Settle waits in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingCfg {
    /// After filling the syringe.
    pub fill_settle_ms: u64,
    /// After each coarse dose, before reading.
    pub first_phase_settle_ms: u64,
    /// After each fine dose, before reading.
    pub second_phase_settle_ms: u64,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            fill_settle_ms: 15_000,
            first_phase_settle_ms: 15_000,
            second_phase_settle_ms: 12_000,
        }
    }
}

/// Syringe geometry, used by hosts to size simulated or real pumps.
#[derive(Debug, Clone, PartialEq)]
pub struct SyringeCfg {
    pub volume_l: f64,
    pub steps: u32,
    pub wash_cycles: u32,
}

impl Default for SyringeCfg {
    fn default() -> Self {
        Self {
            volume_l: 0.002_478,
            steps: 48_000,
            wash_cycles: 3,
        }
    }
}
