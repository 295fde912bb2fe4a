//! `From` implementations bridging `titrator_config` tables to runtime config.

use crate::config::{ControlCfg, SyringeCfg, TimingCfg};

// ── ControlCfg ───────────────────────────────────────────────────────────────

impl From<&titrator_config::Titration> for ControlCfg {
    fn from(c: &titrator_config::Titration) -> Self {
        Self {
            first_phase_threshold_ph: c.first_phase_threshold_ph,
            first_phase_margin_ph: c.first_phase_margin_ph,
            second_phase_end_ph: c.second_phase_end_ph,
            second_phase_step_ph: c.second_phase_step_ph,
            max_steps: c.max_steps,
            gran_max_ph: c.gran_max_ph,
        }
    }
}

// ── TimingCfg ────────────────────────────────────────────────────────────────

impl From<&titrator_config::Timing> for TimingCfg {
    fn from(c: &titrator_config::Timing) -> Self {
        Self {
            fill_settle_ms: c.fill_settle_ms,
            first_phase_settle_ms: c.first_phase_settle_ms,
            second_phase_settle_ms: c.second_phase_settle_ms,
        }
    }
}

// ── SyringeCfg ───────────────────────────────────────────────────────────────

impl From<&titrator_config::PumpCfg> for SyringeCfg {
    fn from(c: &titrator_config::PumpCfg) -> Self {
        Self {
            volume_l: c.syringe_volume_l,
            steps: c.syringe_steps,
            wash_cycles: c.wash_cycles,
        }
    }
}
