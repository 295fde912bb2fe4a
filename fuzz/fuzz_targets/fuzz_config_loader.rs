#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    let Ok(cfg) = titrator_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    // Anything validate() accepts must describe a runnable two-phase titration.
    let t = &cfg.titration;
    assert!(t.second_phase_end_ph < t.first_phase_threshold_ph);
    assert!(t.first_phase_threshold_ph - t.first_phase_margin_ph > 0.0);
    assert!(t.second_phase_step_ph > 0.0 && t.max_steps >= 1);
    assert!(cfg.pump.syringe_volume_l > 0.0 && cfg.pump.syringe_steps >= 1);
});
