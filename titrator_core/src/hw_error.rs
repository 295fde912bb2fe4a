//! Maps `Box<dyn Error>` from the device traits to typed `TitratorError`.
//!
//! With the `hardware-errors` feature, `titrator_hardware::HwError` is
//! downcast for precise mapping; anything else falls back to string
//! heuristics.

use crate::error::TitratorError;

/// Which collaborator raised the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Pump,
    Meter,
}

pub fn map_hw_error(device: Device, e: &(dyn std::error::Error + 'static)) -> TitratorError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<titrator_hardware::error::HwError>() {
            if matches!(hw, titrator_hardware::error::HwError::Timeout) {
                return TitratorError::Timeout;
            }
            return wrap(device, hw.to_string());
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") || s.to_lowercase().contains("timed out") {
        TitratorError::Timeout
    } else {
        wrap(device, s)
    }
}

fn wrap(device: Device, msg: String) -> TitratorError {
    match device {
        Device::Pump => TitratorError::Pump(msg),
        Device::Meter => TitratorError::Meter(msg),
    }
}
