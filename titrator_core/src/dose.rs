//! Acid volume needed to move the sample from one pH to a lower one.
//!
//! Finite-difference proton balance: the acid covers the change in free
//! `[H+]` net of carbonate and borate alkalinity consumed and of water
//! autoionization.

use crate::equilibrium::{EquilibriumConstants, hydrogen_ion};
use crate::error::{Result, TitratorError};
use crate::session::TitrationSession;

/// Volume (L) of acid at `acid_conc_mol_l` that takes `mass_kg` of sample
/// from `current_ph` to `target_ph`.
///
/// `target_ph` above `current_ph` is rejected. Equal values give 0.
pub fn acid_volume_between(
    constants: &EquilibriumConstants,
    mass_kg: f64,
    acid_conc_mol_l: f64,
    current_ph: f64,
    target_ph: f64,
) -> Result<f64> {
    if !(current_ph.is_finite() && target_ph.is_finite()) || target_ph > current_ph {
        return Err(eyre::Report::new(TitratorError::InvalidTarget {
            current: current_ph,
            target: target_ph,
        }));
    }
    let h_cur = hydrogen_ion(current_ph);
    let h_tgt = hydrogen_ion(target_ph);

    let d_h = h_tgt - h_cur;
    let d_ac = constants.carbonate_alkalinity(h_tgt) - constants.carbonate_alkalinity(h_cur);
    let d_ab = constants.borate_alkalinity(h_tgt) - constants.borate_alkalinity(h_cur);
    let d_w = constants.kw * (1.0 / h_tgt - 1.0 / h_cur);

    let volume = mass_kg / acid_conc_mol_l * (d_h - d_ac - d_ab - d_w);
    if !volume.is_finite() || volume < 0.0 {
        return Err(eyre::Report::new(TitratorError::ImplausibleDose { volume_l: volume }));
    }
    Ok(volume)
}

/// Acid volume (L) from the session's last reading to `target_ph`.
pub fn required_acid_volume(session: &TitrationSession, target_ph: f64) -> Result<f64> {
    let p = session.params();
    acid_volume_between(
        session.constants(),
        p.mass_kg(),
        p.acid_conc_mol_l(),
        session.last_ph(),
        target_ph,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SampleParameters;
    use rstest::rstest;

    fn session(ph: f64) -> TitrationSession {
        let p = SampleParameters::new(0.1, 35.0, 0.1, 25.0).unwrap();
        TitrationSession::new(p, ph, 0.0)
    }

    #[test]
    fn coarse_dose_matches_reference() {
        let s = session(8.0);
        let v = required_acid_volume(&s, 3.79).unwrap();
        assert!((v - 0.002_474_553_534_799_941).abs() < 1e-12, "{v}");
    }

    #[test]
    fn fine_dose_is_small_and_positive() {
        let s = session(3.799_426_099_425_128);
        let v = required_acid_volume(&s, 3.699_426_099_425_128).unwrap();
        assert!(v > 0.0 && v < 1e-4, "{v}");
    }

    #[test]
    fn zero_dose_at_current_ph() {
        let s = session(5.2);
        assert_eq!(required_acid_volume(&s, 5.2).unwrap(), 0.0);
    }

    #[rstest]
    #[case(8.1)]
    #[case(5.2)]
    #[case(3.5)]
    fn dose_vanishes_as_target_approaches_current(#[case] ph: f64) {
        let s = session(ph);
        let v = required_acid_volume(&s, ph - 1e-9).unwrap();
        assert!((0.0..1e-9).contains(&v), "{v}");
    }

    #[test]
    fn target_above_current_is_rejected() {
        let s = session(4.0);
        let err = required_acid_volume(&s, 4.5).expect_err("must reject");
        match err.downcast_ref::<TitratorError>() {
            Some(TitratorError::InvalidTarget { current, target }) => {
                assert_eq!(*current, 4.0);
                assert_eq!(*target, 4.5);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn non_finite_target_is_rejected() {
        let s = session(4.0);
        assert!(required_acid_volume(&s, f64::NAN).is_err());
    }
}
