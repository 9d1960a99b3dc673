//! Shot to shot beam parameters

use crate::constants::E_CHARGE;
use serde::{Deserialize, Serialize};

/// Electron beam diagnostics reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EBeam {
    /// bunch charge [nC]
    pub charge: f64,
    /// XTCAV RF amplitude [MV]
    pub xtcav_rf_amplitude: f64,
    /// XTCAV RF phase [deg]
    pub xtcav_rf_phase: f64,
    /// charge measured at the beam dump [electrons]
    pub dump_charge: f64,
}

/// Gas detector pulse energy reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GasDetector {
    /// pulse energy of channel 11 [mJ]
    pub f_11_enrc: f64,
    /// pulse energy of channel 12 [mJ]
    pub f_12_enrc: f64,
}
impl GasDetector {
    /// Pulse energy [J]
    pub fn xray_energy(&self) -> f64 {
        1e-3 * 0.5 * (self.f_11_enrc + self.f_12_enrc)
    }
}

/// Event timestamp
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventId {
    pub seconds: u32,
    pub nanoseconds: u32,
    pub fiducial: u32,
}
impl EventId {
    /// Seconds and nanoseconds packed in the upper and lower 32 bits
    pub fn unix_time(&self) -> u64 {
        ((self.seconds as u64) << 32) | self.nanoseconds as u64
    }
}

/// Per-event beam parameters used by the reconstruction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShotToShotParameters {
    /// bunch charge [nC]
    pub ebeam_charge: f64,
    /// XTCAV RF amplitude [MV]
    pub xtcav_rf_amplitude: f64,
    /// XTCAV RF phase [deg]
    pub xtcav_rf_phase: f64,
    /// charge at the beam dump [C]
    pub dump_e_charge: f64,
    /// X-ray pulse energy from the gas detector [J]
    pub xray_energy: f64,
    pub unix_time: u64,
    pub fiducial: u32,
    pub valid: bool,
}
impl ShotToShotParameters {
    pub fn new(ebeam: Option<&EBeam>, gas_detector: Option<&GasDetector>, id: EventId) -> Self {
        let mut valid = true;
        let (ebeam_charge, xtcav_rf_amplitude, xtcav_rf_phase, dump_e_charge) = match ebeam {
            Some(ebeam) => (
                ebeam.charge,
                ebeam.xtcav_rf_amplitude,
                ebeam.xtcav_rf_phase,
                ebeam.dump_charge * E_CHARGE,
            ),
            None => {
                log::warn!("no e-beam data for event {}", id.fiducial);
                valid = false;
                (f64::NAN, f64::NAN, f64::NAN, f64::NAN)
            }
        };
        let xray_energy = match gas_detector {
            Some(gas_detector) => gas_detector.xray_energy(),
            None => {
                log::warn!("no gas detector data for event {}", id.fiducial);
                valid = false;
                f64::NAN
            }
        };
        if valid
            && ![
                ebeam_charge,
                xtcav_rf_amplitude,
                xtcav_rf_phase,
                dump_e_charge,
                xray_energy,
            ]
            .iter()
            .all(|x| x.is_finite())
        {
            log::warn!("non-finite beam parameters for event {}", id.fiducial);
            valid = false;
        }
        if valid && dump_e_charge <= 0. {
            log::warn!("no charge at the beam dump for event {}", id.fiducial);
            valid = false;
        }
        Self {
            ebeam_charge,
            xtcav_rf_amplitude,
            xtcav_rf_phase,
            dump_e_charge,
            xray_energy,
            unix_time: id.unix_time(),
            fiducial: id.fiducial,
            valid,
        }
    }
    /// Number of electrons reaching the dump
    pub fn n_electrons(&self) -> f64 {
        self.dump_e_charge / E_CHARGE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ebeam() -> EBeam {
        EBeam {
            charge: 0.15,
            xtcav_rf_amplitude: 20.,
            xtcav_rf_phase: 90.,
            dump_charge: 1e9,
        }
    }
    fn gas() -> GasDetector {
        GasDetector {
            f_11_enrc: 1.,
            f_12_enrc: 3.,
        }
    }

    #[test]
    fn valid_shot() {
        let id = EventId {
            seconds: 1,
            nanoseconds: 2,
            fiducial: 3,
        };
        let shot = ShotToShotParameters::new(Some(&ebeam()), Some(&gas()), id);
        assert!(shot.valid);
        assert!((shot.xray_energy - 2e-3).abs() < 1e-15);
        assert!((shot.n_electrons() - 1e9).abs() < 1e-3);
        assert_eq!(shot.unix_time, (1u64 << 32) | 2);
    }

    #[test]
    fn missing_inputs() {
        let id = EventId::default();
        assert!(!ShotToShotParameters::new(None, Some(&gas()), id).valid);
        assert!(!ShotToShotParameters::new(Some(&ebeam()), None, id).valid);
        let no_dump = EBeam {
            dump_charge: 0.,
            ..ebeam()
        };
        assert!(!ShotToShotParameters::new(Some(&no_dump), Some(&gas()), id).valid);
        let nan = EBeam {
            xtcav_rf_phase: f64::NAN,
            ..ebeam()
        };
        assert!(!ShotToShotParameters::new(Some(&nan), Some(&gas()), id).valid);
    }
}
