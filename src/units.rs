//! Physical time and energy axes

use crate::{
    calibration::GlobalCalibration, constants::MIN_COS_PHASE, profile::ImageStats, roi::Roi,
    shot::ShotToShotParameters,
};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum UnitsError {
    #[error("invalid shot to shot parameters")]
    InvalidShot,
    #[error("XTCAV RF phase too far from the calibration phase (cos = {0})")]
    PhaseOffCrest(f64),
    #[error("degenerate calibration: {0} fs/pixel, {1} MeV/pixel")]
    CalibrationInvalid(f64, f64),
    #[error("no bunch to center the axes on")]
    NoBunch,
}
type Result<T> = std::result::Result<T, UnitsError>;

/// Time and energy axes of the ROI
///
/// The time axis is stored increasing; [normalize] reverses the image
/// statistics when the raw time step is negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalUnits {
    /// time of each ROI column [fs]
    pub xfs: Vec<f64>,
    /// energy of each ROI row [MeV]
    pub y_mev: Vec<f64>,
    pub xfs_per_pix: f64,
    pub y_mev_per_pix: f64,
}
impl PhysicalUnits {
    /// Time step of the stored time axis [fs]
    pub fn dt(&self) -> f64 {
        match self.xfs.as_slice() {
            [t0, t1, ..] => t1 - t0,
            _ => self.xfs_per_pix.abs(),
        }
    }
}

/// Computes the physical axes centered on the first bunch center of mass
pub fn calculate_physical_units(
    roi: &Roi,
    center: (f64, f64),
    shot: &ShotToShotParameters,
    global: &GlobalCalibration,
) -> Result<PhysicalUnits> {
    if !shot.valid {
        return Err(UnitsError::InvalidShot);
    }
    let y_mev_per_pix = global.um_per_pix * global.dump_e / global.dump_disp * 1e-3 * roi.y_step;
    let cos_phase = ((global.rf_phase_calib - shot.xtcav_rf_phase).to_radians()).cos();
    if !(cos_phase.abs() >= MIN_COS_PHASE) {
        return Err(UnitsError::PhaseOffCrest(cos_phase));
    }
    let xfs_per_pix = -global.um_per_pix * global.rf_amp_calib
        / (0.3 * global.str_strength * shot.xtcav_rf_amplitude)
        * cos_phase.signum()
        * roi.x_step;
    if [xfs_per_pix, y_mev_per_pix]
        .iter()
        .any(|x| *x == 0. || !x.is_finite())
        || !(center.0.is_finite() && center.1.is_finite())
    {
        return Err(UnitsError::CalibrationInvalid(xfs_per_pix, y_mev_per_pix));
    }
    let (x_com, y_com) = center;
    Ok(PhysicalUnits {
        xfs: roi
            .x_pixels()
            .into_iter()
            .map(|x| xfs_per_pix * (x - x_com))
            .collect(),
        y_mev: roi
            .y_pixels()
            .into_iter()
            .map(|y| y_mev_per_pix * (y - y_com))
            .collect(),
        xfs_per_pix,
        y_mev_per_pix,
    })
}

/// Computes the physical axes of the bunches and orders every time trace by increasing time
pub fn normalize(
    image_stats: Vec<ImageStats>,
    roi: &Roi,
    shot: &ShotToShotParameters,
    global: &GlobalCalibration,
) -> Result<(Vec<ImageStats>, PhysicalUnits)> {
    let first = image_stats.first().ok_or(UnitsError::NoBunch)?;
    let mut units = calculate_physical_units(roi, (first.x_com, first.y_com), shot, global)?;
    let image_stats = if units.xfs_per_pix < 0. {
        units.xfs.reverse();
        image_stats.into_iter().map(ImageStats::reversed).collect()
    } else {
        image_stats
    };
    Ok((image_stats, units))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shot::{EBeam, EventId, GasDetector};

    fn shot(phase: f64) -> ShotToShotParameters {
        ShotToShotParameters::new(
            Some(&EBeam {
                charge: 0.15,
                xtcav_rf_amplitude: 20.,
                xtcav_rf_phase: phase,
                dump_charge: 1e9,
            }),
            Some(&GasDetector {
                f_11_enrc: 1.,
                f_12_enrc: 1.,
            }),
            EventId::default(),
        )
    }

    #[test]
    fn scales() {
        let global = GlobalCalibration::default();
        let roi = Roi::new(10, 0, 5, 3);
        let units = calculate_physical_units(&roi, (12., 1.), &shot(90.), &global).unwrap();
        let fs = 12.5 * 20. / (0.3 * 55. * 20.);
        assert!((units.xfs_per_pix + fs).abs() < 1e-12);
        assert!((units.y_mev_per_pix - 12.5 * 4500. / 0.6 * 1e-3).abs() < 1e-9);
        assert_eq!(units.xfs[2], 0.);
        assert_eq!(units.y_mev[1], 0.);
        let units = calculate_physical_units(&roi, (12., 1.), &shot(270.), &global).unwrap();
        assert!((units.xfs_per_pix - fs).abs() < 1e-12);
    }

    #[test]
    fn invalid() {
        let global = GlobalCalibration::default();
        let roi = Roi::new(0, 0, 5, 3);
        assert_eq!(
            calculate_physical_units(&roi, (2., 1.), &shot(0.), &global),
            Err(UnitsError::PhaseOffCrest((90f64).to_radians().cos()))
        );
        let mut bad = shot(90.);
        bad.valid = false;
        assert_eq!(
            calculate_physical_units(&roi, (2., 1.), &bad, &global),
            Err(UnitsError::InvalidShot)
        );
        let global = GlobalCalibration {
            dump_e: 0.,
            ..Default::default()
        };
        assert!(matches!(
            calculate_physical_units(&roi, (2., 1.), &shot(90.), &global),
            Err(UnitsError::CalibrationInvalid(..))
        ));
        assert!(matches!(
            calculate_physical_units(&roi, (f64::NAN, 1.), &shot(90.), &GlobalCalibration::default()),
            Err(UnitsError::CalibrationInvalid(..))
        ));
    }

    #[test]
    fn increasing_time() {
        let roi = Roi::new(0, 0, 3, 1);
        let stats = ImageStats {
            im_frac: 1.,
            x_profile: vec![1., 2., 3.],
            y_profile: vec![6.],
            x_com: 4. / 3.,
            y_com: 0.,
            x_rms: 0.,
            y_rms: 0.,
            x_fwhm: 0.,
            y_fwhm: 0.,
            y_com_slice: vec![0.; 3],
            y_rms_slice: vec![0.; 3],
        };
        let (stats, units) = normalize(
            vec![stats.clone(), stats],
            &roi,
            &shot(90.),
            &GlobalCalibration::default(),
        )
        .unwrap();
        assert!(units.xfs.windows(2).all(|w| w[1] > w[0]));
        assert!(units.dt() > 0.);
        assert!(stats.iter().all(|s| s.x_profile == vec![3., 2., 1.]));
    }
}
