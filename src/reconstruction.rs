//! X-ray power reconstruction from lasing on/off electron beam comparison
//!
//! The lasing shot electron current, slice energy center of mass (COM) and
//! slice energy spread (RMS) are compared to the best matching group of the
//! lasing off reference. Energy lost by the electrons gives the ECOM power
//! estimate and energy spread growth the ERMS estimate. Both estimates are
//! normalized to the pulse energy measured by the gas detector.

use crate::{
    calibration::AveragedProfiles,
    constants::{CURRENT_THRESHOLD, E_CHARGE, FS_TO_S},
    math::{agreement, argmax, interp, pearson},
    profile::ImageProfile,
};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ReconstructionError {
    #[error("no lasing off reference available")]
    ReferenceMissing,
    #[error("{image} bunches in the image but {reference} in the lasing off reference")]
    BunchMismatch { image: usize, reference: usize },
    #[error("degenerate electron current for bunch #{0}")]
    Degenerate(usize),
    #[error("invalid lasing off reference: {0}")]
    InvalidReference(String),
}
type Result<T> = std::result::Result<T, ReconstructionError>;

/// Reconstructed X-ray pulses of one event
///
/// 2D arrays have one row per bunch and one column per sample of the master
/// time `t`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseCharacterization {
    /// master time [fs]
    pub t: Vec<f64>,
    /// ECOM power before the gas detector normalization [GW]
    pub power_raw_ecom: Array2<f64>,
    /// ERMS power before the gas detector normalization [arb. units]
    pub power_raw_erms: Array2<f64>,
    /// ECOM power [GW]
    pub power_ecom: Array2<f64>,
    /// ERMS power [GW]
    pub power_erms: Array2<f64>,
    /// agreement of the ECOM and ERMS powers, per bunch
    pub power_agreement: Vec<f64>,
    /// delay with respect to the first bunch [fs]
    pub bunch_delay: Vec<f64>,
    /// delay change with respect to the lasing off reference [fs]
    pub bunch_delay_change: Vec<f64>,
    /// gas detector pulse energy [J]
    pub xray_energy: f64,
    /// radiated energy from the ECOM power [J]
    pub lasing_energy_per_bunch_ecom: Vec<f64>,
    /// radiated energy from the ERMS power [J]
    pub lasing_energy_per_bunch_erms: Vec<f64>,
    /// energy difference with respect to the first bunch [MeV]
    pub bunch_energy_diff: Vec<f64>,
    /// energy difference change with respect to the lasing off reference [MeV]
    pub bunch_energy_diff_change: Vec<f64>,
    /// electron current [electrons/s]
    pub lasing_e_current: Array2<f64>,
    pub nolasing_e_current: Array2<f64>,
    /// slice energy center of mass [MeV]
    pub lasing_ecom: Array2<f64>,
    pub nolasing_ecom: Array2<f64>,
    /// slice energy spread [MeV]
    pub lasing_erms: Array2<f64>,
    pub nolasing_erms: Array2<f64>,
    pub num_bunches: usize,
    /// lasing off reference group matched to each bunch
    pub group_num: Vec<usize>,
}

/// Inclusive range of the samples at or above a fraction of the peak
fn support(current: ArrayView1<f64>, fraction: f64) -> Option<(usize, usize)> {
    let max = current.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
    if !(max > 0.) {
        return None;
    }
    let threshold = max * fraction;
    let first = current.iter().position(|&v| v >= threshold)?;
    let last = current.iter().rposition(|&v| v >= threshold)?;
    Some((first, last))
}

fn positive_sum(power: &Array2<f64>) -> f64 {
    power.iter().filter(|&&p| p > 0.).sum()
}

/// Reconstructs the X-ray power of every bunch of a lasing shot
pub fn process_lasing_single_shot(
    profile: &ImageProfile,
    reference: &AveragedProfiles,
) -> Result<PulseCharacterization> {
    reference
        .check()
        .map_err(|e| ReconstructionError::InvalidReference(e.to_string()))?;
    let num_bunches = profile.num_bunches();
    if reference.num_bunches() != num_bunches {
        return Err(ReconstructionError::BunchMismatch {
            image: num_bunches,
            reference: reference.num_bunches(),
        });
    }
    let t = reference.t.clone();
    let n = t.len();
    let dt = (t[n - 1] - t[0]) / (n - 1) as f64;
    let units = &profile.physical_units;
    let dt_old = units.dt();
    let n_electrons = profile.shot_to_shot.n_electrons();
    let xray_energy = profile.shot_to_shot.xray_energy;
    log::debug!(
        "reconstructing {} bunches on {} samples ({} fs)",
        num_bunches,
        n,
        dt
    );

    let zeros = || Array2::<f64>::zeros((num_bunches, n));
    let (mut lasing_e_current, mut nolasing_e_current) = (zeros(), zeros());
    let (mut lasing_ecom, mut nolasing_ecom) = (zeros(), zeros());
    let (mut lasing_erms, mut nolasing_erms) = (zeros(), zeros());
    let mut bunch_delay = vec![0f64; num_bunches];
    let mut bunch_delay_change = vec![0f64; num_bunches];
    let mut bunch_energy_diff = vec![0f64; num_bunches];
    let mut bunch_energy_diff_change = vec![0f64; num_bunches];
    let mut group_num = vec![0usize; num_bunches];

    for (j, stats) in profile.image_stats.iter().enumerate() {
        let first = &profile.image_stats[0];
        bunch_delay[j] = (stats.x_com - first.x_com) * units.xfs_per_pix;
        bunch_energy_diff[j] = (stats.y_com - first.y_com) * units.y_mev_per_pix;

        let e_current: Vec<f64> = stats
            .x_profile
            .iter()
            .map(|p| p / (dt_old * FS_TO_S) * n_electrons)
            .collect();
        let e_com: Vec<f64> = stats
            .y_com_slice
            .iter()
            .map(|y| (y - stats.y_com) * units.y_mev_per_pix)
            .collect();
        let e_rms: Vec<f64> = stats
            .y_rms_slice
            .iter()
            .map(|y| y * units.y_mev_per_pix.abs())
            .collect();
        let shifted: Vec<f64> = units.xfs.iter().map(|x| x - bunch_delay[j]).collect();
        let current = Array1::from(interp(&t, &shifted, &e_current));
        if !current.iter().any(|&c| c > 0.) {
            return Err(ReconstructionError::Degenerate(j));
        }

        let groups = &reference.e_current[j];
        let correlations: Vec<f64> = groups
            .axis_iter(Axis(0))
            .map(|row| pearson(current.as_slice().unwrap_or(&[]), &row.to_vec()))
            .collect();
        let g = argmax(&correlations).unwrap_or(0);
        group_num[j] = g;
        bunch_delay_change[j] = bunch_delay[j] - reference.dist_t[j][g];
        bunch_energy_diff_change[j] = bunch_energy_diff[j] - reference.dist_e[j][g];

        let nolasing_current = groups.row(g);
        lasing_e_current.row_mut(j).assign(&current);
        nolasing_e_current.row_mut(j).assign(&nolasing_current);

        let (ind1, ind2) = match (
            support(current.view(), CURRENT_THRESHOLD),
            support(nolasing_current, CURRENT_THRESHOLD),
        ) {
            (Some((a1, a2)), Some((b1, b2))) => {
                let ind2 = a2.min(b2);
                (a1.max(b1).min(ind2), ind2)
            }
            _ => {
                log::warn!("no overlap of lasing on/off currents for bunch #{}", j);
                (0, 0)
            }
        };
        let e_com = interp(&t, &shifted, &e_com);
        let e_rms = interp(&t, &shifted, &e_rms);
        let reference_com = reference.e_com_slice[j].row(g);
        let reference_rms = reference.e_rms_slice[j].row(g);
        for i in ind1..ind2 {
            lasing_ecom[[j, i]] = e_com[i];
            lasing_erms[[j, i]] = e_rms[i];
            nolasing_ecom[[j, i]] = reference_com[i];
            nolasing_erms[[j, i]] = reference_rms[i];
        }
    }

    let ecom_energy_loss = (&nolasing_ecom - &lasing_ecom) * E_CHARGE * 1e6;
    let power_ecom = &ecom_energy_loss * &lasing_e_current;
    let power_erms = (lasing_erms.mapv(|x| x * x) - nolasing_erms.mapv(|x| x * x))
        * lasing_e_current.mapv(|i| i.max(0.).powf(2. / 3.));
    let power_raw_ecom = &power_ecom * 1e-9;
    let power_raw_erms = power_erms.clone();

    let e_offset = (xray_energy - positive_sum(&power_ecom) * dt * FS_TO_S) / n_electrons;
    let e_scale = positive_sum(&power_erms) * dt * FS_TO_S;
    let power_ecom = ((ecom_energy_loss + e_offset) * &lasing_e_current * 1e-9).mapv(|p| p.max(0.));
    let power_erms = if e_scale > 0. {
        (power_erms * (xray_energy / e_scale * 1e-9)).mapv(|p| p.max(0.))
    } else {
        log::warn!("no energy spread growth, ERMS power set to 0");
        zeros()
    };

    let energy = |power: &Array2<f64>| -> Vec<f64> {
        power
            .axis_iter(Axis(0))
            .map(|row| row.sum() * dt * FS_TO_S * 1e9)
            .collect()
    };
    let power_agreement = power_ecom
        .axis_iter(Axis(0))
        .zip(power_erms.axis_iter(Axis(0)))
        .map(|(a, b)| agreement(&a.to_vec(), &b.to_vec()))
        .collect();

    Ok(PulseCharacterization {
        lasing_energy_per_bunch_ecom: energy(&power_ecom),
        lasing_energy_per_bunch_erms: energy(&power_erms),
        t,
        power_raw_ecom,
        power_raw_erms,
        power_ecom,
        power_erms,
        power_agreement,
        bunch_delay,
        bunch_delay_change,
        xray_energy,
        bunch_energy_diff,
        bunch_energy_diff_change,
        lasing_e_current,
        nolasing_e_current,
        lasing_ecom,
        nolasing_ecom,
        lasing_erms,
        nolasing_erms,
        num_bunches,
        group_num,
    })
}
