//! Pulse delays, widths and energies derived from a processed event
//!
//! The power based metrics need the [PulseCharacterization] of the event;
//! the current based ones only need its [ImageProfile]. An event with no
//! bunch yields empty results.

use crate::{
    math::{argmax, fwhm, quadratic_peak},
    parameters::UnsupportedMethod,
    profile::ImageProfile,
    reconstruction::PulseCharacterization,
};
use ndarray::{Array2, Axis};
use rustfft::{num_complex::Complex, FftPlanner};
use std::str::FromStr;
use strum_macros::{Display, EnumIter, EnumString};

/// Power estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display, EnumIter)]
pub enum PowerMethod {
    /// energy spread growth
    #[strum(serialize = "RMS")]
    Rms,
    /// energy loss
    #[strum(serialize = "COM")]
    Com,
    /// average of both
    #[default]
    #[strum(serialize = "RMSCOM")]
    RmsCom,
}
impl PowerMethod {
    pub fn parse(method: &str) -> std::result::Result<Self, UnsupportedMethod> {
        Self::from_str(method).map_err(|_| UnsupportedMethod(method.to_string()))
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MetricsError {
    #[error("quadratic peak fit failed for bunch #{bunch}")]
    FitFailure { bunch: usize },
    #[error(transparent)]
    UnsupportedMethod(#[from] UnsupportedMethod),
    #[error("zero length time axis")]
    Degenerate,
}
type Result<T> = std::result::Result<T, MetricsError>;

impl PulseCharacterization {
    /// Power profiles [GW], one row per bunch
    pub fn power(&self, method: PowerMethod) -> Array2<f64> {
        match method {
            PowerMethod::Rms => self.power_erms.clone(),
            PowerMethod::Com => self.power_ecom.clone(),
            PowerMethod::RmsCom => (&self.power_ecom + &self.power_erms) / 2.,
        }
    }
    /// Radiated energy per bunch [J]
    pub fn energy_per_bunch(&self, method: PowerMethod) -> Vec<f64> {
        match method {
            PowerMethod::Rms => self.lasing_energy_per_bunch_erms.clone(),
            PowerMethod::Com => self.lasing_energy_per_bunch_ecom.clone(),
            PowerMethod::RmsCom => self
                .lasing_energy_per_bunch_ecom
                .iter()
                .zip(&self.lasing_energy_per_bunch_erms)
                .map(|(a, b)| (a + b) / 2.)
                .collect(),
        }
    }
    /// Master time shifted by the delay of bunch `j`
    fn bunch_time(&self, j: usize) -> Vec<f64> {
        self.t.iter().map(|t| t + self.bunch_delay[j]).collect()
    }
}

/// Time of the power peak of each bunch [fs]
pub fn pulse_delay(pc: &PulseCharacterization, method: PowerMethod) -> Result<Vec<f64>> {
    let power = pc.power(method);
    power
        .axis_iter(Axis(0))
        .enumerate()
        .map(|(j, row)| {
            let (t, power) = (pc.bunch_time(j), row.to_vec());
            argmax(&power)
                .and_then(|central| quadratic_peak(&t, &power, central))
                .ok_or(MetricsError::FitFailure { bunch: j })
        })
        .collect()
}

/// Full width at half maximum of the power profile of each bunch [fs]
pub fn pulse_fwhm(pc: &PulseCharacterization, method: PowerMethod) -> Result<Vec<f64>> {
    let power = pc.power(method);
    power
        .axis_iter(Axis(0))
        .enumerate()
        .map(|(j, row)| {
            fwhm(&pc.bunch_time(j), &row.to_vec()).ok_or(MetricsError::FitFailure { bunch: j })
        })
        .collect()
}

/// Time axes [fs] and power profiles [GW] of each bunch
pub fn xray_power(pc: &PulseCharacterization, method: PowerMethod) -> (Array2<f64>, Array2<f64>) {
    let t = Array2::from_shape_fn((pc.num_bunches, pc.t.len()), |(j, i)| {
        pc.t[i] + pc.bunch_delay[j]
    });
    (t, pc.power(method))
}

/// Radiated energy of each bunch [J]
pub fn xray_energy_per_bunch(pc: &PulseCharacterization, method: PowerMethod) -> Vec<f64> {
    pc.energy_per_bunch(method)
}

/// Mean agreement of the ECOM and ERMS power profiles
///
/// `None` when there is no bunch.
pub fn reconstruction_agreement(pc: &PulseCharacterization) -> Option<f64> {
    let n = pc.power_agreement.len();
    (n > 0).then(|| pc.power_agreement.iter().sum::<f64>() / n as f64)
}

/// Time axes [fs] and electron current profiles [arb. units] of each bunch
pub fn electron_current_per_bunch(profile: &ImageProfile) -> (Array2<f64>, Array2<f64>) {
    let xfs = &profile.physical_units.xfs;
    let shape = (profile.num_bunches(), xfs.len());
    let t = Array2::from_shape_fn(shape, |(_, i)| xfs[i]);
    let current = Array2::from_shape_fn(shape, |(j, i)| profile.image_stats[j].x_profile[i]);
    (t, current)
}

/// Time of the peak electron current of each bunch [fs]
pub fn inter_bunch_pulse_delay_based_on_current(profile: &ImageProfile) -> Result<Vec<f64>> {
    let t = &profile.physical_units.xfs;
    profile
        .image_stats
        .iter()
        .enumerate()
        .map(|(j, stats)| {
            argmax(&stats.x_profile)
                .and_then(|central| quadratic_peak(t, &stats.x_profile, central))
                .ok_or(MetricsError::FitFailure { bunch: j })
        })
        .collect()
}

/// Times of the `n` highest electron current peaks of each bunch [fs]
///
/// Each peak found is suppressed from the current profile by a Gaussian notch
/// of full width at half maximum `filter_width` [fs] before looking for the
/// next one. A bunch whose first peak cannot be fitted fails the whole
/// request; later failures are reported as `NaN`.
pub fn inter_bunch_pulse_delay_based_on_current_multiple(
    profile: &ImageProfile,
    n: usize,
    filter_width: f64,
) -> Result<Array2<f64>> {
    let t = &profile.physical_units.xfs;
    let sigma = filter_width / (2. * 2f64.ln().sqrt());
    let mut peaks = Array2::from_elem((profile.num_bunches(), n), f64::NAN);
    for (j, stats) in profile.image_stats.iter().enumerate() {
        let mut current = stats.x_profile.clone();
        for k in 0..n {
            let Some(peak) = argmax(&current).and_then(|central| quadratic_peak(t, &current, central))
            else {
                if k == 0 {
                    return Err(MetricsError::FitFailure { bunch: j });
                }
                log::debug!("bunch #{}: no current peak #{}", j, k);
                break;
            };
            peaks[[j, k]] = peak;
            current
                .iter_mut()
                .zip(t)
                .for_each(|(c, t)| *c *= 1. - (-((t - peak) / sigma).powi(2)).exp());
        }
    }
    Ok(peaks)
}

/// Time of the electron current peak of each bunch after Fourier filtering [fs]
///
/// The current profile, thresholded at `threshold_factor` times its maximum,
/// is filtered in frequency space by `1 - exp(-(f target_width_fs)^6)`, a
/// high-frequency-pass window that damps the features broader than
/// `target_width_fs`. The maximum of the filtered profile sets the window of
/// the quadratic fit of the unfiltered profile.
pub fn inter_bunch_pulse_delay_based_on_current_fourier_filtered(
    profile: &ImageProfile,
    target_width_fs: f64,
    threshold_factor: f64,
) -> Result<Vec<f64>> {
    let t = &profile.physical_units.xfs;
    let n = t.len();
    let dt = profile.physical_units.xfs_per_pix.abs();
    if dt * n as f64 == 0. {
        return Err(MetricsError::Degenerate);
    }
    let df = 1. / (dt * n as f64);
    let filter: Vec<f64> = (0..n)
        .map(|k| {
            let f = if k <= n / 2 {
                k as f64
            } else {
                k as f64 - n as f64
            } * df;
            1. - (-(f * target_width_fs).powi(6)).exp()
        })
        .collect();

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    let ifft = planner.plan_fft_inverse(n);
    profile
        .image_stats
        .iter()
        .enumerate()
        .map(|(j, stats)| {
            let current = &stats.x_profile;
            let threshold =
                current.iter().cloned().fold(f64::NEG_INFINITY, f64::max) * threshold_factor;
            let mut buffer: Vec<Complex<f64>> = current
                .iter()
                .map(|c| Complex::new((c - threshold).max(0.), 0.))
                .collect();
            fft.process(&mut buffer);
            buffer.iter_mut().zip(&filter).for_each(|(b, f)| *b *= *f);
            ifft.process(&mut buffer);
            let filtered: Vec<f64> = buffer.iter().map(|b| b.re / n as f64).collect();
            argmax(&filtered)
                .and_then(|central| quadratic_peak(t, current, central))
                .ok_or(MetricsError::FitFailure { bunch: j })
        })
        .collect()
}
