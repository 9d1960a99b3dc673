//! Per-bunch image statistics

use crate::{math::fwhm, roi::Roi, shot::ShotToShotParameters, units::PhysicalUnits};
use ndarray::{Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Statistics of one bunch image, in sensor pixel coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageStats {
    /// fraction of the image intensity in this bunch
    pub im_frac: f64,
    /// projection on the time axis (sum over the energy axis)
    pub x_profile: Vec<f64>,
    /// projection on the energy axis
    pub y_profile: Vec<f64>,
    pub x_com: f64,
    pub y_com: f64,
    pub x_rms: f64,
    pub y_rms: f64,
    pub x_fwhm: f64,
    pub y_fwhm: f64,
    /// energy center of mass of each time slice, `NaN` for empty slices
    pub y_com_slice: Vec<f64>,
    /// energy spread of each time slice, `NaN` for empty slices
    pub y_rms_slice: Vec<f64>,
}
impl ImageStats {
    pub fn new(image: ArrayView2<f64>, roi: &Roi, total: f64) -> Self {
        let x = roi.x_pixels();
        let y = roi.y_pixels();
        let x_profile = image.sum_axis(Axis(0)).to_vec();
        let y_profile = image.sum_axis(Axis(1)).to_vec();
        let sum: f64 = x_profile.iter().sum();
        let dot = |a: &[f64], b: &[f64]| a.iter().zip(b).map(|(a, b)| a * b).sum::<f64>();
        let x_com = dot(&x_profile, &x) / sum;
        let y_com = dot(&y_profile, &y) / sum;
        let x_rms = (x_profile
            .iter()
            .zip(&x)
            .map(|(p, x)| p * (x - x_com).powi(2))
            .sum::<f64>()
            / sum)
            .sqrt();
        let y_rms = (y_profile
            .iter()
            .zip(&y)
            .map(|(p, y)| p * (y - y_com).powi(2))
            .sum::<f64>()
            / sum)
            .sqrt();
        let (y_com_slice, y_rms_slice): (Vec<f64>, Vec<f64>) = image
            .axis_iter(Axis(1))
            .zip(&x_profile)
            .map(|(column, &weight)| {
                if weight == 0. {
                    return (f64::NAN, f64::NAN);
                }
                let com = column.iter().zip(&y).map(|(p, y)| p * y).sum::<f64>() / weight;
                let var = column
                    .iter()
                    .zip(&y)
                    .map(|(p, y)| p * (y - com).powi(2))
                    .sum::<f64>()
                    / weight;
                (com, var.sqrt())
            })
            .unzip();
        Self {
            im_frac: sum / total,
            x_fwhm: fwhm(&x, &x_profile).unwrap_or(f64::NAN),
            y_fwhm: fwhm(&y, &y_profile).unwrap_or(f64::NAN),
            x_profile,
            y_profile,
            x_com,
            y_com,
            x_rms,
            y_rms,
            y_com_slice,
            y_rms_slice,
        }
    }
    /// Reverses the time ordered traces
    pub fn reversed(self) -> Self {
        let rev = |mut v: Vec<f64>| {
            v.reverse();
            v
        };
        Self {
            x_profile: rev(self.x_profile),
            y_com_slice: rev(self.y_com_slice),
            y_rms_slice: rev(self.y_rms_slice),
            ..self
        }
    }
    /// True if the bunch holds no intensity
    pub fn is_empty(&self) -> bool {
        !(self.x_profile.iter().sum::<f64>() > 0.)
    }
}

/// Computes the statistics of each bunch of a `(bunch, rows, columns)` stack
pub fn process_image(images: &Array3<f64>, roi: &Roi) -> Vec<ImageStats> {
    let total = images.sum();
    images
        .axis_iter(Axis(0))
        .map(|image| ImageStats::new(image, roi, total))
        .collect()
}

/// Everything known about an event once its image has been processed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageProfile {
    pub image_stats: Vec<ImageStats>,
    pub roi: Roi,
    pub shot_to_shot: ShotToShotParameters,
    pub physical_units: PhysicalUnits,
}
impl ImageProfile {
    pub fn num_bunches(&self) -> usize {
        self.image_stats.len()
    }
}
