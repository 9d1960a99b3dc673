//! XTCAV image preprocessing
//!
//! Rows of an image run along the energy (dispersion) axis and columns along
//! the time (streaking) axis.

use crate::{
    calibration::DarkReference,
    constants::{MIN_ROI_SIZE, SNR_BORDER},
    roi::Roi,
};
use itertools::{Itertools, MinMaxResult};
use ndarray::{s, Array2, Axis};

mod median;
mod split;
pub use median::median_filter;
pub use split::split_image;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ImageError {
    #[error("saturated image: maximum {max} >= {saturation}")]
    Saturation { max: f64, saturation: f64 },
    #[error("no signal left in the image after denoising")]
    NoSignal,
    #[error("ROI too small: {x_n}x{y_n} pixels")]
    RoiTooSmall { x_n: usize, y_n: usize },
    #[error("image shape {image:?} does not match the ROI {roi:?}")]
    ShapeMismatch { image: (usize, usize), roi: (usize, usize) },
}
type Result<T> = std::result::Result<T, ImageError>;

/// Rejects images with pixels at or above the camera saturation
pub fn check_saturation(image: &Array2<f64>, saturation: f64) -> Result<()> {
    let max = image.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max >= saturation {
        Err(ImageError::Saturation { max, saturation })
    } else {
        Ok(())
    }
}

/// Subtracts the dark background, aligning both images on the sensor
///
/// Only the pixels shared by both ROIs are corrected; the image ROI is kept.
pub fn subtract_background(image: &Array2<f64>, roi: &Roi, dark: &DarkReference) -> Array2<f64> {
    let mut output = image.clone();
    match roi.intersection(&dark.roi) {
        Some(overlap) => {
            let (ix, iy) = (overlap.x0 - roi.x0, overlap.y0 - roi.y0);
            let (dx, dy) = (overlap.x0 - dark.roi.x0, overlap.y0 - dark.roi.y0);
            let mut target = output.slice_mut(s![iy..iy + overlap.y_n, ix..ix + overlap.x_n]);
            target -= &dark
                .image
                .slice(s![dy..dy + overlap.y_n, dx..dx + overlap.x_n]);
            if overlap.x_n < roi.x_n || overlap.y_n < roi.y_n {
                log::debug!("dark reference covers {:?} of image ROI {:?}", overlap, roi);
            }
        }
        None => log::warn!("dark reference ROI does not overlap the image ROI"),
    }
    output
}

/// Mean and standard deviation of the pixels in the image outer frame
fn border_noise(image: &Array2<f64>) -> (f64, f64) {
    let (rows, cols) = image.dim();
    let border = SNR_BORDER.min(rows / 4).min(cols / 4).max(1);
    let frame: Vec<f64> = image
        .indexed_iter()
        .filter(|((i, j), _)| {
            *i < border || *j < border || *i + border >= rows || *j + border >= cols
        })
        .map(|(_, &v)| v)
        .collect();
    let n = frame.len() as f64;
    let mean = frame.iter().sum::<f64>() / n;
    let std = (frame.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    (mean, std)
}

/// Median filters the image, zeroes everything below `mean + snr_filter * std`
/// of the border noise and normalizes the image to unit total intensity
pub fn denoise(
    image: &Array2<f64>,
    median_filter_size: usize,
    snr_filter: f64,
) -> Result<Array2<f64>> {
    let filtered = median_filter(image, median_filter_size);
    let (mean, std) = border_noise(&filtered);
    let threshold = mean + snr_filter * std;
    log::debug!(
        "noise: mean={:.3}, std={:.3}, threshold={:.3}",
        mean,
        std,
        threshold
    );
    let mut output = filtered.mapv(|v| if v > threshold { v } else { 0. });
    let total = output.sum();
    if !(total > 0. && total.is_finite()) {
        return Err(ImageError::NoSignal);
    }
    output /= total;
    Ok(output)
}

/// First and last index of the profile waist expanded by `expand` waists
fn waist_bounds(profile: &[f64], threshold: f64, expand: f64) -> Option<(usize, usize)> {
    let max = profile.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !(max > 0.) {
        return None;
    }
    let (first, last) = match profile.iter().positions(|&v| v >= threshold * max).minmax() {
        MinMaxResult::NoElements => return None,
        MinMaxResult::OneElement(k) => (k, k),
        MinMaxResult::MinMax(a, b) => (a, b),
    };
    let half = (last - first) / 2;
    let waist = (last - first) as f64 * 0.5;
    let margin = (((expand - 1.) * waist).round() as isize).max(-(half as isize));
    let lower = (first as isize - margin).max(0) as usize;
    let upper = ((last as isize + margin) as usize).min(profile.len() - 1);
    Some((lower, upper))
}

/// Crops the image around the trace
///
/// The trace waist along each axis is the extent of the projected profile
/// above `threshold` times its maximum; the crop spans `expand` waists around
/// the trace center.
pub fn find_roi(
    image: &Array2<f64>,
    roi: &Roi,
    threshold: f64,
    expand: f64,
) -> Result<(Array2<f64>, Roi)> {
    let x_profile = image.sum_axis(Axis(0)).to_vec();
    let y_profile = image.sum_axis(Axis(1)).to_vec();
    let (x_min, x_max) =
        waist_bounds(&x_profile, threshold, expand).ok_or(ImageError::NoSignal)?;
    let (y_min, y_max) =
        waist_bounds(&y_profile, threshold, expand).ok_or(ImageError::NoSignal)?;
    let cropped = roi.crop(x_min, x_max, y_min, y_max);
    if cropped.is_smaller_than(MIN_ROI_SIZE) {
        return Err(ImageError::RoiTooSmall {
            x_n: cropped.x_n,
            y_n: cropped.y_n,
        });
    }
    Ok((
        image.slice(s![y_min..=y_max, x_min..=x_max]).to_owned(),
        cropped,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(rows: usize, cols: usize, center: (f64, f64), sigma: f64) -> Array2<f64> {
        Array2::from_shape_fn((rows, cols), |(i, j)| {
            100. * (-((i as f64 - center.0).powi(2) + (j as f64 - center.1).powi(2))
                / (2. * sigma * sigma))
                .exp()
        })
    }

    #[test]
    fn saturation() {
        let image = blob(20, 20, (10., 10.), 2.);
        assert!(check_saturation(&image, 101.).is_ok());
        assert!(matches!(
            check_saturation(&image, 100.),
            Err(ImageError::Saturation { .. })
        ));
    }

    #[test]
    fn background_alignment() {
        let image = Array2::from_elem((4, 6), 10.);
        let roi = Roi::new(2, 1, 6, 4);
        let dark = DarkReference::new(
            Array2::from_shape_fn((4, 4), |(i, j)| (i * 4 + j) as f64),
            Roi::new(0, 0, 4, 4),
        )
        .unwrap();
        let output = subtract_background(&image, &roi, &dark);
        // sensor pixel (x=2, y=1) is dark pixel [1, 2]
        assert_eq!(output[[0, 0]], 10. - 6.);
        // sensor pixel (x=3, y=3) is dark pixel [3, 3]
        assert_eq!(output[[2, 1]], 10. - 15.);
        // outside of the dark ROI
        assert_eq!(output[[0, 2]], 10.);
        assert_eq!(output[[3, 0]], 10.);
    }

    #[test]
    fn denoise_normalizes() {
        let image = blob(40, 40, (20., 20.), 3.);
        let output = denoise(&image, 3, 10.).unwrap();
        assert!((output.sum() - 1.).abs() < 1e-12);
        assert!(output[[20, 20]] > 0.);
    }

    #[test]
    fn denoise_empty() {
        let image = Array2::<f64>::zeros((20, 20));
        assert_eq!(denoise(&image, 3, 10.), Err(ImageError::NoSignal));
    }

    #[test]
    fn roi_around_trace() {
        let image = blob(60, 80, (30., 40.), 3.);
        let roi = Roi::new(100, 200, 80, 60);
        let (cropped, new_roi) = find_roi(&image, &roi, 0.2, 2.5).unwrap();
        assert_eq!(cropped.dim(), (new_roi.y_n, new_roi.x_n));
        let xc = new_roi.x0 as f64 + (new_roi.x_n - 1) as f64 / 2.;
        let yc = new_roi.y0 as f64 + (new_roi.y_n - 1) as f64 / 2.;
        assert!((xc - 140.).abs() <= 0.5);
        assert!((yc - 230.).abs() <= 0.5);
        assert!(new_roi.x_n < 80 && new_roi.x_n > 10);
    }

    #[test]
    fn roi_too_small() {
        let mut image = Array2::<f64>::zeros((20, 20));
        image[[10, 10]] = 1.;
        let roi = Roi::full(image.dim());
        assert_eq!(
            find_roi(&image, &roi, 0.2, 2.5),
            Err(ImageError::RoiTooSmall { x_n: 1, y_n: 1 })
        );
    }
}
