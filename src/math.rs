//! Numerical helpers shared by the reconstruction and the metrics

use nalgebra::{SMatrix, SVector};

/// Index of the largest finite value
pub fn argmax(data: &[f64]) -> Option<usize> {
    data.iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(k, _)| k)
}

/// Vertex of the least-squares parabola through the 5 samples centered on `central`
///
/// Returns `None` if the window does not fit in the data, holds non-finite
/// samples or the fit is singular.
pub fn quadratic_peak(t: &[f64], y: &[f64], central: usize) -> Option<f64> {
    if central < 2 || central + 3 > t.len().min(y.len()) {
        return None;
    }
    let (t, y) = (&t[central - 2..central + 3], &y[central - 2..central + 3]);
    if t.iter().chain(y.iter()).any(|x| !x.is_finite()) {
        return None;
    }
    let t0 = t[2];
    let a = SMatrix::<f64, 5, 3>::from_fn(|i, j| (t[i] - t0).powi(2 - j as i32));
    let b = SVector::<f64, 5>::from_column_slice(y);
    let svd = a.svd(true, true);
    let max_sv = svd.singular_values.max();
    if !(svd.singular_values.min() > max_sv * 1e-12) {
        return None;
    }
    let p = svd.solve(&b, 0.).ok()?;
    let half_span = 0.5 * (t[4] - t[0]);
    let y_max = y.iter().fold(0f64, |m, v| m.max(v.abs()));
    if !(p[0].abs() * half_span * half_span > 1e-12 * y_max) {
        return None;
    }
    let vertex = t0 - p[1] / (2. * p[0]);
    vertex.is_finite().then_some(vertex)
}

/// Full width at half maximum: span of the samples at or above half the peak
/// plus one sample step
pub fn fwhm(t: &[f64], y: &[f64]) -> Option<f64> {
    if t.len() < 2 || t.len() != y.len() {
        return None;
    }
    let max = y[argmax(y)?];
    if !(max > 0.) {
        return None;
    }
    let threshold = max / 2.;
    let first = y.iter().position(|&v| v >= threshold)?;
    let last = y.iter().rposition(|&v| v >= threshold)?;
    Some(t[last] - t[first] + t[1] - t[0])
}

/// Linear interpolation of the samples `(x, y)` at `x_new`, `x` ascending
///
/// Points outside of `x` and non-finite samples are set to 0.
pub fn interp(x_new: &[f64], x: &[f64], y: &[f64]) -> Vec<f64> {
    x_new
        .iter()
        .map(|&xi| {
            let n = x.len();
            if n == 0 || xi < x[0] || xi > x[n - 1] {
                return 0.;
            }
            let k = x.partition_point(|&v| v <= xi);
            let value = if k >= n || x[k - 1] == xi {
                y[k - 1]
            } else {
                let (x0, x1) = (x[k - 1], x[k]);
                let w = (xi - x0) / (x1 - x0);
                y[k - 1] * (1. - w) + y[k] * w
            };
            if value.is_finite() {
                value
            } else {
                0.
            }
        })
        .collect()
}

/// Pearson correlation coefficient
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let (ma, mb) = (a.iter().sum::<f64>() / n, b.iter().sum::<f64>() / n);
    let (mut sab, mut saa, mut sbb) = (0f64, 0f64, 0f64);
    for (x, y) in a.iter().zip(b) {
        sab += (x - ma) * (y - mb);
        saa += (x - ma).powi(2);
        sbb += (y - mb).powi(2);
    }
    sab / (saa * sbb).sqrt()
}

/// Agreement of two traces in [-1, 1]
///
/// `1 - sum(a - b)^2 / (sum a^2 + sum b^2)`, 1 only for identical traces;
/// two all-zero traces fully agree.
pub fn agreement(a: &[f64], b: &[f64]) -> f64 {
    let (mut num, mut den) = (0f64, 0f64);
    for (x, y) in a.iter().zip(b) {
        num += (x - y).powi(2);
        den += x * x + y * y;
    }
    if den > 0. {
        1. - num / den
    } else {
        1.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parabola_vertex() {
        let vertex = 12.3456;
        let t: Vec<f64> = (0..25).map(|i| i as f64).collect();
        let y: Vec<f64> = t.iter().map(|t| 5. - 0.7 * (t - vertex).powi(2)).collect();
        let central = argmax(&y).unwrap();
        assert_eq!(central, 12);
        let peak = quadratic_peak(&t, &y, central).unwrap();
        assert!((peak - vertex).abs() < 1e-9, "{peak}");
    }

    #[test]
    fn parabola_vertex_scaled_axis() {
        let vertex = -3.21;
        let t: Vec<f64> = (0..40).map(|i| -20. + 0.5 * i as f64).collect();
        let y: Vec<f64> = t.iter().map(|t| 1e9 * (1. - (t - vertex).powi(2))).collect();
        let peak = quadratic_peak(&t, &y, argmax(&y).unwrap()).unwrap();
        assert!((peak - vertex).abs() < 1e-9, "{peak}");
    }

    #[test]
    fn fit_failures() {
        let t: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = vec![9., 8., 7., 6., 5., 4., 3., 2., 1., 0.];
        assert_eq!(quadratic_peak(&t, &y, argmax(&y).unwrap()), None);
        assert_eq!(quadratic_peak(&t, &y, 8), None);
        let flat = vec![1.; 10];
        assert_eq!(quadratic_peak(&t, &flat, 5), None);
        let mut nan = vec![0., 1., 2., 3., 4., 3., 2., 1., 0., 0.];
        nan[3] = f64::NAN;
        assert_eq!(quadratic_peak(&t, &nan, 4), None);
    }

    #[test]
    fn triangle_fwhm() {
        let hwhm = 6.;
        let t: Vec<f64> = (0..41).map(|i| i as f64 - 20.).collect();
        let y: Vec<f64> = t
            .iter()
            .map(|t| (1. - t.abs() / (2. * hwhm)).max(0.))
            .collect();
        let width = fwhm(&t, &y).unwrap();
        assert!((width - 2. * hwhm).abs() <= 1.);
    }

    #[test]
    fn gaussian_fwhm() {
        let sigma = 4.;
        let expected = 2. * (2. * 2f64.ln()).sqrt() * sigma;
        let t: Vec<f64> = (0..81).map(|i| 0.5 * i as f64 - 20.).collect();
        let y: Vec<f64> = t.iter().map(|t| (-t * t / (2. * sigma * sigma)).exp()).collect();
        assert!((fwhm(&t, &y).unwrap() - expected).abs() <= 0.5);
    }

    #[test]
    fn linear_interpolation() {
        let x = [0., 1., 2.];
        let y = [0., 10., f64::NAN];
        assert_eq!(interp(&[-1., 0., 0.5, 1., 3.], &x, &y), vec![0., 0., 5., 10., 0.]);
        assert_eq!(interp(&[1.5], &x, &y), vec![0.]);
    }

    #[test]
    fn agreement_bounds() {
        let a = [0., 1., 4., 1., 0.];
        assert_eq!(agreement(&a, &a), 1.);
        let b = [0., 2., 3., 2., 0.];
        assert_eq!(agreement(&a, &b), agreement(&b, &a));
        let c: Vec<f64> = a.iter().map(|x| -x).collect();
        assert!((agreement(&a, &c) + 1.).abs() < 1e-12);
        assert_eq!(agreement(&[2.; 4], &[2.; 4]), 1.);
        assert_eq!(agreement(&[0.; 4], &[0.; 4]), 1.);
        let offset: Vec<f64> = a.iter().map(|x| x + 10.).collect();
        let score = agreement(&a, &offset);
        assert!(score < 1. && score >= -1., "{}", score);
        assert_eq!(score, agreement(&offset, &a));
    }

    #[test]
    fn correlation() {
        let a = [1., 2., 3., 4.];
        let b = [2., 4., 6., 8.];
        assert!((pearson(&a, &b) - 1.).abs() < 1e-12);
        assert!(pearson(&a, &[1.; 4]).is_nan());
    }
}
