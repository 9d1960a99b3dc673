use ndarray::Array2;

/// 2-D median filter with a `size x size` neighbourhood and zero padding
///
/// An even `size` is rounded up to the next odd value.
pub fn median_filter(image: &Array2<f64>, size: usize) -> Array2<f64> {
    let half = size / 2;
    if half == 0 {
        return image.clone();
    }
    let (rows, cols) = image.dim();
    let width = 2 * half + 1;
    let mut window = Vec::with_capacity(width * width);
    Array2::from_shape_fn((rows, cols), |(i, j)| {
        window.clear();
        for k in 0..width {
            for l in 0..width {
                let (ii, jj) = ((i + k) as isize - half as isize, (j + l) as isize - half as isize);
                let value = if ii < 0 || jj < 0 || ii >= rows as isize || jj >= cols as isize {
                    0.
                } else {
                    image[[ii as usize, jj as usize]]
                };
                window.push(value);
            }
        }
        let mid = window.len() / 2;
        *window.select_nth_unstable_by(mid, |a, b| a.total_cmp(b)).1
    })
}
