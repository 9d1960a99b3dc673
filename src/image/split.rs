//! Multiple bunch (island) splitting
//!
//! The denoised image is segmented into islands of contiguous signal. The
//! `num_bunches` most intense significant islands become the bunches; every
//! other signal pixel is given to the bunch with the closest center of mass,
//! so no intensity is lost. Bunches are stacked from the highest to the lowest
//! energy, i.e. by decreasing row center of mass.

use crate::parameters::IslandSplitMethod;
use ndarray::{Array2, Array3, Axis};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
struct Island {
    pixels: Vec<(usize, usize)>,
    intensity: f64,
    // (row, column)
    com: (f64, f64),
}
impl Island {
    fn new(image: &Array2<f64>, pixels: Vec<(usize, usize)>) -> Self {
        let intensity: f64 = pixels.iter().map(|&p| image[p]).sum();
        let (sy, sx) = pixels.iter().fold((0f64, 0f64), |(sy, sx), &(i, j)| {
            (sy + i as f64 * image[[i, j]], sx + j as f64 * image[[i, j]])
        });
        Self {
            pixels,
            intensity,
            com: (sy / intensity, sx / intensity),
        }
    }
    fn distance2(&self, (i, j): (f64, f64)) -> f64 {
        (self.com.0 - i).powi(2) + (self.com.1 - j).powi(2)
    }
}

/// 8-connected islands of the pixels where `mask` is true
fn label<F: Fn(f64) -> bool>(image: &Array2<f64>, mask: F) -> Vec<Island> {
    let (rows, cols) = image.dim();
    let mut visited = Array2::from_elem((rows, cols), false);
    let mut islands = vec![];
    let mut queue = VecDeque::new();
    for ((i, j), &value) in image.indexed_iter() {
        if visited[[i, j]] || !mask(value) {
            continue;
        }
        visited[[i, j]] = true;
        queue.push_back((i, j));
        let mut pixels = vec![];
        while let Some((i, j)) = queue.pop_front() {
            pixels.push((i, j));
            for di in -1isize..=1 {
                for dj in -1isize..=1 {
                    let (ii, jj) = (i as isize + di, j as isize + dj);
                    if ii < 0 || jj < 0 || ii >= rows as isize || jj >= cols as isize {
                        continue;
                    }
                    let p = (ii as usize, jj as usize);
                    if !visited[p] && mask(image[p]) {
                        visited[p] = true;
                        queue.push_back(p);
                    }
                }
            }
        }
        islands.push(Island::new(image, pixels));
    }
    islands
}

/// Islands at least `1/ratio` as intense as the brightest one, brightest first
fn significant(mut islands: Vec<Island>, ratio: f64) -> (Vec<Island>, Vec<Island>) {
    islands.sort_by(|a, b| b.intensity.total_cmp(&a.intensity));
    let max = islands.first().map_or(0., |i| i.intensity);
    islands
        .into_iter()
        .partition(|island| ratio <= 0. || island.intensity * ratio >= max)
}

fn connected_components(
    image: &Array2<f64>,
    num_bunches: usize,
    ratio: f64,
    min_size: f64,
) -> Vec<Vec<(usize, usize)>> {
    let (kept, dropped) = significant(label(image, |v| v > 0.), ratio);
    let (seeds, others): (Vec<_>, Vec<_>) = kept
        .into_iter()
        .enumerate()
        .partition(|(k, island)| *k < num_bunches && island.pixels.len() as f64 >= min_size);
    let seeds: Vec<Island> = seeds.into_iter().map(|(_, island)| island).collect();
    let mut bunches: Vec<Vec<(usize, usize)>> = seeds.iter().map(|s| s.pixels.clone()).collect();
    if seeds.is_empty() {
        return bunches;
    }
    for island in others.into_iter().map(|(_, i)| i).chain(dropped) {
        let k = closest(&seeds, island.com);
        bunches[k].extend(island.pixels);
    }
    bunches
}

/// Seeds the bunches from the lowest contour level that resolves enough
/// significant islands and grows them into the whole trace
fn contour(
    image: &Array2<f64>,
    num_bunches: usize,
    ratio: f64,
    levels: f64,
) -> Vec<Vec<(usize, usize)>> {
    let max = image.iter().cloned().fold(0f64, f64::max);
    let n_levels = levels.round().max(1.) as usize;
    let mut best: Vec<Island> = vec![];
    for k in 0..n_levels {
        let level = max * k as f64 / n_levels as f64;
        let (islands, _) = significant(label(image, |v| v > level), ratio);
        if islands.len() > best.len() {
            best = islands;
        }
        if best.len() >= num_bunches {
            break;
        }
    }
    best.truncate(num_bunches);
    if best.is_empty() {
        return vec![];
    }
    let mut bunches = vec![vec![]; best.len()];
    for ((i, j), &value) in image.indexed_iter() {
        if value > 0. {
            bunches[closest(&best, (i as f64, j as f64))].push((i, j));
        }
    }
    bunches
}

fn closest(seeds: &[Island], point: (f64, f64)) -> usize {
    seeds
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.distance2(point).total_cmp(&b.distance2(point)))
        .map_or(0, |(k, _)| k)
}

/// Splits `image` into a `(num_bunches, rows, columns)` stack
///
/// Bunches that cannot be resolved are left as all-zero images.
pub fn split_image(
    image: &Array2<f64>,
    num_bunches: usize,
    method: IslandSplitMethod,
    par1: f64,
    par2: f64,
) -> Array3<f64> {
    let (rows, cols) = image.dim();
    let mut output = Array3::zeros((num_bunches, rows, cols));
    if num_bunches == 1 {
        output.index_axis_mut(Axis(0), 0).assign(image);
    }
    if num_bunches < 2 {
        return output;
    }
    let mut bunches: Vec<(f64, Array2<f64>)> = match method {
        IslandSplitMethod::ConnectedComponents => {
            connected_components(image, num_bunches, par1, par2)
        }
        IslandSplitMethod::Contour => contour(image, num_bunches, par1, par2),
    }
    .into_iter()
    .map(|pixels| {
        let mut bunch = Array2::zeros((rows, cols));
        pixels.into_iter().for_each(|p| bunch[p] = image[p]);
        let island = bunch.sum_axis(Axis(1));
        let y_com = island
            .iter()
            .enumerate()
            .map(|(i, v)| i as f64 * v)
            .sum::<f64>()
            / island.sum();
        (y_com, bunch)
    })
    .collect();
    if bunches.len() < num_bunches {
        log::warn!(
            "only {} of {} bunches found by {} island splitting",
            bunches.len(),
            num_bunches,
            method
        );
    }
    bunches.sort_by(|a, b| b.0.total_cmp(&a.0));
    for (k, (_, bunch)) in bunches.into_iter().enumerate() {
        output.index_axis_mut(Axis(0), k).assign(&bunch);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> Array2<f64> {
        // low energy (small row) bright blob, high energy (large row) dim blob
        Array2::from_shape_fn((40, 60), |(i, j)| {
            let a = 4. * (-((i as f64 - 10.).powi(2) + (j as f64 - 15.).powi(2)) / 8.).exp();
            let b = 2. * (-((i as f64 - 30.).powi(2) + (j as f64 - 45.).powi(2)) / 8.).exp();
            let v = a + b;
            if v > 1e-3 {
                v
            } else {
                0.
            }
        })
    }

    fn check_split(method: IslandSplitMethod) {
        let image = blobs();
        let split = split_image(&image, 2, method, 3., 5.);
        assert_eq!(split.dim(), (2, 40, 60));
        // highest energy bunch first
        assert!(split[[0, 30, 45]] > 0.);
        assert_eq!(split[[0, 10, 15]], 0.);
        assert!(split[[1, 10, 15]] > 0.);
        let total: f64 = split.sum();
        assert!((total - image.sum()).abs() < 1e-9);
    }

    #[test]
    fn connected_components_split() {
        check_split(IslandSplitMethod::ConnectedComponents);
    }

    #[test]
    fn contour_split() {
        check_split(IslandSplitMethod::Contour);
    }

    #[test]
    fn single_bunch_is_whole_image() {
        let image = blobs();
        let split = split_image(&image, 1, IslandSplitMethod::ConnectedComponents, 3., 5.);
        assert_eq!(split.index_axis(Axis(0), 0), image);
    }

    #[test]
    fn unresolved_bunch_is_empty() {
        let image = blobs();
        let split = split_image(&image, 3, IslandSplitMethod::ConnectedComponents, 3., 5.);
        assert_eq!(split.dim().0, 3);
        assert_eq!(split.index_axis(Axis(0), 2).sum(), 0.);
        assert!((split.sum() - image.sum()).abs() < 1e-9);
    }

    #[test]
    fn faint_islands_are_merged() {
        let mut image = blobs();
        image[[0, 59]] = 1e-2;
        let split = split_image(&image, 2, IslandSplitMethod::ConnectedComponents, 3., 5.);
        assert!((split.sum() - image.sum()).abs() < 1e-9);
    }
}
