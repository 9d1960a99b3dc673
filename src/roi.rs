use serde::{Deserialize, Serialize};

/// Region of interest on the camera sensor
///
/// `x0`/`y0` are the sensor pixel offsets of the first column/row and
/// `x_n`/`y_n` the number of columns/rows. The signed steps scale one pixel
/// along each axis: a binned readout has `|step| > 1` and a mirrored readout a
/// negative step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    pub x0: usize,
    pub y0: usize,
    pub x_n: usize,
    pub y_n: usize,
    pub x_step: f64,
    pub y_step: f64,
}
impl Roi {
    pub fn new(x0: usize, y0: usize, x_n: usize, y_n: usize) -> Self {
        Self {
            x0,
            y0,
            x_n,
            y_n,
            x_step: 1.,
            y_step: 1.,
        }
    }
    /// ROI spanning a whole `(rows, columns)` sensor
    pub fn full(shape: (usize, usize)) -> Self {
        Self::new(0, 0, shape.1, shape.0)
    }
    pub fn with_steps(self, x_step: f64, y_step: f64) -> Self {
        Self {
            x_step,
            y_step,
            ..self
        }
    }
    /// Sensor coordinates of the ROI columns
    pub fn x_pixels(&self) -> Vec<f64> {
        (self.x0..self.x0 + self.x_n).map(|x| x as f64).collect()
    }
    /// Sensor coordinates of the ROI rows
    pub fn y_pixels(&self) -> Vec<f64> {
        (self.y0..self.y0 + self.y_n).map(|y| y as f64).collect()
    }
    /// Sub-region `[x_min, x_max] x [y_min, y_max]` given in ROI relative indices
    pub fn crop(&self, x_min: usize, x_max: usize, y_min: usize, y_max: usize) -> Self {
        Self {
            x0: self.x0 + x_min,
            y0: self.y0 + y_min,
            x_n: x_max - x_min + 1,
            y_n: y_max - y_min + 1,
            ..*self
        }
    }
    pub fn is_smaller_than(&self, min_size: usize) -> bool {
        self.x_n < min_size || self.y_n < min_size
    }
    /// Overlap of two ROIs in sensor coordinates
    pub fn intersection(&self, other: &Roi) -> Option<Roi> {
        let x0 = self.x0.max(other.x0);
        let y0 = self.y0.max(other.y0);
        let x1 = (self.x0 + self.x_n).min(other.x0 + other.x_n);
        let y1 = (self.y0 + self.y_n).min(other.y0 + other.y_n);
        if x1 <= x0 || y1 <= y0 {
            None
        } else {
            Some(Roi {
                x0,
                y0,
                x_n: x1 - x0,
                y_n: y1 - y0,
                ..*self
            })
        }
    }
}
