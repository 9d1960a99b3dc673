use crate::{
    calibration::CalibrationError, image::ImageError, metrics::MetricsError,
    reconstruction::ReconstructionError, units::UnitsError,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("pipeline not ready: {0}")]
    NotReady(String),
    #[error("missing input: {0}")]
    MissingInput(String),
    #[error("Error in the `image` module")]
    Image(#[from] ImageError),
    #[error("Error in the `units` module")]
    Units(#[from] UnitsError),
    #[error("Error in the `reconstruction` module")]
    Reconstruction(#[from] ReconstructionError),
    #[error("Error in the `metrics` module")]
    Metrics(#[from] MetricsError),
    #[error("Error in the `calibration` module")]
    Calibration(#[from] CalibrationError),
}
