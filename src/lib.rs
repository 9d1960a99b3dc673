//! XTCAV single shot X-ray pulse characterization
//!
//! The XTCAV (X-band transverse deflecting cavity) streaks the electron bunches
//! of a free electron laser pulse on a camera: time along the image columns,
//! energy along the rows. Comparing a lasing shot to a lasing off reference
//! gives the X-ray power profile of every bunch.
//!
//! A [Pipeline] is built from a [CalibrationContext] and optional
//! [DarkReference] and [LasingOffReference]; each [Event] is then processed
//! into a [ShotResult]:
//!  1. saturation check, dark background subtraction and denoising,
//!  2. region of interest detection and bunch splitting,
//!  3. per-bunch image statistics in physical units ([ImageProfile]),
//!  4. X-ray power reconstruction ([PulseCharacterization]).
//!
//! ```no_run
//! use xtcav_shots::{CalibrationContext, Event, LasingOffReference, Pipeline, PowerMethod};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::builder()
//!     .calibration(CalibrationContext::load("calibration.pkl")?)
//!     .lasing_off_reference(LasingOffReference::load("lasing_off.pkl")?)
//!     .build()?;
//! # let event = Event::default();
//! let shot = pipeline.process_event(&event)?;
//! let delays = shot.pulse_delay(PowerMethod::RmsCom)?;
//! # Ok(())
//! # }
//! ```

pub mod calibration;
pub mod constants;
mod error;
pub mod image;
pub mod math;
pub mod metrics;
pub mod parameters;
pub mod pipeline;
pub mod profile;
pub mod reconstruction;
pub mod roi;
pub mod shot;
pub mod units;

pub use calibration::{
    AveragedProfiles, CalibrationContext, CalibrationError, DarkReference, GlobalCalibration,
    LasingOffReference,
};
pub use error::Error;
pub use image::ImageError;
pub use metrics::{MetricsError, PowerMethod};
pub use parameters::{
    IslandSplitMethod, ParameterOverrides, ParameterWarning, ProcessingParameters,
    UnsupportedMethod,
};
pub use pipeline::{Event, Pipeline, PipelineBuilder, ShotResult};
pub use profile::{ImageProfile, ImageStats};
pub use reconstruction::{PulseCharacterization, ReconstructionError};
pub use roi::Roi;
pub use shot::{EBeam, EventId, GasDetector, ShotToShotParameters};
pub use units::{PhysicalUnits, UnitsError};
