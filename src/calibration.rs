//! Calibration context and references
//!
//! The camera calibration, the dark background and the lasing off reference
//! are produced offline. They are loaded once and shared read-only by every
//! event processed by a [Pipeline](crate::Pipeline).

use crate::{constants::*, parameters::ProcessingParameters, roi::Roi};
use ndarray::Array2;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_pickle as pickle;
use std::{fs::File, io::BufWriter, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("failed to open the calibration file")]
    Io(#[from] std::io::Error),
    #[error("failed to (de)serialize the calibration pickle")]
    Pickle(#[from] pickle::Error),
    #[error("inconsistent lasing off reference: {0}")]
    Inconsistent(String),
}
type Result<T> = std::result::Result<T, CalibrationError>;

fn load<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let mut file = File::open(path.as_ref())?;
    log::info!("Loading {:?}...", path.as_ref());
    Ok(pickle::from_reader(&mut file, Default::default())?)
}
fn save<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    let mut file = BufWriter::new(File::create(path.as_ref())?);
    pickle::to_writer(&mut file, value, Default::default())?;
    log::info!("Saved {:?}", path.as_ref());
    Ok(())
}

/// XTCAV geometric calibration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalCalibration {
    /// camera pixel size [um]
    pub um_per_pix: f64,
    /// streaking strength [um/(MV fs)]
    pub str_strength: f64,
    /// RF amplitude of the streaking calibration [MV]
    pub rf_amp_calib: f64,
    /// RF phase of the streaking calibration [deg]
    pub rf_phase_calib: f64,
    /// beam energy at the dump [MeV]
    pub dump_e: f64,
    /// dispersion at the dump screen [m]
    pub dump_disp: f64,
}
impl Default for GlobalCalibration {
    fn default() -> Self {
        Self {
            um_per_pix: UM_PER_PIX,
            str_strength: STR_STRENGTH,
            rf_amp_calib: RF_AMP_CALIB,
            rf_phase_calib: RF_PHASE_CALIB,
            dump_e: DUMP_E,
            dump_disp: DUMP_DISP,
        }
    }
}

/// Camera specific calibration needed before any event can be processed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationContext {
    /// pixel value at or above which the camera is saturated
    pub saturation_value: f64,
    /// nominal camera ROI
    pub roi: Roi,
    pub global: GlobalCalibration,
}
impl CalibrationContext {
    pub fn new(saturation_value: f64, roi: Roi, global: GlobalCalibration) -> Self {
        Self {
            saturation_value,
            roi,
            global,
        }
    }
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        load(path)
    }
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save(self, path)
    }
}

/// Dark background pixel baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DarkReference {
    pub image: Array2<f64>,
    pub roi: Roi,
}
impl DarkReference {
    pub fn new(image: Array2<f64>, roi: Roi) -> Result<Self> {
        let this = Self { image, roi };
        this.check()?;
        Ok(this)
    }
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let this: Self = load(path)?;
        this.check()?;
        Ok(this)
    }
    /// Checks that the baseline image covers its ROI
    pub fn check(&self) -> Result<()> {
        if self.image.dim() != (self.roi.y_n, self.roi.x_n) {
            return Err(CalibrationError::Inconsistent(format!(
                "dark image shape {:?} does not match its {}x{} ROI",
                self.image.dim(),
                self.roi.x_n,
                self.roi.y_n
            )));
        }
        Ok(())
    }
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save(self, path)
    }
}

/// Lasing off profiles averaged per bunch
///
/// Each bunch holds several groups of averaged shots; the per-bunch arrays
/// have one row per group and one column per sample of the master time `t`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AveragedProfiles {
    /// master time [fs]
    pub t: Vec<f64>,
    /// electron current [electrons/s]
    pub e_current: Vec<Array2<f64>>,
    /// energy center of mass per time slice [MeV]
    pub e_com_slice: Vec<Array2<f64>>,
    /// energy spread per time slice [MeV]
    pub e_rms_slice: Vec<Array2<f64>>,
    /// delay with respect to the first bunch [fs]
    pub dist_t: Vec<Vec<f64>>,
    /// energy difference with respect to the first bunch [MeV]
    pub dist_e: Vec<Vec<f64>>,
}
impl AveragedProfiles {
    pub fn num_bunches(&self) -> usize {
        self.e_current.len()
    }
    /// Checks that all per-bunch arrays agree in shape
    pub fn check(&self) -> Result<()> {
        let n = self.t.len();
        if n < 2 {
            return Err(CalibrationError::Inconsistent(
                "master time needs at least 2 samples".into(),
            ));
        }
        let nb = self.num_bunches();
        if [
            self.e_com_slice.len(),
            self.e_rms_slice.len(),
            self.dist_t.len(),
            self.dist_e.len(),
        ]
        .iter()
        .any(|&m| m != nb)
        {
            return Err(CalibrationError::Inconsistent(format!(
                "expected profiles for {} bunches",
                nb
            )));
        }
        for j in 0..nb {
            let shape = self.e_current[j].dim();
            if shape.1 != n
                || shape.0 == 0
                || self.e_com_slice[j].dim() != shape
                || self.e_rms_slice[j].dim() != shape
                || self.dist_t[j].len() != shape.0
                || self.dist_e[j].len() != shape.0
            {
                return Err(CalibrationError::Inconsistent(format!(
                    "bunch #{} profiles do not match the master time",
                    j
                )));
            }
        }
        Ok(())
    }
}

/// Lasing off reference and the parameters it was processed with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LasingOffReference {
    pub averaged_profiles: AveragedProfiles,
    pub parameters: ProcessingParameters,
}
impl LasingOffReference {
    pub fn new(averaged_profiles: AveragedProfiles, parameters: ProcessingParameters) -> Result<Self> {
        let this = Self {
            averaged_profiles,
            parameters,
        };
        this.check()?;
        Ok(this)
    }
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let this: Self = load(path)?;
        this.check()?;
        Ok(this)
    }
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save(self, path)
    }
    pub fn num_bunches(&self) -> usize {
        self.parameters.num_bunches
    }
    fn check(&self) -> Result<()> {
        self.averaged_profiles.check()?;
        if self.averaged_profiles.num_bunches() != self.parameters.num_bunches {
            return Err(CalibrationError::Inconsistent(format!(
                "{} averaged profiles for {} bunches",
                self.averaged_profiles.num_bunches(),
                self.parameters.num_bunches
            )));
        }
        Ok(())
    }
}
