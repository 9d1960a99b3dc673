//! Physical constants and camera defaults

/// Electron charge [C]
pub const E_CHARGE: f64 = 1.60217657e-19;
/// Femtosecond to second
pub const FS_TO_S: f64 = 1e-15;
/// Smallest accepted ROI size along either axis [pixel]
pub const MIN_ROI_SIZE: usize = 3;
/// Width of the image border used to estimate the noise floor [pixel]
pub const SNR_BORDER: usize = 100;
/// Fraction of the peak current below which slice energies are ignored
pub const CURRENT_THRESHOLD: f64 = 0.1;
/// Smallest |cos| of the RF phase difference for a usable time calibration
pub const MIN_COS_PHASE: f64 = 0.5;

// Default processing parameters
pub const DEFAULT_NUM_BUNCHES: usize = 1;
pub const DEFAULT_MEDIAN_FILTER: usize = 3;
pub const DEFAULT_SNR_FILTER: f64 = 10.;
pub const DEFAULT_ROI_WAIST_THRESHOLD: f64 = 0.2;
pub const DEFAULT_ROI_EXPAND: f64 = 2.5;
pub const DEFAULT_ISLAND_SPLIT_PAR1: f64 = 3.;
pub const DEFAULT_ISLAND_SPLIT_PAR2: f64 = 5.;

// Default global XTCAV calibration
pub const UM_PER_PIX: f64 = 12.5;
pub const STR_STRENGTH: f64 = 55.;
pub const RF_AMP_CALIB: f64 = 20.;
pub const RF_PHASE_CALIB: f64 = 90.;
pub const DUMP_E: f64 = 4500.;
pub const DUMP_DISP: f64 = 0.6;
/// Default camera saturation [ADU]
pub const SATURATION_VALUE: f64 = 4095.;
