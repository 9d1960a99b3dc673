//! Single shot processing pipeline
//!
//! A [Pipeline] is built once from the calibration context and the optional
//! references, then turns each [Event] into a [ShotResult] or the reason the
//! event was rejected. The pipeline is never modified by the events it
//! processes and can be shared between threads.

use crate::{
    calibration::{CalibrationContext, DarkReference, LasingOffReference},
    error::Error,
    image::{self, ImageError},
    metrics::{self, PowerMethod},
    parameters::{resolve, ParameterOverrides, ParameterWarning, ProcessingParameters},
    profile::{process_image, ImageProfile},
    reconstruction::{process_lasing_single_shot, PulseCharacterization, ReconstructionError},
    roi::Roi,
    shot::{EBeam, EventId, GasDetector, ShotToShotParameters},
    units::normalize,
};
use ndarray::{Array2, Array3};
use rayon::prelude::*;

type Result<T> = std::result::Result<T, Error>;

/// Detector readings of one event
#[derive(Debug, Clone, Default)]
pub struct Event {
    /// XTCAV camera image, rows along energy and columns along time
    pub image: Option<Array2<f64>>,
    pub ebeam: Option<EBeam>,
    pub gas_detector: Option<GasDetector>,
    pub id: EventId,
}
impl Event {
    pub fn new(image: Array2<f64>) -> Self {
        Self {
            image: Some(image),
            ..Default::default()
        }
    }
    pub fn ebeam(self, ebeam: EBeam) -> Self {
        Self {
            ebeam: Some(ebeam),
            ..self
        }
    }
    pub fn gas_detector(self, gas_detector: GasDetector) -> Self {
        Self {
            gas_detector: Some(gas_detector),
            ..self
        }
    }
    pub fn id(self, id: EventId) -> Self {
        Self { id, ..self }
    }
}

#[derive(Debug, Default)]
pub struct PipelineBuilder {
    calibration: Option<CalibrationContext>,
    dark_reference: Option<DarkReference>,
    lasing_off_reference: Option<LasingOffReference>,
    overrides: ParameterOverrides,
}
impl PipelineBuilder {
    pub fn calibration(self, calibration: CalibrationContext) -> Self {
        Self {
            calibration: Some(calibration),
            ..self
        }
    }
    pub fn dark_reference(self, dark_reference: DarkReference) -> Self {
        Self {
            dark_reference: Some(dark_reference),
            ..self
        }
    }
    pub fn lasing_off_reference(self, lasing_off_reference: LasingOffReference) -> Self {
        Self {
            lasing_off_reference: Some(lasing_off_reference),
            ..self
        }
    }
    pub fn overrides(self, overrides: ParameterOverrides) -> Self {
        Self { overrides, ..self }
    }
    /// Resolves the processing parameters and loads the dark reference if
    /// only its path is known
    pub fn build(self) -> Result<Pipeline> {
        let context = self
            .calibration
            .ok_or_else(|| Error::NotReady("no calibration context".into()))?;
        let resolution = resolve(
            &self.overrides,
            self.lasing_off_reference.as_ref().map(|r| &r.parameters),
        );
        let parameters = resolution.parameters;
        let dark_reference = match (self.dark_reference, &parameters.dark_reference_path) {
            (Some(dark), _) => {
                dark.check()
                    .map_err(|e| Error::NotReady(format!("invalid dark reference: {}", e)))?;
                Some(dark)
            }
            (None, Some(path)) => DarkReference::load(path)
                .map_err(|e| log::warn!("dark reference {:?} not loaded: {}", path, e))
                .ok(),
            (None, None) => {
                log::warn!("no dark reference, background not subtracted");
                None
            }
        };
        if self.lasing_off_reference.is_none() {
            log::warn!("no lasing off reference, pulses will not be reconstructed");
        }
        log::info!("processing parameters: {:?}", parameters);
        Ok(Pipeline {
            context,
            dark_reference,
            lasing_off_reference: self.lasing_off_reference,
            parameters,
            warnings: resolution.warnings,
        })
    }
}

/// XTCAV single shot processing
#[derive(Debug)]
pub struct Pipeline {
    context: CalibrationContext,
    dark_reference: Option<DarkReference>,
    lasing_off_reference: Option<LasingOffReference>,
    parameters: ProcessingParameters,
    warnings: Vec<ParameterWarning>,
}
impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        Default::default()
    }
    pub fn parameters(&self) -> &ProcessingParameters {
        &self.parameters
    }
    /// Conflicts met while resolving the parameters
    pub fn warnings(&self) -> &[ParameterWarning] {
        &self.warnings
    }
    pub fn context(&self) -> &CalibrationContext {
        &self.context
    }
    /// Processes one event
    pub fn process_event(&self, event: &Event) -> Result<ShotResult> {
        self.try_process_event(event).map_err(|e| {
            log::warn!("event {} rejected: {}", event.id.fiducial, e);
            e
        })
    }
    fn try_process_event(&self, event: &Event) -> Result<ShotResult> {
        let raw = event
            .image
            .as_ref()
            .ok_or_else(|| Error::MissingInput("no XTCAV image".into()))?;
        image::check_saturation(raw, self.context.saturation_value)?;
        let roi = self.context.roi;
        if raw.dim() != (roi.y_n, roi.x_n) {
            return Err(ImageError::ShapeMismatch {
                image: raw.dim(),
                roi: (roi.y_n, roi.x_n),
            }
            .into());
        }
        let shot_to_shot = ShotToShotParameters::new(
            event.ebeam.as_ref(),
            event.gas_detector.as_ref(),
            event.id,
        );
        if !shot_to_shot.valid {
            return Err(Error::MissingInput("invalid shot to shot parameters".into()));
        }

        let p = &self.parameters;
        let image = match &self.dark_reference {
            Some(dark) => image::subtract_background(raw, &roi, dark),
            None => raw.clone(),
        };
        let image = image::denoise(&image, p.median_filter, p.snr_filter)?;
        let (image, roi) = image::find_roi(&image, &roi, p.roi_waist_threshold, p.roi_expand)?;
        log::debug!("event {}: {:?}", event.id.fiducial, roi);
        let processed_image = image::split_image(
            &image,
            p.num_bunches,
            p.island_split_method,
            p.island_split_par1,
            p.island_split_par2,
        );

        let image_stats = process_image(&processed_image, &roi);
        let (image_stats, physical_units) =
            normalize(image_stats, &roi, &shot_to_shot, &self.context.global)?;
        let image_profile = ImageProfile {
            image_stats,
            roi,
            shot_to_shot,
            physical_units,
        };
        let pulse = match &self.lasing_off_reference {
            Some(reference) => {
                process_lasing_single_shot(&image_profile, &reference.averaged_profiles)
            }
            None => Err(ReconstructionError::ReferenceMissing),
        };
        if let Err(e) = &pulse {
            log::warn!("event {}: no pulse reconstruction: {}", event.id.fiducial, e);
        }
        Ok(ShotResult {
            processed_image,
            image_profile,
            pulse,
        })
    }
    /// Processes a batch of independent events in parallel, in order
    pub fn process_events(&self, events: &[Event]) -> Vec<Result<ShotResult>> {
        events
            .par_iter()
            .map(|event| self.process_event(event))
            .collect()
    }
}

/// Outcome of a processed event
#[derive(Debug, Clone)]
pub struct ShotResult {
    /// `(bunch, rows, columns)` stack of the denoised bunch images
    pub processed_image: Array3<f64>,
    pub image_profile: ImageProfile,
    pub pulse: std::result::Result<PulseCharacterization, ReconstructionError>,
}
impl ShotResult {
    pub fn processed_image(&self) -> &Array3<f64> {
        &self.processed_image
    }
    /// Location of the processed image on the sensor
    pub fn roi(&self) -> &Roi {
        &self.image_profile.roi
    }
    pub fn num_bunches(&self) -> usize {
        self.image_profile.num_bunches()
    }
    pub fn pulse_characterization(&self) -> Result<&PulseCharacterization> {
        self.pulse.as_ref().map_err(|e| Error::from(e.clone()))
    }
    pub fn pulse_delay(&self, method: PowerMethod) -> Result<Vec<f64>> {
        Ok(metrics::pulse_delay(self.pulse_characterization()?, method)?)
    }
    pub fn pulse_fwhm(&self, method: PowerMethod) -> Result<Vec<f64>> {
        Ok(metrics::pulse_fwhm(self.pulse_characterization()?, method)?)
    }
    pub fn xray_power(&self, method: PowerMethod) -> Result<(Array2<f64>, Array2<f64>)> {
        Ok(metrics::xray_power(self.pulse_characterization()?, method))
    }
    pub fn xray_energy_per_bunch(&self, method: PowerMethod) -> Result<Vec<f64>> {
        Ok(metrics::xray_energy_per_bunch(
            self.pulse_characterization()?,
            method,
        ))
    }
    pub fn reconstruction_agreement(&self) -> Result<Option<f64>> {
        Ok(metrics::reconstruction_agreement(
            self.pulse_characterization()?,
        ))
    }
    pub fn electron_current_per_bunch(&self) -> (Array2<f64>, Array2<f64>) {
        metrics::electron_current_per_bunch(&self.image_profile)
    }
    pub fn inter_bunch_pulse_delay_based_on_current(&self) -> Result<Vec<f64>> {
        Ok(metrics::inter_bunch_pulse_delay_based_on_current(
            &self.image_profile,
        )?)
    }
    pub fn inter_bunch_pulse_delay_based_on_current_multiple(
        &self,
        n: usize,
        filter_width: f64,
    ) -> Result<Array2<f64>> {
        Ok(metrics::inter_bunch_pulse_delay_based_on_current_multiple(
            &self.image_profile,
            n,
            filter_width,
        )?)
    }
    pub fn inter_bunch_pulse_delay_based_on_current_fourier_filtered(
        &self,
        target_width_fs: f64,
        threshold_factor: f64,
    ) -> Result<Vec<f64>> {
        Ok(
            metrics::inter_bunch_pulse_delay_based_on_current_fourier_filtered(
                &self.image_profile,
                target_width_fs,
                threshold_factor,
            )?,
        )
    }
}
