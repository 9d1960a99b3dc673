//! Image processing parameters
//!
//! Parameters are resolved once per pipeline from the caller overrides, the
//! parameters recorded in the lasing off reference and the hard-coded
//! defaults, in that order of precedence. The number of bunches is the
//! exception: the lasing off reference always wins.

use crate::constants::*;
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, str::FromStr};
use strum_macros::{Display, EnumIter, EnumString};

/// Algorithm used to split the image into bunches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, EnumIter)]
pub enum IslandSplitMethod {
    /// Connected components labeling of the thresholded image
    #[strum(to_string = "scipylabel", serialize = "label")]
    ConnectedComponents,
    /// Seeds from iso-intensity contour levels grown into the whole trace
    #[strum(to_string = "contourLabel", serialize = "contour")]
    Contour,
}
impl IslandSplitMethod {
    pub fn parse(method: &str) -> Result<Self, UnsupportedMethod> {
        Self::from_str(method).map_err(|_| UnsupportedMethod(method.to_string()))
    }
}

/// Unknown method selector
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("method {0:?} not supported")]
pub struct UnsupportedMethod(pub String);

/// Resolved processing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingParameters {
    pub num_bunches: usize,
    /// median filter neighbourhood size [pixel]
    pub median_filter: usize,
    /// number of noise standard deviations of the signal threshold
    pub snr_filter: f64,
    /// fraction of the profile maximum defining the trace waist
    pub roi_waist_threshold: f64,
    /// number of waists the ROI spans around the trace
    pub roi_expand: f64,
    pub island_split_method: IslandSplitMethod,
    pub island_split_par1: f64,
    pub island_split_par2: f64,
    pub dark_reference_path: Option<PathBuf>,
}
impl Default for ProcessingParameters {
    fn default() -> Self {
        Self {
            num_bunches: DEFAULT_NUM_BUNCHES,
            median_filter: DEFAULT_MEDIAN_FILTER,
            snr_filter: DEFAULT_SNR_FILTER,
            roi_waist_threshold: DEFAULT_ROI_WAIST_THRESHOLD,
            roi_expand: DEFAULT_ROI_EXPAND,
            island_split_method: IslandSplitMethod::ConnectedComponents,
            island_split_par1: DEFAULT_ISLAND_SPLIT_PAR1,
            island_split_par2: DEFAULT_ISLAND_SPLIT_PAR2,
            dark_reference_path: None,
        }
    }
}

/// Caller supplied parameters, `None` meaning "not set"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterOverrides {
    pub num_bunches: Option<usize>,
    pub median_filter: Option<usize>,
    pub snr_filter: Option<f64>,
    pub roi_waist_threshold: Option<f64>,
    pub roi_expand: Option<f64>,
    pub island_split_method: Option<IslandSplitMethod>,
    pub island_split_par1: Option<f64>,
    pub island_split_par2: Option<f64>,
    pub dark_reference_path: Option<PathBuf>,
}
impl ParameterOverrides {
    pub fn num_bunches(self, num_bunches: usize) -> Self {
        Self {
            num_bunches: Some(num_bunches),
            ..self
        }
    }
    pub fn median_filter(self, median_filter: usize) -> Self {
        Self {
            median_filter: Some(median_filter),
            ..self
        }
    }
    pub fn snr_filter(self, snr_filter: f64) -> Self {
        Self {
            snr_filter: Some(snr_filter),
            ..self
        }
    }
    pub fn roi_waist_threshold(self, roi_waist_threshold: f64) -> Self {
        Self {
            roi_waist_threshold: Some(roi_waist_threshold),
            ..self
        }
    }
    pub fn roi_expand(self, roi_expand: f64) -> Self {
        Self {
            roi_expand: Some(roi_expand),
            ..self
        }
    }
    pub fn island_split_method(self, island_split_method: IslandSplitMethod) -> Self {
        Self {
            island_split_method: Some(island_split_method),
            ..self
        }
    }
    pub fn island_split_par1(self, island_split_par1: f64) -> Self {
        Self {
            island_split_par1: Some(island_split_par1),
            ..self
        }
    }
    pub fn island_split_par2(self, island_split_par2: f64) -> Self {
        Self {
            island_split_par2: Some(island_split_par2),
            ..self
        }
    }
    pub fn dark_reference_path<P: Into<PathBuf>>(self, path: P) -> Self {
        Self {
            dark_reference_path: Some(path.into()),
            ..self
        }
    }
}

/// Conflict found while resolving the parameters
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterWarning {
    BunchCountMismatch { requested: usize, reference: usize },
}
impl fmt::Display for ParameterWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterWarning::BunchCountMismatch {
                requested,
                reference,
            } => write!(
                f,
                "number of bunches input ({}) differs from number of bunches found in lasing off reference ({}), using the reference value",
                requested, reference
            ),
        }
    }
}

/// Resolved parameters and the conflicts met on the way
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub parameters: ProcessingParameters,
    pub warnings: Vec<ParameterWarning>,
}

/// Resolves the parameters: explicit > lasing off reference > default
pub fn resolve(
    overrides: &ParameterOverrides,
    reference: Option<&ProcessingParameters>,
) -> Resolution {
    let defaults = ProcessingParameters::default();
    let mut warnings = vec![];
    let num_bunches = match (overrides.num_bunches, reference) {
        (Some(requested), Some(reference)) if requested != reference.num_bunches => {
            warnings.push(ParameterWarning::BunchCountMismatch {
                requested,
                reference: reference.num_bunches,
            });
            reference.num_bunches
        }
        (_, Some(reference)) => reference.num_bunches,
        (Some(requested), None) => requested,
        (None, None) => defaults.num_bunches,
    };
    warnings.iter().for_each(|w| log::warn!("{}", w));
    macro_rules! pick {
        ($field:ident) => {
            overrides
                .$field
                .or_else(|| reference.map(|r| r.$field))
                .unwrap_or(defaults.$field)
        };
    }
    let parameters = ProcessingParameters {
        num_bunches,
        median_filter: pick!(median_filter),
        snr_filter: pick!(snr_filter),
        roi_waist_threshold: pick!(roi_waist_threshold),
        roi_expand: pick!(roi_expand),
        island_split_method: pick!(island_split_method),
        island_split_par1: pick!(island_split_par1),
        island_split_par2: pick!(island_split_par2),
        dark_reference_path: overrides
            .dark_reference_path
            .clone()
            .or_else(|| reference.and_then(|r| r.dark_reference_path.clone())),
    };
    log::debug!("resolved processing parameters: {:?}", parameters);
    Resolution {
        parameters,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn reference() -> ProcessingParameters {
        ProcessingParameters {
            num_bunches: 2,
            median_filter: 5,
            snr_filter: 7.,
            roi_waist_threshold: 0.3,
            roi_expand: 3.,
            island_split_method: IslandSplitMethod::Contour,
            island_split_par1: 4.,
            island_split_par2: 6.,
            dark_reference_path: Some("pedestals.pkl".into()),
        }
    }

    #[test]
    fn defaults_without_reference() {
        let resolution = resolve(&ParameterOverrides::default(), None);
        assert_eq!(resolution.parameters, ProcessingParameters::default());
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn reference_over_defaults() {
        let resolution = resolve(&ParameterOverrides::default(), Some(&reference()));
        assert_eq!(resolution.parameters, reference());
    }

    #[test]
    fn explicit_over_reference() {
        let overrides = ParameterOverrides::default()
            .median_filter(1)
            .snr_filter(3.)
            .roi_waist_threshold(0.1)
            .roi_expand(1.5)
            .island_split_method(IslandSplitMethod::ConnectedComponents)
            .island_split_par1(2.)
            .island_split_par2(8.)
            .dark_reference_path("dark.pkl");
        let p = resolve(&overrides, Some(&reference())).parameters;
        assert_eq!(p.median_filter, 1);
        assert_eq!(p.snr_filter, 3.);
        assert_eq!(p.roi_waist_threshold, 0.1);
        assert_eq!(p.roi_expand, 1.5);
        assert_eq!(p.island_split_method, IslandSplitMethod::ConnectedComponents);
        assert_eq!(p.island_split_par1, 2.);
        assert_eq!(p.island_split_par2, 8.);
        assert_eq!(p.dark_reference_path, Some(PathBuf::from("dark.pkl")));
        assert_eq!(p.num_bunches, 2);
    }

    #[test]
    fn explicit_over_defaults() {
        let overrides = ParameterOverrides::default().num_bunches(3).snr_filter(2.);
        let p = resolve(&overrides, None).parameters;
        assert_eq!(p.num_bunches, 3);
        assert_eq!(p.snr_filter, 2.);
        assert_eq!(p.median_filter, DEFAULT_MEDIAN_FILTER);
    }

    #[test]
    fn bunch_count_mismatch() {
        let overrides = ParameterOverrides::default().num_bunches(4);
        let resolution = resolve(&overrides, Some(&reference()));
        assert_eq!(resolution.parameters.num_bunches, 2);
        assert_eq!(
            resolution.warnings,
            vec![ParameterWarning::BunchCountMismatch {
                requested: 4,
                reference: 2
            }]
        );
        let matching = resolve(
            &ParameterOverrides::default().num_bunches(2),
            Some(&reference()),
        );
        assert!(matching.warnings.is_empty());
    }

    #[test]
    fn idempotent() {
        let overrides = ParameterOverrides::default().num_bunches(4);
        assert_eq!(
            resolve(&overrides, Some(&reference())),
            resolve(&overrides, Some(&reference()))
        );
    }

    #[test]
    fn legacy_method_names() {
        assert_eq!(
            IslandSplitMethod::parse("scipylabel").unwrap(),
            IslandSplitMethod::ConnectedComponents
        );
        assert_eq!(
            IslandSplitMethod::parse("contourLabel").unwrap(),
            IslandSplitMethod::Contour
        );
        assert!(IslandSplitMethod::parse("watershed").is_err());
        for method in IslandSplitMethod::iter() {
            assert_eq!(IslandSplitMethod::parse(&method.to_string()), Ok(method));
        }
    }
}
