use statrs::distribution::{Continuous, Gamma, Normal};

use crate::errors::{Result, SimError};
use crate::sim::properties::{PeakProperties, PeakShape};

/// Chromatographic shape factor of a molecule at retention time `rt`.
///
/// `gauss` evaluates a normal density centered on the elution window
/// midpoint, `gamma` evaluates a gamma density at `rt` itself, `none`
/// applies no shaping at all.
pub fn shape_factor(rt: f64, props: &PeakProperties) -> Result<f64> {
    match props.peak_function {
        PeakShape::Gauss => {
            let sigma = props
                .peak_params
                .get("sigma")
                .copied()
                .unwrap_or(props.peak_width / 10.0);
            let normal = Normal::new(props.elution_center(), sigma).map_err(|e| {
                SimError::InvalidParameter {
                    parameter: "peak_params.sigma",
                    molecule: Some(props.chemical_formula.clone()),
                    msg: e.to_string(),
                }
            })?;
            Ok(normal.pdf(rt))
        }
        PeakShape::Gamma => {
            let a = props.peak_params.get("a").ok_or(SimError::MissingParameter {
                parameter: "peak_params.a",
                molecule: Some(props.chemical_formula.clone()),
            })?;
            let scale = props.peak_params.get("scale").ok_or(SimError::MissingParameter {
                parameter: "peak_params.scale",
                molecule: Some(props.chemical_formula.clone()),
            })?;
            // statrs parameterizes by rate, the configuration by scale
            let gamma = Gamma::new(*a, 1.0 / *scale).map_err(|e| SimError::InvalidParameter {
                parameter: "peak_params",
                molecule: Some(props.chemical_formula.clone()),
                msg: e.to_string(),
            })?;
            Ok(gamma.pdf(rt))
        }
        PeakShape::None => Ok(1.0),
    }
}

/// Rescale raw envelope intensities to the chromatographic profile at `rt`:
/// raw × shape factor × peak scaling factor.
pub fn rescale_intensity(raw: &[f64], rt: f64, props: &PeakProperties) -> Result<Vec<f64>> {
    let factor = shape_factor(rt, props)? * props.peak_scaling_factor;
    Ok(raw.iter().map(|&i| i * factor).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn gauss_props(sigma: Option<f64>) -> PeakProperties {
        let mut peak_params = BTreeMap::new();
        if let Some(sigma) = sigma {
            peak_params.insert("sigma".to_string(), sigma);
        }
        PeakProperties {
            chemical_formula: "H2O".to_string(),
            trivial_name: "water".to_string(),
            charge: 1,
            scan_start_time: 0.0,
            peak_width: 10.0,
            peak_function: PeakShape::Gauss,
            peak_params,
            peak_scaling_factor: 1000.0,
        }
    }

    #[test]
    fn test_gauss_factor_peaks_at_elution_center() {
        let props = gauss_props(Some(1.0));
        // Normal density at its mean with sigma 1
        let at_center = shape_factor(5.0, &props).unwrap();
        assert!((at_center - 0.39894228040143265).abs() < 1e-12);
        assert!(shape_factor(2.0, &props).unwrap() < at_center);
        assert!(shape_factor(8.0, &props).unwrap() < at_center);
    }

    #[test]
    fn test_gauss_sigma_defaults_to_tenth_of_width() {
        let defaulted = gauss_props(None);
        let explicit = gauss_props(Some(1.0));
        assert_eq!(
            shape_factor(5.0, &defaulted).unwrap(),
            shape_factor(5.0, &explicit).unwrap()
        );
    }

    #[test]
    fn test_rescale_applies_scaling_factor() {
        let props = gauss_props(Some(1.0));
        let scaled = rescale_intensity(&[1.0, 2.0], 5.0, &props).unwrap();
        let expected = 0.39894228040143265 * 1000.0;
        assert!((scaled[0] - expected).abs() < 1e-9);
        assert!((scaled[1] - 2.0 * expected).abs() < 1e-9);
    }

    #[test]
    fn test_none_shape_only_scales() {
        let mut props = gauss_props(None);
        props.peak_function = PeakShape::None;
        let scaled = rescale_intensity(&[0.5], 3.0, &props).unwrap();
        assert_eq!(scaled, vec![500.0]);
    }

    #[test]
    fn test_gamma_density_matches_closed_form() {
        let mut props = gauss_props(None);
        props.peak_function = PeakShape::Gamma;
        props.peak_params.insert("a".to_string(), 2.0);
        props.peak_params.insert("scale".to_string(), 1.0);
        // a = 2, scale = 1 at rt = 1: e^-1
        let factor = shape_factor(1.0, &props).unwrap();
        assert!((factor - (-1.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_gamma_without_parameters_errors() {
        let mut props = gauss_props(None);
        props.peak_function = PeakShape::Gamma;
        props.peak_params.clear();
        let err = shape_factor(1.0, &props).unwrap_err();
        assert!(matches!(err, SimError::MissingParameter { parameter: "peak_params.a", .. }));
    }
}
