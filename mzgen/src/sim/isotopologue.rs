use std::collections::{BTreeMap, HashMap};

use mzcore::algorithm::isotope::generate_isotope_distributions;
use mzcore::chemistry::constants::MASS_PROTON;
use mzcore::chemistry::formula::parse_formula;
use mzcore::data::spectrum::MzSpectrum;

use crate::errors::{Result, SimError};
use crate::sim::properties::PeakProperties;

/// Resolves chemical formulas to isotope envelopes. The reference envelope
/// is computed at the first charge of the configured charge list; envelope
/// order is the provider's natural order and is never re-sorted downstream.
pub trait EnvelopeProvider {
    fn resolve(&self, formulas: &[String], charges: &[i32]) -> Result<BTreeMap<String, MzSpectrum>>;
}

/// Envelope provider backed by elementwise isotope-distribution convolution.
pub struct ConvolutionEnvelopeProvider {
    pub mass_tolerance: f64,
    pub abundance_threshold: f64,
    pub max_peaks: i32,
    pub num_threads: usize,
}

impl Default for ConvolutionEnvelopeProvider {
    fn default() -> Self {
        ConvolutionEnvelopeProvider {
            mass_tolerance: 1e-3,
            abundance_threshold: 1e-9,
            max_peaks: 200,
            num_threads: 4,
        }
    }
}

impl EnvelopeProvider for ConvolutionEnvelopeProvider {
    fn resolve(&self, formulas: &[String], charges: &[i32]) -> Result<BTreeMap<String, MzSpectrum>> {
        let reference_charge = charges.first().copied().unwrap_or(1);

        let mut compositions: Vec<HashMap<String, i32>> = Vec::with_capacity(formulas.len());
        for formula in formulas {
            let composition = parse_formula(formula).map_err(|msg| SimError::InvalidFormula {
                formula: formula.clone(),
                msg,
            })?;
            compositions.push(composition);
        }

        let distributions = generate_isotope_distributions(
            &compositions,
            self.mass_tolerance,
            self.abundance_threshold,
            self.max_peaks,
            self.num_threads,
        );

        let mut envelopes = BTreeMap::new();
        for (formula, distribution) in formulas.iter().zip(distributions) {
            let mz = distribution
                .iter()
                .map(|(mass, _)| (mass + reference_charge as f64 * MASS_PROTON) / reference_charge as f64)
                .collect();
            let intensity = distribution.iter().map(|(_, abundance)| *abundance).collect();
            envelopes.insert(formula.clone(), MzSpectrum::new(mz, intensity));
        }
        Ok(envelopes)
    }
}

/// Build the per-molecule envelope library once, before the simulation
/// starts. An empty molecule set produces an empty library.
pub fn build_isotopologue_library(
    properties: &[PeakProperties],
    provider: &dyn EnvelopeProvider,
    charges: &[i32],
) -> Result<BTreeMap<String, MzSpectrum>> {
    if properties.is_empty() {
        return Ok(BTreeMap::new());
    }
    let formulas: Vec<String> = properties
        .iter()
        .map(|p| p.chemical_formula.clone())
        .collect();
    provider.resolve(&formulas, charges)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_molecule_set_builds_empty_library() {
        let provider = ConvolutionEnvelopeProvider::default();
        let library = build_isotopologue_library(&[], &provider, &[1]).unwrap();
        assert!(library.is_empty());
    }

    #[test]
    fn test_water_envelope_at_reference_charge() {
        let provider = ConvolutionEnvelopeProvider::default();
        let envelopes = provider.resolve(&["H2O".to_string()], &[1]).unwrap();
        let water = &envelopes["H2O"];

        assert_eq!(water.mz.len(), water.intensity.len());
        assert!(!water.is_empty());
        assert!((water.mz[0] - 19.01784115).abs() < 1e-4);
        // Provider order is mass-ascending, left untouched
        assert!(water.mz.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_bad_formula_is_a_configuration_error() {
        let provider = ConvolutionEnvelopeProvider::default();
        let err = provider.resolve(&["notaformula".to_string()], &[1]).unwrap_err();
        assert!(matches!(err, SimError::InvalidFormula { .. }));
    }
}
