use std::collections::BTreeMap;

use mzcore::chemistry::formula::{calculate_mz, SumFormula};
use mzcore::data::spectrum::MzSpectrum;

use crate::errors::{Result, SimError};

/// Intensity assigned to every knowledge-base fragment peak.
const FRAGMENT_INTENSITY: f64 = 100.0;

/// Produces fragment spectra for a molecule, addressed by trivial name.
pub trait Fragmentor {
    fn fragment(&self, trivial_name: &str) -> Result<MzSpectrum>;
}

/// Built-in nucleoside fragmentation knowledge base: trivial name to the
/// sum formulas of the fragments observed for the protonated species.
pub fn nucleoside_fragment_kb() -> BTreeMap<&'static str, Vec<&'static str>> {
    let mut map = BTreeMap::new();
    map.insert("adenosine", vec!["C5H5N5", "C5H2N4"]);
    map.insert("guanosine", vec!["C5H5N5O"]);
    map.insert("cytidine", vec!["C4H5N3O"]);
    map.insert("uridine", vec!["C4H4N2O2"]);
    map.insert("inosine", vec!["C5H4N4O"]);
    map
}

/// Fragmentor backed by a name-to-fragment-formulas knowledge base. The
/// knowledge base is a constructor argument; [`nucleoside_fragment_kb`] is
/// the documented default.
pub struct KnowledgeBaseFragmentor {
    fragment_mz: BTreeMap<String, Vec<f64>>,
}

impl KnowledgeBaseFragmentor {
    pub fn new(kb: &BTreeMap<&str, Vec<&str>>) -> Result<Self> {
        let mut fragment_mz: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for (name, formulas) in kb {
            let mut mz_values = Vec::with_capacity(formulas.len());
            for formula in formulas {
                let fragment = SumFormula::new(formula).map_err(|msg| SimError::InvalidFormula {
                    formula: formula.to_string(),
                    msg,
                })?;
                mz_values.push(calculate_mz(fragment.monoisotopic_weight(), 1));
            }
            fragment_mz.insert(name.to_string(), mz_values);
        }
        Ok(KnowledgeBaseFragmentor { fragment_mz })
    }

    pub fn with_default_kb() -> Result<Self> {
        Self::new(&nucleoside_fragment_kb())
    }
}

impl Fragmentor for KnowledgeBaseFragmentor {
    fn fragment(&self, trivial_name: &str) -> Result<MzSpectrum> {
        let mz_values = self
            .fragment_mz
            .get(trivial_name)
            .ok_or(SimError::UnknownMolecule {
                name: trivial_name.to_string(),
            })?;
        let intensity = vec![FRAGMENT_INTENSITY; mz_values.len()];
        Ok(MzSpectrum::new(mz_values.clone(), intensity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_kb_fragments_adenosine() {
        let fragmentor = KnowledgeBaseFragmentor::with_default_kb().unwrap();
        let fragments = fragmentor.fragment("adenosine").unwrap();

        assert_eq!(fragments.mz.len(), 2);
        assert_eq!(fragments.intensity, vec![FRAGMENT_INTENSITY; 2]);
        // Protonated adenine
        assert!((fragments.mz[0] - 136.0618).abs() < 1e-3);
    }

    #[test]
    fn test_unknown_molecule_is_an_error() {
        let fragmentor = KnowledgeBaseFragmentor::with_default_kb().unwrap();
        let err = fragmentor.fragment("caffeine").unwrap_err();
        assert!(matches!(err, SimError::UnknownMolecule { .. }));
    }

    #[test]
    fn test_custom_kb_is_injected() {
        let mut kb = BTreeMap::new();
        kb.insert("salt", vec!["NaCl"]);
        let fragmentor = KnowledgeBaseFragmentor::new(&kb).unwrap();
        let fragments = fragmentor.fragment("salt").unwrap();
        assert_eq!(fragments.mz.len(), 1);
    }
}
