use std::collections::HashMap;

use crate::algorithm::isotope::generate_isotope_distribution;
use crate::chemistry::constants::MASS_PROTON;
use crate::chemistry::elements::atomic_weights_mono_isotopic;
use crate::data::spectrum::MzSpectrum;

/// calculate the m/z of an ion
///
/// # Examples
///
/// ```
/// use mzcore::chemistry::formula::calculate_mz;
///
/// let mz = calculate_mz(1000.0, 2);
/// assert_eq!(mz, 501.007276466621);
/// ```
pub fn calculate_mz(monoisotopic_mass: f64, charge: i32) -> f64 {
    (monoisotopic_mass + charge as f64 * MASS_PROTON) / charge as f64
}

/// A parsed elemental sum formula.
pub struct SumFormula {
    pub formula: String,
    pub elements: HashMap<String, i32>,
}

impl SumFormula {
    pub fn new(formula: &str) -> Result<Self, String> {
        let elements = parse_formula(formula)?;
        Ok(SumFormula {
            formula: formula.to_string(),
            elements,
        })
    }

    /// Monoisotopic mass of the neutral molecule.
    pub fn monoisotopic_weight(&self) -> f64 {
        let atomic_weights = atomic_weights_mono_isotopic();
        self.elements.iter().fold(0.0, |acc, (element, count)| {
            acc + atomic_weights[element.as_str()] * *count as f64
        })
    }

    /// Isotope envelope of the protonated species at the given charge,
    /// m/z ascending, abundances normalized to sum one.
    pub fn isotope_distribution(&self, charge: i32) -> MzSpectrum {
        let distribution = generate_isotope_distribution(&self.elements, 1e-3, 1e-9, 200);
        let intensity = distribution.iter().map(|(_, i)| *i).collect();
        let mz = distribution
            .iter()
            .map(|(m, _)| (*m + charge as f64 * MASS_PROTON) / charge as f64)
            .collect();
        MzSpectrum::new(mz, intensity)
    }
}

/// Scan a sum formula into element counts. Accepts an optional leading `+`
/// (knowledge bases mark adduct formulas that way).
pub fn parse_formula(formula: &str) -> Result<HashMap<String, i32>, String> {
    let atomic_weights = atomic_weights_mono_isotopic();
    let mut element_counts: HashMap<String, i32> = HashMap::new();
    let mut chars = formula.chars().peekable();

    if let Some('+') = chars.peek() {
        chars.next();
    }

    while let Some(c) = chars.next() {
        if !c.is_ascii_uppercase() {
            return Err(format!("Unexpected character '{}' in formula '{}'", c, formula));
        }
        let mut element = c.to_string();
        while let Some(&next) = chars.peek() {
            if next.is_ascii_lowercase() {
                element.push(next);
                chars.next();
            } else {
                break;
            }
        }
        let mut digits = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_ascii_digit() {
                digits.push(next);
                chars.next();
            } else {
                break;
            }
        }
        let count = if digits.is_empty() {
            1
        } else {
            digits.parse::<i32>().map_err(|e| e.to_string())?
        };
        if !atomic_weights.contains_key(element.as_str()) {
            return Err(format!("Unknown element: {}", element));
        }
        *element_counts.entry(element).or_insert(0) += count;
    }

    if element_counts.is_empty() {
        return Err(format!("Empty formula: '{}'", formula));
    }

    Ok(element_counts)
}
