use std::collections::{BTreeMap, BTreeSet};

use mzcore::chemistry::formula::parse_formula;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SimError};

pub const DEFAULT_CHARGE: i32 = 2;
pub const DEFAULT_PEAK_SCALING_FACTOR: f64 = 1e3;
pub const DEFAULT_MS_RT_DIFF: f64 = 0.03;

/// Chromatographic peak shape of a molecule's elution profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeakShape {
    Gauss,
    Gamma,
    None,
}

impl PeakShape {
    pub fn parse(name: &str) -> Option<PeakShape> {
        match name {
            "gauss" => Some(PeakShape::Gauss),
            "gamma" => Some(PeakShape::Gamma),
            "none" => Some(PeakShape::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PeakShape::Gauss => "gauss",
            PeakShape::Gamma => "gamma",
            PeakShape::None => "none",
        }
    }
}

/// Per-molecule simulation parameters as they arrive from configuration,
/// before defaulting and validation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawPeakProperties {
    pub chemical_formula: String,
    pub trivial_name: Option<String>,
    pub charge: Option<i32>,
    pub scan_start_time: Option<f64>,
    pub peak_width: Option<f64>,
    pub peak_function: Option<String>,
    #[serde(default)]
    pub peak_params: BTreeMap<String, f64>,
    pub peak_scaling_factor: Option<f64>,
}

/// Validated per-molecule simulation parameters. Immutable once the run
/// starts; the configuration row order is the engine's iteration order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeakProperties {
    pub chemical_formula: String,
    pub trivial_name: String,
    pub charge: i32,
    pub scan_start_time: f64,
    pub peak_width: f64,
    pub peak_function: PeakShape,
    pub peak_params: BTreeMap<String, f64>,
    pub peak_scaling_factor: f64,
}

impl PeakProperties {
    /// Elution window [start, start + width], both ends inclusive.
    pub fn is_active_at(&self, rt: f64) -> bool {
        self.scan_start_time <= rt && rt <= self.scan_start_time + self.peak_width
    }

    /// Midpoint of the elution window, the mean of the shape distributions.
    pub fn elution_center(&self) -> f64 {
        self.scan_start_time + 0.5 * self.peak_width
    }
}

/// Run-level parameters as they arrive from configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawRunParams {
    pub gradient_length: Option<f64>,
    pub ms_rt_diff: Option<f64>,
    pub charges: Option<Vec<i32>>,
}

/// Validated run-level parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunParams {
    pub gradient_length: f64,
    pub ms_rt_diff: f64,
    pub charges: Vec<i32>,
}

fn invalid(parameter: &'static str, molecule: Option<&str>, msg: impl Into<String>) -> SimError {
    SimError::InvalidParameter {
        parameter,
        molecule: molecule.map(str::to_string),
        msg: msg.into(),
    }
}

/// Validate raw per-molecule parameters, filling defaults where the schema
/// defines them and failing on anything required but absent.
pub fn check_peak_properties(rows: Vec<RawPeakProperties>) -> Result<Vec<PeakProperties>> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut validated = Vec::with_capacity(rows.len());

    for raw in rows {
        let formula = raw.chemical_formula;
        if formula.is_empty() {
            return Err(SimError::MissingParameter {
                parameter: "chemical_formula",
                molecule: None,
            });
        }
        if !seen.insert(formula.clone()) {
            return Err(SimError::DuplicateMolecule { formula });
        }
        parse_formula(&formula).map_err(|msg| SimError::InvalidFormula {
            formula: formula.clone(),
            msg,
        })?;

        let scan_start_time = raw.scan_start_time.ok_or(SimError::MissingParameter {
            parameter: "scan_start_time",
            molecule: Some(formula.clone()),
        })?;
        if scan_start_time < 0.0 {
            return Err(invalid("scan_start_time", Some(&formula), "must be >= 0"));
        }

        let peak_width = raw.peak_width.ok_or(SimError::MissingParameter {
            parameter: "peak_width",
            molecule: Some(formula.clone()),
        })?;
        if peak_width <= 0.0 {
            return Err(invalid("peak_width", Some(&formula), "must be > 0"));
        }

        let charge = raw.charge.unwrap_or(DEFAULT_CHARGE);
        if charge < 1 {
            return Err(invalid("charge", Some(&formula), "must be >= 1"));
        }

        let peak_scaling_factor = raw.peak_scaling_factor.unwrap_or(DEFAULT_PEAK_SCALING_FACTOR);
        if peak_scaling_factor <= 0.0 {
            return Err(invalid("peak_scaling_factor", Some(&formula), "must be > 0"));
        }

        let peak_function = match raw.peak_function {
            None => PeakShape::Gauss,
            Some(name) => PeakShape::parse(&name).ok_or(SimError::UnsupportedPeakFunction {
                molecule: formula.clone(),
                function: name,
            })?,
        };

        match peak_function {
            PeakShape::Gauss => {
                if let Some(&sigma) = raw.peak_params.get("sigma") {
                    if sigma <= 0.0 {
                        return Err(invalid("peak_params.sigma", Some(&formula), "must be > 0"));
                    }
                }
            }
            PeakShape::Gamma => {
                let a = raw.peak_params.get("a").ok_or(SimError::MissingParameter {
                    parameter: "peak_params.a",
                    molecule: Some(formula.clone()),
                })?;
                let scale = raw.peak_params.get("scale").ok_or(SimError::MissingParameter {
                    parameter: "peak_params.scale",
                    molecule: Some(formula.clone()),
                })?;
                if *a <= 0.0 || *scale <= 0.0 {
                    return Err(invalid("peak_params", Some(&formula), "gamma a and scale must be > 0"));
                }
            }
            PeakShape::None => {}
        }

        let trivial_name = match raw.trivial_name {
            Some(name) if !name.is_empty() => name,
            _ => formula.clone(),
        };

        validated.push(PeakProperties {
            chemical_formula: formula,
            trivial_name,
            charge,
            scan_start_time,
            peak_width,
            peak_function,
            peak_params: raw.peak_params,
            peak_scaling_factor,
        });
    }

    Ok(validated)
}

/// Validate run-level parameters, filling defaults.
pub fn check_run_params(raw: RawRunParams) -> Result<RunParams> {
    let gradient_length = raw.gradient_length.ok_or(SimError::MissingParameter {
        parameter: "gradient_length",
        molecule: None,
    })?;
    if gradient_length < 0.0 {
        return Err(invalid("gradient_length", None, "must be >= 0"));
    }

    let ms_rt_diff = raw.ms_rt_diff.unwrap_or(DEFAULT_MS_RT_DIFF);
    if ms_rt_diff <= 0.0 {
        return Err(invalid("ms_rt_diff", None, "must be > 0"));
    }

    let charges = raw.charges.unwrap_or_else(|| vec![1]);
    if charges.is_empty() {
        return Err(invalid("charges", None, "must not be empty"));
    }
    if charges.iter().any(|&c| c < 1) {
        return Err(invalid("charges", None, "all charges must be >= 1"));
    }

    Ok(RunParams {
        gradient_length,
        ms_rt_diff,
        charges,
    })
}
