use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SimError};
use crate::sim::properties::{PeakProperties, RawPeakProperties};

/// Wire format of one molecule configuration row. `peak_params` carries
/// comma-joined `key=value` pairs inside one (quoted) field.
#[derive(Debug, Deserialize)]
struct RawPropertiesRow {
    chemical_formula: String,
    #[serde(default)]
    trivial_name: Option<String>,
    #[serde(default)]
    charge: Option<i32>,
    #[serde(default)]
    scan_start_time: Option<f64>,
    #[serde(default)]
    peak_width: Option<f64>,
    #[serde(default)]
    peak_scaling_factor: Option<f64>,
    #[serde(default)]
    peak_function: Option<String>,
    #[serde(default)]
    peak_params: Option<String>,
}

#[derive(Debug, Serialize)]
struct PropertiesRow<'a> {
    chemical_formula: &'a str,
    trivial_name: &'a str,
    charge: i32,
    scan_start_time: f64,
    peak_width: f64,
    peak_scaling_factor: f64,
    peak_function: &'a str,
    peak_params: String,
}

fn parse_peak_params(field: &str, line: usize) -> Result<BTreeMap<String, f64>> {
    let mut params = BTreeMap::new();
    for pair in field.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').ok_or_else(|| SimError::MalformedRow {
            line,
            msg: format!("expected key=value in peak_params, got '{}'", pair),
        })?;
        let value: f64 = value.trim().parse().map_err(|_| SimError::MalformedRow {
            line,
            msg: format!("peak_params value for '{}' is not a number", key.trim()),
        })?;
        params.insert(key.trim().to_string(), value);
    }
    Ok(params)
}

fn format_peak_params(params: &BTreeMap<String, f64>) -> String {
    params.iter().map(|(key, value)| format!("{}={}", key, value)).join(",")
}

/// Read raw molecule rows; validation and defaulting happen afterwards in
/// [`crate::sim::properties::check_peak_properties`].
pub fn read_peak_properties<R: Read>(reader: R) -> Result<Vec<RawPeakProperties>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for (index, record) in csv_reader.deserialize::<RawPropertiesRow>().enumerate() {
        let line = index + 2; // header is line 1
        let row = record?;
        let peak_params = match &row.peak_params {
            Some(field) => parse_peak_params(field, line)?,
            None => BTreeMap::new(),
        };
        rows.push(RawPeakProperties {
            chemical_formula: row.chemical_formula,
            trivial_name: row.trivial_name,
            charge: row.charge,
            scan_start_time: row.scan_start_time,
            peak_width: row.peak_width,
            peak_function: row.peak_function,
            peak_params,
            peak_scaling_factor: row.peak_scaling_factor,
        });
    }
    Ok(rows)
}

pub fn read_peak_properties_path(path: &Path) -> Result<Vec<RawPeakProperties>> {
    let file = File::open(path).map_err(|source| SimError::Io {
        source,
        path: Some(path.to_path_buf()),
    })?;
    read_peak_properties(file)
}

/// Write the configuration as used, after defaulting. Reading the output
/// back reproduces an equivalent molecule set.
pub fn write_peak_properties<W: Write>(writer: W, properties: &[PeakProperties]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for props in properties {
        csv_writer.serialize(PropertiesRow {
            chemical_formula: &props.chemical_formula,
            trivial_name: &props.trivial_name,
            charge: props.charge,
            scan_start_time: props.scan_start_time,
            peak_width: props.peak_width,
            peak_scaling_factor: props.peak_scaling_factor,
            peak_function: props.peak_function.as_str(),
            peak_params: format_peak_params(&props.peak_params),
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_peak_properties_path(path: &Path, properties: &[PeakProperties]) -> Result<()> {
    let file = File::create(path).map_err(|source| SimError::Io {
        source,
        path: Some(path.to_path_buf()),
    })?;
    write_peak_properties(file, properties)
}
