use std::path::PathBuf;

/// Everything that can abort a generation run. Configuration problems are
/// raised before the simulation starts and name the offending parameter
/// and molecule; collaborator and I/O failures propagate as-is.
#[derive(Debug)]
pub enum SimError {
    MissingParameter {
        parameter: &'static str,
        molecule: Option<String>,
    },
    InvalidParameter {
        parameter: &'static str,
        molecule: Option<String>,
        msg: String,
    },
    UnsupportedPeakFunction {
        molecule: String,
        function: String,
    },
    DuplicateMolecule {
        formula: String,
    },
    InvalidFormula {
        formula: String,
        msg: String,
    },
    MalformedRow {
        line: usize,
        msg: String,
    },
    UnknownMolecule {
        name: String,
    },
    LengthMismatch {
        scan_id: u32,
        mz_len: usize,
        intensity_len: usize,
    },
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },
    Csv(csv::Error),
    Json(serde_json::Error),
    Xml(quick_xml::Error),
}

impl std::fmt::Display for SimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimError::MissingParameter { parameter, molecule } => match molecule {
                Some(molecule) => {
                    write!(f, "parameter {} is required but not set for molecule {}", parameter, molecule)
                }
                None => write!(f, "parameter {} is required but not set", parameter),
            },
            SimError::InvalidParameter { parameter, molecule, msg } => match molecule {
                Some(molecule) => {
                    write!(f, "invalid parameter {} for molecule {}: {}", parameter, molecule, msg)
                }
                None => write!(f, "invalid parameter {}: {}", parameter, msg),
            },
            SimError::UnsupportedPeakFunction { molecule, function } => {
                write!(f, "unsupported peak function '{}' for molecule {}", function, molecule)
            }
            SimError::DuplicateMolecule { formula } => {
                write!(f, "duplicate chemical formula {}", formula)
            }
            SimError::InvalidFormula { formula, msg } => {
                write!(f, "cannot parse chemical formula '{}': {}", formula, msg)
            }
            SimError::MalformedRow { line, msg } => {
                write!(f, "malformed configuration row {}: {}", line, msg)
            }
            SimError::UnknownMolecule { name } => {
                write!(f, "no fragments known for molecule '{}'", name)
            }
            SimError::LengthMismatch { scan_id, mz_len, intensity_len } => {
                write!(
                    f,
                    "scan {} has {} m/z values but {} intensities",
                    scan_id, mz_len, intensity_len
                )
            }
            SimError::Io { source, path } => match path {
                Some(path) => write!(f, "io error on {:?}: {}", path, source),
                None => write!(f, "io error: {}", source),
            },
            SimError::Csv(e) => write!(f, "csv error: {}", e),
            SimError::Json(e) => write!(f, "json error: {}", e),
            SimError::Xml(e) => write!(f, "xml error: {}", e),
        }
    }
}

impl std::error::Error for SimError {}

pub type Result<T> = std::result::Result<T, SimError>;

impl From<std::io::Error> for SimError {
    fn from(source: std::io::Error) -> Self {
        Self::Io { source, path: None }
    }
}

impl From<csv::Error> for SimError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}

impl From<serde_json::Error> for SimError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<quick_xml::Error> for SimError {
    fn from(e: quick_xml::Error) -> Self {
        Self::Xml(e)
    }
}
