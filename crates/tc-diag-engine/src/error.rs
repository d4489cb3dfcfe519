//! Error types for the diagnostic engine.

use std::path::PathBuf;
use thiserror::Error;

use atcf_track::TrackError;
use cylindrical_grid::{GridError, LutError};

/// Errors found while loading or resolving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration file is not valid YAML for the expected structure.
    #[error("failed to parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A value failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// A computation names a callable that is not registered.
    #[error("computation {name:?}: unknown callable {callable:?}")]
    UnknownComputation { name: String, callable: String },

    /// A computation names a unit converter that is not registered.
    #[error("computation {name:?}: unknown unit converter {converter:?}")]
    UnknownConverter { name: String, converter: String },

    /// Output names, unit labels and converters do not line up.
    #[error(
        "computation {name:?}: {output_vars} output vars, {units} units and {converters} unit converters must have equal lengths"
    )]
    LengthMismatch {
        name: String,
        output_vars: usize,
        units: usize,
        converters: usize,
    },

    /// A path or file-name template could not be rendered.
    #[error("template {template:?}: {message}")]
    Template { template: String, message: String },

    /// A `${VAR}` substitution in a configuration file could not be resolved.
    #[error("{path}:{line}: {message}")]
    EnvVar {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

impl ConfigError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub(crate) fn template(template: &str, message: impl Into<String>) -> Self {
        Self::Template {
            template: template.to_string(),
            message: message.into(),
        }
    }
}

/// Errors from the forecast hour results store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResultsError {
    #[error("unknown pressure independent variable: {0}")]
    UnknownPressureIndependentVar(String),

    #[error("unknown sounding variable: {0}")]
    UnknownSoundingVar(String),

    #[error("unknown forecast hour: {0}")]
    UnknownHour(i32),

    #[error("unknown pressure level: {0} hPa")]
    UnknownLevel(i32),
}

/// Errors from gridded datasets and their loaders.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("variable {0:?} is not in the dataset")]
    UnknownVariable(String),

    #[error("variable {name:?} has no level {level_hpa} hPa")]
    MissingLevel { name: String, level_hpa: f64 },

    #[error("variable {0:?} is a profile and needs a pressure level")]
    LevelRequired(String),

    #[error("variable {name:?} has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The underlying file format could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Errors raised by a single diagnostic computation.
#[derive(Error, Debug)]
pub enum DiagError {
    #[error("missing argument {0:?}")]
    MissingArgument(String),

    #[error("argument {name:?}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("no pressure level given")]
    LevelRequired,

    #[error("no track row for forecast hour {0}")]
    MissingTrackRow(i32),

    #[error("unknown track column {0:?}")]
    UnknownTrackColumn(String),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Results(#[from] ResultsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Failed(String),
}

impl DiagError {
    pub fn invalid_argument(name: &str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

/// Errors that can stop a run.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A computation returned a different number of values than it declares.
    #[error("computation {name:?} returned {actual} values but declares {expected} output vars")]
    OutputCount {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// A computation failed while exceptions were not suppressed.
    #[error("computation {name:?} failed at hour {hour}{}: {source}", level_suffix(.level_hpa))]
    Computation {
        name: String,
        hour: i32,
        level_hpa: Option<i32>,
        #[source]
        source: DiagError,
    },

    /// The configuration asks for something the grid can not provide.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Results(#[from] ResultsError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Lut(#[from] LutError),

    #[error(transparent)]
    Track(#[from] TrackError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn level_suffix(level_hpa: &Option<i32>) -> String {
    level_hpa
        .map(|level| format!(" level {} hPa", level))
        .unwrap_or_default()
}

impl EngineError {
    /// Errors that abort the run even when exceptions are suppressed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::OutputCount { .. } | Self::Validation(_)
        )
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
