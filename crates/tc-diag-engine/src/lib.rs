//! Tropical Cyclone Diagnostic Engine
//!
//! Computes storm-centric diagnostics (shear, RMW, divergence, vorticity,
//! area averages, distance to land, storm motion) for every forecast hour
//! and pressure level of a model run, and writes them in the fixed-width
//! diagnostics format.
//!
//! # Architecture
//!
//! ```text
//! ModelSpec (YAML) ──► DiagComputation[] ──► ComputationBatch[] (by batch_order)
//!                                                  │
//! for each forecast hour:                          │
//!   GridLoader ──► GridDataset                     │
//!   Track ──► storm (lon, lat)                     │
//!   build_interpolator ──► HourData ───────────────┤
//!                                                  ▼
//!                                  ForecastHourResults (NaN prefilled)
//!                                                  │
//!                                                  ▼
//!                                         to_diag_file (fixed width)
//! ```
//!
//! Computations are plain functions registered under stable identifiers in
//! a [`ComputationRegistry`]; configuration names them by identifier.

pub mod computation;
pub mod config;
pub mod dataset;
pub mod diag_vars;
pub mod driver;
pub mod error;
pub mod kwargs;
pub mod output;
pub mod results;
pub mod template;
pub mod units;

pub use computation::{
    diag_computations_from_entry, get_all_result_names, get_computation_batches, CallContext,
    ComputationBatch, ComputationRegistry, DiagComputation, DiagFn, DiagValue, DiagValues,
    HourData,
};
pub use config::{
    model_entries_from_file, ComputationSpec, DiagVarOutputSpec, InputVarSpec, ModelEntry,
    ModelSpec, OutputType,
};
pub use dataset::{FieldData, GridDataset, GridLoader};
pub use driver::Driver;
pub use error::{ConfigError, DatasetError, DiagError, EngineError, Result, ResultsError};
pub use kwargs::{Kwargs, LEVEL_KWARG};
pub use output::{diag_filename, to_diag_file, to_diag_string, DiagHeaderInfo, DIAG_MISSING_VALUE};
pub use results::ForecastHourResults;
pub use template::TemplateVars;
pub use units::{UnitConverter, UnitConverterRegistry};
