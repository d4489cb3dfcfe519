//! Computation registry and batched execution.
//!
//! A [`DiagComputation`] pairs a registered function with its arguments and
//! output description. Computations are grouped by `batch_order` into
//! [`ComputationBatch`]es; batches run in ascending order so a later batch
//! can read what an earlier one stored.

use chrono::{DateTime, Utc};
use ndarray::Array2;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

use atcf_track::{Track, TrackRow};
use cylindrical_grid::{CylindricalGridInterpolator, LandLUT};

use crate::config::{ComputationSpec, ModelSpec};
use crate::dataset::GridDataset;
use crate::diag_vars;
use crate::error::{ConfigError, DiagError, EngineError, Result};
use crate::kwargs::{Kwargs, LEVEL_KWARG};
use crate::results::ForecastHourResults;
use crate::units::{UnitConverter, UnitConverterRegistry};

// ============================================================================
// Values returned by computations
// ============================================================================

/// One computed value and, optionally, the unit it is expressed in.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagValue {
    pub value: f64,
    pub units: Option<String>,
}

impl From<f64> for DiagValue {
    fn from(value: f64) -> Self {
        Self { value, units: None }
    }
}

/// The values of one call, one per output variable.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagValues(Vec<DiagValue>);

impl DiagValues {
    pub fn new(values: Vec<DiagValue>) -> Self {
        Self(values)
    }

    pub fn single(value: f64) -> Self {
        Self(vec![value.into()])
    }

    pub fn pair(first: f64, second: f64) -> Self {
        Self(vec![first.into(), second.into()])
    }

    /// `count` NaN values.
    pub fn missing(count: usize) -> Self {
        Self(vec![f64::NAN.into(); count])
    }

    /// Attach `units` to every value.
    pub fn with_units(mut self, units: &str) -> Self {
        for value in &mut self.0 {
            value.units = Some(units.to_string());
        }
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.iter().map(|v| v.value)
    }

    pub fn into_vec(self) -> Vec<DiagValue> {
        self.0
    }
}

impl From<f64> for DiagValues {
    fn from(value: f64) -> Self {
        Self::single(value)
    }
}

impl From<(f64, f64)> for DiagValues {
    fn from((first, second): (f64, f64)) -> Self {
        Self::pair(first, second)
    }
}

// ============================================================================
// Call context
// ============================================================================

/// Everything known about one forecast hour, shared by all computations.
pub struct HourData<'a> {
    pub dataset: &'a GridDataset,
    pub interpolator: &'a dyn CylindricalGridInterpolator,
    pub land_lut: &'a LandLUT,
    pub track: &'a Track,
    pub track_row: &'a TrackRow,
    /// Flat-earth distance of every source grid point from the storm.
    pub distances_from_tc_km: &'a Array2<f64>,
    pub tc_lon: f64,
    pub tc_lat: f64,
    pub model_spec: &'a ModelSpec,
    pub hour: i32,
    pub model_time: DateTime<Utc>,
}

/// What a single computation call may read.
pub struct CallContext<'a> {
    pub data: &'a HourData<'a>,
    /// Results as they stood when the current batch started.
    pub results: &'a ForecastHourResults,
    pub kwargs: &'a Kwargs,
    /// Current level of a sounding computation.
    pub level_hpa: Option<i32>,
    pub converters: &'a UnitConverterRegistry,
}

impl CallContext<'_> {
    pub fn hour(&self) -> i32 {
        self.data.hour
    }

    /// The sounding level, else a `level_hPa` argument, if either is present.
    pub fn opt_level(&self) -> std::result::Result<Option<i32>, DiagError> {
        match self.level_hpa {
            Some(level) => Ok(Some(level)),
            None => self.kwargs.opt_i32(LEVEL_KWARG),
        }
    }

    /// Like [`CallContext::opt_level`] but a level is required.
    pub fn level(&self) -> std::result::Result<i32, DiagError> {
        self.opt_level()?.ok_or(DiagError::LevelRequired)
    }

    /// Resolve a converter named by argument `name`, if given.
    pub fn converter(&self, name: &str) -> std::result::Result<Option<UnitConverter>, DiagError> {
        match self.kwargs.opt_str(name)? {
            Some(token) => Ok(self.converters.resolve(name, token)?),
            None => Ok(None),
        }
    }
}

/// Signature every diagnostic function implements.
pub type DiagFn = fn(&CallContext<'_>) -> std::result::Result<DiagValues, DiagError>;

// ============================================================================
// Registry
// ============================================================================

/// Maps callable identifiers used in configuration to functions.
#[derive(Debug, Clone, Default)]
pub struct ComputationRegistry {
    functions: BTreeMap<String, DiagFn>,
}

impl ComputationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the diagnostic library.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("mean_in_radius_range", diag_vars::mean_in_radius_range);
        registry.register("max_in_radius_range", diag_vars::max_in_radius_range);
        registry.register("track_row_lookup", diag_vars::track_row_lookup);
        registry.register("shear", diag_vars::shear);
        registry.register("temperature_gradient", diag_vars::temperature_gradient);
        registry.register("always_missing", diag_vars::always_missing);
        registry.register("distance_to_land_lookup", diag_vars::distance_to_land_lookup);
        registry.register("storm_r_theta", diag_vars::storm_r_theta);
        registry.register(
            "radial_and_tangential_area_average",
            diag_vars::radial_and_tangential_area_average,
        );
        registry.register("divergence_vorticity", diag_vars::divergence_vorticity);
        registry.register("average_rmw", diag_vars::average_rmw);
        registry.register("debug_cyl_grid_dump", diag_vars::debug_cyl_grid_dump);
        registry
    }

    pub fn register(&mut self, id: impl Into<String>, function: DiagFn) {
        self.functions.insert(id.into(), function);
    }

    pub fn get(&self, id: &str) -> Option<DiagFn> {
        self.functions.get(id.trim()).copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

// ============================================================================
// Computations
// ============================================================================

/// A named diagnostic bound to its function, arguments and outputs.
#[derive(Clone)]
pub struct DiagComputation {
    name: String,
    callable: String,
    function: DiagFn,
    batch_order: i32,
    kwargs: Kwargs,
    output_vars: Vec<String>,
    units: Vec<Option<String>>,
    unit_converters: Vec<Option<UnitConverter>>,
}

impl std::fmt::Debug for DiagComputation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagComputation")
            .field("name", &self.name)
            .field("callable", &self.callable)
            .field("batch_order", &self.batch_order)
            .field("output_vars", &self.output_vars)
            .finish()
    }
}

impl DiagComputation {
    /// Resolve `spec` against the registries.
    ///
    /// Outputs default to the computation name. Units and converters default
    /// to none per output; when given, their lengths must match the outputs.
    pub fn new(
        name: &str,
        spec: &ComputationSpec,
        registry: &ComputationRegistry,
        converters: &UnitConverterRegistry,
    ) -> std::result::Result<Self, ConfigError> {
        let function = registry
            .get(&spec.callable)
            .ok_or_else(|| ConfigError::UnknownComputation {
                name: name.to_string(),
                callable: spec.callable.clone(),
            })?;

        let output_vars = spec
            .output_vars
            .clone()
            .unwrap_or_else(|| vec![name.to_string()]);
        let n_outputs = output_vars.len();
        if n_outputs == 0 {
            return Err(ConfigError::invalid(format!(
                "computation {:?} declares no output vars",
                name
            )));
        }

        let units = spec.units.clone().unwrap_or_else(|| vec![None; n_outputs]);
        let unit_converters = match &spec.unit_converters {
            Some(tokens) => tokens
                .iter()
                .map(|token| converters.resolve(name, token))
                .collect::<std::result::Result<Vec<_>, _>>()?,
            None => vec![None; n_outputs],
        };

        if units.len() != n_outputs || unit_converters.len() != n_outputs {
            return Err(ConfigError::LengthMismatch {
                name: name.to_string(),
                output_vars: n_outputs,
                units: units.len(),
                converters: unit_converters.len(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            callable: spec.callable.clone(),
            function,
            batch_order: spec.batch_order,
            kwargs: spec.kwargs.clone(),
            output_vars,
            units,
            unit_converters,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn batch_order(&self) -> i32 {
        self.batch_order
    }

    pub fn kwargs(&self) -> &Kwargs {
        &self.kwargs
    }

    pub fn output_vars(&self) -> &[String] {
        &self.output_vars
    }

    /// Call the function with this computation's arguments.
    pub fn compute(
        &self,
        data: &HourData<'_>,
        results: &ForecastHourResults,
        level_hpa: Option<i32>,
        converters: &UnitConverterRegistry,
    ) -> std::result::Result<DiagValues, DiagError> {
        let ctx = CallContext {
            data,
            results,
            kwargs: &self.kwargs,
            level_hpa,
            converters,
        };
        (self.function)(&ctx)
    }

    /// Run once, applying the suppress policy and unit conversion.
    ///
    /// Returns `(output var, value, units)` for each output.
    fn evaluate(
        &self,
        data: &HourData<'_>,
        results: &ForecastHourResults,
        level_hpa: Option<i32>,
        converters: &UnitConverterRegistry,
        suppress_exceptions: bool,
    ) -> Result<Vec<(String, f64, Option<String>)>> {
        let hour = data.hour;
        info!(computation = %self.name, hour, level_hpa = ?level_hpa, "Started computation");

        let values = match self.compute(data, results, level_hpa, converters) {
            Ok(values) => {
                if values.len() != self.output_vars.len() {
                    return Err(EngineError::OutputCount {
                        name: self.name.clone(),
                        expected: self.output_vars.len(),
                        actual: values.len(),
                    });
                }
                values
            }
            Err(source) if suppress_exceptions => {
                warn!(
                    computation = %self.name,
                    hour,
                    level_hpa = ?level_hpa,
                    error = %source,
                    "Computation failed, storing missing values"
                );
                DiagValues::missing(self.output_vars.len())
            }
            Err(source) => {
                return Err(EngineError::Computation {
                    name: self.name.clone(),
                    hour,
                    level_hpa,
                    source,
                })
            }
        };

        let converted: Vec<(String, f64, Option<String>)> = values
            .into_vec()
            .into_iter()
            .enumerate()
            .map(|(i, DiagValue { value, units })| {
                let value = match self.unit_converters[i] {
                    Some(convert) => convert(value),
                    None => value,
                };
                let units = self.units[i].clone().or(units);
                (self.output_vars[i].clone(), value, units)
            })
            .collect();

        info!(
            computation = %self.name,
            hour,
            level_hpa = ?level_hpa,
            values = ?converted.iter().map(|(_, v, _)| *v).collect::<Vec<_>>(),
            "Finished computation"
        );
        Ok(converted)
    }
}

/// Build computations from a configuration mapping.
pub fn diag_computations_from_entry(
    specs: &BTreeMap<String, ComputationSpec>,
    registry: &ComputationRegistry,
    converters: &UnitConverterRegistry,
) -> std::result::Result<Vec<DiagComputation>, ConfigError> {
    specs
        .iter()
        .map(|(name, spec)| DiagComputation::new(name, spec, registry, converters))
        .collect()
}

/// Names of every output variable, for pressure independent and sounding
/// computations respectively, in first-seen order.
pub fn get_all_result_names(
    pressure_independent: &[DiagComputation],
    sounding: &[DiagComputation],
) -> (Vec<String>, Vec<String>) {
    fn names(computations: &[DiagComputation]) -> Vec<String> {
        let mut seen = HashSet::new();
        computations
            .iter()
            .flat_map(|c| c.output_vars.iter())
            .filter(|name| seen.insert(name.as_str()))
            .cloned()
            .collect()
    }
    (names(pressure_independent), names(sounding))
}

// ============================================================================
// Batches
// ============================================================================

/// Where a pending value is stored.
enum Target {
    PressureIndependent,
    Sounding(i32),
}

struct PendingWrite {
    target: Target,
    var_name: String,
    value: f64,
    units: Option<String>,
}

/// Computations sharing one `batch_order`.
#[derive(Debug, Clone)]
pub struct ComputationBatch {
    batch_order: i32,
    pressure_independent: Vec<DiagComputation>,
    sounding: Vec<DiagComputation>,
}

impl ComputationBatch {
    pub fn new(batch_order: i32) -> Self {
        Self {
            batch_order,
            pressure_independent: Vec::new(),
            sounding: Vec::new(),
        }
    }

    pub fn batch_order(&self) -> i32 {
        self.batch_order
    }

    pub fn pressure_independent(&self) -> &[DiagComputation] {
        &self.pressure_independent
    }

    pub fn sounding(&self) -> &[DiagComputation] {
        &self.sounding
    }

    /// Run every computation of the batch for one hour and store the results.
    ///
    /// All computations see `results` as it was before the batch; values are
    /// written once the whole batch has run. Sounding computations run once
    /// per level of `levels_hpa`.
    pub fn add_to_results(
        &self,
        results: &mut ForecastHourResults,
        data: &HourData<'_>,
        levels_hpa: &[i32],
        converters: &UnitConverterRegistry,
        suppress_exceptions: bool,
    ) -> Result<()> {
        debug!(
            batch_order = self.batch_order,
            hour = data.hour,
            pressure_independent = self.pressure_independent.len(),
            sounding = self.sounding.len(),
            "Running computation batch"
        );

        let mut pending = Vec::new();
        {
            let snapshot: &ForecastHourResults = results;

            for computation in &self.pressure_independent {
                let outputs =
                    computation.evaluate(data, snapshot, None, converters, suppress_exceptions)?;
                pending.extend(outputs.into_iter().map(|(var_name, value, units)| PendingWrite {
                    target: Target::PressureIndependent,
                    var_name,
                    value,
                    units,
                }));
            }

            for computation in &self.sounding {
                for &level in levels_hpa {
                    let outputs = computation.evaluate(
                        data,
                        snapshot,
                        Some(level),
                        converters,
                        suppress_exceptions,
                    )?;
                    pending.extend(outputs.into_iter().map(|(var_name, value, units)| {
                        PendingWrite {
                            target: Target::Sounding(level),
                            var_name,
                            value,
                            units,
                        }
                    }));
                }
            }
        }

        for write in pending {
            match write.target {
                Target::PressureIndependent => results.add_pressure_independent_result(
                    &write.var_name,
                    data.hour,
                    write.value,
                    write.units.as_deref(),
                )?,
                Target::Sounding(level) => results.add_sounding_result(
                    &write.var_name,
                    data.hour,
                    level,
                    write.value,
                    write.units.as_deref(),
                )?,
            }
        }
        Ok(())
    }
}

/// Group computations by `batch_order`, in ascending order.
pub fn get_computation_batches(
    pressure_independent: &[DiagComputation],
    sounding: &[DiagComputation],
) -> Vec<ComputationBatch> {
    let mut batches: BTreeMap<i32, ComputationBatch> = BTreeMap::new();
    for computation in pressure_independent {
        batches
            .entry(computation.batch_order)
            .or_insert_with(|| ComputationBatch::new(computation.batch_order))
            .pressure_independent
            .push(computation.clone());
    }
    for computation in sounding {
        batches
            .entry(computation.batch_order)
            .or_insert_with(|| ComputationBatch::new(computation.batch_order))
            .sounding
            .push(computation.clone());
    }
    batches.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(callable: &str, batch_order: i32) -> ComputationSpec {
        ComputationSpec {
            callable: callable.to_string(),
            batch_order,
            kwargs: Kwargs::new(),
            output_vars: None,
            units: None,
            unit_converters: None,
        }
    }

    #[test]
    fn test_defaults_to_computation_name() {
        let registry = ComputationRegistry::with_builtins();
        let converters = UnitConverterRegistry::with_builtins();
        let comp = DiagComputation::new("dtl", &spec("always_missing", 0), &registry, &converters)
            .unwrap();
        assert_eq!(comp.output_vars(), ["dtl".to_string()]);
        assert_eq!(comp.units, vec![None]);
    }

    #[test]
    fn test_length_mismatch() {
        let registry = ComputationRegistry::with_builtins();
        let converters = UnitConverterRegistry::with_builtins();
        let mut s = spec("shear", 0);
        s.output_vars = Some(vec!["shrd".into(), "shtd".into()]);
        s.units = Some(vec![Some("kt".into())]);
        assert!(matches!(
            DiagComputation::new("shear", &s, &registry, &converters),
            Err(ConfigError::LengthMismatch { output_vars: 2, units: 1, .. })
        ));

        s.units = Some(vec![Some("kt".into()), Some("deg".into())]);
        s.unit_converters = Some(vec!["mps_to_kt".into(), "pass".into()]);
        let comp = DiagComputation::new("shear", &s, &registry, &converters).unwrap();
        assert!(comp.unit_converters[0].is_some());
        assert!(comp.unit_converters[1].is_none());
    }

    #[test]
    fn test_unknown_callable_and_converter() {
        let registry = ComputationRegistry::with_builtins();
        let converters = UnitConverterRegistry::with_builtins();
        assert!(matches!(
            DiagComputation::new("x", &spec("nope", 0), &registry, &converters),
            Err(ConfigError::UnknownComputation { .. })
        ));
        let mut s = spec("always_missing", 0);
        s.unit_converters = Some(vec!["furlongs".into()]);
        assert!(matches!(
            DiagComputation::new("x", &s, &registry, &converters),
            Err(ConfigError::UnknownConverter { .. })
        ));
    }

    #[test]
    fn test_batches_sorted_and_split() {
        let registry = ComputationRegistry::with_builtins();
        let converters = UnitConverterRegistry::with_builtins();
        let make = |name: &str, order| {
            DiagComputation::new(name, &spec("always_missing", order), &registry, &converters)
                .unwrap()
        };
        let pi = vec![make("late", 2), make("early", 0)];
        let snd = vec![make("mid", 1), make("also_early", 0)];

        let batches = get_computation_batches(&pi, &snd);
        let orders: Vec<i32> = batches.iter().map(|b| b.batch_order()).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(batches[0].pressure_independent()[0].name(), "early");
        assert_eq!(batches[0].sounding()[0].name(), "also_early");
        assert!(batches[1].pressure_independent().is_empty());

        let (pi_names, snd_names) = get_all_result_names(&pi, &snd);
        assert_eq!(pi_names, vec!["late", "early"]);
        assert_eq!(snd_names, vec!["mid", "also_early"]);
    }

    #[test]
    fn test_diag_values() {
        let values = DiagValues::pair(1.0, 2.0).with_units("kt");
        assert_eq!(values.len(), 2);
        assert_eq!(values.values().collect::<Vec<_>>(), vec![1.0, 2.0]);
        assert!(DiagValues::missing(3).values().all(f64::is_nan));
        assert_eq!(DiagValues::from(4.0), DiagValues::single(4.0));
    }
}
