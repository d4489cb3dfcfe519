//! Per model run orchestration.
//!
//! For every forecast hour the driver loads the gridded fields, finds the
//! storm on the model track, builds the cylindrical interpolator around it
//! and runs the computation batches in order.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use atcf_track::{format_yyyymmddhh, get_adeck_track, Track};
use cylindrical_grid::{build_interpolator, distances_from_tc, flat_earth_error, LandLUT, PolarGrid};

use crate::computation::{
    diag_computations_from_entry, get_all_result_names, get_computation_batches, ComputationBatch,
    ComputationRegistry, DiagComputation, HourData,
};
use crate::config::{InputVarSpec, ModelEntry, ModelSpec, OutputType};
use crate::dataset::GridLoader;
use crate::error::{EngineError, Result};
use crate::output::{diag_filename, to_diag_file, DiagHeaderInfo};
use crate::results::ForecastHourResults;
use crate::units::UnitConverterRegistry;

/// Arguments holding radii that must lie on the polar grid.
const RADIUS_KWARGS: [&str; 3] = ["radius_km", "min_radius_km", "max_radius_km"];

/// Runs model entries against a land LUT and a gridded-data loader.
pub struct Driver<'a> {
    land_lut: &'a LandLUT,
    loader: &'a dyn GridLoader,
    registry: ComputationRegistry,
    converters: UnitConverterRegistry,
    suppress_exceptions: bool,
}

impl<'a> Driver<'a> {
    /// A driver using the built-in computations and converters.
    pub fn new(land_lut: &'a LandLUT, loader: &'a dyn GridLoader) -> Self {
        Self {
            land_lut,
            loader,
            registry: ComputationRegistry::with_builtins(),
            converters: UnitConverterRegistry::with_builtins(),
            suppress_exceptions: false,
        }
    }

    pub fn with_registry(mut self, registry: ComputationRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_converters(mut self, converters: UnitConverterRegistry) -> Self {
        self.converters = converters;
        self
    }

    /// When set, failed computations, hours and entries are logged and
    /// skipped instead of aborting the run.
    pub fn suppress_exceptions(mut self, suppress: bool) -> Self {
        self.suppress_exceptions = suppress;
        self
    }

    /// Process every entry and write its diagnostics file.
    ///
    /// Returns the paths written.
    pub fn run(&self, entries: &[ModelEntry]) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.run_entry(entry) {
                Ok(path) => written.push(path),
                Err(e) if self.suppress_exceptions && !e.is_fatal() => {
                    error!(entry = %entry, error = %e, "Failed to process entry");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(written)
    }

    /// Process one entry and write its diagnostics file.
    pub fn run_entry(&self, entry: &ModelEntry) -> Result<PathBuf> {
        let spec = &entry.model_spec;

        let pressure_independent = diag_computations_from_entry(
            &spec.pressure_independent_computation_specs,
            &self.registry,
            &self.converters,
        )?;
        let sounding =
            diag_computations_from_entry(&spec.sounding_computation_specs, &self.registry, &self.converters)?;

        let track = get_adeck_track(&entry.atcf_file, &spec.atcf_tech_id)?;
        let results = self.process_model_entry(entry, &track, &pressure_independent, &sounding)?;

        let atcf_id = entry.atcf_id.to_string();
        let path = diag_filename(
            &spec.output_file_format,
            &entry.output_dir,
            entry.model_time,
            &atcf_id,
            &spec.atcf_tech_id,
        )?;
        let header = DiagHeaderInfo {
            model_id: spec.atcf_tech_id.clone(),
            model_time: entry.model_time,
            basin: entry.atcf_id.basin.clone(),
            storm_number: entry.atcf_id.storm_number,
            storm_name: track.storm_name(&entry.atcf_id),
        };
        to_diag_file(&path, &results, &spec.output_specs, &header, spec.missing_value)?;
        Ok(path)
    }

    /// Compute every diagnostic for every forecast hour of `entry`.
    ///
    /// Hours without a model file or a track position stay missing.
    pub fn process_model_entry(
        &self,
        entry: &ModelEntry,
        track: &Track,
        pressure_independent: &[DiagComputation],
        sounding: &[DiagComputation],
    ) -> Result<ForecastHourResults> {
        info!(entry = %entry, "Started processing entry");
        let spec = &entry.model_spec;

        let (pi_names, snd_names) = get_all_result_names(pressure_independent, sounding);
        let polar_grid = spec.polar_grid()?;
        validate_entry(spec, &polar_grid, pressure_independent, sounding, &pi_names, &snd_names)?;

        let mut results =
            ForecastHourResults::new(&spec.forecast_hours, &spec.levels_hpa, pi_names, snd_names);
        let batches = get_computation_batches(pressure_independent, sounding);
        let nav_spec = spec.nav_spec();

        let run = EntryRun {
            driver: self,
            spec,
            model_time: entry.model_time,
            track,
            batches: &batches,
            polar_grid: &polar_grid,
            nav_spec: &nav_spec,
        };

        for &hour in &spec.forecast_hours {
            match run.process_hour(hour, &mut results) {
                Ok(()) => {}
                Err(e) if self.suppress_exceptions && !e.is_fatal() => {
                    error!(
                        model_time = %format_yyyymmddhh(&entry.model_time),
                        hour,
                        error = %e,
                        "Failed to process hour"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        info!(entry = %entry, "Finished processing entry");
        Ok(results)
    }
}

/// State shared by the hours of one entry.
struct EntryRun<'r> {
    driver: &'r Driver<'r>,
    spec: &'r ModelSpec,
    model_time: DateTime<Utc>,
    track: &'r Track,
    batches: &'r [ComputationBatch],
    polar_grid: &'r PolarGrid,
    nav_spec: &'r InputVarSpec,
}

impl EntryRun<'_> {
    fn process_hour(&self, hour: i32, results: &mut ForecastHourResults) -> Result<()> {
        let model_path = self.spec.make_model_path(hour, self.model_time)?;
        info!(hour, path = %model_path.display(), "Processing hour");

        if !model_path.exists() {
            warn!(hour, path = %model_path.display(), "Could not find model file, skipping hour");
            return Ok(());
        }

        let dataset = self.driver.loader.load(
            &model_path,
            self.nav_spec,
            &self.spec.levels_hpa,
            &self.spec.input_var_specs,
        )?;

        let track_row = match self.track.forecast_row(self.model_time, hour) {
            Some(row) => row,
            None => {
                warn!(
                    hour,
                    model_time = %format_yyyymmddhh(&self.model_time),
                    "No storm position on the track, skipping hour"
                );
                return Ok(());
            }
        };
        let (tc_lon, tc_lat) = track_row.tc_location();

        let distances = distances_from_tc(dataset.lons(), dataset.lats(), tc_lon, tc_lat);
        let interpolator = build_interpolator(
            self.spec.interpolation,
            self.polar_grid.clone(),
            tc_lon,
            tc_lat,
            dataset.lons(),
            dataset.lats(),
        )?;
        debug!(
            hour,
            tc_lon,
            tc_lat,
            method = %self.spec.interpolation,
            flat_earth_error = flat_earth_error(tc_lon, tc_lat, self.polar_grid.max_radius_km()),
            "Built cylindrical grid interpolator"
        );

        let data = HourData {
            dataset: &dataset,
            interpolator: interpolator.as_ref(),
            land_lut: self.driver.land_lut,
            track: self.track,
            track_row,
            distances_from_tc_km: &distances,
            tc_lon,
            tc_lat,
            model_spec: self.spec,
            hour,
            model_time: self.model_time,
        };

        for batch in self.batches {
            batch.add_to_results(
                results,
                &data,
                &self.spec.levels_hpa,
                &self.driver.converters,
                self.driver.suppress_exceptions,
            )?;
        }

        info!(hour, path = %model_path.display(), "Finished processing hour");
        Ok(())
    }
}

/// Checks that need no model data and must pass before any hour runs.
fn validate_entry(
    spec: &ModelSpec,
    polar_grid: &PolarGrid,
    pressure_independent: &[DiagComputation],
    sounding: &[DiagComputation],
    pi_names: &[String],
    snd_names: &[String],
) -> Result<()> {
    let max_radius_km = polar_grid.max_radius_km();
    if max_radius_km > spec.max_flat_earth_radius_km {
        return Err(EngineError::Validation(format!(
            "polar grid reaches {} km, beyond the flat-earth limit of {} km",
            max_radius_km, spec.max_flat_earth_radius_km
        )));
    }

    for computation in pressure_independent.iter().chain(sounding) {
        for name in RADIUS_KWARGS {
            if !computation.kwargs().contains(name) {
                continue;
            }
            let radius = computation.kwargs().get_f64(name).map_err(|e| {
                EngineError::Validation(format!("computation {:?}: {}", computation.name(), e))
            })?;
            if !(0.0..=max_radius_km).contains(&radius) {
                return Err(EngineError::Validation(format!(
                    "computation {:?}: {} = {} km is outside the polar grid (0 to {} km)",
                    computation.name(),
                    name,
                    radius,
                    max_radius_km
                )));
            }
        }
    }

    for output in &spec.output_specs {
        let (table, names) = match output.output_type {
            OutputType::Sounding => ("sounding", snd_names),
            OutputType::Storm | OutputType::Surface | OutputType::Custom => {
                ("pressure independent", pi_names)
            }
        };
        if !names.iter().any(|name| *name == output.var_name) {
            return Err(EngineError::Validation(format!(
                "output {:?} ({}) is not produced by any {} computation",
                output.var_name, output.output_type, table
            )));
        }
    }

    Ok(())
}
