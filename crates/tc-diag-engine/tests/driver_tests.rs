//! End-to-end driver runs against an in-memory grid loader.

use chrono::{TimeZone, Utc};
use ndarray::{s, Array2, Array3};
use std::path::Path;
use tempfile::TempDir;

use atcf_track::{AtcfId, Track};
use cylindrical_grid::LandLUT;
use tc_diag_engine::{
    diag_computations_from_entry, CallContext, ComputationRegistry, DatasetError, DiagError,
    DiagValues, Driver, EngineError, ForecastHourResults, GridDataset, GridLoader, InputVarSpec,
    ModelEntry, ModelSpec, UnitConverterRegistry,
};
use test_utils::{
    assert_all_nan, assert_approx_eq, centered_axes, constant_field, linear_field, sample_adeck,
    temp_test_dir, write_test_file, AdeckRecord, GLOBAL_2X2_LUT,
};

/// Serves the same synthetic grid for every file, centered near the hour 0
/// storm position (277.2E, 22.0N).
///
/// - `sst`: constant surface field.
/// - `tmp`, `u`, `v`: profiles constant at each of 850 and 200 hPa.
/// - `u_rot`, `v_rot`: solid rotation, vorticity 2e-5 (1 + 1 / cos(lat)) 1/s.
/// - `u10`, `v10`: surface outflow vanishing at the hour 0 storm center.
struct FakeLoader;

impl GridLoader for FakeLoader {
    fn load(
        &self,
        _path: &Path,
        _nav_spec: &InputVarSpec,
        _levels_hpa: &[i32],
        _input_vars: &[InputVarSpec],
    ) -> Result<GridDataset, DatasetError> {
        let (lons, lats) = centered_axes(277.0, 22.5, 0.5, 20);
        let sst = constant_field(&lons, &lats, 301.5);
        let (ny, nx) = sst.dim();
        let layered = |bottom: f64, top: f64| {
            Array3::from_shape_fn((2, ny, nx), |(k, _, _)| if k == 0 { bottom } else { top })
        };
        let stacked = |field: Array2<f64>| {
            Array3::from_shape_fn((2, ny, nx), |(_, j, i)| field[[j, i]])
        };

        let mut dataset = GridDataset::new(lons.clone(), lats.clone())?;
        dataset.insert_surface("sst", sst)?;
        dataset.insert_profile("tmp", vec![850.0, 200.0], layered(290.0, 220.0))?;
        dataset.insert_profile("u", vec![850.0, 200.0], layered(10.0, -20.0))?;
        dataset.insert_profile("v", vec![850.0, 200.0], layered(15.0, -25.0))?;

        let u_rot = linear_field(&lons, &lats, 0.0, -2.222, 2.222 * 22.5);
        let v_rot = linear_field(&lons, &lats, 2.222, 0.0, -2.222 * 277.0);
        dataset.insert_profile("u_rot", vec![850.0, 200.0], stacked(u_rot))?;
        dataset.insert_profile("v_rot", vec![850.0, 200.0], stacked(v_rot))?;

        dataset.insert_surface("u10", linear_field(&lons, &lats, 1.111, 0.0, -1.111 * 277.2))?;
        dataset.insert_surface("v10", linear_field(&lons, &lats, 0.0, 1.111, -1.111 * 22.0))?;
        Ok(dataset)
    }
}

/// A constant `sst` grid around (`lon`, `lat`).
struct SstLoader {
    lon: f64,
    lat: f64,
}

impl GridLoader for SstLoader {
    fn load(
        &self,
        _path: &Path,
        _nav_spec: &InputVarSpec,
        _levels_hpa: &[i32],
        _input_vars: &[InputVarSpec],
    ) -> Result<GridDataset, DatasetError> {
        let (lons, lats) = centered_axes(self.lon, self.lat, 0.5, 20);
        let sst = constant_field(&lons, &lats, 300.0);
        let mut dataset = GridDataset::new(lons, lats)?;
        dataset.insert_surface("sst", sst)?;
        Ok(dataset)
    }
}

fn constant_ten(_ctx: &CallContext<'_>) -> Result<DiagValues, DiagError> {
    Ok(10.0.into())
}

fn double_ten(ctx: &CallContext<'_>) -> Result<DiagValues, DiagError> {
    let ten = ctx.results.pressure_independent_value("ten", ctx.hour())?;
    Ok((2.0 * ten).into())
}

fn broken(_ctx: &CallContext<'_>) -> Result<DiagValues, DiagError> {
    Err(DiagError::Failed("model field is corrupt".into()))
}

fn too_many(_ctx: &CallContext<'_>) -> Result<DiagValues, DiagError> {
    Ok((1.0, 2.0).into())
}

fn test_registry() -> ComputationRegistry {
    let mut registry = ComputationRegistry::with_builtins();
    registry.register("constant_ten", constant_ten);
    registry.register("double_ten", double_ten);
    registry.register("broken", broken);
    registry.register("too_many", too_many);
    registry
}

const BASE_SPEC: &str = r#"
model_file_format: "MODEL_DIR/gfs.{model_time:%Y%m%d%H}.f{forecast_hour:03}.grb2"
atcf_tech_id: AVNO
forecast_hours: [0, 6, 12, 18]
levels_hPa: [850, 200]
n_radii: 5
n_theta: 8
radii_step_km: 50
nav_var_name: sst
nav_var_level_type: surface
"#;

/// Working directory with model files for hours 0, 6 and 18 only.
struct Fixture {
    dir: TempDir,
    lut: LandLUT,
}

impl Fixture {
    fn new() -> Self {
        let dir = temp_test_dir();
        for hour in [0, 6, 18] {
            write_test_file(&dir, &format!("gfs.2022092600.f{:03}.grb2", hour), "");
        }
        write_test_file(&dir, "aal092022.dat", &sample_adeck());
        let lut_path = write_test_file(&dir, "land.txt", GLOBAL_2X2_LUT);
        let lut = LandLUT::from_file(lut_path).unwrap();
        Self { dir, lut }
    }

    fn add_model_file(&self, hour: i32) {
        write_test_file(&self.dir, &format!("gfs.2022092600.f{:03}.grb2", hour), "");
    }

    fn spec(&self, extra: &str) -> ModelSpec {
        let yaml = format!("{}{}", BASE_SPEC, extra)
            .replace("MODEL_DIR", &self.dir.path().display().to_string());
        ModelSpec::from_yaml_str(&yaml).unwrap()
    }

    fn entry(&self, spec: ModelSpec) -> ModelEntry {
        ModelEntry {
            model_spec: spec,
            atcf_id: "al092022".parse::<AtcfId>().unwrap(),
            atcf_file: self.dir.path().join("aal092022.dat"),
            model_time: Utc.with_ymd_and_hms(2022, 9, 26, 0, 0, 0).unwrap(),
            output_dir: self.dir.path().join("out"),
        }
    }
}

fn process(
    driver: &Driver<'_>,
    entry: &ModelEntry,
) -> Result<ForecastHourResults, EngineError> {
    process_with_adeck(driver, entry, &sample_adeck())
}

fn process_with_adeck(
    driver: &Driver<'_>,
    entry: &ModelEntry,
    adeck: &str,
) -> Result<ForecastHourResults, EngineError> {
    let registry = test_registry();
    let converters = UnitConverterRegistry::with_builtins();
    let spec = &entry.model_spec;
    let pi = diag_computations_from_entry(
        &spec.pressure_independent_computation_specs,
        &registry,
        &converters,
    )?;
    let snd =
        diag_computations_from_entry(&spec.sounding_computation_specs, &registry, &converters)?;
    let track = Track::from_adeck_str(adeck, &spec.atcf_tech_id).unwrap();
    driver.process_model_entry(entry, &track, &pi, &snd)
}

#[test]
fn test_missing_file_and_track_row_stay_missing() {
    let fixture = Fixture::new();
    let entry = fixture.entry(fixture.spec(
        r#"
pressure_independent_computation_specs:
  ten:
    callable: constant_ten
"#,
    ));
    let driver = Driver::new(&fixture.lut, &FakeLoader).with_registry(test_registry());
    let results = process(&driver, &entry).unwrap();

    let row = results.pressure_independent_row("ten").unwrap();
    assert_eq!(row[0], 10.0);
    assert_eq!(row[1], 10.0);
    // Hour 12 has no model file, hour 18 has no AVNO position.
    assert_all_nan!(row.slice(s![2..]));
}

#[test]
fn test_builtin_computations() {
    let fixture = Fixture::new();
    let entry = fixture.entry(fixture.spec(
        r#"
pressure_independent_computation_specs:
  vmax:
    callable: track_row_lookup
    kwargs:
      column_name: vmax
  sst:
    callable: mean_in_radius_range
    kwargs:
      grib_var_name: sst
      min_radius_km: 0
      max_radius_km: 200
    unit_converters: [kelvin_to_celsius]
    units: [C]
  dtl:
    callable: distance_to_land_lookup
sounding_computation_specs:
  t:
    callable: mean_in_radius_range
    kwargs:
      grib_var_name: tmp
      min_radius_km: 0
      max_radius_km: 100
"#,
    ));
    let driver = Driver::new(&fixture.lut, &FakeLoader);
    let results = process(&driver, &entry).unwrap();

    assert_eq!(results.pressure_independent_value("vmax", 0).unwrap(), 75.0);
    assert_approx_eq!(results.pressure_independent_value("sst", 6).unwrap(), 28.35, 1e-9);
    assert_eq!(results.pressure_independent_units("sst").unwrap(), Some("C"));

    let dtl = results.pressure_independent_value("dtl", 0).unwrap();
    assert!((100.0..=500.0).contains(&dtl), "dtl = {}", dtl);
    assert_eq!(results.pressure_independent_units("dtl").unwrap(), Some("km"));

    assert_approx_eq!(results.sounding_value("t", 0, 850).unwrap(), 290.0, 1e-9);
    assert_approx_eq!(results.sounding_value("t", 6, 200).unwrap(), 220.0, 1e-9);
    assert!(results.sounding_value("t", 12, 850).unwrap().is_nan());
}

#[test]
fn test_batches_see_earlier_batches_only() {
    let fixture = Fixture::new();
    // Names sort before "ten", so config order alone would run them first.
    let entry = fixture.entry(fixture.spec(
        r#"
pressure_independent_computation_specs:
  a_later:
    callable: double_ten
    batch_order: 1
    output_vars: [twenty]
  b_same_batch:
    callable: double_ten
    output_vars: [nan_twenty]
  ten:
    callable: constant_ten
"#,
    ));
    let driver = Driver::new(&fixture.lut, &FakeLoader).with_registry(test_registry());
    let results = process(&driver, &entry).unwrap();

    assert_eq!(results.pressure_independent_value("twenty", 0).unwrap(), 20.0);
    assert!(results
        .pressure_independent_value("nan_twenty", 0)
        .unwrap()
        .is_nan());
}

const BROKEN_SPEC: &str = r#"
pressure_independent_computation_specs:
  broken:
    callable: broken
  ten:
    callable: constant_ten
"#;

#[test]
fn test_computation_error_is_fatal_without_suppress() {
    let fixture = Fixture::new();
    let entry = fixture.entry(fixture.spec(BROKEN_SPEC));
    let driver = Driver::new(&fixture.lut, &FakeLoader).with_registry(test_registry());

    match process(&driver, &entry) {
        Err(EngineError::Computation { name, hour, .. }) => {
            assert_eq!(name, "broken");
            assert_eq!(hour, 0);
        }
        other => panic!("expected a computation error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_suppressed_computation_error_stores_missing() {
    let fixture = Fixture::new();
    let entry = fixture.entry(fixture.spec(BROKEN_SPEC));
    let driver = Driver::new(&fixture.lut, &FakeLoader)
        .with_registry(test_registry())
        .suppress_exceptions(true);
    let results = process(&driver, &entry).unwrap();

    assert!(results.pressure_independent_value("broken", 0).unwrap().is_nan());
    assert_eq!(results.pressure_independent_value("ten", 0).unwrap(), 10.0);
}

#[test]
fn test_output_count_mismatch_is_fatal_even_when_suppressed() {
    let fixture = Fixture::new();
    let entry = fixture.entry(fixture.spec(
        r#"
pressure_independent_computation_specs:
  single:
    callable: too_many
"#,
    ));
    let driver = Driver::new(&fixture.lut, &FakeLoader)
        .with_registry(test_registry())
        .suppress_exceptions(true);

    assert!(matches!(
        process(&driver, &entry),
        Err(EngineError::OutputCount {
            expected: 1,
            actual: 2,
            ..
        })
    ));
}

#[test]
fn test_radius_beyond_polar_grid_is_rejected() {
    let fixture = Fixture::new();
    let entry = fixture.entry(fixture.spec(
        r#"
pressure_independent_computation_specs:
  sst:
    callable: mean_in_radius_range
    kwargs:
      grib_var_name: sst
      min_radius_km: 0
      max_radius_km: 500
"#,
    ));
    let driver = Driver::new(&fixture.lut, &FakeLoader).suppress_exceptions(true);

    assert!(matches!(
        process(&driver, &entry),
        Err(EngineError::Validation(_))
    ));
}

#[test]
fn test_polar_grid_beyond_flat_earth_limit_is_rejected() {
    let fixture = Fixture::new();
    let entry = fixture.entry(fixture.spec("max_flat_earth_radius_km: 100\n"));
    let driver = Driver::new(&fixture.lut, &FakeLoader);

    let err = process(&driver, &entry).unwrap_err();
    assert!(err.is_fatal());
    assert!(err.to_string().contains("flat-earth"), "{}", err);
}

#[test]
fn test_output_spec_must_name_a_result() {
    let fixture = Fixture::new();
    let entry = fixture.entry(fixture.spec(
        r#"
pressure_independent_computation_specs:
  ten:
    callable: constant_ten
output_specs:
  - var_name: vmax
    units: kt
    output_type: storm
"#,
    ));
    let driver = Driver::new(&fixture.lut, &FakeLoader).with_registry(test_registry());

    assert!(matches!(
        process(&driver, &entry),
        Err(EngineError::Validation(_))
    ));
}

#[test]
fn test_unknown_callable_is_a_config_error() {
    let fixture = Fixture::new();
    let entry = fixture.entry(fixture.spec(
        r#"
pressure_independent_computation_specs:
  ten:
    callable: not_registered
"#,
    ));
    let driver = Driver::new(&fixture.lut, &FakeLoader).suppress_exceptions(true);

    let err = driver.run(&[entry]).unwrap_err();
    assert!(matches!(err, EngineError::Config(_)));
}

#[test]
fn test_run_entry_writes_diag_file() {
    let fixture = Fixture::new();
    let entry = fixture.entry(fixture.spec(
        r#"
pressure_independent_computation_specs:
  vmax:
    callable: track_row_lookup
    kwargs:
      column_name: vmax
sounding_computation_specs:
  t:
    callable: mean_in_radius_range
    kwargs:
      grib_var_name: tmp
      min_radius_km: 0
      max_radius_km: 100
    unit_converters: [kelvin_to_10celsius]
output_specs:
  - var_name: vmax
    units: kt
    output_type: storm
  - var_name: t
    units: 10c
    output_type: sounding
"#,
    ));
    let driver = Driver::new(&fixture.lut, &FakeLoader);

    let path = driver.run_entry(&entry).unwrap();
    assert_eq!(
        path,
        fixture.dir.path().join("out/al092022_avno_2022092600.dat")
    );

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "               *   AVNO  2022092600   *");
    assert_eq!(lines[1], "               *   AL09  IAN       *");
    assert!(text.contains("NTIME 004   DELTAT 006"));
    assert!(text.contains("NLEV 003 SURF 0850 0200"));
    assert!(text.contains("VMAX    (KT)        75    75  9999  9999"));
    assert!(text.contains("T_0850  (10C)      168   168  9999  9999"));
    assert!(text.contains("T_0200  (10C)     -531  -531  9999  9999"));
}

#[test]
fn test_run_skips_failed_entries_when_suppressed() {
    let fixture = Fixture::new();
    let good = fixture.entry(fixture.spec(
        r#"
pressure_independent_computation_specs:
  ten:
    callable: constant_ten
"#,
    ));
    let mut bad = good.clone();
    bad.atcf_file = fixture.dir.path().join("missing.dat");

    let driver = Driver::new(&fixture.lut, &FakeLoader)
        .with_registry(test_registry())
        .suppress_exceptions(true);
    let written = driver.run(&[bad.clone(), good]).unwrap();
    assert_eq!(written.len(), 1);

    let strict = Driver::new(&fixture.lut, &FakeLoader).with_registry(test_registry());
    assert!(matches!(strict.run(&[bad]), Err(EngineError::Track(_))));
}

// ============================================================================
// Diagnostic library
// ============================================================================

const STORM_MOTION_SPEC: &str = r#"
pressure_independent_computation_specs:
  storm_motion:
    callable: storm_r_theta
    output_vars: [spd, hdg]
"#;

#[test]
fn test_storm_motion_differences() {
    let fixture = Fixture::new();
    fixture.add_model_file(12);
    let entry = fixture.entry(fixture.spec(STORM_MOTION_SPEC));
    let driver = Driver::new(&fixture.lut, &FakeLoader);
    let results = process(&driver, &entry).unwrap();

    let spd = results.pressure_independent_row("spd").unwrap();
    let hdg = results.pressure_independent_row("hdg").unwrap();

    // Forward from tau 0 to 6.
    assert_approx_eq!(spd[0], 8.813430994, 1e-8);
    assert_approx_eq!(hdg[0], 335.190173086, 1e-8);
    // Centered over tau 0 to 12.
    assert_approx_eq!(spd[1], 8.808933348, 1e-8);
    assert_approx_eq!(hdg[1], 335.253531740, 1e-8);
    // Backward from tau 12 to 6.
    assert_approx_eq!(spd[2], 8.804371434, 1e-8);
    assert_approx_eq!(hdg[2], 335.318017751, 1e-8);
    // No track row at tau 18.
    assert!(spd[3].is_nan());
}

#[test]
fn test_storm_motion_across_0_360_seam() {
    let fixture = Fixture::new();
    let base = AdeckRecord {
        basin: "AL",
        storm_number: 9,
        init_time: "2022092600",
        tech: "AVNO",
        tau: 0,
        lat_tenths: 200,
        lon_tenths: 2,
        vmax_kt: 40,
        mslp_hpa: 1002,
        storm_name: "NINE",
    };
    let adeck = [
        base.to_line(),
        AdeckRecord {
            tau: 6,
            lat_tenths: 206,
            lon_tenths: -2,
            ..base.clone()
        }
        .to_line(),
    ]
    .join("\n");

    let entry = fixture.entry(fixture.spec(STORM_MOTION_SPEC));
    let loader = SstLoader { lon: 0.0, lat: 20.0 };
    let driver = Driver::new(&fixture.lut, &loader);
    let results = process_with_adeck(&driver, &entry, &adeck).unwrap();

    // 0.2E to 0.2W is 0.4 degrees west, not 359.6 east.
    for hour in [0, 6] {
        let spd = results.pressure_independent_value("spd", hour).unwrap();
        let hdg = results.pressure_independent_value("hdg", hour).unwrap();
        assert_approx_eq!(spd, 7.076310512, 1e-8);
        assert_approx_eq!(hdg, 327.983934921, 1e-8);
    }
}

#[test]
fn test_shear_reads_earlier_sounding_batch() {
    let fixture = Fixture::new();
    let entry = fixture.entry(fixture.spec(
        r#"
pressure_independent_computation_specs:
  shear_850_200:
    callable: shear
    batch_order: 1
    kwargs:
      u_name: u
      v_name: v
      bottom_hPa: 850
      top_hPa: 200
    output_vars: [shdc, sddc]
  shear_850_500:
    callable: shear
    batch_order: 1
    kwargs:
      u_name: u
      v_name: v
      bottom_hPa: 850
      top_hPa: 500
    output_vars: [shrd_500, shtd_500]
  shear_same_batch:
    callable: shear
    kwargs:
      u_name: u
      v_name: v
      bottom_hPa: 850
      top_hPa: 200
    output_vars: [early_shr, early_hdg]
  tgrd:
    callable: temperature_gradient
    batch_order: 1
    kwargs:
      u_name: u
      v_name: v
      bottom_hPa: 850
      top_hPa: 200
sounding_computation_specs:
  u:
    callable: mean_in_radius_range
    kwargs:
      grib_var_name: u
      min_radius_km: 0
      max_radius_km: 100
  v:
    callable: mean_in_radius_range
    kwargs:
      grib_var_name: v
      min_radius_km: 0
      max_radius_km: 100
"#,
    ));
    let driver = Driver::new(&fixture.lut, &FakeLoader);
    let results = process(&driver, &entry).unwrap();

    let value = |name: &str, hour: i32| results.pressure_independent_value(name, hour).unwrap();

    // (u, v) goes from (10, 15) at 850 hPa to (-20, -25) at 200 hPa.
    assert_approx_eq!(value("shdc", 0), 50.0, 1e-9);
    assert_approx_eq!(value("sddc", 0), 216.869897646, 1e-8);

    // 500 hPa lies 350/650 of the way up in pressure.
    assert_approx_eq!(value("shrd_500", 6), 26.923076923, 1e-8);
    assert_approx_eq!(value("shtd_500", 6), 216.869897646, 1e-8);

    // Soundings are not written until their batch ends.
    assert!(value("early_shr", 0).is_nan());
    assert!(value("early_hdg", 0).is_nan());

    // f / (R ln(850 / 200)) times the 50 m/s thermal wind, storm at 22N.
    assert_approx_eq!(value("tgrd", 0), 6.577926982e-6, 1e-14);
    assert!(value("tgrd", 12).is_nan());
}

#[test]
fn test_divergence_vorticity_and_area_averages() {
    let fixture = Fixture::new();
    let entry = fixture.entry(fixture.spec(
        r#"
sounding_computation_specs:
  rotation:
    callable: divergence_vorticity
    kwargs:
      u_name: u_rot
      v_name: v_rot
      radius_km: 110
    output_vars: [div_rot, vort_rot]
  outflow:
    callable: divergence_vorticity
    kwargs:
      u_name: u10
      v_name: v10
      radius_km: 100
    output_vars: [div_out, vort_out]
  rt:
    callable: radial_and_tangential_area_average
    kwargs:
      u_name: u_rot
      v_name: v_rot
      min_radius_km: 0
      max_radius_km: 200
    output_vars: [vr, vt]
"#,
    ));
    let driver = Driver::new(&fixture.lut, &FakeLoader);
    let results = process(&driver, &entry).unwrap();

    let k = 0.02 * (1.0 + 1.0 / 22.0_f64.to_radians().cos());
    for level in [850, 200] {
        let value = |name: &str| results.sounding_value(name, 0, level).unwrap();

        assert_approx_eq!(value("vort_rot"), k / 1000.0, 1e-15);
        assert_approx_eq!(value("div_rot"), 0.0, 1e-15);

        assert_approx_eq!(value("div_out"), k / 2000.0, 1e-15);
        assert_approx_eq!(value("vort_out"), 0.0, 1e-15);

        // Tangential wind grows as k r / 2; radius weighting gives 75 k.
        assert_approx_eq!(value("vt"), 75.0 * k, 1e-9);
        assert_approx_eq!(value("vr"), 0.0, 1e-9);
    }
}

#[test]
fn test_divergence_vorticity_at_storm_center_fails() {
    let fixture = Fixture::new();
    let entry = fixture.entry(fixture.spec(
        r#"
sounding_computation_specs:
  dv_center:
    callable: divergence_vorticity
    kwargs:
      u_name: u_rot
      v_name: v_rot
      radius_km: 10
    output_vars: [div_center, vort_center]
"#,
    ));

    let driver = Driver::new(&fixture.lut, &FakeLoader);
    match process(&driver, &entry) {
        Err(EngineError::Computation {
            name,
            hour,
            level_hpa,
            source: DiagError::InvalidArgument { name: argument, .. },
        }) => {
            assert_eq!(name, "dv_center");
            assert_eq!(hour, 0);
            assert_eq!(level_hpa, Some(850));
            assert_eq!(argument, "radius_km");
        }
        other => panic!("expected an invalid radius, got {:?}", other.map(|_| ())),
    }

    let driver = Driver::new(&fixture.lut, &FakeLoader).suppress_exceptions(true);
    let results = process(&driver, &entry).unwrap();
    assert_all_nan!(results.sounding_table("vort_center").unwrap());
}

#[test]
fn test_average_rmw() {
    let fixture = Fixture::new();
    let entry = fixture.entry(fixture.spec(
        r#"
pressure_independent_computation_specs:
  rmw_150:
    callable: average_rmw
    kwargs:
      u_surface_name: u10
      v_surface_name: v10
      radius_km: 150
  rmw_120:
    callable: average_rmw
    kwargs:
      u_surface_name: u10
      v_surface_name: v10
      radius_km: 120
"#,
    ));
    let driver = Driver::new(&fixture.lut, &FakeLoader);
    let results = process(&driver, &entry).unwrap();

    // Wind speed grows with radius on every azimuth at hour 0, so the
    // maximum sits on the last ring searched.
    assert_eq!(results.pressure_independent_value("rmw_150", 0).unwrap(), 150.0);
    assert_eq!(results.pressure_independent_value("rmw_120", 0).unwrap(), 100.0);
}

#[test]
fn test_polar_grid_dump() {
    let fixture = Fixture::new();
    let entry = fixture.entry(fixture.spec(
        r#"
pressure_independent_computation_specs:
  sst_dump:
    callable: debug_cyl_grid_dump
    kwargs:
      grib_var_name: sst
      output_filename: "MODEL_DIR/{grib_var_name}_{level_hPa}_f{hour:03}.json"
sounding_computation_specs:
  tmp_dump:
    callable: debug_cyl_grid_dump
    kwargs:
      grib_var_name: tmp
      output_filename: "MODEL_DIR/{grib_var_name}_{level_hPa}_f{hour:03}.json"
"#,
    ));
    let driver = Driver::new(&fixture.lut, &FakeLoader);
    let results = process(&driver, &entry).unwrap();
    assert!(results.pressure_independent_value("sst_dump", 0).unwrap().is_nan());

    let read = |name: &str| -> serde_json::Value {
        let text = std::fs::read_to_string(fixture.dir.path().join(name)).unwrap();
        serde_json::from_str(&text).unwrap()
    };

    let sst = read("sst_none_f000.json");
    assert_eq!(sst["var_name"], "sst");
    assert_eq!(sst["hour"], 0);
    assert!(sst["level_hpa"].is_null());
    assert_eq!(
        sst["radius_km"],
        serde_json::json!([0.0, 50.0, 100.0, 150.0, 200.0])
    );
    assert_eq!(sst["theta_radians"].as_array().unwrap().len(), 8);
    let rows = sst["values"].as_array().unwrap();
    assert_eq!(rows.len(), 8);
    for row in rows {
        let row = row.as_array().unwrap();
        assert_eq!(row.len(), 5);
        for value in row {
            assert_approx_eq!(value.as_f64().unwrap(), 301.5, 1e-9);
        }
    }

    let tmp = read("tmp_200_f006.json");
    assert_eq!(tmp["level_hpa"], 200);
    assert_approx_eq!(tmp["values"][3][2].as_f64().unwrap(), 220.0, 1e-9);

    // No model file for hour 12.
    assert!(!fixture.dir.path().join("sst_none_f012.json").exists());
}
