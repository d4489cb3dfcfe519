//! Diagnostic variable library.
//!
//! Every function here has the [`DiagFn`](crate::computation::DiagFn)
//! signature and reads its arguments from the call context. Missing data
//! surfaces as a [`DiagError`]; the engine decides whether that is fatal.

use ndarray::{Array1, Array2, ArrayView2, Zip};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::{debug, info};

use cylindrical_grid::geo::wrap_longitude_delta;
use cylindrical_grid::{area_average, azimuthal_average, LandLUT};

use crate::computation::{CallContext, DiagValues};
use crate::error::DiagError;
use crate::template::TemplateVars;
use crate::units::UnitConverter;

type Result<T> = std::result::Result<T, DiagError>;

/// Nautical miles per degree of latitude.
pub const DEG_TO_NMI: f64 = 60.0;

const OMEGA: f64 = 7.292e-5;
const DRY_AIR_GAS_CONSTANT: f64 = 287.0;
const DEG_TO_RAD: f64 = 0.017453;

// ============================================================================
// Shared helpers
// ============================================================================

/// A dataset field at the context level (if any), converted.
fn field_at_level(
    ctx: &CallContext<'_>,
    var_name: &str,
    converter: Option<UnitConverter>,
) -> Result<Array2<f64>> {
    let level = ctx.opt_level()?.map(f64::from);
    let field = ctx.data.dataset.field(var_name, level)?;
    Ok(match converter {
        Some(convert) => field.mapv(convert),
        None => field.to_owned(),
    })
}

fn resample(ctx: &CallContext<'_>, field: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
    Ok(ctx.data.interpolator.resample(field)?)
}

/// `var_name` at the context level, resampled onto the polar grid.
fn polar_field(
    ctx: &CallContext<'_>,
    var_name: &str,
    converter: Option<UnitConverter>,
) -> Result<Array2<f64>> {
    let field = field_at_level(ctx, var_name, converter)?;
    resample(ctx, field.view())
}

/// Magnitude and compass heading (degrees, 0 = north) of a vector.
///
/// The heading is NaN for a zero or non-finite vector.
pub fn u_v_to_r_theta(u: f64, v: f64) -> (f64, f64) {
    let r = u.hypot(v);
    if !r.is_finite() || r < f64::EPSILON {
        return (r, f64::NAN);
    }

    let mut theta = (u / r).clamp(-1.0, 1.0).acos().to_degrees();
    if v < 0.0 {
        theta = 360.0 - theta;
    }

    let mut heading = 90.0 - theta;
    if heading < 0.0 {
        heading += 360.0;
    }
    (r, heading)
}

// ============================================================================
// Area statistics
// ============================================================================

/// Radius-weighted mean of a field between `min_radius_km` and
/// `max_radius_km`.
pub fn mean_in_radius_range(ctx: &CallContext<'_>) -> Result<DiagValues> {
    let var_name = ctx.kwargs.get_str("grib_var_name")?;
    let min_km = ctx.kwargs.get_f64("min_radius_km")?;
    let max_km = ctx.kwargs.get_f64("max_radius_km")?;
    let converter = ctx.converter("unit_converter")?;

    let polar = polar_field(ctx, var_name, converter)?;
    let radii = ctx.data.interpolator.polar_grid().rad_2d_km();
    let mean = area_average(polar.iter(), radii.iter(), min_km, max_km);

    debug!(var_name, min_km, max_km, mean, "Area average");
    Ok(mean.into())
}

/// Largest value of a field between `min_radius_km` and `max_radius_km`.
///
/// NaN cells are ignored; an empty or all-NaN band gives NaN.
pub fn max_in_radius_range(ctx: &CallContext<'_>) -> Result<DiagValues> {
    let var_name = ctx.kwargs.get_str("grib_var_name")?;
    let min_km = ctx.kwargs.get_f64("min_radius_km")?;
    let max_km = ctx.kwargs.get_f64("max_radius_km")?;
    let converter = ctx.converter("unit_converter")?;

    let polar = polar_field(ctx, var_name, converter)?;
    let radii = ctx.data.interpolator.polar_grid().rad_2d_km();
    let max = polar
        .iter()
        .zip(radii.iter())
        .filter(|(value, radius)| **radius >= min_km && **radius <= max_km && !value.is_nan())
        .map(|(&value, _)| value)
        .fold(f64::NAN, f64::max);
    Ok(max.into())
}

// ============================================================================
// Track
// ============================================================================

/// A numeric column of the current track row.
pub fn track_row_lookup(ctx: &CallContext<'_>) -> Result<DiagValues> {
    let column = ctx.kwargs.get_str("column_name")?;
    let to_0_360 = ctx.kwargs.get_bool_or("convert_to_0_360", false)?;
    Ok(row_column(ctx, column, to_0_360)?.into())
}

fn row_column(ctx: &CallContext<'_>, column: &str, to_0_360: bool) -> Result<f64> {
    let value = ctx
        .data
        .track_row
        .column(column)
        .ok_or_else(|| DiagError::UnknownTrackColumn(column.to_string()))?;
    Ok(if to_0_360 { value.rem_euclid(360.0) } else { value })
}

/// Distance from the storm center to the nearest land, in km.
pub fn distance_to_land_lookup(ctx: &CallContext<'_>) -> Result<DiagValues> {
    let lon_column = ctx.kwargs.opt_str("lon_column_name")?.unwrap_or("lon");
    let lat_column = ctx.kwargs.opt_str("lat_column_name")?.unwrap_or("lat");

    let lon = row_column(ctx, lon_column, true)?;
    let lat = row_column(ctx, lat_column, false)?;
    let distance = ctx.data.land_lut.distance(lon, lat);

    info!(hour = ctx.hour(), lon, lat, distance, "Distance to land");
    Ok(DiagValues::single(distance).with_units(LandLUT::UNITS))
}

/// Storm translation speed (kt) and heading (degrees) from the model track.
///
/// Uses a forward difference at the first lead time of the cycle, a
/// backward difference at the last and a centered difference otherwise.
pub fn storm_r_theta(ctx: &CallContext<'_>) -> Result<DiagValues> {
    let dt = ctx.kwargs.opt_i32("time_delta_hours")?.unwrap_or(6);
    if dt <= 0 {
        return Err(DiagError::invalid_argument(
            "time_delta_hours",
            "must be greater than 0",
        ));
    }
    let hour = ctx.hour();

    let cycle = ctx.data.track.cycle(ctx.data.model_time);
    let (min_tau, max_tau) = match (cycle.first(), cycle.last()) {
        (Some(first), Some(last)) => (first.tau, last.tau),
        _ => return Err(DiagError::MissingTrackRow(hour)),
    };

    let (lower_offset, upper_offset, delta_t) = if hour == min_tau {
        (0, dt, dt)
    } else if hour == max_tau {
        (-dt, 0, dt)
    } else {
        (-dt, dt, 2 * dt)
    };

    let row_at = |tau: i32| {
        cycle
            .iter()
            .find(|row| row.tau == tau)
            .ok_or(DiagError::MissingTrackRow(tau))
    };
    let lower = row_at(hour + lower_offset)?;
    let upper = row_at(hour + upper_offset)?;

    let (lower_lon, lower_lat) = lower.tc_location();
    let (upper_lon, upper_lat) = upper.tc_location();

    let dlon = wrap_longitude_delta(upper_lon - lower_lon);
    let dlat = upper_lat - lower_lat;
    let cfac = ((upper_lat + lower_lat) / 2.0).to_radians().cos();
    let delta_t = f64::from(delta_t);

    let v = DEG_TO_NMI * dlat / delta_t;
    let u = cfac * DEG_TO_NMI * dlon / delta_t;
    let (r, theta) = u_v_to_r_theta(u, v);

    info!(hour, speed_kt = r, heading = theta, "Storm motion");
    Ok(DiagValues::pair(r, theta))
}

// ============================================================================
// Soundings
// ============================================================================

/// Magnitude and heading of the wind difference between two levels.
///
/// Reads sounding results stored by an earlier batch, interpolating in
/// pressure when a level is not on the sounding grid.
pub fn shear(ctx: &CallContext<'_>) -> Result<DiagValues> {
    let u_name = ctx.kwargs.get_str("u_name")?;
    let v_name = ctx.kwargs.get_str("v_name")?;
    let bottom = ctx.kwargs.get_f64("bottom_hPa")?;
    let top = ctx.kwargs.get_f64("top_hPa")?;
    let converter = ctx.converter("uv_converter")?;
    let hour = ctx.hour();

    let component = |name: &str| -> Result<f64> {
        let at_bottom = ctx.results.sounding_at_pressure(name, hour, bottom)?;
        let at_top = ctx.results.sounding_at_pressure(name, hour, top)?;
        let diff = at_top - at_bottom;
        Ok(converter.map_or(diff, |convert| convert(diff)))
    };
    let u = component(u_name)?;
    let v = component(v_name)?;

    let (r, theta) = u_v_to_r_theta(u, v);
    info!(hour, bottom, top, shear = r, heading = theta, "Shear");
    Ok(DiagValues::pair(r, theta))
}

/// Layer-mean horizontal temperature gradient from the thermal wind.
pub fn temperature_gradient(ctx: &CallContext<'_>) -> Result<DiagValues> {
    let u_name = ctx.kwargs.get_str("u_name")?;
    let v_name = ctx.kwargs.get_str("v_name")?;
    let bottom = ctx.kwargs.get_i32("bottom_hPa")?;
    let top = ctx.kwargs.get_i32("top_hPa")?;
    let converter = ctx.converter("uv_converter")?;
    let hour = ctx.hour();

    let at = |name: &str, level: i32| -> Result<f64> {
        let value = ctx.results.sounding_value(name, hour, level)?;
        Ok(converter.map_or(value, |convert| convert(value)))
    };
    let (bottom_u, top_u) = (at(u_name, bottom)?, at(u_name, top)?);
    let (bottom_v, top_v) = (at(v_name, bottom)?, at(v_name, top)?);

    let f = 2.0 * OMEGA * (ctx.data.tc_lat * DEG_TO_RAD).sin();
    let plog = (f64::from(bottom) / f64::from(top)).ln();
    let cfac = f / (DRY_AIR_GAS_CONSTANT * plog);

    let dtdx = -cfac * (bottom_v - top_v);
    let dtdy = cfac * (bottom_u - top_u);
    Ok(dtdx.hypot(dtdy).into())
}

// ============================================================================
// Winds on the polar grid
// ============================================================================

/// Azimuthally averaged radial and tangential winds at the context level.
struct RadialTangential {
    radial: Array1<f64>,
    tangential: Array1<f64>,
}

fn radial_tangential_profiles(ctx: &CallContext<'_>) -> Result<RadialTangential> {
    let u_name = ctx.kwargs.get_str("u_name")?;
    let v_name = ctx.kwargs.get_str("v_name")?;
    let level = f64::from(ctx.level()?);

    let u = ctx.data.dataset.interp_level(u_name, level)?;
    let v = ctx.data.dataset.interp_level(v_name, level)?;
    let u_cyl = resample(ctx, u.view())?;
    let v_cyl = resample(ctx, v.view())?;

    let theta = ctx.data.interpolator.polar_grid().theta_2d_radians();
    let mut radial = Array2::<f64>::zeros(u_cyl.dim());
    let mut tangential = Array2::<f64>::zeros(u_cyl.dim());
    Zip::from(&mut radial)
        .and(&mut tangential)
        .and(&u_cyl)
        .and(&v_cyl)
        .and(theta)
        .for_each(|rad, tan, &u, &v, &t| {
            let (sin, cos) = t.sin_cos();
            *rad = u * cos + v * sin;
            *tan = -u * sin + v * cos;
        });

    Ok(RadialTangential {
        radial: azimuthal_average(radial.view()),
        tangential: azimuthal_average(tangential.view()),
    })
}

/// Area averages of the azimuthally averaged radial and tangential winds.
pub fn radial_and_tangential_area_average(ctx: &CallContext<'_>) -> Result<DiagValues> {
    let min_km = ctx.kwargs.get_f64("min_radius_km")?;
    let max_km = ctx.kwargs.get_f64("max_radius_km")?;

    let profiles = radial_tangential_profiles(ctx)?;
    let radii = ctx.data.interpolator.polar_grid().radii_km();
    let radial = area_average(profiles.radial.iter(), radii.iter(), min_km, max_km);
    let tangential = area_average(profiles.tangential.iter(), radii.iter(), min_km, max_km);
    Ok(DiagValues::pair(radial, tangential))
}

/// Divergence and relative vorticity (1/s) inside the ring nearest
/// `radius_km`, from the circulation theorem.
pub fn divergence_vorticity(ctx: &CallContext<'_>) -> Result<DiagValues> {
    let radius_km = ctx.kwargs.get_f64("radius_km")?;
    let (closest_km, index) = ctx.data.interpolator.polar_grid().nearest_radius(radius_km)?;
    if closest_km <= 0.0 {
        return Err(DiagError::invalid_argument(
            "radius_km",
            format!("{} km is nearest the storm center", radius_km),
        ));
    }

    let profiles = radial_tangential_profiles(ctx)?;
    let radius_m = closest_km * 1000.0;
    let divergence = 2.0 * profiles.radial[index] / radius_m;
    let vorticity = 2.0 * profiles.tangential[index] / radius_m;

    info!(
        hour = ctx.hour(),
        level_hpa = ?ctx.level_hpa,
        radius_km,
        divergence,
        vorticity,
        "Divergence and vorticity"
    );
    Ok(DiagValues::pair(divergence, vorticity))
}

/// Mean over azimuths of the radius of maximum surface wind speed, searched
/// out to `radius_km`.
pub fn average_rmw(ctx: &CallContext<'_>) -> Result<DiagValues> {
    let u_name = ctx.kwargs.get_str("u_surface_name")?;
    let v_name = ctx.kwargs.get_str("v_surface_name")?;
    let radius_km = ctx.kwargs.get_f64("radius_km")?;

    let u = ctx.data.dataset.field(u_name, None)?;
    let v = ctx.data.dataset.field(v_name, None)?;
    let u_cyl = resample(ctx, u)?;
    let v_cyl = resample(ctx, v)?;

    let radii = ctx.data.interpolator.polar_grid().radii_km();
    let rmw = post_cyl_avg_rmw(&u_cyl, &v_cyl, radius_km, radii.as_slice().unwrap_or(&[]));
    info!(hour = ctx.hour(), radius_km, rmw_km = rmw, "Average RMW");
    Ok(rmw.into())
}

/// RMW averaged over azimuths for polar `u`/`v` winds.
pub fn post_cyl_avg_rmw(u_cyl: &Array2<f64>, v_cyl: &Array2<f64>, radius_km: f64, radii_km: &[f64]) -> f64 {
    // Largest radius index not beyond radius_km.
    let last = radii_km
        .iter()
        .take_while(|&&rad| rad <= radius_km)
        .count()
        .max(1)
        .min(radii_km.len());

    let mut total = 0.0;
    let mut count = 0usize;
    for (u_row, v_row) in u_cyl.outer_iter().zip(v_cyl.outer_iter()) {
        let argmax = u_row
            .iter()
            .zip(v_row.iter())
            .take(last)
            .map(|(u, v)| u.hypot(*v))
            .enumerate()
            .filter(|(_, speed)| !speed.is_nan())
            .fold(None, |best: Option<(usize, f64)>, (i, speed)| match best {
                Some((_, best_speed)) if best_speed >= speed => best,
                _ => Some((i, speed)),
            });
        if let Some((i, _)) = argmax {
            total += radii_km[i];
            count += 1;
        }
    }

    if count == 0 {
        f64::NAN
    } else {
        total / count as f64
    }
}

// ============================================================================
// Misc
// ============================================================================

/// Always NaN; stands in for diagnostics a model can not provide.
pub fn always_missing(_ctx: &CallContext<'_>) -> Result<DiagValues> {
    Ok(f64::NAN.into())
}

#[derive(Serialize)]
struct PolarDump<'a> {
    var_name: &'a str,
    level_hpa: Option<i32>,
    hour: i32,
    theta_radians: Vec<f64>,
    radius_km: Vec<f64>,
    /// Row per azimuth, column per radius.
    values: Vec<Vec<f64>>,
}

/// Write a field on the polar grid to a JSON file for inspection.
///
/// `output_filename` may use `{grib_var_name}`, `{level_hPa}` and `{hour}`.
/// Always returns NaN.
pub fn debug_cyl_grid_dump(ctx: &CallContext<'_>) -> Result<DiagValues> {
    let var_name = ctx.kwargs.get_str("grib_var_name")?;
    let template = ctx.kwargs.get_str("output_filename")?;
    let converter = ctx.converter("unit_converter")?;
    let level = ctx.opt_level()?;
    let hour = ctx.hour();

    let mut vars = TemplateVars::new()
        .text("grib_var_name", var_name)
        .int("hour", i64::from(hour));
    vars = match level {
        Some(level) => vars.int("level_hPa", i64::from(level)),
        None => vars.text("level_hPa", "none"),
    };
    let path = PathBuf::from(vars.render(template)?);
    info!(var_name, path = %path.display(), "Started polar grid dump");

    let polar = polar_field(ctx, var_name, converter)?;
    let grid = ctx.data.interpolator.polar_grid();
    let dump = PolarDump {
        var_name,
        level_hpa: level,
        hour,
        theta_radians: grid.theta_radians().to_vec(),
        radius_km: grid.radii_km().to_vec(),
        values: polar.outer_iter().map(|row| row.to_vec()).collect(),
    };

    let writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(writer, &dump)?;

    info!(var_name, path = %path.display(), "Finished polar grid dump");
    Ok(f64::NAN.into())
}
