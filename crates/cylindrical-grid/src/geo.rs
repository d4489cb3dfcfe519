//! Geographic helpers for storm-relative coordinates.
//!
//! Source grids are converted to kilometers relative to the storm center with
//! a flat-earth approximation. This is accurate to well under a percent at the
//! few hundred kilometers the polar grid covers; [`flat_earth_error`] reports
//! how far it drifts from the great-circle distance at a given radius.

use ndarray::{Array1, Array2};

/// Kilometers per degree of latitude used by the flat-earth conversion.
pub const KM_PER_DEGREE: f64 = 111.1;

/// Mean earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Wrap a longitude difference into `[-180, 180)`.
pub fn wrap_longitude_delta(delta: f64) -> f64 {
    (delta + 180.0).rem_euclid(360.0) - 180.0
}

/// Normalize a longitude into `[0, 360)`.
pub fn normalize_longitude(lon: f64) -> f64 {
    lon.rem_euclid(360.0)
}

/// Great-circle distance in km between two lon/lat points (degrees).
pub fn haversine_distance(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = wrap_longitude_delta(lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());
    EARTH_RADIUS_KM * c
}

/// Flat-earth x offsets (km east of the storm) for each source longitude.
pub fn lon_offsets_km(lons: &[f64], tc_lon: f64, tc_lat: f64) -> Array1<f64> {
    let scale = KM_PER_DEGREE * tc_lat.to_radians().cos();
    lons.iter()
        .map(|&lon| wrap_longitude_delta(lon - tc_lon) * scale)
        .collect()
}

/// Flat-earth y offsets (km north of the storm) for each source latitude.
pub fn lat_offsets_km(lats: &[f64], tc_lat: f64) -> Array1<f64> {
    lats.iter().map(|&lat| (lat - tc_lat) * KM_PER_DEGREE).collect()
}

/// Convert a regular lon/lat grid to storm-centric km offsets.
///
/// Returns `(x_km, y_km)`, both shaped `(lats.len(), lons.len())`.
pub fn convert_grid_to_tc_centric_km(
    lons: &[f64],
    lats: &[f64],
    tc_lon: f64,
    tc_lat: f64,
) -> (Array2<f64>, Array2<f64>) {
    let x = lon_offsets_km(lons, tc_lon, tc_lat);
    let y = lat_offsets_km(lats, tc_lat);
    let shape = (lats.len(), lons.len());

    let x_km = Array2::from_shape_fn(shape, |(_, i)| x[i]);
    let y_km = Array2::from_shape_fn(shape, |(j, _)| y[j]);
    (x_km, y_km)
}

/// Flat-earth distance in km from the storm center to every source point.
pub fn distances_from_tc(lons: &[f64], lats: &[f64], tc_lon: f64, tc_lat: f64) -> Array2<f64> {
    let (x_km, y_km) = convert_grid_to_tc_centric_km(lons, lats, tc_lon, tc_lat);
    let mut distances = x_km;
    distances.zip_mut_with(&y_km, |x, &y| *x = x.hypot(y));
    distances
}

/// Relative error of the flat-earth approximation for a point `radius_km`
/// due east of the storm, compared to the great-circle distance.
pub fn flat_earth_error(tc_lon: f64, tc_lat: f64, radius_km: f64) -> f64 {
    if radius_km <= 0.0 {
        return 0.0;
    }
    let dlon = radius_km / (KM_PER_DEGREE * tc_lat.to_radians().cos());
    let exact = haversine_distance(tc_lon, tc_lat, tc_lon + dlon, tc_lat);
    ((exact - radius_km) / radius_km).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_symmetry() {
        let a = haversine_distance(-75.0, 25.0, -60.0, 30.0);
        let b = haversine_distance(-60.0, 30.0, -75.0, 25.0);
        assert!((a - b).abs() < 1e-9);
        assert_eq!(haversine_distance(-75.0, 25.0, -75.0, 25.0), 0.0);
    }

    #[test]
    fn test_haversine_one_degree_latitude() {
        let d = haversine_distance(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111.19).abs() < 0.1, "got {}", d);
    }

    #[test]
    fn test_haversine_across_dateline() {
        let d = haversine_distance(179.5, 0.0, -179.5, 0.0);
        assert!((d - 111.19).abs() < 0.1, "got {}", d);
    }

    #[test]
    fn test_wrap_longitude_delta() {
        assert_eq!(wrap_longitude_delta(10.0), 10.0);
        assert_eq!(wrap_longitude_delta(350.0), -10.0);
        assert_eq!(wrap_longitude_delta(-350.0), 10.0);
        assert_eq!(wrap_longitude_delta(180.0), -180.0);
    }

    #[test]
    fn test_tc_centric_offsets() {
        let lons = [279.0, 280.0, 281.0];
        let lats = [19.0, 20.0, 21.0];
        let (x, y) = convert_grid_to_tc_centric_km(&lons, &lats, -80.0, 20.0);
        assert_eq!(x.dim(), (3, 3));
        assert!(x[[1, 1]].abs() < 1e-9);
        assert!(y[[1, 1]].abs() < 1e-9);
        let expected_dx = KM_PER_DEGREE * 20.0_f64.to_radians().cos();
        assert!((x[[0, 2]] - expected_dx).abs() < 1e-9);
        assert!((y[[2, 0]] - KM_PER_DEGREE).abs() < 1e-9);
    }

    #[test]
    fn test_distances_from_tc() {
        let d = distances_from_tc(&[0.0, 1.0], &[0.0], 0.0, 0.0);
        assert!(d[[0, 0]].abs() < 1e-12);
        assert!((d[[0, 1]] - KM_PER_DEGREE).abs() < 1e-9);
    }

    #[test]
    fn test_flat_earth_error_small_at_mesoscale() {
        assert!(flat_earth_error(-60.0, 20.0, 500.0) < 0.01);
        assert_eq!(flat_earth_error(-60.0, 20.0, 0.0), 0.0);
    }
}
