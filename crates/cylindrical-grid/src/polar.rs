//! Storm-centered polar grid and radial averaging helpers.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use std::f64::consts::PI;

use crate::error::{GridError, Result};

/// A polar grid of `n_theta x n_radii` points centered on the storm.
///
/// All 2-D arrays are shaped `(n_theta, n_radii)`: rows are azimuths and
/// columns are radii. Azimuth is measured counter-clockwise from east, so
/// `x = r cos(theta)` points east and `y = r sin(theta)` points north.
#[derive(Debug, Clone)]
pub struct PolarGrid {
    n_radii: usize,
    n_theta: usize,
    radii_step_km: f64,
    radii_km: Array1<f64>,
    theta_radians: Array1<f64>,
    rad_2d_km: Array2<f64>,
    theta_2d_radians: Array2<f64>,
    x_km: Array2<f64>,
    y_km: Array2<f64>,
}

impl PolarGrid {
    /// Build a polar grid with radii `0, step, ..., (n_radii - 1) * step`
    /// and `n_theta` azimuths evenly spaced over `[0, 2pi)`.
    pub fn new(n_radii: usize, n_theta: usize, radii_step_km: f64) -> Result<Self> {
        if n_radii == 0 || n_theta == 0 {
            return Err(GridError::invalid_polar_grid(format!(
                "n_radii ({}) and n_theta ({}) must be > 0",
                n_radii, n_theta
            )));
        }
        if radii_step_km <= 0.0 || !radii_step_km.is_finite() {
            return Err(GridError::invalid_polar_grid(format!(
                "radii_step_km must be a positive number, got {}",
                radii_step_km
            )));
        }

        let radii_km = Array1::from_shape_fn(n_radii, |i| i as f64 * radii_step_km);
        let theta_radians = Array1::from_shape_fn(n_theta, |k| 2.0 * PI * k as f64 / n_theta as f64);

        let shape = (n_theta, n_radii);
        let rad_2d_km = Array2::from_shape_fn(shape, |(_, i)| radii_km[i]);
        let theta_2d_radians = Array2::from_shape_fn(shape, |(k, _)| theta_radians[k]);
        let x_km = Array2::from_shape_fn(shape, |(k, i)| radii_km[i] * theta_radians[k].cos());
        let y_km = Array2::from_shape_fn(shape, |(k, i)| radii_km[i] * theta_radians[k].sin());

        Ok(Self {
            n_radii,
            n_theta,
            radii_step_km,
            radii_km,
            theta_radians,
            rad_2d_km,
            theta_2d_radians,
            x_km,
            y_km,
        })
    }

    pub fn n_radii(&self) -> usize {
        self.n_radii
    }

    pub fn n_theta(&self) -> usize {
        self.n_theta
    }

    pub fn radii_step_km(&self) -> f64 {
        self.radii_step_km
    }

    /// Shape of every polar field: `(n_theta, n_radii)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.n_theta, self.n_radii)
    }

    /// Largest radius on the grid.
    pub fn max_radius_km(&self) -> f64 {
        (self.n_radii - 1) as f64 * self.radii_step_km
    }

    /// 1-D radii, one per column.
    pub fn radii_km(&self) -> &Array1<f64> {
        &self.radii_km
    }

    /// 1-D azimuths, one per row.
    pub fn theta_radians(&self) -> &Array1<f64> {
        &self.theta_radians
    }

    pub fn rad_2d_km(&self) -> &Array2<f64> {
        &self.rad_2d_km
    }

    pub fn theta_2d_radians(&self) -> &Array2<f64> {
        &self.theta_2d_radians
    }

    /// Eastward offset of each polar point from the storm center.
    pub fn x_km(&self) -> &Array2<f64> {
        &self.x_km
    }

    /// Northward offset of each polar point from the storm center.
    pub fn y_km(&self) -> &Array2<f64> {
        &self.y_km
    }

    /// Find the grid radius closest to `desired_km`.
    ///
    /// Returns the radius and its column index. A radius beyond the outermost
    /// ring is an error rather than being silently clamped.
    pub fn nearest_radius(&self, desired_km: f64) -> Result<(f64, usize)> {
        let max_km = self.max_radius_km();
        if desired_km > max_km || desired_km < 0.0 || !desired_km.is_finite() {
            return Err(GridError::RadiusOutOfRange {
                requested_km: desired_km,
                max_km,
            });
        }
        let index = ((desired_km / self.radii_step_km).round() as usize).min(self.n_radii - 1);
        Ok((self.radii_km[index], index))
    }
}

/// Mean across the azimuth axis of a polar field, giving a radial profile.
pub fn azimuthal_average(polar_field: ArrayView2<'_, f64>) -> Array1<f64> {
    polar_field
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::from_elem(polar_field.ncols(), f64::NAN))
}

/// Radius-weighted mean of the values whose radius lies in `[min_km, max_km]`.
///
/// `values` and `radii_km` are walked in lockstep, so either a radial profile
/// with its 1-D radii or a polar field with its 2-D radii may be passed.
/// Weighting by radius keeps the outer annuli, which cover more area, from
/// being undercounted. Returns NaN when no radius falls in the band.
pub fn area_average<'a, V, R>(values: V, radii_km: R, min_km: f64, max_km: f64) -> f64
where
    V: IntoIterator<Item = &'a f64>,
    R: IntoIterator<Item = &'a f64>,
{
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (&value, &radius) in values.into_iter().zip(radii_km) {
        if radius >= min_km && radius <= max_km {
            numerator += value * radius;
            denominator += radius;
        }
    }
    numerator / denominator
}
